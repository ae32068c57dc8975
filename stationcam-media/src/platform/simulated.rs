//! In-process camera platform for tests, demos and machines without cameras

use super::{CameraPlatform, LiveStream, RawFrame, StreamRequest};
use crate::device::{DeviceDescriptor, DeviceKind};
use crate::error::{MediaError, MediaResult};
use crate::stream::VideoResolution;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Behaviour of a [`SimulatedPlatform`]
#[derive(Debug, Clone)]
pub struct SimulatedPlatformConfig {
    /// Devices reported by enumeration
    pub devices: Vec<DeviceDescriptor>,
    /// Every open fails with `PermissionDenied`
    pub permission_denied: bool,
    /// Enumeration itself fails
    pub enumeration_fails: bool,
    /// Devices held by another application
    pub busy_devices: HashSet<String>,
    /// Devices that fail to open for a hardware reason
    pub failing_devices: HashSet<String>,
    /// Resolution every stream negotiates; `None` honours the request, else VGA
    pub native_resolution: Option<VideoResolution>,
    /// Simulated time spent in the platform's open call
    pub open_delay: Duration,
}

impl Default for SimulatedPlatformConfig {
    fn default() -> Self {
        Self {
            devices: vec![
                DeviceDescriptor::video_input("cam-1", "Station Camera"),
                DeviceDescriptor::video_input("cam-2", "Dock Camera"),
            ],
            permission_denied: false,
            enumeration_fails: false,
            busy_devices: HashSet::new(),
            failing_devices: HashSet::new(),
            native_resolution: None,
            open_delay: Duration::ZERO,
        }
    }
}

struct PlatformState {
    config: RwLock<SimulatedPlatformConfig>,
    disconnected: RwLock<HashSet<String>>,
    live: AtomicUsize,
    opened: AtomicUsize,
}

/// Simulated camera platform. Clones share state, so a test can keep one
/// clone to inspect the live-stream count and inject faults.
#[derive(Clone)]
pub struct SimulatedPlatform {
    state: Arc<PlatformState>,
}

impl SimulatedPlatform {
    /// Platform with the given behaviour
    pub fn new(config: SimulatedPlatformConfig) -> Self {
        Self {
            state: Arc::new(PlatformState {
                config: RwLock::new(config),
                disconnected: RwLock::new(HashSet::new()),
                live: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Platform reporting no devices
    pub fn empty() -> Self {
        Self::new(SimulatedPlatformConfig {
            devices: Vec::new(),
            ..Default::default()
        })
    }

    /// Streams opened and not yet stopped
    pub fn live_streams(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Streams opened over the platform's lifetime, permission probes included
    pub fn streams_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Replace the device list (hot-plug)
    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.state.config.write().devices = devices;
    }

    /// Toggle permission denial
    pub fn set_permission_denied(&self, denied: bool) {
        self.state.config.write().permission_denied = denied;
    }

    /// Mark `device_id` busy or free
    pub fn set_busy(&self, device_id: &str, busy: bool) {
        let mut config = self.state.config.write();
        if busy {
            config.busy_devices.insert(device_id.to_string());
        } else {
            config.busy_devices.remove(device_id);
        }
    }

    /// Change the simulated open latency
    pub fn set_open_delay(&self, delay: Duration) {
        self.state.config.write().open_delay = delay;
    }

    /// Unplug `device_id`: open streams stop delivering and it leaves enumeration
    pub fn disconnect(&self, device_id: &str) {
        self.state
            .disconnected
            .write()
            .insert(device_id.to_string());
        self.state
            .config
            .write()
            .devices
            .retain(|d| d.id != device_id);
    }

    fn pick_device(&self, request: &StreamRequest) -> MediaResult<DeviceDescriptor> {
        let config = self.state.config.read();
        let cameras = config
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::VideoInput);

        let found = match &request.device_id {
            Some(id) => cameras.clone().find(|d| &d.id == id),
            None => cameras.clone().next(),
        };

        found.cloned().ok_or_else(|| MediaError::DeviceNotFound {
            device_id: request
                .device_id
                .clone()
                .unwrap_or_else(|| "any".to_string()),
        })
    }
}

#[async_trait]
impl CameraPlatform for SimulatedPlatform {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn enumerate(&self) -> MediaResult<Vec<DeviceDescriptor>> {
        let config = self.state.config.read();
        if config.enumeration_fails {
            return Err(MediaError::DeviceEnumerationFailed {
                reason: "simulated enumeration failure".to_string(),
            });
        }

        if config.permission_denied {
            // Labels stay hidden until access is granted
            return Ok(config
                .devices
                .iter()
                .map(|d| DeviceDescriptor {
                    label: String::new(),
                    ..d.clone()
                })
                .collect());
        }
        Ok(config.devices.clone())
    }

    async fn open(&self, request: &StreamRequest) -> MediaResult<Box<dyn LiveStream>> {
        let delay = self.state.config.read().open_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let device = self.pick_device(request)?;
        let resolution = {
            let config = self.state.config.read();
            if config.permission_denied {
                return Err(MediaError::PermissionDenied {
                    operation: format!("open camera {}", device.id),
                });
            }
            if config.busy_devices.contains(&device.id) {
                return Err(MediaError::DeviceBusy {
                    device_id: device.id,
                });
            }
            if config.failing_devices.contains(&device.id) {
                return Err(MediaError::AcquisitionFailed {
                    device_id: device.id,
                    reason: "simulated hardware fault".to_string(),
                });
            }
            config
                .native_resolution
                .or(request.ideal_resolution)
                .unwrap_or(VideoResolution::VGA)
        };

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated stream opened on {} at {}", device.id, resolution);

        Ok(Box::new(SimulatedStream {
            device_id: device.id,
            resolution,
            sequence: 0,
            stopped: AtomicBool::new(false),
            platform: self.state.clone(),
        }))
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new(SimulatedPlatformConfig::default())
    }
}

impl std::fmt::Debug for SimulatedPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPlatform")
            .field("live_streams", &self.live_streams())
            .field("streams_opened", &self.streams_opened())
            .finish()
    }
}

struct SimulatedStream {
    device_id: String,
    resolution: VideoResolution,
    sequence: u64,
    stopped: AtomicBool,
    platform: Arc<PlatformState>,
}

impl SimulatedStream {
    fn gradient(&self) -> Vec<u8> {
        let (w, h) = (self.resolution.width, self.resolution.height);
        let shade = (self.sequence % 256) as u8;
        let mut rgb = Vec::with_capacity(self.resolution.pixel_count() * 3);
        for y in 0..h {
            for x in 0..w {
                rgb.push((x * 255 / w.max(1)) as u8);
                rgb.push((y * 255 / h.max(1)) as u8);
                rgb.push(shade);
            }
        }
        rgb
    }
}

impl LiveStream for SimulatedStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn resolution(&self) -> Option<VideoResolution> {
        Some(self.resolution)
    }

    fn read_frame(&mut self) -> MediaResult<RawFrame> {
        if !self.is_live() {
            return Err(MediaError::DeviceDisconnected {
                device_id: self.device_id.clone(),
            });
        }
        self.sequence += 1;
        RawFrame::new(
            self.resolution.width,
            self.resolution.height,
            self.gradient(),
            self.sequence,
        )
    }

    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.platform.live.fetch_sub(1, Ordering::SeqCst);
            debug!("Simulated stream on {} stopped", self.device_id);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
            && !self.platform.disconnected.read().contains(&self.device_id)
    }
}
