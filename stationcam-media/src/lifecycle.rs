//! Camera lifecycle manager
//!
//! One manager per widget. It composes the device registry, the stream
//! session, the preview surface and the frame capturer, and applies a
//! [`CameraPolicy`] describing how the owning widget wants the camera to
//! behave around captures.

use crate::capture::{CapturedFrame, FrameCapturer, DEFAULT_JPEG_QUALITY};
use crate::device::{DeviceDescriptor, DeviceListing, DeviceRegistry};
use crate::error::{MediaError, MediaResult};
use crate::platform::CameraPlatform;
use crate::preview::{NullSink, PreviewStatus, PreviewSurface, VideoSink};
use crate::stream::{
    CameraSession, FeedQuality, StreamConstraints, StreamHandle, StreamSession,
    DEFAULT_REFRESH_INTERVAL,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the preview shows after a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    /// Keep showing the live stream
    Continuous,
    /// Hold the captured frame until the stream is rebound
    FreezeOnCapture,
}

/// Per-widget camera behaviour
#[derive(Debug, Clone)]
pub struct CameraPolicy {
    /// Preview behaviour after capture
    pub preview: PreviewMode,
    /// Release the stream right after a capture
    pub stop_after_capture: bool,
    /// Select the first device when nothing valid is selected
    pub auto_select_first: bool,
    /// Delay before falling back to a simulated scan when acquisition fails
    pub simulate_on_failure: Option<Duration>,
    /// Hints for every acquisition
    pub constraints: StreamConstraints,
    /// JPEG quality for captures
    pub jpeg_quality: u8,
    /// Liveness refresh period while active
    pub refresh_interval: Duration,
}

impl Default for CameraPolicy {
    fn default() -> Self {
        Self {
            preview: PreviewMode::Continuous,
            stop_after_capture: false,
            auto_select_first: false,
            simulate_on_failure: None,
            constraints: StreamConstraints::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl CameraPolicy {
    /// Scanner behaviour: freeze, stop after capture, first device preselected
    pub fn scanner() -> Self {
        Self {
            preview: PreviewMode::FreezeOnCapture,
            stop_after_capture: true,
            auto_select_first: true,
            ..Default::default()
        }
    }

    /// Replace the acquisition hints
    pub fn with_constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Fall back to a simulated scan `delay` after a failed acquisition
    pub fn with_simulation_fallback(mut self, delay: Duration) -> Self {
        self.simulate_on_failure = Some(delay);
        self
    }
}

/// Camera lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    /// Enumeration finished
    DevicesRefreshed {
        /// Cameras found
        count: usize,
        /// Selection after reconciliation
        selected: Option<String>,
    },
    /// A stream became active
    StreamStarted {
        /// Device opened
        device_id: String,
        /// New stream
        stream_id: Uuid,
    },
    /// The active stream was released
    StreamStopped {
        /// Stream released
        stream_id: Option<Uuid>,
    },
    /// A still frame was taken
    FrameCaptured {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Preview could not play; the stream is still usable
    PreviewWarning {
        /// Warning text
        message: String,
    },
    /// Enumeration or acquisition failed
    CameraError {
        /// Error text
        message: String,
    },
}

/// Owns one widget's camera from discovery to teardown
pub struct CameraLifecycleManager {
    policy: CameraPolicy,
    registry: DeviceRegistry,
    session: StreamSession,
    surface: Mutex<PreviewSurface>,
    capturer: FrameCapturer,
    devices: RwLock<DeviceListing>,
    selected: RwLock<Option<String>>,
    constraints: RwLock<StreamConstraints>,
    last_capture: RwLock<Option<CapturedFrame>>,
    event_tx: broadcast::Sender<CameraEvent>,
}

impl CameraLifecycleManager {
    /// Manager with a preview that renders nowhere
    pub fn new(platform: Arc<dyn CameraPlatform>, policy: CameraPolicy) -> MediaResult<Self> {
        Self::with_sink(platform, policy, Box::new(NullSink))
    }

    /// Manager rendering its preview into `sink`
    pub fn with_sink(
        platform: Arc<dyn CameraPlatform>,
        policy: CameraPolicy,
        sink: Box<dyn VideoSink>,
    ) -> MediaResult<Self> {
        policy.constraints.validate()?;
        let capturer = FrameCapturer::new(policy.jpeg_quality)?;
        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            registry: DeviceRegistry::new(platform.clone()),
            session: StreamSession::with_refresh_interval(platform, policy.refresh_interval),
            surface: Mutex::new(PreviewSurface::new(sink)),
            capturer,
            devices: RwLock::new(DeviceListing::default()),
            selected: RwLock::new(None),
            constraints: RwLock::new(policy.constraints.clone()),
            last_capture: RwLock::new(None),
            event_tx,
            policy,
        })
    }

    /// Behaviour this manager was built with
    pub fn policy(&self) -> &CameraPolicy {
        &self.policy
    }

    /// Re-enumerate cameras and reconcile the selection
    pub async fn refresh_devices(&self) -> MediaResult<DeviceListing> {
        let listing = match self.registry.list_devices().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Device refresh failed: {}", e);
                self.emit(CameraEvent::CameraError {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let selected = {
            let mut selected = self.selected.write();
            let mut reconciled = listing.reconcile(selected.as_deref());
            if reconciled.is_none() && selected.is_some() {
                debug!("Selected camera vanished, clearing selection");
            }
            if reconciled.is_none() && self.policy.auto_select_first {
                reconciled = listing.first().map(|d| d.id.clone());
            }
            *selected = reconciled.clone();
            reconciled
        };

        *self.devices.write() = listing.clone();
        self.emit(CameraEvent::DevicesRefreshed {
            count: listing.len(),
            selected,
        });
        Ok(listing)
    }

    /// Last enumeration result
    pub fn devices(&self) -> DeviceListing {
        self.devices.read().clone()
    }

    /// Select a listed camera. Locked while a camera is connecting.
    pub fn select_device(&self, device_id: &str) -> MediaResult<DeviceDescriptor> {
        if self.session.is_connecting() {
            return Err(MediaError::AcquisitionInProgress);
        }
        let device = self
            .devices
            .read()
            .devices()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| MediaError::DeviceNotFound {
                device_id: device_id.to_string(),
            })?;

        *self.selected.write() = Some(device.id.clone());
        debug!("Selected camera {}", device.display_label());
        Ok(device)
    }

    /// Forget the selection
    pub fn clear_selection(&self) {
        *self.selected.write() = None;
    }

    /// Current selection
    pub fn selected_device(&self) -> Option<String> {
        self.selected.read().clone()
    }

    /// Start the camera on `device_id`, or on the selection when `None`
    pub async fn start(&self, device_id: Option<&str>) -> MediaResult<StreamHandle> {
        let device_id = match device_id {
            Some(id) => id.to_string(),
            None => self
                .selected_device()
                .ok_or_else(|| MediaError::InvalidConfiguration {
                    message: "No camera selected".to_string(),
                })?,
        };

        let constraints = self.constraints.read().clone();
        let previous = self.session.handle();
        let handle = match self.session.acquire(&device_id, &constraints).await {
            Ok(handle) => handle,
            Err(e) => {
                if previous.is_some() {
                    self.surface.lock().bind(None);
                }
                self.emit(CameraEvent::CameraError {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let status = self.surface.lock().bind(Some(&handle)).clone();
        if let PreviewStatus::Warning(message) = status {
            self.emit(CameraEvent::PreviewWarning { message });
        }
        if let Err(e) = self.refresh_preview() {
            debug!("First preview frame unavailable: {}", e);
        }

        info!("Camera started on {}", device_id);
        self.emit(CameraEvent::StreamStarted {
            device_id,
            stream_id: handle.stream_id,
        });
        Ok(handle)
    }

    /// Release the stream and detach the preview. Returns whether a stream was held.
    pub fn stop(&self) -> bool {
        let stream_id = self.session.handle().map(|h| h.stream_id);
        let released = self.session.release();
        self.surface.lock().bind(None);

        if released {
            info!("Camera stopped");
            self.emit(CameraEvent::StreamStopped { stream_id });
        }
        released
    }

    /// Present the stream's current frame on the preview
    pub fn refresh_preview(&self) -> MediaResult<bool> {
        let handle = match self.session.handle() {
            Some(handle) => handle,
            None => return Ok(false),
        };
        let frame = self.session.grab_frame()?;
        Ok(self.surface.lock().present(handle.stream_id, frame))
    }

    /// Take a still frame, then apply the preview and stop policies
    pub fn capture(&self) -> MediaResult<CapturedFrame> {
        if self.session.is_active() {
            if let Err(e) = self.refresh_preview() {
                debug!("Capturing last presented frame: {}", e);
            }
        }

        let frame = {
            let mut surface = self.surface.lock();
            let frame = self.capturer.capture(&surface)?;
            if self.policy.preview == PreviewMode::FreezeOnCapture {
                surface.freeze();
            }
            frame
        };

        info!("Captured {}x{} frame", frame.width, frame.height);
        *self.last_capture.write() = Some(frame.clone());
        self.emit(CameraEvent::FrameCaptured {
            width: frame.width,
            height: frame.height,
        });

        if self.policy.stop_after_capture {
            self.stop();
        }
        Ok(frame)
    }

    /// Most recent capture
    pub fn last_capture(&self) -> Option<CapturedFrame> {
        self.last_capture.read().clone()
    }

    /// Drop the held capture
    pub fn clear_capture(&self) {
        *self.last_capture.write() = None;
    }

    /// Use `quality` for the next acquisition
    pub fn change_quality(&self, quality: FeedQuality) {
        self.session.set_quality(quality);
        self.constraints.write().ideal_resolution = Some(quality.ideal_resolution());
        debug!("Feed quality set to {:?}", quality);
    }

    /// Hints used by the next acquisition
    pub fn constraints(&self) -> StreamConstraints {
        self.constraints.read().clone()
    }

    /// Session view
    pub fn snapshot(&self) -> CameraSession {
        self.session.snapshot()
    }

    /// Current stream handle
    pub fn handle(&self) -> Option<StreamHandle> {
        self.session.handle()
    }

    /// Whether a stream is live
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Whether the liveness task is running
    pub fn has_liveness_task(&self) -> bool {
        self.session.has_liveness_task()
    }

    /// Preview status
    pub fn preview_status(&self) -> PreviewStatus {
        self.surface.lock().status().clone()
    }

    /// Start is offered only with cameras present and no acquisition running
    pub fn can_start(&self) -> bool {
        !self.session.is_connecting() && !self.devices.read().is_empty()
    }

    /// Leave the error state without acquiring
    pub fn clear_error(&self) {
        self.session.clear_error();
    }

    /// Teardown: release everything the manager holds
    pub fn shutdown(&self) {
        self.stop();
        self.clear_capture();
        debug!("Camera manager for session {} shut down", self.session.id());
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: CameraEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for CameraLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraLifecycleManager")
            .field("policy", &self.policy)
            .field("session", &self.session)
            .field("selected", &*self.selected.read())
            .finish()
    }
}
