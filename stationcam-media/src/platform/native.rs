//! Native cameras through nokhwa
//!
//! nokhwa cameras are not `Send` on every backend, so each opened camera
//! lives on its own worker thread and is driven over a channel.

use super::{CameraPlatform, LiveStream, RawFrame, StreamRequest};
use crate::device::DeviceDescriptor;
use crate::error::{MediaError, MediaResult};
use crate::stream::VideoResolution;
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

enum WorkerCommand {
    Frame(mpsc::Sender<MediaResult<RawFrame>>),
    Stop,
}

/// Platform backed by the operating system's camera API
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;

impl NativePlatform {
    /// Native platform using nokhwa's automatic backend
    pub fn new() -> Self {
        Self
    }
}

fn parse_index(device_id: &str) -> CameraIndex {
    match device_id.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device_id.to_string()),
    }
}

fn requested_format(request: &StreamRequest) -> RequestedFormat<'static> {
    let format_type = match request.ideal_resolution {
        Some(resolution) => RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(resolution.width, resolution.height),
            FrameFormat::MJPEG,
            request.ideal_frame_rate.unwrap_or(30),
        )),
        None => RequestedFormatType::AbsoluteHighestFrameRate,
    };
    RequestedFormat::new::<RgbFormat>(format_type)
}

fn acquisition_failed(device_id: &str, reason: impl ToString) -> MediaError {
    MediaError::AcquisitionFailed {
        device_id: device_id.to_string(),
        reason: reason.to_string(),
    }
}

fn read_frame(camera: &mut Camera, device_id: &str, sequence: u64) -> MediaResult<RawFrame> {
    let buffer = camera
        .frame()
        .map_err(|e| acquisition_failed(device_id, e))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| MediaError::EncodingFailed {
            format: "rgb".to_string(),
            reason: e.to_string(),
        })?;
    let (width, height) = (decoded.width(), decoded.height());
    RawFrame::new(width, height, decoded.into_raw(), sequence)
}

fn run_worker(
    device_id: String,
    request: StreamRequest,
    ready: oneshot::Sender<MediaResult<VideoResolution>>,
    commands: mpsc::Receiver<WorkerCommand>,
    live: Arc<AtomicBool>,
) {
    let opened = Camera::new(parse_index(&device_id), requested_format(&request))
        .and_then(|mut camera| camera.open_stream().map(|_| camera));

    let mut camera = match opened {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(acquisition_failed(&device_id, e)));
            return;
        }
    };

    let negotiated = camera.resolution();
    let resolution = VideoResolution::new(negotiated.width(), negotiated.height());
    live.store(true, Ordering::SeqCst);
    if ready.send(Ok(resolution)).is_err() {
        // Caller went away before the camera opened
        let _ = camera.stop_stream();
        live.store(false, Ordering::SeqCst);
        return;
    }

    let mut sequence = 0u64;
    while let Ok(command) = commands.recv() {
        match command {
            WorkerCommand::Frame(reply) => {
                sequence += 1;
                let frame = read_frame(&mut camera, &device_id, sequence);
                if let Err(e) = &frame {
                    warn!("Camera {} frame read failed: {}", device_id, e);
                }
                let _ = reply.send(frame);
            }
            WorkerCommand::Stop => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!("Failed to stop camera {}: {}", device_id, e);
    }
    live.store(false, Ordering::SeqCst);
    debug!("Camera worker for {} exited", device_id);
}

#[async_trait]
impl CameraPlatform for NativePlatform {
    fn name(&self) -> &str {
        "native"
    }

    async fn enumerate(&self) -> MediaResult<Vec<DeviceDescriptor>> {
        let cameras = tokio::task::spawn_blocking(|| nokhwa::query(ApiBackend::Auto))
            .await
            .map_err(|e| MediaError::DeviceEnumerationFailed {
                reason: e.to_string(),
            })?
            .map_err(|e| MediaError::DeviceEnumerationFailed {
                reason: e.to_string(),
            })?;

        Ok(cameras
            .into_iter()
            .map(|info| DeviceDescriptor::video_input(info.index().as_string(), info.human_name()))
            .collect())
    }

    async fn open(&self, request: &StreamRequest) -> MediaResult<Box<dyn LiveStream>> {
        let device_id = request
            .device_id
            .clone()
            .unwrap_or_else(|| "0".to_string());
        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = mpsc::channel();
        let live = Arc::new(AtomicBool::new(false));

        let worker_device = device_id.clone();
        let worker_request = request.clone();
        let worker_live = live.clone();
        std::thread::Builder::new()
            .name(format!("camera-{}", device_id))
            .spawn(move || {
                run_worker(worker_device, worker_request, ready_tx, command_rx, worker_live)
            })
            .map_err(|e| acquisition_failed(&device_id, e))?;

        let resolution = ready_rx
            .await
            .map_err(|_| acquisition_failed(&device_id, "camera worker exited"))??;

        info!("Native camera {} opened at {}", device_id, resolution);
        Ok(Box::new(NativeStream {
            device_id,
            resolution,
            commands: command_tx,
            live,
            stopped: false,
        }))
    }
}

struct NativeStream {
    device_id: String,
    resolution: VideoResolution,
    commands: mpsc::Sender<WorkerCommand>,
    live: Arc<AtomicBool>,
    stopped: bool,
}

impl LiveStream for NativeStream {
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
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(WorkerCommand::Frame(reply_tx))
            .map_err(|_| MediaError::DeviceDisconnected {
                device_id: self.device_id.clone(),
            })?;
        reply_rx.recv().map_err(|_| MediaError::DeviceDisconnected {
            device_id: self.device_id.clone(),
        })?
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            let _ = self.commands.send(WorkerCommand::Stop);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped && self.live.load(Ordering::SeqCst)
    }
}
