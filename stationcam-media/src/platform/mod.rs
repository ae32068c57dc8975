pub mod simulated;

#[cfg(feature = "native")]
pub mod native;

use crate::device::DeviceDescriptor;
use crate::error::{MediaError, MediaResult};
use crate::stream::{StreamConstraints, VideoResolution};
use async_trait::async_trait;

/// What to open: a specific device with negotiable hints, or any camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Exact device to open; `None` lets the platform pick (permission probe)
    pub device_id: Option<String>,
    /// Preferred resolution, platform may substitute the nearest supported
    pub ideal_resolution: Option<VideoResolution>,
    /// Preferred frame rate
    pub ideal_frame_rate: Option<u32>,
    /// Prefer the environment-facing camera
    pub environment_facing: bool,
}

impl StreamRequest {
    /// Unconstrained request for any camera
    pub fn any() -> Self {
        Self {
            device_id: None,
            ideal_resolution: None,
            ideal_frame_rate: None,
            environment_facing: false,
        }
    }

    /// Request for exactly `device_id` with the given hints
    pub fn exact(device_id: &str, constraints: &StreamConstraints) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            ideal_resolution: constraints.ideal_resolution,
            ideal_frame_rate: constraints.ideal_frame_rate,
            environment_facing: constraints.environment_facing,
        }
    }
}

/// Uncompressed RGB24 frame read from a live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed RGB bytes, row major
    pub rgb: Vec<u8>,
    /// Monotonic frame counter within its stream
    pub sequence: u64,
}

impl RawFrame {
    /// Create a frame, checking the buffer length against the dimensions
    pub fn new(width: u32, height: u32, rgb: Vec<u8>, sequence: u64) -> MediaResult<Self> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: rgb.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgb,
            sequence,
        })
    }

    /// Solid black frame
    pub fn blank(resolution: VideoResolution) -> Self {
        Self {
            width: resolution.width,
            height: resolution.height,
            rgb: vec![0u8; resolution.pixel_count() * 3],
            sequence: 0,
        }
    }

    /// Frame dimensions
    pub fn resolution(&self) -> VideoResolution {
        VideoResolution::new(self.width, self.height)
    }
}

/// An open camera capture pipeline. Must be stopped explicitly.
pub trait LiveStream: Send {
    /// Device the stream was opened on
    fn device_id(&self) -> &str;

    /// Resolution the platform actually negotiated, if known
    fn resolution(&self) -> Option<VideoResolution>;

    /// Read the current frame
    fn read_frame(&mut self) -> MediaResult<RawFrame>;

    /// Stop every underlying track. Calling it again is a no-op.
    fn stop(&mut self);

    /// Whether the stream is still delivering frames
    fn is_live(&self) -> bool;
}

/// Platform camera capability
#[async_trait]
pub trait CameraPlatform: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// List every media device the platform reports
    async fn enumerate(&self) -> MediaResult<Vec<DeviceDescriptor>>;

    /// Open a stream. May wait indefinitely on a user permission prompt.
    async fn open(&self, request: &StreamRequest) -> MediaResult<Box<dyn LiveStream>>;
}
