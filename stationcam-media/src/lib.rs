//! # Station Cam Media
//!
//! Camera lifecycle management for station widgets: device discovery,
//! stream acquisition and release, live preview, and still-frame capture.
//! Each widget owns one [`CameraLifecycleManager`]; nothing here is shared
//! between widgets.

#![warn(clippy::all)]

pub mod capture;
pub mod device;
pub mod error;
pub mod lifecycle;
pub mod platform;
pub mod preview;
pub mod stream;

// Re-export main types
pub use capture::{CapturedFrame, FrameCapturer, DEFAULT_CAPTURE_RESOLUTION};
pub use device::{DeviceDescriptor, DeviceKind, DeviceListing, DeviceRegistry};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use lifecycle::{CameraEvent, CameraLifecycleManager, CameraPolicy, PreviewMode};
pub use platform::simulated::{SimulatedPlatform, SimulatedPlatformConfig};
pub use platform::{CameraPlatform, LiveStream, RawFrame, StreamRequest};
pub use preview::{NullSink, PreviewStatus, PreviewSurface, VideoSink};
pub use stream::{
    CameraSession, FeedQuality, SessionState, StreamConstraints, StreamHandle, StreamSession,
    VideoResolution,
};

#[cfg(feature = "native")]
pub use platform::native::NativePlatform;
