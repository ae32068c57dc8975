//! Stream session: acquisition, release and liveness of one camera stream
//!
//! A [`StreamSession`] owns at most one live stream at a time. Acquiring a
//! new stream always releases the previous one first, and releasing while
//! the platform is still opening a device abandons that acquisition: the
//! late stream is stopped as soon as it arrives.

use crate::error::{MediaError, MediaResult};
use crate::platform::{CameraPlatform, LiveStream, RawFrame, StreamRequest};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default period of the liveness refresh while a stream is active
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl VideoResolution {
    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 640×480
    pub const VGA: Self = Self::new(640, 480);
    /// 800×600, used for captures taken before any frame was presented
    pub const SVGA: Self = Self::new(800, 600);
    /// 1280×720
    pub const HD: Self = Self::new(1280, 720);
    /// 1920×1080
    pub const FULL_HD: Self = Self::new(1920, 1080);

    /// Total pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Neither dimension is zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Feed quality selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedQuality {
    /// 640×480
    Low,
    /// 1280×720
    #[default]
    Medium,
    /// 1920×1080
    High,
}

impl FeedQuality {
    /// Ideal resolution requested for the next acquisition
    pub fn ideal_resolution(&self) -> VideoResolution {
        match self {
            FeedQuality::Low => VideoResolution::VGA,
            FeedQuality::Medium => VideoResolution::HD,
            FeedQuality::High => VideoResolution::FULL_HD,
        }
    }
}

/// Negotiable hints for an acquisition. The device match itself is always exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Preferred resolution
    pub ideal_resolution: Option<VideoResolution>,
    /// Preferred frame rate
    pub ideal_frame_rate: Option<u32>,
    /// Prefer the environment-facing camera
    pub environment_facing: bool,
}

impl StreamConstraints {
    /// Prefer `resolution`
    pub fn with_resolution(mut self, resolution: VideoResolution) -> Self {
        self.ideal_resolution = Some(resolution);
        self
    }

    /// Prefer `fps`
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.ideal_frame_rate = Some(fps);
        self
    }

    /// Prefer the environment-facing camera
    pub fn facing_environment(mut self) -> Self {
        self.environment_facing = true;
        self
    }

    /// Reject hints no platform could satisfy
    pub fn validate(&self) -> MediaResult<()> {
        if let Some(resolution) = self.ideal_resolution {
            if !resolution.is_valid() {
                return Err(MediaError::InvalidConfiguration {
                    message: format!("Invalid resolution {}", resolution),
                });
            }
        }

        if let Some(fps) = self.ideal_frame_rate {
            if fps == 0 || fps > 120 {
                return Err(MediaError::InvalidConfiguration {
                    message: format!("Invalid frame rate {}", fps),
                });
            }
        }

        Ok(())
    }
}

/// Session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SessionState {
    /// No stream held
    Idle,
    /// Waiting on the platform to open a device
    Connecting,
    /// A stream is live
    Active,
    /// The last acquisition failed; persists until release or the next acquire
    Error {
        /// Failure description
        message: String,
    },
}

impl SessionState {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Error { .. } => "error",
        }
    }
}

/// Token identifying one live stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHandle {
    /// Unique per acquisition
    pub stream_id: Uuid,
    /// Device the stream was opened on
    pub device_id: String,
    /// Negotiated resolution, if the platform reported one
    pub resolution: Option<VideoResolution>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSession {
    /// Session identifier
    pub session_id: Uuid,
    /// Device of the current or last attempted stream
    pub device_id: Option<String>,
    /// Current stream, only while active
    pub stream_id: Option<Uuid>,
    /// Lifecycle state
    pub state: SessionState,
    /// Mirrors `state == Active`
    pub is_active: bool,
    /// Mirrors `state == Connecting`
    pub is_connecting: bool,
    /// Quality used for the next acquisition
    pub quality: FeedQuality,
    /// Last state change or liveness refresh
    pub last_updated: DateTime<Utc>,
    /// Error message while in the error state
    pub error: Option<String>,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    device_id: Option<String>,
    handle: Option<StreamHandle>,
    quality: FeedQuality,
    last_updated: DateTime<Utc>,
    liveness_ticks: u64,
    // Bumped by every acquire and release so a completing open can tell it was abandoned
    epoch: u64,
}

impl SessionInner {
    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.last_updated = Utc::now();
    }
}

/// One camera stream owner
pub struct StreamSession {
    session_id: Uuid,
    platform: Arc<dyn CameraPlatform>,
    refresh_interval: Duration,
    inner: Arc<RwLock<SessionInner>>,
    // Lock order: `inner` before `stream`
    stream: Arc<Mutex<Option<Box<dyn LiveStream>>>>,
    liveness_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamSession {
    /// Session over `platform` with the default liveness interval
    pub fn new(platform: Arc<dyn CameraPlatform>) -> Self {
        Self::with_refresh_interval(platform, DEFAULT_REFRESH_INTERVAL)
    }

    /// Session with a custom liveness interval
    pub fn with_refresh_interval(
        platform: Arc<dyn CameraPlatform>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            platform,
            refresh_interval,
            inner: Arc::new(RwLock::new(SessionInner {
                state: SessionState::Idle,
                device_id: None,
                handle: None,
                quality: FeedQuality::default(),
                last_updated: Utc::now(),
                liveness_ticks: 0,
                epoch: 0,
            })),
            stream: Arc::new(Mutex::new(None)),
            liveness_task: Mutex::new(None),
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.session_id
    }

    /// Open `device_id` and make it the session's only stream
    pub async fn acquire(
        &self,
        device_id: &str,
        constraints: &StreamConstraints,
    ) -> MediaResult<StreamHandle> {
        if device_id.trim().is_empty() {
            return Err(MediaError::InvalidConfiguration {
                message: "No camera selected".to_string(),
            });
        }
        constraints.validate()?;

        let epoch = {
            let mut inner = self.inner.write();
            if inner.state == SessionState::Connecting {
                return Err(MediaError::AcquisitionInProgress);
            }

            // Previous stream goes before the new open call
            self.stop_liveness();
            if let Some(mut previous) = self.stream.lock().take() {
                debug!("Releasing stream on {} before reacquiring", previous.device_id());
                previous.stop();
            }

            inner.handle = None;
            inner.device_id = Some(device_id.to_string());
            inner.epoch += 1;
            inner.set_state(SessionState::Connecting);
            inner.epoch
        };

        info!("Acquiring camera {} on {}", device_id, self.platform.name());
        let request = StreamRequest::exact(device_id, constraints);
        let opened = self.platform.open(&request).await;

        let mut inner = self.inner.write();
        if inner.epoch != epoch || inner.state != SessionState::Connecting {
            if let Ok(mut late) = opened {
                debug!("Stopping stream on {} opened after release", device_id);
                late.stop();
            }
            return Err(MediaError::SessionReleased);
        }

        match opened {
            Ok(stream) => {
                let handle = StreamHandle {
                    stream_id: Uuid::new_v4(),
                    device_id: device_id.to_string(),
                    resolution: stream.resolution(),
                };
                *self.stream.lock() = Some(stream);
                inner.handle = Some(handle.clone());
                inner.liveness_ticks = 0;
                inner.set_state(SessionState::Active);
                drop(inner);

                self.start_liveness();
                info!("Camera {} active (stream {})", device_id, handle.stream_id);
                Ok(handle)
            }
            Err(e) => {
                warn!("Failed to acquire camera {}: {}", device_id, e);
                inner.set_state(SessionState::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stop every track and return to idle. Returns whether a stream was held.
    pub fn release(&self) -> bool {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        self.stop_liveness();

        let released = match self.stream.lock().take() {
            Some(mut stream) => {
                stream.stop();
                true
            }
            None => false,
        };

        if released || inner.state != SessionState::Idle {
            debug!("Session {} released", self.session_id);
        }
        inner.handle = None;
        inner.device_id = None;
        if inner.state != SessionState::Idle {
            inner.set_state(SessionState::Idle);
        }
        released
    }

    /// Leave the error state without acquiring
    pub fn clear_error(&self) {
        let mut inner = self.inner.write();
        if matches!(inner.state, SessionState::Error { .. }) {
            inner.set_state(SessionState::Idle);
        }
    }

    /// Read the current frame of the live stream
    pub fn grab_frame(&self) -> MediaResult<RawFrame> {
        let inner = self.inner.read();
        if inner.state != SessionState::Active {
            return Err(MediaError::CaptureNotActive);
        }
        let mut stream = self.stream.lock();
        match stream.as_mut() {
            Some(stream) => stream.read_frame(),
            None => Err(MediaError::CaptureNotActive),
        }
    }

    /// Current stream handle, only while active
    pub fn handle(&self) -> Option<StreamHandle> {
        self.inner.read().handle.clone()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    /// Whether a stream is live
    pub fn is_active(&self) -> bool {
        self.inner.read().state == SessionState::Active
    }

    /// Whether an acquisition is in flight
    pub fn is_connecting(&self) -> bool {
        self.inner.read().state == SessionState::Connecting
    }

    /// Quality recorded for the next acquisition
    pub fn quality(&self) -> FeedQuality {
        self.inner.read().quality
    }

    /// Record the quality used by the next acquisition
    pub fn set_quality(&self, quality: FeedQuality) {
        let mut inner = self.inner.write();
        inner.quality = quality;
        inner.last_updated = Utc::now();
    }

    /// Number of liveness refreshes since the stream became active
    pub fn liveness_ticks(&self) -> u64 {
        self.inner.read().liveness_ticks
    }

    /// Whether the liveness task is scheduled
    pub fn has_liveness_task(&self) -> bool {
        self.liveness_task
            .lock()
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    /// Point-in-time view
    pub fn snapshot(&self) -> CameraSession {
        let inner = self.inner.read();
        let error = match &inner.state {
            SessionState::Error { message } => Some(message.clone()),
            _ => None,
        };
        CameraSession {
            session_id: self.session_id,
            device_id: inner.device_id.clone(),
            stream_id: inner.handle.as_ref().map(|h| h.stream_id),
            is_active: inner.state == SessionState::Active,
            is_connecting: inner.state == SessionState::Connecting,
            state: inner.state.clone(),
            quality: inner.quality,
            last_updated: inner.last_updated,
            error,
        }
    }

    fn start_liveness(&self) {
        let inner = self.inner.clone();
        let stream = self.stream.clone();
        let period = self.refresh_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let mut state = inner.write();
                if state.state != SessionState::Active {
                    break;
                }

                let live = stream.lock().as_ref().map_or(false, |s| s.is_live());
                if !live {
                    let device = state.device_id.clone().unwrap_or_default();
                    warn!("Camera {} stopped delivering frames", device);
                    if let Some(mut dead) = stream.lock().take() {
                        dead.stop();
                    }
                    state.handle = None;
                    state.set_state(SessionState::Error {
                        message: MediaError::DeviceDisconnected { device_id: device }.to_string(),
                    });
                    break;
                }

                state.liveness_ticks += 1;
                state.last_updated = Utc::now();
            }
        });

        if let Some(previous) = self.liveness_task.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_liveness(&self) {
        if let Some(task) = self.liveness_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("session_id", &self.session_id)
            .field("platform", &self.platform.name())
            .field("state", &self.inner.read().state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceDescriptor;
    use crate::platform::simulated::{SimulatedPlatform, SimulatedPlatformConfig};

    fn platform() -> SimulatedPlatform {
        SimulatedPlatform::new(SimulatedPlatformConfig {
            devices: vec![
                DeviceDescriptor::video_input("cam-1", "Front"),
                DeviceDescriptor::video_input("cam-2", "Rear"),
            ],
            native_resolution: Some(VideoResolution::new(64, 48)),
            ..Default::default()
        })
    }

    #[test]
    fn test_pixel_count_does_not_wrap() {
        assert_eq!(VideoResolution::SVGA.pixel_count(), 480_000);
        let huge = VideoResolution::new(70_000, 70_000);
        assert_eq!(huge.pixel_count() as u64, 4_900_000_000);
    }

    #[test]
    fn test_quality_resolutions() {
        assert_eq!(FeedQuality::Low.ideal_resolution(), VideoResolution::VGA);
        assert_eq!(FeedQuality::Medium.ideal_resolution(), VideoResolution::HD);
        assert_eq!(FeedQuality::High.ideal_resolution(), VideoResolution::FULL_HD);
        assert_eq!(FeedQuality::default(), FeedQuality::Medium);
    }

    #[test]
    fn test_constraints_validation() {
        assert!(StreamConstraints::default().validate().is_ok());
        assert!(StreamConstraints::default()
            .with_resolution(VideoResolution::new(0, 720))
            .validate()
            .is_err());
        assert!(StreamConstraints::default()
            .with_frame_rate(0)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let platform = platform();
        let session = StreamSession::new(Arc::new(platform.clone()));

        let handle = session
            .acquire("cam-1", &StreamConstraints::default())
            .await
            .unwrap();
        assert_eq!(handle.device_id, "cam-1");
        assert_eq!(handle.resolution, Some(VideoResolution::new(64, 48)));
        assert!(session.is_active());
        assert!(session.has_liveness_task());
        assert_eq!(platform.live_streams(), 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.stream_id, Some(handle.stream_id));
        assert!(snapshot.is_active);
        assert!(!snapshot.is_connecting);

        assert!(session.release());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_liveness_task());
        assert_eq!(platform.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let platform = platform();
        let session = StreamSession::new(Arc::new(platform.clone()));

        assert!(!session.release());
        session
            .acquire("cam-1", &StreamConstraints::default())
            .await
            .unwrap();
        assert!(session.release());
        assert!(!session.release());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(platform.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_reacquire_replaces_stream() {
        let platform = platform();
        let session = StreamSession::new(Arc::new(platform.clone()));
        let constraints = StreamConstraints::default();

        let first = session.acquire("cam-1", &constraints).await.unwrap();
        let second = session.acquire("cam-2", &constraints).await.unwrap();
        assert_ne!(first.stream_id, second.stream_id);
        assert_eq!(platform.live_streams(), 1);
        assert_eq!(platform.streams_opened(), 2);
    }

    #[tokio::test]
    async fn test_empty_device_id_rejected_before_platform() {
        let platform = platform();
        let session = StreamSession::new(Arc::new(platform.clone()));

        let result = session.acquire("  ", &StreamConstraints::default()).await;
        assert!(matches!(
            result,
            Err(MediaError::InvalidConfiguration { .. })
        ));
        assert_eq!(platform.streams_opened(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_failed_acquire_enters_error_state() {
        let platform = platform();
        platform.set_busy("cam-1", true);
        let session = StreamSession::new(Arc::new(platform.clone()));

        let result = session.acquire("cam-1", &StreamConstraints::default()).await;
        assert!(matches!(result, Err(MediaError::DeviceBusy { .. })));

        let snapshot = session.snapshot();
        assert!(matches!(snapshot.state, SessionState::Error { .. }));
        assert!(snapshot.error.unwrap().contains("cam-1"));
        assert!(!session.has_liveness_task());

        session.clear_error();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let session = StreamSession::new(Arc::new(platform()));
        let result = session
            .acquire("cam-404", &StreamConstraints::default())
            .await;
        assert!(matches!(result, Err(MediaError::DeviceNotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_refreshes_while_active() {
        let session = StreamSession::with_refresh_interval(
            Arc::new(platform()),
            Duration::from_millis(100),
        );
        session
            .acquire("cam-1", &StreamConstraints::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(session.liveness_ticks() >= 3);

        session.release();
        let ticks = session.liveness_ticks();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.liveness_ticks(), ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_detected_by_liveness() {
        let platform = platform();
        let session = StreamSession::new(Arc::new(platform.clone()));
        session
            .acquire("cam-1", &StreamConstraints::default())
            .await
            .unwrap();

        platform.disconnect("cam-1");
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(matches!(session.state(), SessionState::Error { .. }));
        assert_eq!(platform.live_streams(), 0);
        assert!(matches!(
            session.grab_frame(),
            Err(MediaError::CaptureNotActive)
        ));
    }

    #[tokio::test]
    async fn test_grab_frame_requires_active_stream() {
        let session = StreamSession::new(Arc::new(platform()));
        assert!(matches!(
            session.grab_frame(),
            Err(MediaError::CaptureNotActive)
        ));

        session
            .acquire("cam-1", &StreamConstraints::default())
            .await
            .unwrap();
        let frame = session.grab_frame().unwrap();
        assert_eq!(frame.resolution(), VideoResolution::new(64, 48));
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let platform = platform();
        {
            let session = StreamSession::new(Arc::new(platform.clone()));
            session
                .acquire("cam-1", &StreamConstraints::default())
                .await
                .unwrap();
            assert_eq!(platform.live_streams(), 1);
        }
        assert_eq!(platform.live_streams(), 0);
    }
}
