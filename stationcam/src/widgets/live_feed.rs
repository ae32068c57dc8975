//! Live camera feed viewer

use super::CameraBinding;
use crate::error::{WidgetError, WidgetResult};
use crate::event::{EventStream, WidgetEvent, WidgetKind};
use stationcam_media::device::NO_DEVICES_MESSAGE;
use stationcam_media::{
    CameraPlatform, CameraPolicy, CameraSession, DeviceDescriptor, DeviceListing, FeedQuality,
    StreamHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_SCREENSHOT_PREFIX: &str = "robot";

/// Continuous preview of one station camera with screenshots
pub struct LiveFeed {
    binding: CameraBinding,
    screenshot_prefix: String,
    screenshot_dir: PathBuf,
}

impl LiveFeed {
    /// Live feed over `platform`
    pub fn new(platform: Arc<dyn CameraPlatform>, policy: CameraPolicy) -> WidgetResult<Self> {
        Ok(Self {
            binding: CameraBinding::new(WidgetKind::LiveFeed, platform, policy)?,
            screenshot_prefix: DEFAULT_SCREENSHOT_PREFIX.to_string(),
            screenshot_dir: PathBuf::from("."),
        })
    }

    /// Use `prefix` for screenshot file names
    pub fn with_screenshot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.screenshot_prefix = prefix.into();
        self
    }

    /// Write [`save_screenshot`](Self::save_screenshot) files into `dir`
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Directory used by [`save_screenshot`](Self::save_screenshot)
    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Re-enumerate cameras
    pub async fn refresh_devices(&self) -> WidgetResult<DeviceListing> {
        self.binding.refresh_devices().await
    }

    /// Cameras found by the last refresh
    pub fn devices(&self) -> DeviceListing {
        self.binding.camera().devices()
    }

    /// Pick the camera the next start uses
    pub fn select_device(&self, device_id: &str) -> WidgetResult<DeviceDescriptor> {
        Ok(self.binding.camera().select_device(device_id)?)
    }

    /// Camera picked in the dropdown
    pub fn selected_device(&self) -> Option<String> {
        self.binding.camera().selected_device()
    }

    /// Start on the selected camera, or the first one listed.
    ///
    /// The dropdown selection is cleared once the stream is up.
    pub async fn start(&self) -> WidgetResult<StreamHandle> {
        let camera = self.binding.camera();
        let device_id = match camera
            .selected_device()
            .or_else(|| camera.devices().first().map(|d| d.id.clone()))
        {
            Some(id) => id,
            None => {
                self.binding.emit_error(NO_DEVICES_MESSAGE);
                return Err(WidgetError::validation(NO_DEVICES_MESSAGE));
            }
        };

        match camera.start(Some(&device_id)).await {
            Ok(handle) => {
                camera.clear_selection();
                self.binding.pump();
                Ok(handle)
            }
            Err(e) => {
                let error = WidgetError::from(e);
                self.binding.emit_error(&error.user_message());
                Err(error)
            }
        }
    }

    /// Stop streaming. Returns whether a stream was running.
    pub fn stop(&self) -> bool {
        let stopped = self.binding.camera().stop();
        self.binding.pump();
        stopped
    }

    /// Start when stopped, stop when streaming. Returns whether the feed is now live.
    pub async fn toggle(&self) -> WidgetResult<bool> {
        if self.is_active() {
            self.stop();
            Ok(false)
        } else {
            self.start().await.map(|_| true)
        }
    }

    /// Pull the latest frame onto the preview
    pub fn refresh_preview(&self) -> WidgetResult<bool> {
        Ok(self.binding.camera().refresh_preview()?)
    }

    /// Save the current frame as `<prefix>-screenshot-<millis>.jpg` in `dir`
    pub fn take_screenshot(&self, dir: impl AsRef<Path>) -> WidgetResult<PathBuf> {
        if !self.is_active() {
            return Err(WidgetError::validation(
                "Start the camera before taking a screenshot.",
            ));
        }

        let frame = self.binding.camera().capture()?;
        let path = frame.save_to(dir, &self.screenshot_prefix)?;
        info!("Live feed screenshot {}", path.display());
        self.binding
            .emit(WidgetEvent::ScreenshotSaved { path: path.clone() });
        Ok(path)
    }

    /// [`take_screenshot`](Self::take_screenshot) into the configured directory
    pub fn save_screenshot(&self) -> WidgetResult<PathBuf> {
        self.take_screenshot(&self.screenshot_dir)
    }

    /// Quality for the next start; a running stream keeps its resolution
    pub fn change_quality(&self, quality: FeedQuality) {
        debug!("Live feed quality {:?}", quality);
        self.binding.camera().change_quality(quality);
    }

    /// Quality the next start uses
    pub fn quality(&self) -> FeedQuality {
        self.snapshot().quality
    }

    /// Session view
    pub fn snapshot(&self) -> CameraSession {
        self.binding.camera().snapshot()
    }

    /// Whether a stream is live
    pub fn is_active(&self) -> bool {
        self.binding.camera().is_active()
    }

    /// Whether the start button should be enabled
    pub fn can_start(&self) -> bool {
        self.binding.camera().can_start()
    }

    /// Message to show in place of the feed, if any
    pub fn error_message(&self) -> Option<String> {
        self.snapshot().error.or_else(|| {
            self.devices()
                .error_message()
                .map(str::to_string)
        })
    }

    /// Subscribe to this widget's events
    pub fn subscribe(&self) -> EventStream {
        self.binding.subscribe()
    }

    /// Release the camera
    pub fn shutdown(&self) {
        self.binding.camera().shutdown();
        self.binding.pump();
    }
}

impl std::fmt::Debug for LiveFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeed")
            .field("camera", self.binding.camera())
            .field("screenshot_prefix", &self.screenshot_prefix)
            .field("screenshot_dir", &self.screenshot_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationcam_media::{CameraEvent, SimulatedPlatform, VideoResolution};

    fn feed(platform: &SimulatedPlatform) -> LiveFeed {
        LiveFeed::new(Arc::new(platform.clone()), CameraPolicy::default()).unwrap()
    }

    #[tokio::test]
    async fn test_start_defaults_to_first_camera() {
        let platform = SimulatedPlatform::default();
        let feed = feed(&platform);
        feed.refresh_devices().await.unwrap();

        let handle = feed.start().await.unwrap();
        assert_eq!(handle.device_id, "cam-1");
        assert!(feed.is_active());
        assert_eq!(platform.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_selection_cleared_after_start() {
        let platform = SimulatedPlatform::default();
        let feed = feed(&platform);
        feed.refresh_devices().await.unwrap();
        feed.select_device("cam-2").unwrap();

        let handle = feed.start().await.unwrap();
        assert_eq!(handle.device_id, "cam-2");
        assert!(feed.selected_device().is_none());
    }

    #[tokio::test]
    async fn test_no_devices() {
        let feed = feed(&SimulatedPlatform::empty());
        let listing = feed.refresh_devices().await.unwrap();
        assert!(listing.is_empty());
        assert!(!feed.can_start());
        assert_eq!(feed.error_message().as_deref(), Some(NO_DEVICES_MESSAGE));

        let error = feed.start().await.unwrap_err();
        assert_eq!(error.user_message(), NO_DEVICES_MESSAGE);
    }

    #[tokio::test]
    async fn test_toggle() {
        let platform = SimulatedPlatform::default();
        let feed = feed(&platform);
        feed.refresh_devices().await.unwrap();

        assert!(feed.toggle().await.unwrap());
        assert!(!feed.toggle().await.unwrap());
        assert_eq!(platform.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_screenshot_written() {
        let dir = tempfile::tempdir().unwrap();
        let platform = SimulatedPlatform::default();
        let feed = feed(&platform).with_screenshot_prefix("dock");
        feed.refresh_devices().await.unwrap();

        assert!(feed.take_screenshot(dir.path()).is_err());

        let mut events = feed.subscribe();
        feed.start().await.unwrap();
        let path = feed.take_screenshot(dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dock-screenshot-"));
        assert!(name.ends_with(".jpg"));
        assert!(path.exists());
        // Continuous preview keeps streaming
        assert!(feed.is_active());

        let events = events.drain();
        assert!(events
            .iter()
            .any(|e| matches!(e, WidgetEvent::ScreenshotSaved { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            WidgetEvent::Camera {
                event: CameraEvent::StreamStarted { .. },
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_save_screenshot_uses_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let platform = SimulatedPlatform::default();
        let feed = feed(&platform).with_screenshot_dir(dir.path());
        assert_eq!(feed.screenshot_dir(), dir.path());
        feed.refresh_devices().await.unwrap();
        feed.start().await.unwrap();

        let path = feed.save_screenshot().unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_quality_applies_to_next_start() {
        let platform = SimulatedPlatform::default();
        let feed = feed(&platform);
        feed.refresh_devices().await.unwrap();

        feed.change_quality(FeedQuality::Low);
        assert_eq!(feed.quality(), FeedQuality::Low);
        let handle = feed.start().await.unwrap();
        assert_eq!(handle.resolution, Some(VideoResolution::VGA));
    }
}
