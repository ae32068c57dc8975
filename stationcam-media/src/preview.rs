//! Live preview surface
//!
//! The surface tracks which stream is bound and keeps the last frame it
//! presented, which is what the capturer rasterizes. Playback itself is
//! delegated to a [`VideoSink`]; a sink refusing to play is reported as a
//! warning and never fails the binding.

use crate::error::MediaResult;
use crate::platform::RawFrame;
use crate::stream::{StreamHandle, VideoResolution};
use tracing::{debug, warn};
use uuid::Uuid;

/// Where preview frames end up (a window, a texture, nothing)
pub trait VideoSink: Send + Sync {
    /// Begin playback of `handle`. May be refused (e.g. autoplay policy).
    fn start_playback(&self, handle: &StreamHandle) -> MediaResult<()>;

    /// Stop showing any stream
    fn detach(&self);

    /// Display one frame of the bound stream
    fn render(&self, _frame: &RawFrame) {}
}

/// Sink that accepts everything and shows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VideoSink for NullSink {
    fn start_playback(&self, _handle: &StreamHandle) -> MediaResult<()> {
        Ok(())
    }

    fn detach(&self) {}
}

/// Playback status of a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    /// Nothing bound
    Detached,
    /// Bound stream is playing
    Playing,
    /// Bound, but the sink refused playback. Non-fatal.
    Warning(String),
}

/// Display binding for one stream
pub struct PreviewSurface {
    sink: Box<dyn VideoSink>,
    bound: Option<StreamHandle>,
    status: PreviewStatus,
    last_frame: Option<RawFrame>,
    frozen: bool,
}

impl PreviewSurface {
    /// Surface rendering into `sink`
    pub fn new(sink: Box<dyn VideoSink>) -> Self {
        Self {
            sink,
            bound: None,
            status: PreviewStatus::Detached,
            last_frame: None,
            frozen: false,
        }
    }

    /// Bind `handle`, or detach with `None`
    pub fn bind(&mut self, handle: Option<&StreamHandle>) -> &PreviewStatus {
        self.last_frame = None;
        self.frozen = false;

        match handle {
            Some(handle) => {
                self.bound = Some(handle.clone());
                self.status = match self.sink.start_playback(handle) {
                    Ok(()) => {
                        debug!("Preview playing stream {}", handle.stream_id);
                        PreviewStatus::Playing
                    }
                    Err(e) => {
                        warn!("Preview playback failed: {}", e);
                        PreviewStatus::Warning(e.to_string())
                    }
                };
            }
            None => {
                if self.bound.take().is_some() {
                    self.sink.detach();
                }
                self.status = PreviewStatus::Detached;
            }
        }
        &self.status
    }

    /// Show `frame` if it belongs to the bound stream. Returns whether it was taken.
    pub fn present(&mut self, stream_id: Uuid, frame: RawFrame) -> bool {
        if self.frozen {
            return false;
        }
        match &self.bound {
            Some(bound) if bound.stream_id == stream_id => {
                self.sink.render(&frame);
                self.last_frame = Some(frame);
                true
            }
            _ => false,
        }
    }

    /// Hold the current frame until the next bind
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the frame is held
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Last frame presented
    pub fn last_frame(&self) -> Option<&RawFrame> {
        self.last_frame.as_ref()
    }

    /// Bound stream
    pub fn bound_stream(&self) -> Option<&StreamHandle> {
        self.bound.as_ref()
    }

    /// Playback status
    pub fn status(&self) -> &PreviewStatus {
        &self.status
    }

    /// Size of the presented frame, else the negotiated stream size
    pub fn native_resolution(&self) -> Option<VideoResolution> {
        self.last_frame
            .as_ref()
            .map(RawFrame::resolution)
            .or_else(|| self.bound.as_ref().and_then(|h| h.resolution))
    }
}

impl Default for PreviewSurface {
    fn default() -> Self {
        Self::new(Box::new(NullSink))
    }
}

impl std::fmt::Debug for PreviewSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSurface")
            .field("bound", &self.bound)
            .field("status", &self.status)
            .field("has_frame", &self.last_frame.is_some())
            .field("frozen", &self.frozen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RefusingSink;

    impl VideoSink for RefusingSink {
        fn start_playback(&self, _handle: &StreamHandle) -> MediaResult<()> {
            Err(MediaError::PlaybackRejected {
                reason: "autoplay blocked".to_string(),
            })
        }

        fn detach(&self) {}
    }

    #[derive(Default)]
    struct CountingSink {
        rendered: Arc<AtomicUsize>,
    }

    impl VideoSink for CountingSink {
        fn start_playback(&self, _handle: &StreamHandle) -> MediaResult<()> {
            Ok(())
        }

        fn detach(&self) {}

        fn render(&self, _frame: &RawFrame) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn handle(resolution: Option<VideoResolution>) -> StreamHandle {
        StreamHandle {
            stream_id: Uuid::new_v4(),
            device_id: "cam-1".to_string(),
            resolution,
        }
    }

    #[test]
    fn test_refused_playback_is_a_warning() {
        let mut surface = PreviewSurface::new(Box::new(RefusingSink));
        let status = surface.bind(Some(&handle(None))).clone();
        assert!(matches!(status, PreviewStatus::Warning(ref m) if m.contains("autoplay")));
        // Still bound, frames are still accepted
        assert!(surface.bound_stream().is_some());
    }

    #[test]
    fn test_present_ignores_other_streams() {
        let rendered = Arc::new(AtomicUsize::new(0));
        let mut surface = PreviewSurface::new(Box::new(CountingSink {
            rendered: rendered.clone(),
        }));
        let bound = handle(None);
        surface.bind(Some(&bound));

        let frame = RawFrame::blank(VideoResolution::new(4, 2));
        assert!(!surface.present(Uuid::new_v4(), frame.clone()));
        assert!(surface.last_frame().is_none());

        assert!(surface.present(bound.stream_id, frame));
        assert_eq!(surface.native_resolution(), Some(VideoResolution::new(4, 2)));
        assert_eq!(rendered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_native_resolution_falls_back_to_handle() {
        let mut surface = PreviewSurface::default();
        assert_eq!(surface.native_resolution(), None);

        surface.bind(Some(&handle(Some(VideoResolution::HD))));
        assert_eq!(surface.native_resolution(), Some(VideoResolution::HD));

        surface.bind(None);
        assert_eq!(surface.status(), &PreviewStatus::Detached);
        assert_eq!(surface.native_resolution(), None);
    }

    #[test]
    fn test_freeze_holds_frame_until_rebind() {
        let mut surface = PreviewSurface::default();
        let bound = handle(None);
        surface.bind(Some(&bound));
        surface.present(bound.stream_id, RawFrame::blank(VideoResolution::new(2, 2)));

        surface.freeze();
        assert!(!surface.present(bound.stream_id, RawFrame::blank(VideoResolution::new(8, 8))));
        assert_eq!(surface.native_resolution(), Some(VideoResolution::new(2, 2)));

        surface.bind(Some(&bound));
        assert!(!surface.is_frozen());
    }
}
