//! Still-frame capture from a preview surface

use crate::error::{MediaError, MediaResult};
use crate::platform::RawFrame;
use crate::preview::PreviewSurface;
use crate::stream::VideoResolution;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Size of the frame produced when nothing has been presented yet
pub const DEFAULT_CAPTURE_RESOLUTION: VideoResolution = VideoResolution::SVGA;

/// Default JPEG quality
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// An encoded still image. Stale once its stream has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// JPEG bytes
    pub encoded: Bytes,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Capture time
    pub captured_at: DateTime<Utc>,
    /// Stream bound to the surface when the frame was taken
    pub stream_id: Option<Uuid>,
}

impl CapturedFrame {
    /// Always `image/jpeg`
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    /// Frame dimensions
    pub fn resolution(&self) -> VideoResolution {
        VideoResolution::new(self.width, self.height)
    }

    /// `data:image/jpeg;base64,...` for in-memory hand-off
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), BASE64.encode(&self.encoded))
    }

    /// `<prefix>-screenshot-<unix millis>.jpg`
    pub fn download_name(&self, prefix: &str) -> String {
        format!(
            "{}-screenshot-{}.jpg",
            prefix,
            self.captured_at.timestamp_millis()
        )
    }

    /// Write the JPEG into `dir` under its download name
    pub fn save_to(&self, dir: impl AsRef<Path>, prefix: &str) -> MediaResult<PathBuf> {
        let path = dir.as_ref().join(self.download_name(prefix));
        std::fs::write(&path, &self.encoded)?;
        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }

    /// Whether a different stream (or none) is now current
    pub fn is_stale(&self, current_stream: Option<Uuid>) -> bool {
        self.stream_id.is_none() || self.stream_id != current_stream
    }
}

/// Rasterizes the preview's current frame into a JPEG
#[derive(Debug, Clone)]
pub struct FrameCapturer {
    quality: u8,
    default_resolution: VideoResolution,
}

impl FrameCapturer {
    /// Capturer encoding at `quality` (1-100)
    pub fn new(quality: u8) -> MediaResult<Self> {
        if quality == 0 || quality > 100 {
            return Err(MediaError::InvalidConfiguration {
                message: format!("JPEG quality must be 1-100, got {}", quality),
            });
        }
        Ok(Self {
            quality,
            default_resolution: DEFAULT_CAPTURE_RESOLUTION,
        })
    }

    /// JPEG quality
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Capture the surface at its native resolution. A surface that has
    /// not presented a frame yields a blank frame at the bound stream's
    /// resolution, else at the default size.
    pub fn capture(&self, surface: &PreviewSurface) -> MediaResult<CapturedFrame> {
        let stream_id = surface.bound_stream().map(|h| h.stream_id);

        let (encoded, resolution) = match surface.last_frame() {
            Some(frame) => self.encode(frame)?,
            None => {
                let resolution = surface
                    .native_resolution()
                    .unwrap_or(self.default_resolution);
                debug!("No frame presented, capturing blank {}", resolution);
                self.encode(&RawFrame::blank(resolution))?
            }
        };

        Ok(CapturedFrame {
            encoded,
            width: resolution.width,
            height: resolution.height,
            captured_at: Utc::now(),
            stream_id,
        })
    }

    fn encode(&self, frame: &RawFrame) -> MediaResult<(Bytes, VideoResolution)> {
        let expected = frame.width as usize * frame.height as usize * 3;
        let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or(
            MediaError::InvalidFrameData {
                expected,
                actual: frame.rgb.len(),
            },
        )?;

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode_image(&image)
            .map_err(|e| MediaError::EncodingFailed {
                format: "jpeg".to_string(),
                reason: e.to_string(),
            })?;

        Ok((Bytes::from(buffer), frame.resolution()))
    }
}

impl Default for FrameCapturer {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            default_resolution: DEFAULT_CAPTURE_RESOLUTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamHandle;

    fn decode(frame: &CapturedFrame) -> image::DynamicImage {
        image::load_from_memory_with_format(&frame.encoded, image::ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn test_capture_without_frame_is_blank_default() {
        let surface = PreviewSurface::default();
        let frame = FrameCapturer::default().capture(&surface).unwrap();

        assert_eq!(frame.resolution(), DEFAULT_CAPTURE_RESOLUTION);
        assert_eq!(frame.stream_id, None);
        let decoded = decode(&frame);
        assert_eq!((decoded.width(), decoded.height()), (800, 600));
    }

    #[test]
    fn test_capture_at_native_resolution() {
        let mut surface = PreviewSurface::default();
        let handle = StreamHandle {
            stream_id: Uuid::new_v4(),
            device_id: "cam-1".to_string(),
            resolution: Some(VideoResolution::new(48, 32)),
        };
        surface.bind(Some(&handle));
        surface.present(handle.stream_id, RawFrame::blank(VideoResolution::new(48, 32)));

        let frame = FrameCapturer::new(90).unwrap().capture(&surface).unwrap();
        assert_eq!(frame.resolution(), VideoResolution::new(48, 32));
        assert_eq!(frame.stream_id, Some(handle.stream_id));
        assert!(!frame.is_stale(Some(handle.stream_id)));
        assert!(frame.is_stale(Some(Uuid::new_v4())));
        assert_eq!(decode(&frame).width(), 48);
    }

    #[test]
    fn test_capture_before_first_frame_uses_bound_resolution() {
        let mut surface = PreviewSurface::default();
        let handle = StreamHandle {
            stream_id: Uuid::new_v4(),
            device_id: "cam-1".to_string(),
            resolution: Some(VideoResolution::HD),
        };
        surface.bind(Some(&handle));

        let frame = FrameCapturer::default().capture(&surface).unwrap();
        assert_eq!(frame.resolution(), VideoResolution::HD);
        assert_eq!(frame.stream_id, Some(handle.stream_id));
        let decoded = decode(&frame);
        assert_eq!((decoded.width(), decoded.height()), (1280, 720));
    }

    #[test]
    fn test_invalid_quality() {
        assert!(FrameCapturer::new(0).is_err());
        assert!(FrameCapturer::new(101).is_err());
        assert_eq!(FrameCapturer::default().quality(), 80);
    }

    #[test]
    fn test_data_url_and_download_name() {
        let frame = FrameCapturer::default()
            .capture(&PreviewSurface::default())
            .unwrap();

        let url = frame.to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let payload = BASE64.decode(&url["data:image/jpeg;base64,".len()..]).unwrap();
        assert_eq!(payload, frame.encoded.to_vec());

        let name = frame.download_name("robot");
        assert_eq!(
            name,
            format!("robot-screenshot-{}.jpg", frame.captured_at.timestamp_millis())
        );
    }

    #[test]
    fn test_save_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let frame = FrameCapturer::default()
            .capture(&PreviewSurface::default())
            .unwrap();

        let path = frame.save_to(dir.path(), "robot").unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("robot-screenshot-"));
        assert_eq!(std::fs::read(&path).unwrap(), frame.encoded.to_vec());
    }
}
