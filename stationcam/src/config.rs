//! Configuration types and defaults

use serde::Deserialize;
use stationcam_core::{SimulatedDelays, StationError, StationResult};
use stationcam_media::{CameraPolicy, StreamConstraints, VideoResolution};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global station configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StationConfig {
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Directory of the persisted login; `None` keeps it in memory
    pub session_dir: Option<PathBuf>,
    /// Liveness refresh period of an active camera, in milliseconds
    pub refresh_interval_ms: u64,
    /// JPEG quality of captured frames
    pub jpeg_quality: u8,
    /// Delay before the package scanner simulates a scan when the camera fails
    pub qr_fallback_delay_ms: Option<u64>,
    /// Same fallback for the product scanner; off unless configured
    pub product_fallback_delay_ms: Option<u64>,
    /// Destination of delivery tasks created from product scans
    pub packaging_station: String,
    /// File name prefix of live feed screenshots
    pub screenshot_prefix: String,
    /// Where live feed screenshots are written
    pub screenshot_dir: PathBuf,
    /// Simulated backend settings
    pub backend: BackendConfig,
}

/// Simulated backend settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// Per-call latency
    pub delays: SimulatedDelays,
    /// RNG seed for reproducible ids
    pub seed: Option<u64>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            session_dir: None,
            refresh_interval_ms: 1000,
            jpeg_quality: 80,
            qr_fallback_delay_ms: Some(3000),
            product_fallback_delay_ms: None,
            packaging_station: "Packaging Station A".to_string(),
            screenshot_prefix: "robot".to_string(),
            screenshot_dir: PathBuf::from("."),
            backend: BackendConfig::default(),
        }
    }
}

impl StationConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> StationResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> StationResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validate configuration
    pub fn validate(&self) -> StationResult<()> {
        if self.refresh_interval_ms == 0 {
            return Err(config_error("refresh_interval_ms must be > 0"));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(config_error("jpeg_quality must be between 1 and 100"));
        }

        if self.packaging_station.trim().is_empty() {
            return Err(config_error("packaging_station must not be empty"));
        }

        if self.screenshot_prefix.trim().is_empty() {
            return Err(config_error("screenshot_prefix must not be empty"));
        }

        Ok(())
    }

    /// Liveness refresh period
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Camera policy of the live feed: continuous preview at full HD, 30 fps
    pub fn live_feed_policy(&self) -> CameraPolicy {
        CameraPolicy {
            constraints: StreamConstraints::default()
                .with_resolution(VideoResolution::FULL_HD)
                .with_frame_rate(30),
            jpeg_quality: self.jpeg_quality,
            refresh_interval: self.refresh_interval(),
            ..Default::default()
        }
    }

    /// Camera policy of the product scanner: 720p, environment facing
    pub fn product_scanner_policy(&self) -> CameraPolicy {
        CameraPolicy {
            constraints: StreamConstraints::default()
                .with_resolution(VideoResolution::HD)
                .facing_environment(),
            simulate_on_failure: self.product_fallback_delay_ms.map(Duration::from_millis),
            jpeg_quality: self.jpeg_quality,
            refresh_interval: self.refresh_interval(),
            ..CameraPolicy::scanner()
        }
    }

    /// Camera policy of the package scanner
    pub fn qr_scanner_policy(&self) -> CameraPolicy {
        CameraPolicy {
            simulate_on_failure: self.qr_fallback_delay_ms.map(Duration::from_millis),
            jpeg_quality: self.jpeg_quality,
            refresh_interval: self.refresh_interval(),
            ..CameraPolicy::scanner()
        }
    }
}

fn config_error(message: &str) -> StationError {
    StationError::Configuration {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationcam_media::PreviewMode;

    #[test]
    fn test_defaults_are_valid() {
        let config = StationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.packaging_station, "Packaging Station A");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StationConfig::from_json_str(
            r#"{ "jpeg_quality": 65, "backend": { "seed": 7, "delays": { "identify": 10 } } }"#,
        )
        .unwrap();

        assert_eq!(config.jpeg_quality, 65);
        assert_eq!(config.qr_fallback_delay_ms, Some(3000));
        assert_eq!(config.backend.seed, Some(7));
        assert_eq!(config.backend.delays.identify, Duration::from_millis(10));
        assert_eq!(config.backend.delays.login, Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let error = StationConfig::from_json_str(r#"{ "jpeg_quality": 0 }"#).unwrap_err();
        assert!(matches!(error, StationError::Configuration { .. }));

        let error = StationConfig::from_json_str(r#"{ "refresh_interval_ms": "soon" }"#).unwrap_err();
        assert!(matches!(error, StationError::Serialization { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.json");
        std::fs::write(&path, r#"{ "packaging_station": "Dock 3" }"#).unwrap();

        let config = StationConfig::from_file(&path).unwrap();
        assert_eq!(config.packaging_station, "Dock 3");

        let missing = StationConfig::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, StationError::Io { .. }));
    }

    #[test]
    fn test_widget_policies() {
        let config = StationConfig::default();

        let feed = config.live_feed_policy();
        assert_eq!(feed.preview, PreviewMode::Continuous);
        assert_eq!(feed.constraints.ideal_frame_rate, Some(30));
        assert!(feed.simulate_on_failure.is_none());

        let product = config.product_scanner_policy();
        assert!(product.constraints.environment_facing);
        assert!(product.stop_after_capture);
        assert!(product.simulate_on_failure.is_none());

        let qr = config.qr_scanner_policy();
        assert_eq!(qr.preview, PreviewMode::FreezeOnCapture);
        assert_eq!(qr.simulate_on_failure, Some(Duration::from_secs(3)));
    }
}
