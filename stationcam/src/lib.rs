//! # Station Cam
//!
//! Camera widgets for a warehouse packing station: a live feed viewer, a
//! product scanner and a package (QR) scanner. Each widget owns its own
//! camera lifecycle and receives its collaborators explicitly.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stationcam::{Station, StationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let station = Station::simulated(StationConfig::default())?;
//!
//!     let scanner = station.qr_scanner()?;
//!     scanner.refresh_devices().await?;
//!     scanner.start_scanning().await?;
//!     scanner.capture_image()?;
//!     scanner.process_captured_image().await?;
//!     let state = scanner.confirm_scan().await?;
//!     println!("Scan finished: {}", state.label());
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use stationcam_core::{
    AuthError, AuthService, Authenticator, DeliveryState, DeliveryStatus, FileSessionStore,
    IdentificationService, ImagePayload, LoginCredentials, MemorySessionStore, PackageScan,
    ProductScan, Role, ScanKind, ScanResult, ServiceError, SessionStore, SimulatedBackend,
    SimulatedOperation, StationError, StationResult, SubmissionService, TaskStatus, UserProfile,
    WarehouseDelivery,
};

pub use stationcam_media::{
    CameraEvent, CameraPlatform, CameraPolicy, CameraSession, CapturedFrame, DeviceDescriptor,
    DeviceListing, FeedQuality, MediaError, PreviewMode, SessionState, SimulatedPlatform,
    SimulatedPlatformConfig, StreamConstraints, StreamHandle, VideoResolution,
};

#[cfg(feature = "native")]
pub use stationcam_media::NativePlatform;

// Public API modules
pub mod config;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod logging;
pub mod scan_flow;
pub mod widgets;

// Re-export main API types
pub use config::{BackendConfig, StationConfig};
pub use dashboard::{DeliveryBoard, DeliveryStats};
pub use error::{WidgetError, WidgetResult};
pub use event::{EventStream, WidgetEvent, WidgetKind};
pub use logging::init_logging;
pub use scan_flow::{FailureClass, FlowError, FlowFailure, FlowState, Outcome, ScanFlow};
pub use widgets::{LiveFeed, ProductScanner, QrScanner};

use std::sync::Arc;
use tracing::info;

/// One packing station: configuration, collaborators and the camera platform.
///
/// Cloning is cheap; clones share the same collaborators and login state.
#[derive(Clone)]
pub struct Station {
    inner: Arc<StationInner>,
}

struct StationInner {
    config: StationConfig,
    platform: Arc<dyn CameraPlatform>,
    identifier: Arc<dyn IdentificationService>,
    submitter: Arc<dyn SubmissionService>,
    authenticator: Authenticator,
    simulated: Option<Arc<SimulatedBackend>>,
}

impl Station {
    /// Station backed by the simulated backend and simulated cameras
    ///
    /// # Example
    /// ```rust,no_run
    /// use stationcam::{Station, StationConfig};
    ///
    /// let station = Station::simulated(StationConfig::default())?;
    /// assert!(!station.authenticator().is_authenticated());
    /// # Ok::<(), stationcam::StationError>(())
    /// ```
    pub fn simulated(config: StationConfig) -> StationResult<Self> {
        Self::builder(config).build()
    }

    /// Builder for a station with custom collaborators or camera platform
    pub fn builder(config: StationConfig) -> StationBuilder {
        StationBuilder::new(config)
    }

    /// Station configuration
    pub fn config(&self) -> &StationConfig {
        &self.inner.config
    }

    /// Login state shared by every widget of this station
    pub fn authenticator(&self) -> &Authenticator {
        &self.inner.authenticator
    }

    /// Camera platform handed to new widgets
    pub fn platform(&self) -> Arc<dyn CameraPlatform> {
        self.inner.platform.clone()
    }

    /// Simulated backend, when the station runs on one
    pub fn simulated_backend(&self) -> Option<Arc<SimulatedBackend>> {
        self.inner.simulated.clone()
    }

    /// New live feed widget
    pub fn live_feed(&self) -> WidgetResult<LiveFeed> {
        let config = &self.inner.config;
        Ok(
            LiveFeed::new(self.platform(), config.live_feed_policy())?
                .with_screenshot_prefix(config.screenshot_prefix.clone())
                .with_screenshot_dir(config.screenshot_dir.clone()),
        )
    }

    /// New product scanner widget
    pub fn product_scanner(&self) -> WidgetResult<ProductScanner> {
        let config = &self.inner.config;
        ProductScanner::new(
            self.platform(),
            config.product_scanner_policy(),
            self.inner.identifier.clone(),
            self.inner.submitter.clone(),
            config.packaging_station.clone(),
        )
    }

    /// New package scanner widget
    pub fn qr_scanner(&self) -> WidgetResult<QrScanner> {
        QrScanner::new(
            self.platform(),
            self.inner.config.qr_scanner_policy(),
            self.inner.identifier.clone(),
            self.inner.submitter.clone(),
        )
    }

    /// Delivery board loaded from the submission service
    pub async fn delivery_board(&self) -> Result<DeliveryBoard, ServiceError> {
        let mut board = DeliveryBoard::default();
        board.refresh(self.inner.submitter.as_ref()).await?;
        Ok(board)
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("config", &self.inner.config)
            .field("platform", &self.inner.platform.name())
            .field("authenticator", &self.inner.authenticator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Station`]. Collaborators that are not set come from one
/// shared [`SimulatedBackend`]; the camera platform defaults to
/// [`SimulatedPlatform`].
pub struct StationBuilder {
    config: StationConfig,
    platform: Option<Arc<dyn CameraPlatform>>,
    auth: Option<Arc<dyn AuthService>>,
    identifier: Option<Arc<dyn IdentificationService>>,
    submitter: Option<Arc<dyn SubmissionService>>,
    session_store: Option<Arc<dyn SessionStore>>,
}

impl StationBuilder {
    fn new(config: StationConfig) -> Self {
        Self {
            config,
            platform: None,
            auth: None,
            identifier: None,
            submitter: None,
            session_store: None,
        }
    }

    /// Camera platform
    pub fn platform(mut self, platform: Arc<dyn CameraPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Authentication collaborator
    pub fn auth_service(mut self, service: Arc<dyn AuthService>) -> Self {
        self.auth = Some(service);
        self
    }

    /// Identification collaborator
    pub fn identification_service(mut self, service: Arc<dyn IdentificationService>) -> Self {
        self.identifier = Some(service);
        self
    }

    /// Submission collaborator
    pub fn submission_service(mut self, service: Arc<dyn SubmissionService>) -> Self {
        self.submitter = Some(service);
        self
    }

    /// Session store; defaults to a file store in `session_dir`, else memory
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Validate the configuration and assemble the station.
    ///
    /// A persisted login is restored on the way.
    pub fn build(self) -> StationResult<Station> {
        self.config.validate()?;

        let needs_backend =
            self.auth.is_none() || self.identifier.is_none() || self.submitter.is_none();
        let simulated = needs_backend.then(|| {
            let backend = SimulatedBackend::with_delays(self.config.backend.delays.clone());
            let backend = match self.config.backend.seed {
                Some(seed) => backend.seeded(seed),
                None => backend,
            };
            Arc::new(backend)
        });

        let (auth, identifier, submitter) = match &simulated {
            Some(backend) => (
                self.auth
                    .unwrap_or_else(|| backend.clone() as Arc<dyn AuthService>),
                self.identifier
                    .unwrap_or_else(|| backend.clone() as Arc<dyn IdentificationService>),
                self.submitter
                    .unwrap_or_else(|| backend.clone() as Arc<dyn SubmissionService>),
            ),
            None => match (self.auth, self.identifier, self.submitter) {
                (Some(auth), Some(identifier), Some(submitter)) => (auth, identifier, submitter),
                _ => {
                    return Err(StationError::Configuration {
                        message: "missing station collaborator".to_string(),
                    })
                }
            },
        };

        let store: Arc<dyn SessionStore> = match (self.session_store, &self.config.session_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileSessionStore::new(dir)),
            (None, None) => Arc::new(MemorySessionStore::new()),
        };
        let authenticator = Authenticator::new(auth, store);
        if let Some(user) = authenticator.restore() {
            info!("Restored session for {}", user.username);
        }

        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(SimulatedPlatform::default()) as Arc<dyn CameraPlatform>);
        info!("Station ready on {} cameras", platform.name());

        Ok(Station {
            inner: Arc::new(StationInner {
                config: self.config,
                platform,
                identifier,
                submitter,
                authenticator,
                simulated,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn instant_config() -> StationConfig {
        StationConfig::from_json_str(
            r#"{ "backend": { "seed": 1, "delays": { "login": 0, "identify": 0, "submit_package": 0, "submit_product": 0, "create_task": 0, "update_status": 0, "list_deliveries": 0 } } }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_simulated_station() {
        let station = Station::simulated(instant_config()).unwrap();
        assert!(station.simulated_backend().is_some());
        assert!(!station.authenticator().is_authenticated());
        assert!(station.live_feed().is_ok());
        assert!(station.product_scanner().is_ok());
        assert!(station.qr_scanner().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StationConfig {
            jpeg_quality: 0,
            ..StationConfig::default()
        };
        assert!(matches!(
            Station::simulated(config),
            Err(StationError::Configuration { .. })
        ));
    }

    #[test]
    fn test_injected_collaborators_skip_backend() {
        let backend = Arc::new(SimulatedBackend::instant(2));
        let station = Station::builder(StationConfig::default())
            .auth_service(backend.clone())
            .identification_service(backend.clone())
            .submission_service(backend)
            .build()
            .unwrap();
        assert!(station.simulated_backend().is_none());
    }

    #[tokio::test]
    async fn test_session_restored_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StationConfig {
            session_dir: Some(dir.path().to_path_buf()),
            ..instant_config()
        };

        let station = Station::simulated(config.clone()).unwrap();
        station
            .authenticator()
            .login(&LoginCredentials::new("admin", "demo123"))
            .await
            .unwrap();

        let restarted = Station::simulated(config).unwrap();
        let user = restarted.authenticator().current().unwrap();
        assert_eq!(user.username, "admin");
    }

    #[test]
    fn test_live_feed_uses_configured_screenshot_dir() {
        let config = StationConfig {
            screenshot_dir: PathBuf::from("/var/lib/station/shots"),
            ..instant_config()
        };
        let station = Station::simulated(config).unwrap();
        let feed = station.live_feed().unwrap();
        assert_eq!(feed.screenshot_dir(), Path::new("/var/lib/station/shots"));
    }

    #[tokio::test]
    async fn test_delivery_board_from_backend() {
        let station = Station::simulated(instant_config()).unwrap();
        let board = station.delivery_board().await.unwrap();
        assert_eq!(board.stats().total, 4);
    }
}
