//! Product identification scanner
//!
//! Capture (or upload) an image of a product on a rack, have it identified,
//! log the identification with the backend, then optionally ask a robot to
//! bring the product to the packaging station. There is no confirmation
//! step: a successful identification is final.

use super::{service_failure, CameraBinding, ScannerCore};
use crate::error::{WidgetError, WidgetResult};
use crate::event::{EventStream, WidgetEvent, WidgetKind};
use crate::scan_flow::{FailureClass, FlowError, FlowFailure, FlowState, Outcome, ScanFlow};
use parking_lot::RwLock;
use stationcam_core::{
    IdentificationService, ImagePayload, ProductScan, ScanKind, ScanResult, ServiceError,
    SubmissionService, WarehouseDelivery,
};
use stationcam_media::{CameraPlatform, CameraPolicy, DeviceDescriptor, DeviceListing};
use std::sync::Arc;
use tracing::{info, warn};

const SELECT_CAMERA: &str = "Please select a camera device to start.";
const IDENTIFY_REJECTED: &str = "Failed to identify product. Please try again.";
const IDENTIFY_UNAVAILABLE: &str = "Error processing image. Please try again.";
const IDENTIFIED: &str = "Product identified successfully!";
const TASK_CREATED: &str = "Delivery task created! Robot will pick up the product shortly.";
const TASK_REJECTED: &str = "Failed to create delivery task.";
const TASK_UNAVAILABLE: &str = "Error creating delivery task.";

/// Product scanner widget
pub struct ProductScanner {
    core: ScannerCore<ProductScan>,
    identifier: Arc<dyn IdentificationService>,
    submitter: Arc<dyn SubmissionService>,
    packaging_station: String,
    last_delivery: RwLock<Option<WarehouseDelivery>>,
}

impl ProductScanner {
    /// Scanner over `platform`, delivering to `packaging_station`
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        policy: CameraPolicy,
        identifier: Arc<dyn IdentificationService>,
        submitter: Arc<dyn SubmissionService>,
        packaging_station: impl Into<String>,
    ) -> WidgetResult<Self> {
        let binding = CameraBinding::new(WidgetKind::ProductScanner, platform, policy)?;
        Ok(Self {
            core: ScannerCore::new(binding),
            identifier,
            submitter,
            packaging_station: packaging_station.into(),
            last_delivery: RwLock::new(None),
        })
    }

    /// Re-enumerate cameras; the first one is selected when nothing valid is
    pub async fn refresh_devices(&self) -> WidgetResult<DeviceListing> {
        self.core.binding().refresh_devices().await
    }

    /// Cameras found by the last refresh
    pub fn devices(&self) -> DeviceListing {
        self.core.camera().devices()
    }

    /// Pick a camera
    pub fn select_device(&self, device_id: &str) -> WidgetResult<DeviceDescriptor> {
        Ok(self.core.camera().select_device(device_id)?)
    }

    /// Selected camera
    pub fn selected_device(&self) -> Option<String> {
        self.core.camera().selected_device()
    }

    /// Start the camera on the selected device.
    ///
    /// A camera failure ends in `Error` unless a simulation fallback is
    /// configured, in which case a blank frame is identified after the delay.
    pub async fn start_camera(&self) -> WidgetResult<FlowState<ProductScan>> {
        let error = match self.core.start_camera(SELECT_CAMERA).await? {
            Ok(handle) => {
                info!("Product scanner streaming {}", handle.device_id);
                return Ok(self.core.state());
            }
            Err(e) => e,
        };

        if !self.core.fallback_due(&error).await {
            return Ok(self.core.state());
        }

        let frame = self.core.camera().capture()?;
        self.core.update(|flow| flow.attach_frame(frame.clone()));
        self.core.begin_processing()?;
        let payload = ImagePayload::camera(frame.mime_type(), frame.encoded.to_vec());
        self.identify(payload).await
    }

    /// Stop the camera without scanning
    pub fn stop_camera(&self) -> bool {
        self.core.stop_camera()
    }

    /// Capture the current frame, stop the camera, identify and log the product
    pub async fn capture_and_identify(&self) -> WidgetResult<FlowState<ProductScan>> {
        let frame = self.core.capture_frame()?;
        self.core.begin_processing()?;
        let payload = ImagePayload::camera(frame.mime_type(), frame.encoded.to_vec());
        self.identify(payload).await
    }

    /// Identify an uploaded image, bypassing the camera
    pub async fn upload_and_identify(
        &self,
        mime_type: &str,
        data: Vec<u8>,
    ) -> WidgetResult<FlowState<ProductScan>> {
        if data.is_empty() {
            return Err(WidgetError::validation("Please choose an image to upload."));
        }

        self.core.camera().stop();
        self.core.begin_processing()?;
        self.identify(ImagePayload::upload(mime_type, data)).await
    }

    async fn identify(&self, payload: ImagePayload) -> WidgetResult<FlowState<ProductScan>> {
        let outcome = match self.identifier.identify(&payload, ScanKind::Product).await {
            Ok(ScanResult::Product(scan)) => self.log_scan(scan).await,
            Ok(other) => {
                warn!("Expected a product scan, got {:?}", other.kind());
                Outcome::Failed(FlowFailure::new(FailureClass::Collaborator, IDENTIFY_REJECTED))
            }
            Err(e) => {
                warn!("Product identification failed: {}", e);
                Outcome::Failed(service_failure(&e, IDENTIFY_REJECTED, IDENTIFY_UNAVAILABLE))
            }
        };

        let state = self.core.finish(outcome)?;
        if matches!(state, FlowState::Ready(_)) {
            self.core.update(|flow| flow.set_notice(IDENTIFIED));
        }
        Ok(state)
    }

    async fn log_scan(&self, scan: ProductScan) -> Outcome<ProductScan> {
        let result = ScanResult::Product(scan.clone());
        self.core.binding().emit(WidgetEvent::ScanIdentified {
            widget: WidgetKind::ProductScanner,
            scan: result.clone(),
        });

        match self.submitter.submit(&result).await {
            Ok(token) => {
                info!(
                    "Identified {} at {} ({}% confidence)",
                    scan.product_name,
                    scan.rack_location,
                    scan.confidence_percent()
                );
                self.core.binding().emit(WidgetEvent::ScanSubmitted {
                    widget: WidgetKind::ProductScanner,
                    token,
                });
                Outcome::Ready(scan)
            }
            Err(e) => {
                warn!("Product scan submission failed: {}", e);
                Outcome::Failed(service_failure(&e, IDENTIFY_REJECTED, IDENTIFY_UNAVAILABLE))
            }
        }
    }

    /// Ask a robot to move the identified product to the packaging station.
    ///
    /// Failures are returned, not recorded on the flow: the identification
    /// stays valid and the request can be retried.
    pub async fn create_delivery_task(&self) -> WidgetResult<WarehouseDelivery> {
        let scan = match self.core.state() {
            FlowState::Ready(scan) => scan,
            other => {
                return Err(FlowError::InvalidTransition {
                    from: other.label(),
                    action: "create delivery task",
                }
                .into())
            }
        };

        let created = self
            .submitter
            .create_delivery_task(&scan.product_id, &scan.rack_location, &self.packaging_station)
            .await;

        match created {
            Ok(delivery) => {
                info!(
                    "Delivery task {} created for {} -> {}",
                    delivery.id, delivery.from_location, delivery.to_location
                );
                self.core.update(|flow| flow.set_notice(TASK_CREATED));
                *self.last_delivery.write() = Some(delivery.clone());
                self.core.binding().emit(WidgetEvent::DeliveryTaskCreated {
                    delivery: delivery.clone(),
                });
                Ok(delivery)
            }
            Err(source) => {
                let message = match source {
                    ServiceError::Unavailable { .. } => TASK_UNAVAILABLE,
                    _ => TASK_REJECTED,
                };
                self.core.binding().emit_error(message);
                Err(WidgetError::Collaborator {
                    message: message.to_string(),
                    source,
                })
            }
        }
    }

    /// Delivery task created from the current scan
    pub fn last_delivery(&self) -> Option<WarehouseDelivery> {
        self.last_delivery.read().clone()
    }

    /// Back to idle with the first camera selected again
    pub fn reset(&self) -> WidgetResult<FlowState<ProductScan>> {
        let state = self.core.reset()?;
        *self.last_delivery.write() = None;

        let camera = self.core.camera();
        camera.clear_selection();
        if let Some(first) = camera.devices().first() {
            camera.select_device(&first.id)?;
        }
        Ok(state)
    }

    /// Flow state
    pub fn state(&self) -> FlowState<ProductScan> {
        self.core.state()
    }

    /// Flow with its captured frame and notice
    pub fn flow(&self) -> ScanFlow<ProductScan> {
        self.core.flow()
    }

    /// Whether the camera is streaming
    pub fn is_scanning(&self) -> bool {
        self.core.camera().is_active()
    }

    /// Subscribe to this widget's events
    pub fn subscribe(&self) -> EventStream {
        self.core.binding().subscribe()
    }

    /// Release the camera and abandon any scan in progress
    pub fn shutdown(&self) {
        self.core.stop_camera();
        self.core.camera().shutdown();
    }
}

impl std::fmt::Debug for ProductScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductScanner")
            .field("state", &self.core.state().label())
            .field("packaging_station", &self.packaging_station)
            .finish()
    }
}
