//! Package label (QR) scanner
//!
//! Package scans need an explicit confirmation before they are submitted.
//! When the camera cannot be acquired and the policy has a simulation
//! fallback, a package scan is simulated after the fallback delay.

use super::{service_failure, CameraBinding, ScannerCore};
use crate::error::{WidgetError, WidgetResult};
use crate::event::{EventStream, WidgetEvent, WidgetKind};
use crate::scan_flow::{FailureClass, FlowError, FlowFailure, FlowState, Outcome, ScanFlow};
use stationcam_core::{
    simulated_package_scan, DeliveryState, DeliveryStatus, IdentificationService, ImagePayload,
    PackageScan, ScanKind, ScanResult, ServiceError, SubmissionService,
};
use stationcam_media::{CameraPlatform, CameraPolicy, CapturedFrame, DeviceDescriptor, DeviceListing};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SELECT_CAMERA: &str = "Please select a camera device.";
const NO_IMAGE: &str = "No image captured to process.";
const SEND_REJECTED: &str = "Failed to send captured image.";
const SEND_UNAVAILABLE: &str = "Error sending captured image to backend.";
const SENT: &str = "Captured image sent to backend successfully!";
const SUBMIT_REJECTED: &str = "Failed to process QR scan result.";
const SUBMIT_UNAVAILABLE: &str = "Error communicating with backend.";
const SUBMITTED: &str = "QR code scanned and sent to backend successfully!";
const STATUS_REJECTED: &str = "Failed to update delivery status.";

/// QR scanner widget
pub struct QrScanner {
    core: ScannerCore<PackageScan>,
    identifier: Arc<dyn IdentificationService>,
    submitter: Arc<dyn SubmissionService>,
}

impl QrScanner {
    /// Scanner over `platform`
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        policy: CameraPolicy,
        identifier: Arc<dyn IdentificationService>,
        submitter: Arc<dyn SubmissionService>,
    ) -> WidgetResult<Self> {
        let binding = CameraBinding::new(WidgetKind::QrScanner, platform, policy)?;
        Ok(Self {
            core: ScannerCore::new(binding),
            identifier,
            submitter,
        })
    }

    /// Re-enumerate cameras
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

    /// Start scanning on the selected camera.
    ///
    /// With a fallback delay configured, a camera failure waits that long and
    /// then simulates a scan, unless the scan was stopped or reset meanwhile.
    pub async fn start_scanning(&self) -> WidgetResult<FlowState<PackageScan>> {
        let error = match self.core.start_camera(SELECT_CAMERA).await? {
            Ok(_) => return Ok(self.core.state()),
            Err(e) => e,
        };

        if self.core.fallback_due(&error).await {
            self.simulate_scan()
        } else {
            Ok(self.core.state())
        }
    }

    /// Stop the camera and abandon the scan
    pub fn stop_scanning(&self) -> bool {
        self.core.stop_camera()
    }

    /// Freeze the current frame for processing
    pub fn capture_image(&self) -> WidgetResult<CapturedFrame> {
        self.core.capture_frame()
    }

    /// Frame held for processing
    pub fn captured_image(&self) -> Option<CapturedFrame> {
        self.core.flow().frame().cloned()
    }

    /// Send the captured frame for decoding; the decoded package waits for
    /// confirmation
    pub async fn process_captured_image(&self) -> WidgetResult<FlowState<PackageScan>> {
        let frame = match self.captured_image() {
            Some(frame) => frame,
            None => {
                self.core.binding().emit_error(NO_IMAGE);
                return Err(WidgetError::validation(NO_IMAGE));
            }
        };

        self.core.begin_processing()?;
        let payload = ImagePayload::camera(frame.mime_type(), frame.encoded.to_vec());
        let outcome = match self.identifier.identify(&payload, ScanKind::Package).await {
            Ok(ScanResult::Package(scan)) => self.identified(scan),
            Ok(other) => {
                warn!("Expected a package scan, got {:?}", other.kind());
                Outcome::Failed(FlowFailure::new(FailureClass::Collaborator, SEND_REJECTED))
            }
            Err(e) => {
                warn!("Captured image processing failed: {}", e);
                Outcome::Failed(service_failure(&e, SEND_REJECTED, SEND_UNAVAILABLE))
            }
        };

        let state = self.core.finish(outcome)?;
        if matches!(state, FlowState::PendingConfirmation(_)) {
            self.core.update(|flow| flow.set_notice(SENT));
        }
        Ok(state)
    }

    /// Produce a random package scan without a camera
    pub fn simulate_scan(&self) -> WidgetResult<FlowState<PackageScan>> {
        self.core.begin_processing()?;
        self.core.camera().stop();
        let scan = simulated_package_scan(&mut rand::thread_rng());
        debug!("Simulated package scan {}", scan.package_id);
        let outcome = self.identified(scan);
        self.core.finish(outcome)
    }

    fn identified(&self, scan: PackageScan) -> Outcome<PackageScan> {
        info!("Package {} decoded for {}", scan.package_id, scan.recipient_name);
        self.core.binding().emit(WidgetEvent::ScanIdentified {
            widget: WidgetKind::QrScanner,
            scan: ScanResult::Package(scan.clone()),
        });
        Outcome::NeedsConfirmation(scan)
    }

    /// Submit the pending package scan
    pub async fn confirm_scan(&self) -> WidgetResult<FlowState<PackageScan>> {
        let scan = self.core.update(|flow| flow.confirm())?;

        let outcome = match self.submitter.submit(&ScanResult::Package(scan.clone())).await {
            Ok(token) => {
                info!("Package scan {} confirmed as {}", scan.package_id, token);
                self.core.binding().emit(WidgetEvent::ScanSubmitted {
                    widget: WidgetKind::QrScanner,
                    token,
                });
                Outcome::Ready(scan)
            }
            Err(e) => {
                warn!("Package scan submission failed: {}", e);
                Outcome::Failed(service_failure(&e, SUBMIT_REJECTED, SUBMIT_UNAVAILABLE))
            }
        };

        let state = self.core.finish(outcome)?;
        if matches!(state, FlowState::Ready(_)) {
            self.core.update(|flow| flow.set_notice(SUBMITTED));
        }
        Ok(state)
    }

    /// Report the submitted package as delivered
    pub async fn mark_delivered(&self) -> WidgetResult<DeliveryStatus> {
        let scan = match self.core.state() {
            FlowState::Ready(scan) => scan,
            other => {
                return Err(FlowError::InvalidTransition {
                    from: other.label(),
                    action: "mark delivered",
                }
                .into())
            }
        };

        match self
            .submitter
            .update_delivery_status(&scan.package_id, DeliveryState::Delivered)
            .await
        {
            Ok(status) => {
                info!("Package {} marked delivered", status.package_id);
                self.core
                    .binding()
                    .emit(WidgetEvent::DeliveryStatusUpdated {
                        status: status.clone(),
                    });
                Ok(status)
            }
            Err(source) => {
                let message = match source {
                    ServiceError::Unavailable { .. } => SUBMIT_UNAVAILABLE,
                    _ => STATUS_REJECTED,
                };
                self.core.binding().emit_error(message);
                Err(WidgetError::Collaborator {
                    message: message.to_string(),
                    source,
                })
            }
        }
    }

    /// Back to idle, dropping the captured frame, result and messages
    pub fn reset(&self) -> WidgetResult<FlowState<PackageScan>> {
        self.core.reset()
    }

    /// Flow state
    pub fn state(&self) -> FlowState<PackageScan> {
        self.core.state()
    }

    /// Flow with its captured frame and notice
    pub fn flow(&self) -> ScanFlow<PackageScan> {
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

impl std::fmt::Debug for QrScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrScanner")
            .field("state", &self.core.state().label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationcam_core::{SimulatedBackend, SimulatedOperation};
    use stationcam_media::{PreviewStatus, SimulatedPlatform};
    use std::time::Duration;

    fn scanner(platform: &SimulatedPlatform, policy: CameraPolicy) -> (QrScanner, Arc<SimulatedBackend>) {
        let backend = Arc::new(SimulatedBackend::instant(11));
        let scanner = QrScanner::new(
            Arc::new(platform.clone()),
            policy,
            backend.clone(),
            backend.clone(),
        )
        .unwrap();
        (scanner, backend)
    }

    #[tokio::test]
    async fn test_capture_process_confirm() {
        let platform = SimulatedPlatform::default();
        let (scanner, backend) = scanner(&platform, CameraPolicy::scanner());
        scanner.refresh_devices().await.unwrap();

        assert_eq!(scanner.start_scanning().await.unwrap(), FlowState::Capturing);
        let frame = scanner.capture_image().unwrap();
        assert_eq!(scanner.captured_image(), Some(frame));
        assert!(!scanner.is_scanning());
        assert_eq!(platform.live_streams(), 0);

        let state = scanner.process_captured_image().await.unwrap();
        let pending = match state {
            FlowState::PendingConfirmation(scan) => scan,
            other => panic!("unexpected state {:?}", other),
        };
        assert!(pending.package_id.starts_with("PKG-"));
        assert!(backend.submitted().is_empty());

        let state = scanner.confirm_scan().await.unwrap();
        assert_eq!(state, FlowState::Ready(pending));
        assert_eq!(scanner.flow().notice(), Some(SUBMITTED));
        assert_eq!(backend.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_process_without_capture() {
        let platform = SimulatedPlatform::default();
        let (scanner, _) = scanner(&platform, CameraPolicy::scanner());
        scanner.refresh_devices().await.unwrap();
        scanner.start_scanning().await.unwrap();

        let error = scanner.process_captured_image().await.unwrap_err();
        assert_eq!(error.user_message(), NO_IMAGE);
        assert_eq!(scanner.state(), FlowState::Capturing);
    }

    #[tokio::test]
    async fn test_capture_freezes_preview() {
        let platform = SimulatedPlatform::default();
        let (scanner, _) = scanner(
            &platform,
            CameraPolicy {
                stop_after_capture: false,
                ..CameraPolicy::scanner()
            },
        );
        scanner.refresh_devices().await.unwrap();
        scanner.start_scanning().await.unwrap();
        scanner.capture_image().unwrap();

        assert!(scanner.is_scanning());
        assert_eq!(scanner.core.camera().preview_status(), PreviewStatus::Playing);
        assert!(scanner.stop_scanning());
        assert!(scanner.state().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_simulates_scan() {
        let platform = SimulatedPlatform::default();
        platform.set_busy("cam-1", true);
        let (scanner, _) = scanner(
            &platform,
            CameraPolicy::scanner().with_simulation_fallback(Duration::from_secs(3)),
        );
        scanner.refresh_devices().await.unwrap();

        let started = tokio::time::Instant::now();
        let state = scanner.start_scanning().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(matches!(state, FlowState::PendingConfirmation(_)));
    }

    #[tokio::test]
    async fn test_camera_failure_without_fallback() {
        let platform = SimulatedPlatform::default();
        platform.set_permission_denied(true);
        let (scanner, _) = scanner(&platform, CameraPolicy::scanner());
        scanner.refresh_devices().await.unwrap();

        let state = scanner.start_scanning().await.unwrap();
        assert_eq!(state.failure().unwrap().class, FailureClass::PermissionDenied);
    }

    #[tokio::test]
    async fn test_rejected_confirmation_recovers() {
        let platform = SimulatedPlatform::default();
        let (scanner, backend) = scanner(&platform, CameraPolicy::scanner());

        scanner.simulate_scan().unwrap();
        backend.reject_next(SimulatedOperation::Submit, "Unknown delivery code");
        let state = scanner.confirm_scan().await.unwrap();
        assert_eq!(
            state.failure().unwrap().message,
            "Failed to process QR scan result. Unknown delivery code"
        );

        assert!(scanner.reset().unwrap().is_idle());
        assert!(scanner.confirm_scan().await.is_err());
    }

    #[tokio::test]
    async fn test_mark_delivered() {
        let platform = SimulatedPlatform::default();
        let (scanner, backend) = scanner(&platform, CameraPolicy::scanner());

        assert!(scanner.mark_delivered().await.is_err());

        scanner.simulate_scan().unwrap();
        let state = scanner.confirm_scan().await.unwrap();
        let scan = state.result().cloned().unwrap();

        let status = scanner.mark_delivered().await.unwrap();
        assert_eq!(status.package_id, scan.package_id);
        assert_eq!(status.status, DeliveryState::Delivered);

        backend.fail_next(SimulatedOperation::UpdateStatus, "offline");
        let error = scanner.mark_delivered().await.unwrap_err();
        assert_eq!(error.user_message(), SUBMIT_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_start_after_result_begins_new_scan() {
        let platform = SimulatedPlatform::default();
        let (scanner, _) = scanner(&platform, CameraPolicy::scanner());
        scanner.refresh_devices().await.unwrap();

        scanner.simulate_scan().unwrap();
        let state = scanner.start_scanning().await.unwrap();
        assert_eq!(state, FlowState::Capturing);
        assert!(scanner.captured_image().is_none());
    }
}
