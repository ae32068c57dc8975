//! Station widgets
//!
//! Each widget owns its own [`CameraLifecycleManager`] and receives its
//! collaborators explicitly. Nothing is shared between widgets.

pub mod live_feed;
pub mod product_scanner;
pub mod qr_scanner;

pub use live_feed::LiveFeed;
pub use product_scanner::ProductScanner;
pub use qr_scanner::QrScanner;

use crate::error::{WidgetError, WidgetResult};
use crate::event::{EventBus, EventStream, WidgetEvent, WidgetKind};
use crate::scan_flow::{FailureClass, FlowError, FlowFailure, FlowState, Outcome, ScanFlow};
use parking_lot::Mutex;
use stationcam_core::ServiceError;
use stationcam_media::{
    CameraEvent, CameraLifecycleManager, CameraPlatform, CameraPolicy, CapturedFrame,
    DeviceListing, MediaError, StreamHandle,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// A widget's camera plus its event plumbing
pub(crate) struct CameraBinding {
    kind: WidgetKind,
    camera: CameraLifecycleManager,
    camera_events: Mutex<broadcast::Receiver<CameraEvent>>,
    bus: EventBus,
}

impl CameraBinding {
    pub(crate) fn new(
        kind: WidgetKind,
        platform: Arc<dyn CameraPlatform>,
        policy: CameraPolicy,
    ) -> WidgetResult<Self> {
        let camera = CameraLifecycleManager::new(platform, policy)?;
        let camera_events = Mutex::new(camera.subscribe());
        Ok(Self {
            kind,
            camera,
            camera_events,
            bus: EventBus::new(),
        })
    }

    pub(crate) fn camera(&self) -> &CameraLifecycleManager {
        &self.camera
    }

    pub(crate) fn kind(&self) -> WidgetKind {
        self.kind
    }

    /// Forward queued camera events to widget subscribers
    pub(crate) fn pump(&self) {
        let mut receiver = self.camera_events.lock();
        loop {
            match receiver.try_recv() {
                Ok(event) => self.bus.emit(WidgetEvent::Camera {
                    widget: self.kind,
                    event,
                }),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    pub(crate) fn emit(&self, event: WidgetEvent) {
        self.pump();
        self.bus.emit(event);
    }

    pub(crate) fn emit_error(&self, message: &str) {
        self.emit(WidgetEvent::Error {
            widget: self.kind,
            message: message.to_string(),
        });
    }

    pub(crate) fn subscribe(&self) -> EventStream {
        self.bus.subscribe()
    }

    pub(crate) async fn refresh_devices(&self) -> WidgetResult<DeviceListing> {
        let listing = self.camera.refresh_devices().await;
        self.pump();
        Ok(listing?)
    }
}

/// Camera binding plus scan flow, shared by both scanners
pub(crate) struct ScannerCore<R> {
    binding: CameraBinding,
    flow: Mutex<ScanFlow<R>>,
    // Bumped whenever a scan attempt starts or is abandoned
    attempt: AtomicU64,
}

impl<R: Clone> ScannerCore<R> {
    pub(crate) fn new(binding: CameraBinding) -> Self {
        Self {
            binding,
            flow: Mutex::new(ScanFlow::new()),
            attempt: AtomicU64::new(0),
        }
    }

    pub(crate) fn binding(&self) -> &CameraBinding {
        &self.binding
    }

    pub(crate) fn camera(&self) -> &CameraLifecycleManager {
        self.binding.camera()
    }

    /// Run `change` on the flow and announce a state change
    pub(crate) fn update<T>(&self, change: impl FnOnce(&mut ScanFlow<R>) -> T) -> T {
        let (result, before, after) = {
            let mut flow = self.flow.lock();
            let before = flow.state().label();
            let result = change(&mut flow);
            (result, before, flow.state().label())
        };
        if before != after {
            self.binding.emit(WidgetEvent::FlowChanged {
                widget: self.binding.kind(),
                state: after,
            });
        }
        result
    }

    /// Move the flow to `Error`, tolerating an already idle flow
    pub(crate) fn fail(&self, failure: FlowFailure) -> FlowState<R> {
        let message = failure.message.clone();
        let state = self.update(|flow| {
            if let Err(e) = flow.fail(failure.class, failure.message) {
                warn!("Dropping failure '{}': {}", message, e);
            }
            flow.state().clone()
        });
        if let FlowState::Error(failure) = &state {
            self.binding.emit_error(&failure.message);
        }
        state
    }

    pub(crate) fn state(&self) -> FlowState<R> {
        self.flow.lock().state().clone()
    }

    pub(crate) fn flow(&self) -> ScanFlow<R> {
        self.flow.lock().clone()
    }

    fn next_attempt(&self) -> u64 {
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current_attempt(&self, attempt: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == attempt
    }

    /// Begin a camera scan on the selected device, resetting a finished flow
    /// first. `Ok(Err(_))` means the camera failed with the flow still capturing.
    pub(crate) async fn start_camera(
        &self,
        missing_selection: &str,
    ) -> WidgetResult<Result<StreamHandle, MediaError>> {
        if self.camera().selected_device().is_none() {
            self.binding.emit_error(missing_selection);
            return Err(WidgetError::validation(missing_selection));
        }

        self.update(|flow| {
            if flow.state().result().is_some() || flow.state().failure().is_some() {
                flow.reset()?;
            }
            flow.begin_capture()
        })?;
        self.next_attempt();

        let started = self.camera().start(None).await;
        self.binding.pump();
        Ok(started)
    }

    /// Handle a failed start. Without a fallback the flow fails right away;
    /// with one, wait the delay and report whether the simulated scan should
    /// run (nobody stopped or reset the scan meanwhile).
    pub(crate) async fn fallback_due(&self, error: &MediaError) -> bool {
        let delay = match self.camera().policy().simulate_on_failure {
            Some(delay) => delay,
            None => {
                self.fail(camera_failure(error));
                return false;
            }
        };

        let attempt = self.attempt.load(Ordering::SeqCst);
        info!(
            "Camera unavailable ({}), simulating a {} scan in {:?}",
            error,
            self.binding.kind().as_str(),
            delay
        );
        tokio::time::sleep(delay).await;
        self.is_current_attempt(attempt) && matches!(self.state(), FlowState::Capturing)
    }

    /// Take a still from the running camera and hold it on the flow
    pub(crate) fn capture_frame(&self) -> WidgetResult<CapturedFrame> {
        let state = self.state();
        if !matches!(state, FlowState::Capturing) {
            return Err(FlowError::InvalidTransition {
                from: state.label(),
                action: "capture",
            }
            .into());
        }
        if !self.camera().is_active() {
            return Err(WidgetError::validation(
                "Start the camera before capturing.",
            ));
        }

        let frame = self.camera().capture()?;
        self.update(|flow| flow.attach_frame(frame.clone()));
        self.binding.pump();
        Ok(frame)
    }

    /// Move to `Processing`
    pub(crate) fn begin_processing(&self) -> WidgetResult<()> {
        self.update(|flow| flow.begin_processing())?;
        Ok(())
    }

    /// Leave `Processing` with `outcome`
    pub(crate) fn finish(&self, outcome: Outcome<R>) -> WidgetResult<FlowState<R>> {
        let state = self.update(|flow| flow.complete(outcome).map(|state| state.clone()))?;
        if let FlowState::Error(failure) = &state {
            self.binding.emit_error(&failure.message);
        }
        Ok(state)
    }

    /// Stop the camera and abandon a scan that has not been processed yet
    pub(crate) fn stop_camera(&self) -> bool {
        self.next_attempt();
        let stopped = self.camera().stop();
        self.update(|flow| {
            if matches!(flow.state(), FlowState::Capturing) {
                let _ = flow.cancel();
            }
        });
        self.binding.pump();
        stopped
    }

    /// Back to `Idle` from anywhere but `Processing`
    pub(crate) fn reset(&self) -> WidgetResult<FlowState<R>> {
        self.update(|flow| match flow.state() {
            FlowState::Idle => Ok(()),
            FlowState::Capturing => flow.cancel(),
            _ => flow.reset(),
        })?;
        self.next_attempt();

        let camera = self.camera();
        camera.stop();
        camera.clear_capture();
        camera.clear_error();
        self.binding.pump();
        Ok(self.state())
    }
}

/// Flow failure for a camera error
pub(crate) fn camera_failure(error: &MediaError) -> FlowFailure {
    match error {
        MediaError::PermissionDenied { .. } => FlowFailure::new(
            FailureClass::PermissionDenied,
            FailureClass::PermissionDenied.default_message(),
        ),
        MediaError::InvalidConfiguration { message } => {
            FlowFailure::new(FailureClass::Validation, message.clone())
        }
        other => FlowFailure::new(
            FailureClass::MissingDevice,
            format!("{} ({})", FailureClass::MissingDevice.default_message(), other),
        ),
    }
}

/// Flow failure for a collaborator error: `rejected` when the service said
/// no, `unavailable` when the call itself failed
pub(crate) fn service_failure(error: &ServiceError, rejected: &str, unavailable: &str) -> FlowFailure {
    match error {
        ServiceError::Rejected { message, .. } if !message.trim().is_empty() => {
            FlowFailure::new(FailureClass::Collaborator, format!("{} {}", rejected, message))
        }
        ServiceError::Rejected { .. } => FlowFailure::new(FailureClass::Collaborator, rejected),
        ServiceError::InvalidInput { reason, .. } => {
            FlowFailure::new(FailureClass::Validation, format!("{} {}", rejected, reason))
        }
        ServiceError::Unavailable { .. } => {
            FlowFailure::new(FailureClass::Collaborator, unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_failure_classes() {
        let denied = camera_failure(&MediaError::PermissionDenied {
            operation: "open camera".to_string(),
        });
        assert_eq!(denied.class, FailureClass::PermissionDenied);

        let busy = camera_failure(&MediaError::DeviceBusy {
            device_id: "cam-1".to_string(),
        });
        assert_eq!(busy.class, FailureClass::MissingDevice);
        assert!(busy.message.contains("cam-1"));
    }

    #[test]
    fn test_service_failure_messages() {
        let rejected = service_failure(
            &ServiceError::rejected("submit package scan", "Duplicate package"),
            "Failed to process QR scan result.",
            "Error communicating with backend.",
        );
        assert_eq!(rejected.class, FailureClass::Collaborator);
        assert_eq!(
            rejected.message,
            "Failed to process QR scan result. Duplicate package"
        );

        let down = service_failure(
            &ServiceError::unavailable("identify", "timeout"),
            "Failed to identify product. Please try again.",
            "",
        );
        assert_eq!(down.class, FailureClass::Collaborator);
        assert_eq!(down.message, "Error communicating with backend.");
    }
}
