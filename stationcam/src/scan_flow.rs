//! Scan result flow
//!
//! ```text
//! Idle ─begin_capture─▶ Capturing ─begin_processing─▶ Processing ─complete─▶ Ready
//!   │                                                      │  ▲     └──────▶ PendingConfirmation ─confirm─┘
//!   └──────────────begin_processing (upload)───────────────┘  └─────────────▶ Error ─reset─▶ Idle
//! ```
//!
//! Every failure lands in `Error` with a non-empty message and is recovered
//! by `reset`. Transitions not in the diagram are rejected and leave the
//! state untouched.

use stationcam_media::CapturedFrame;
use thiserror::Error;
use tracing::debug;

/// Kind of failure, each with its own default message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// No usable camera
    MissingDevice,
    /// Camera access refused
    PermissionDenied,
    /// Identification or submission failed
    Collaborator,
    /// Required input missing
    Validation,
}

impl FailureClass {
    /// Message used when none is given
    pub fn default_message(&self) -> &'static str {
        match self {
            FailureClass::MissingDevice => {
                "Failed to start camera. Make sure the selected device is connected."
            }
            FailureClass::PermissionDenied => {
                "Camera access was denied. Allow camera access and try again."
            }
            FailureClass::Collaborator => "Error communicating with backend.",
            FailureClass::Validation => "Required input is missing.",
        }
    }
}

/// Why the flow is in `Error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowFailure {
    /// Failure class
    pub class: FailureClass,
    /// User-facing message, never empty
    pub message: String,
}

impl FlowFailure {
    /// Failure with `message`, or the class default when it is blank
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            class.default_message().to_string()
        } else {
            message
        };
        Self { class, message }
    }
}

/// Flow state
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState<R> {
    /// Nothing in progress
    Idle,
    /// Camera running or upload being read
    Capturing,
    /// Waiting on a collaborator
    Processing,
    /// Identified, waiting for the operator to confirm
    PendingConfirmation(R),
    /// Final result
    Ready(R),
    /// Failed; reset to retry
    Error(FlowFailure),
}

impl<R> FlowState<R> {
    /// State label
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Capturing => "capturing",
            FlowState::Processing => "processing",
            FlowState::PendingConfirmation(_) => "pending-confirmation",
            FlowState::Ready(_) => "ready",
            FlowState::Error(_) => "error",
        }
    }

    /// Result held by `Ready` or `PendingConfirmation`
    pub fn result(&self) -> Option<&R> {
        match self {
            FlowState::PendingConfirmation(r) | FlowState::Ready(r) => Some(r),
            _ => None,
        }
    }

    /// Failure held by `Error`
    pub fn failure(&self) -> Option<&FlowFailure> {
        match self {
            FlowState::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the flow is idle
    pub fn is_idle(&self) -> bool {
        matches!(self, FlowState::Idle)
    }
}

/// What a collaborator round trip produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    /// Final result
    Ready(R),
    /// Result that needs an explicit confirmation
    NeedsConfirmation(R),
    /// Failure
    Failed(FlowFailure),
}

/// Flow misuse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The action is not allowed in the current state
    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        /// State the flow was in
        from: &'static str,
        /// Attempted action
        action: &'static str,
    },
}

/// Scan flow state machine with its transient data
#[derive(Debug, Clone)]
pub struct ScanFlow<R> {
    state: FlowState<R>,
    frame: Option<CapturedFrame>,
    notice: Option<String>,
}

impl<R: Clone> ScanFlow<R> {
    /// Idle flow
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            frame: None,
            notice: None,
        }
    }

    /// Current state
    pub fn state(&self) -> &FlowState<R> {
        &self.state
    }

    /// Captured frame held for processing or display
    pub fn frame(&self) -> Option<&CapturedFrame> {
        self.frame.as_ref()
    }

    /// Hold `frame` until reset
    pub fn attach_frame(&mut self, frame: CapturedFrame) {
        self.frame = Some(frame);
    }

    /// Transient success message
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Set the transient success message
    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// `Idle → Capturing`
    pub fn begin_capture(&mut self) -> Result<(), FlowError> {
        match self.state {
            FlowState::Idle => {
                self.notice = None;
                self.frame = None;
                self.transition(FlowState::Capturing);
                Ok(())
            }
            _ => Err(self.invalid("begin capture")),
        }
    }

    /// `Capturing → Processing`, or `Idle → Processing` for uploads
    pub fn begin_processing(&mut self) -> Result<(), FlowError> {
        match self.state {
            FlowState::Capturing | FlowState::Idle => {
                self.notice = None;
                self.transition(FlowState::Processing);
                Ok(())
            }
            _ => Err(self.invalid("begin processing")),
        }
    }

    /// `Processing → Ready | PendingConfirmation | Error`
    pub fn complete(&mut self, outcome: Outcome<R>) -> Result<&FlowState<R>, FlowError> {
        if !matches!(self.state, FlowState::Processing) {
            return Err(self.invalid("complete processing"));
        }
        let next = match outcome {
            Outcome::Ready(result) => FlowState::Ready(result),
            Outcome::NeedsConfirmation(result) => FlowState::PendingConfirmation(result),
            Outcome::Failed(failure) => FlowState::Error(failure),
        };
        self.transition(next);
        Ok(&self.state)
    }

    /// `PendingConfirmation → Processing`, handing back the result to submit
    pub fn confirm(&mut self) -> Result<R, FlowError> {
        match &self.state {
            FlowState::PendingConfirmation(result) => {
                let result = result.clone();
                self.transition(FlowState::Processing);
                Ok(result)
            }
            _ => Err(self.invalid("confirm")),
        }
    }

    /// Any non-idle state `→ Error`
    pub fn fail(
        &mut self,
        class: FailureClass,
        message: impl Into<String>,
    ) -> Result<&FlowFailure, FlowError> {
        if self.state.is_idle() {
            return Err(self.invalid("fail"));
        }
        self.notice = None;
        self.transition(FlowState::Error(FlowFailure::new(class, message)));
        match &self.state {
            FlowState::Error(failure) => Ok(failure),
            _ => Err(self.invalid("fail")),
        }
    }

    /// `Capturing → Idle` when the operator stops the camera
    pub fn cancel(&mut self) -> Result<(), FlowError> {
        match self.state {
            FlowState::Capturing => {
                self.frame = None;
                self.transition(FlowState::Idle);
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }

    /// `Ready | Error | PendingConfirmation → Idle`, dropping the frame and messages
    pub fn reset(&mut self) -> Result<(), FlowError> {
        match self.state {
            FlowState::Ready(_) | FlowState::Error(_) | FlowState::PendingConfirmation(_) => {
                self.frame = None;
                self.notice = None;
                self.transition(FlowState::Idle);
                Ok(())
            }
            _ => Err(self.invalid("reset")),
        }
    }

    fn transition(&mut self, next: FlowState<R>) {
        debug!("Scan flow {} -> {}", self.state.label(), next.label());
        self.state = next;
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            from: self.state.label(),
            action,
        }
    }
}

impl<R: Clone> Default for ScanFlow<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_path_to_ready() {
        let mut flow = ScanFlow::<u32>::new();
        flow.begin_capture().unwrap();
        flow.begin_processing().unwrap();
        let state = flow.complete(Outcome::Ready(7)).unwrap();
        assert_eq!(state, &FlowState::Ready(7));

        flow.reset().unwrap();
        assert!(flow.state().is_idle());
    }

    #[test]
    fn test_upload_bypasses_capture() {
        let mut flow = ScanFlow::<u32>::new();
        flow.begin_processing().unwrap();
        assert_eq!(flow.state(), &FlowState::Processing);
    }

    #[test]
    fn test_confirmation_step() {
        let mut flow = ScanFlow::<&str>::new();
        flow.begin_capture().unwrap();
        flow.begin_processing().unwrap();
        flow.complete(Outcome::NeedsConfirmation("PKG-1")).unwrap();
        assert_eq!(flow.state().result(), Some(&"PKG-1"));

        assert_eq!(flow.confirm().unwrap(), "PKG-1");
        assert_eq!(flow.state(), &FlowState::Processing);
        flow.complete(Outcome::Ready("PKG-1")).unwrap();
        assert_eq!(flow.state().label(), "ready");
    }

    #[test]
    fn test_error_message_never_empty() {
        let mut flow = ScanFlow::<u32>::new();
        flow.begin_processing().unwrap();
        let failure = flow.fail(FailureClass::Collaborator, "   ").unwrap();
        assert_eq!(failure.message, "Error communicating with backend.");

        flow.reset().unwrap();
        flow.begin_processing().unwrap();
        flow.complete(Outcome::Failed(FlowFailure::new(FailureClass::Validation, "")))
            .unwrap();
        assert!(!flow.state().failure().unwrap().message.is_empty());
    }

    #[test]
    fn test_invalid_transitions_leave_state() {
        let mut flow = ScanFlow::<u32>::new();
        assert!(flow.reset().is_err());
        assert!(flow.confirm().is_err());
        assert!(flow.fail(FailureClass::Validation, "x").is_err());
        assert!(flow.complete(Outcome::Ready(1)).is_err());
        assert!(flow.state().is_idle());

        flow.begin_capture().unwrap();
        assert_eq!(
            flow.begin_capture().unwrap_err(),
            FlowError::InvalidTransition {
                from: "capturing",
                action: "begin capture",
            }
        );
        assert_eq!(flow.state(), &FlowState::Capturing);
    }

    #[test]
    fn test_reset_drops_frame_and_notice() {
        let mut flow = ScanFlow::<u32>::new();
        flow.begin_capture().unwrap();
        flow.attach_frame(
            stationcam_media::FrameCapturer::default()
                .capture(&stationcam_media::PreviewSurface::default())
                .unwrap(),
        );
        flow.begin_processing().unwrap();
        flow.complete(Outcome::Ready(1)).unwrap();
        flow.set_notice("done");

        flow.reset().unwrap();
        assert!(flow.frame().is_none());
        assert!(flow.notice().is_none());
    }

    #[test]
    fn test_cancel_only_while_capturing() {
        let mut flow = ScanFlow::<u32>::new();
        assert!(flow.cancel().is_err());
        flow.begin_capture().unwrap();
        flow.cancel().unwrap();
        assert!(flow.state().is_idle());
    }
}
