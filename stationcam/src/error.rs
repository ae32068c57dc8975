//! Widget error type

use crate::scan_flow::FlowError;
use stationcam_core::{ServiceError, StationError};
use stationcam_media::MediaError;
use thiserror::Error;

/// Errors returned by widget operations.
///
/// Failures that happen inside a scan (camera, identification, submission)
/// are recorded in the widget's flow instead; these are the requests that
/// were refused outright.
#[derive(Error, Debug, Clone)]
pub enum WidgetError {
    /// Required input missing; nothing was attempted
    #[error("{message}")]
    Validation {
        /// User-facing message
        message: String,
    },

    /// Action not allowed in the current flow state
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Camera error outside a scan flow
    #[error(transparent)]
    Camera(#[from] MediaError),

    /// Collaborator call that does not drive the flow failed
    #[error("{message}")]
    Collaborator {
        /// User-facing message
        message: String,
        /// Underlying error
        #[source]
        source: ServiceError,
    },

    /// Station level failure (configuration, storage)
    #[error("Station error: {0}")]
    Station(String),
}

/// Result type alias for widget operations
pub type WidgetResult<T> = Result<T, WidgetError>;

impl From<StationError> for WidgetError {
    fn from(error: StationError) -> Self {
        WidgetError::Station(error.to_string())
    }
}

impl WidgetError {
    /// Validation error with `message`
    pub fn validation(message: impl Into<String>) -> Self {
        WidgetError::Validation {
            message: message.into(),
        }
    }

    /// Text suitable for showing to the operator
    pub fn user_message(&self) -> String {
        match self {
            WidgetError::Validation { message } => message.clone(),
            WidgetError::Flow(_) => "That action is not available right now.".to_string(),
            WidgetError::Camera(MediaError::PermissionDenied { .. }) => {
                "Camera access was denied. Allow camera access and try again.".to_string()
            }
            WidgetError::Camera(_) => {
                "Failed to start camera. Make sure the selected device is connected and permission granted."
                    .to_string()
            }
            WidgetError::Collaborator { message, .. } => message.clone(),
            WidgetError::Station(_) => "Station configuration error.".to_string(),
        }
    }

    /// Whether retrying the same action can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            WidgetError::Camera(e) => e.is_recoverable(),
            WidgetError::Station(_) => false,
            _ => true,
        }
    }
}
