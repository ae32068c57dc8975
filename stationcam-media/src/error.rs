//! Camera error types and handling
//!
//! This module defines the error types used by device discovery, stream
//! acquisition, preview and capture, with helpers to classify them for the
//! widgets that turn them into user messages.

use thiserror::Error;

/// Main error type for camera operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Camera access was denied by the platform or the user
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// Device enumeration failed
    #[error("Device enumeration failed: {reason}")]
    DeviceEnumerationFailed {
        /// Failure reason
        reason: String,
    },

    /// Requested device is not present
    #[error("Device not found: {device_id}")]
    DeviceNotFound {
        /// Device identifier
        device_id: String,
    },

    /// Device is held by another application
    #[error("Device busy: {device_id}")]
    DeviceBusy {
        /// Device identifier
        device_id: String,
    },

    /// Device went away while streaming
    #[error("Device disconnected: {device_id}")]
    DeviceDisconnected {
        /// Device identifier
        device_id: String,
    },

    /// The platform failed to open a stream for another reason
    #[error("Failed to start camera {device_id}: {reason}")]
    AcquisitionFailed {
        /// Device identifier
        device_id: String,
        /// Failure reason
        reason: String,
    },

    /// An acquisition is already running on this session
    #[error("Camera is already connecting")]
    AcquisitionInProgress,

    /// The session was released while the acquisition was in flight
    #[error("Session released before the camera finished connecting")]
    SessionReleased,

    /// Capture not active error
    #[error("Capture not active")]
    CaptureNotActive,

    /// Preview could not start playback
    #[error("Playback rejected: {reason}")]
    PlaybackRejected {
        /// Rejection reason
        reason: String,
    },

    /// Still image encoding failed
    #[error("Encoding failed: {format} - {reason}")]
    EncodingFailed {
        /// Image format
        format: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid frame data error
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message
        message: String,
    },
}

/// Result type alias for camera operations
pub type MediaResult<T> = Result<T, MediaError>;

impl From<std::io::Error> for MediaError {
    fn from(error: std::io::Error) -> Self {
        MediaError::Io {
            message: error.to_string(),
        }
    }
}

impl MediaError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::DeviceBusy { .. } => true,
            MediaError::DeviceDisconnected { .. } => true,
            MediaError::AcquisitionFailed { .. } => true,
            MediaError::AcquisitionInProgress => true,
            MediaError::SessionReleased => true,
            MediaError::PlaybackRejected { .. } => true,
            MediaError::Io { .. } => true,
            MediaError::PermissionDenied { .. } => false,
            MediaError::InvalidConfiguration { .. } => false,
            _ => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Validation,
            MediaError::PermissionDenied { .. } => ErrorCategory::Permission,
            MediaError::DeviceEnumerationFailed { .. } => ErrorCategory::Device,
            MediaError::DeviceNotFound { .. } => ErrorCategory::Device,
            MediaError::DeviceBusy { .. } => ErrorCategory::Device,
            MediaError::DeviceDisconnected { .. } => ErrorCategory::Device,
            MediaError::AcquisitionFailed { .. } => ErrorCategory::Device,
            MediaError::AcquisitionInProgress => ErrorCategory::State,
            MediaError::SessionReleased => ErrorCategory::State,
            MediaError::CaptureNotActive => ErrorCategory::State,
            MediaError::PlaybackRejected { .. } => ErrorCategory::Preview,
            MediaError::EncodingFailed { .. } => ErrorCategory::Format,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Format,
            MediaError::Io { .. } => ErrorCategory::System,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed input, rejected before any platform call
    Validation,
    /// Camera access denied
    Permission,
    /// Device absent, busy or disconnected
    Device,
    /// State management errors
    State,
    /// Preview playback problems (non-fatal)
    Preview,
    /// Format and data structure errors
    Format,
    /// System-level errors (I/O)
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let denied = MediaError::PermissionDenied {
            operation: "open camera".to_string(),
        };
        assert_eq!(denied.category(), ErrorCategory::Permission);
        assert!(!denied.is_recoverable());

        let busy = MediaError::DeviceBusy {
            device_id: "cam-1".to_string(),
        };
        assert_eq!(busy.category(), ErrorCategory::Device);
        assert!(busy.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::InvalidFrameData {
            expected: 1024,
            actual: 512,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame data: expected 1024 bytes, got 512"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        match MediaError::from(io_error) {
            MediaError::Io { message } => assert!(message.contains("access denied")),
            other => panic!("Expected Io error variant, got {:?}", other),
        }
    }
}
