//! Structured logging setup

use stationcam_core::{StationError, StationResult};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this again
/// after a subscriber is installed does nothing.
pub fn init_logging(default_filter: &str) -> StationResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| StationError::Configuration {
            message: format!("Invalid log filter '{}': {}", default_filter, e),
        })?,
    };

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
    {
        tracing::debug!("Logging initialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        assert!(init_logging("debug").is_ok());
        assert!(init_logging("info").is_ok());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var("RUST_LOG").is_err() {
            let error = init_logging("stationcam=verbose").unwrap_err();
            assert!(matches!(error, StationError::Configuration { .. }));
        }
    }
}
