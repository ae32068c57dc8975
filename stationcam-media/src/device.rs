//! Video input device discovery

use crate::error::MediaResult;
use crate::platform::{CameraPlatform, StreamRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Message reported when enumeration finds no cameras
pub const NO_DEVICES_MESSAGE: &str = "No camera devices found";

/// Kind of media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    /// Camera
    VideoInput,
    /// Microphones, speakers and anything else
    Other,
}

/// Device as reported by the platform. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Opaque platform identifier
    pub id: String,
    /// Human readable name, empty until permission is granted on some platforms
    pub label: String,
    /// Device kind
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    /// Camera descriptor
    pub fn video_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }

    /// Label, or `Camera <id prefix>` when the platform gave none
    pub fn display_label(&self) -> String {
        if self.label.trim().is_empty() {
            let prefix: String = self.id.chars().take(8).collect();
            format!("Camera {}", prefix)
        } else {
            self.label.clone()
        }
    }
}

/// Outcome of one enumeration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceListing {
    devices: Vec<DeviceDescriptor>,
    permission_granted: bool,
}

impl DeviceListing {
    /// Listing from already filtered cameras
    pub fn new(devices: Vec<DeviceDescriptor>, permission_granted: bool) -> Self {
        Self {
            devices,
            permission_granted,
        }
    }

    /// Cameras in platform order
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Whether the permission probe succeeded
    pub fn permission_granted(&self) -> bool {
        self.permission_granted
    }

    /// No cameras found
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of cameras
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Error state to show instead of a device list
    pub fn error_message(&self) -> Option<&'static str> {
        self.is_empty().then_some(NO_DEVICES_MESSAGE)
    }

    /// Whether `device_id` is in this listing
    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.id == device_id)
    }

    /// First camera, the default pick for scanners
    pub fn first(&self) -> Option<&DeviceDescriptor> {
        self.devices.first()
    }

    /// Keep `selection` only if it still exists in this listing
    pub fn reconcile(&self, selection: Option<&str>) -> Option<String> {
        selection
            .filter(|id| self.contains(id))
            .map(str::to_string)
    }
}

/// Enumerates cameras through a platform
#[derive(Clone)]
pub struct DeviceRegistry {
    platform: Arc<dyn CameraPlatform>,
}

impl DeviceRegistry {
    /// Registry over `platform`
    pub fn new(platform: Arc<dyn CameraPlatform>) -> Self {
        Self { platform }
    }

    /// Enumerate cameras. Safe to call repeatedly.
    ///
    /// First opens and immediately stops a throwaway stream so the platform
    /// unlocks device labels. A failed probe is not an error; labels then
    /// fall back to generated names.
    pub async fn list_devices(&self) -> MediaResult<DeviceListing> {
        let permission_granted = match self.platform.open(&StreamRequest::any()).await {
            Ok(mut probe) => {
                probe.stop();
                true
            }
            Err(e) => {
                debug!("Camera permission not granted yet: {}", e);
                false
            }
        };

        let devices: Vec<DeviceDescriptor> = self
            .platform
            .enumerate()
            .await?
            .into_iter()
            .filter(|d| d.kind == DeviceKind::VideoInput)
            .map(|d| DeviceDescriptor {
                label: d.display_label(),
                ..d
            })
            .collect();

        info!(
            "Camera devices found on {}: {}",
            self.platform.name(),
            devices.len()
        );
        Ok(DeviceListing::new(devices, permission_granted))
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("platform", &self.platform.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{SimulatedPlatform, SimulatedPlatformConfig};

    #[test]
    fn test_display_label_fallback() {
        let unlabeled = DeviceDescriptor::video_input("0123456789abcdef", "");
        assert_eq!(unlabeled.display_label(), "Camera 01234567");

        let short = DeviceDescriptor::video_input("cam", " ");
        assert_eq!(short.display_label(), "Camera cam");

        let labeled = DeviceDescriptor::video_input("cam-1", "Camo");
        assert_eq!(labeled.display_label(), "Camo");
    }

    #[test]
    fn test_reconcile_clears_vanished_selection() {
        let listing = DeviceListing::new(
            vec![DeviceDescriptor::video_input("cam-2", "Dock camera")],
            true,
        );
        assert_eq!(listing.reconcile(Some("cam-1")), None);
        assert_eq!(listing.reconcile(Some("cam-2")), Some("cam-2".to_string()));
        assert_eq!(listing.reconcile(None), None);
    }

    #[tokio::test]
    async fn test_list_filters_non_video_devices() {
        let platform = SimulatedPlatform::new(SimulatedPlatformConfig {
            devices: vec![
                DeviceDescriptor::video_input("cam-1", "Front"),
                DeviceDescriptor {
                    id: "mic-1".to_string(),
                    label: "Microphone".to_string(),
                    kind: DeviceKind::Other,
                },
            ],
            ..Default::default()
        });
        let registry = DeviceRegistry::new(Arc::new(platform.clone()));

        let listing = registry.list_devices().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing.permission_granted());
        assert!(listing.error_message().is_none());
        // The permission probe must not leave a stream running
        assert_eq!(platform.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_denied_permission_yields_generated_labels() {
        let platform = SimulatedPlatform::new(SimulatedPlatformConfig {
            devices: vec![DeviceDescriptor::video_input("abcdef123456", "Hidden")],
            permission_denied: true,
            ..Default::default()
        });
        let registry = DeviceRegistry::new(Arc::new(platform));

        let listing = registry.list_devices().await.unwrap();
        assert!(!listing.permission_granted());
        assert_eq!(listing.devices()[0].label, "Camera abcdef12");
    }

    #[tokio::test]
    async fn test_empty_listing_reports_error_state() {
        let platform = SimulatedPlatform::new(SimulatedPlatformConfig {
            devices: Vec::new(),
            ..Default::default()
        });
        let registry = DeviceRegistry::new(Arc::new(platform));

        let listing = registry.list_devices().await.unwrap();
        assert!(listing.is_empty());
        assert_eq!(listing.error_message(), Some(NO_DEVICES_MESSAGE));
    }
}
