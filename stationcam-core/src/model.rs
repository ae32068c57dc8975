//! Domain records exchanged with the station collaborators

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Station operator role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Station operator
    Operator,
    /// Shift supervisor
    Supervisor,
    /// Administrator
    Admin,
}

/// Authenticated user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Account ID
    pub id: String,
    /// Login name
    pub username: String,
    /// Contact email
    pub email: String,
    /// Role
    pub role: Role,
    /// Station the user is assigned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserProfile {
    /// "First Last"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Username/password pair submitted at login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// Login name
    pub username: String,
    /// Plain-text password
    pub password: String,
}

impl LoginCredentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields non-empty after trimming the username
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Warehouse robot task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Waiting for a robot
    Queued,
    /// Robot is picking the product
    Picking,
    /// On the way to the destination
    InTransit,
    /// Arrived
    Delivered,
    /// Gave up
    Failed,
}

/// Warehouse robot task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Urgent
    Urgent,
}

/// Robot delivery task inside the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseDelivery {
    /// Task ID (`WD-...`)
    pub id: String,
    /// Product being moved
    pub product_id: String,
    /// Pickup rack location
    pub from_location: String,
    /// Drop-off station
    pub to_location: String,
    /// Current status as reported by the backend
    pub status: TaskStatus,
    /// Priority
    pub priority: Priority,
    /// Estimated completion time
    pub estimated_time: String,
    /// Actual completion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<String>,
    /// Assigned robot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_id: Option<String>,
}

/// Package delivery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryState {
    /// Not yet dispatched
    Pending,
    /// Out for delivery
    InTransit,
    /// Delivered
    Delivered,
    /// Delivery failed
    Failed,
}

/// Package delivery status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    /// Report ID
    pub id: String,
    /// Reported state
    pub status: DeliveryState,
    /// Where the package is
    pub address: String,
    /// Who received it
    pub recipient: String,
    /// Estimated time
    pub estimated_time: String,
    /// Package the report refers to
    pub package_id: String,
}

/// Result of scanning a package label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageScan {
    /// Package ID (`PKG-...`)
    pub package_id: String,
    /// Recipient
    pub recipient_name: String,
    /// Delivery address
    pub address: String,
    /// Delivery code (`DLV-...`)
    pub delivery_code: String,
    /// When the scan was produced
    pub timestamp: DateTime<Utc>,
}

/// Physical product dimensions in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Depth
    pub depth: f32,
}

/// Result of identifying a product from an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductScan {
    /// Product ID (`PROD-...`)
    pub product_id: String,
    /// Product name
    pub product_name: String,
    /// Catalogue category
    pub category: String,
    /// Rack location (`A-12-3`)
    pub rack_location: String,
    /// Model confidence in `[0, 1]`
    pub confidence: f32,
    /// Stock keeping unit
    pub sku: String,
    /// Dimensions, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Weight in kilograms, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    /// Reference to the image the product was identified from
    pub image_ref: String,
    /// When the scan was produced
    pub timestamp: DateTime<Utc>,
}

impl ProductScan {
    /// Confidence as a whole percentage
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Which kind of scan an image should be identified as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    /// Package label / QR code
    Package,
    /// Product on a rack
    Product,
}

/// Scan produced by the identification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScanResult {
    /// Package scan
    Package(PackageScan),
    /// Product scan
    Product(ProductScan),
}

impl ScanResult {
    /// Kind of this scan
    pub fn kind(&self) -> ScanKind {
        match self {
            ScanResult::Package(_) => ScanKind::Package,
            ScanResult::Product(_) => ScanKind::Product,
        }
    }

    /// Package or product ID
    pub fn subject_id(&self) -> &str {
        match self {
            ScanResult::Package(scan) => &scan.package_id,
            ScanResult::Product(scan) => &scan.product_id,
        }
    }

    /// Timestamp of the scan
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScanResult::Package(scan) => scan.timestamp,
            ScanResult::Product(scan) => scan.timestamp,
        }
    }
}

impl From<PackageScan> for ScanResult {
    fn from(scan: PackageScan) -> Self {
        ScanResult::Package(scan)
    }
}

impl From<ProductScan> for ScanResult {
    fn from(scan: ProductScan) -> Self {
        ScanResult::Product(scan)
    }
}

/// Where an image handed to identification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Captured from a live camera
    Camera,
    /// Uploaded from a file
    Upload,
}

/// Encoded still image handed to the identification service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type, e.g. `image/jpeg`
    pub mime_type: String,
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Origin of the image
    pub source: ImageSource,
}

impl ImagePayload {
    /// Image captured from a camera
    pub fn camera(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            source: ImageSource::Camera,
        }
    }

    /// Image uploaded from a file
    pub fn upload(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            source: ImageSource::Upload,
        }
    }

    /// Empty payloads cannot be identified
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Response envelope used by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded
    pub success: bool,
    /// Payload on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable status message
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Successful response
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    /// Failed response
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }

    /// Map `success: false` or a missing payload to [`ServiceError::Rejected`]
    pub fn into_result(self, operation: &str) -> Result<T, ServiceError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ServiceError::rejected(
                operation,
                format!("{} (empty response)", self.message),
            )),
            (false, _) => Err(ServiceError::rejected(operation, self.message)),
        }
    }
}
