//! Collaborator contracts consumed by the station widgets
//!
//! Widgets receive these as `Arc<dyn ...>` handles; nothing is looked up
//! from ambient state.

use crate::error::{AuthError, ServiceError};
use crate::model::{
    DeliveryState, DeliveryStatus, ImagePayload, LoginCredentials, ScanKind, ScanResult,
    UserProfile, WarehouseDelivery,
};
use async_trait::async_trait;

/// Authentication collaborator
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Verify credentials and return the matching profile
    async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile, AuthError>;

    /// End the backend session, if there is one
    async fn logout(&self) {}
}

/// Image identification collaborator
#[async_trait]
pub trait IdentificationService: Send + Sync {
    /// Identify the contents of an image as the requested kind of scan
    async fn identify(
        &self,
        image: &ImagePayload,
        kind: ScanKind,
    ) -> Result<ScanResult, ServiceError>;
}

/// Submission collaborator
#[async_trait]
pub trait SubmissionService: Send + Sync {
    /// Submit a finished scan, returning a confirmation token
    async fn submit(&self, scan: &ScanResult) -> Result<String, ServiceError>;

    /// Ask a robot to move a product between two locations
    async fn create_delivery_task(
        &self,
        product_id: &str,
        from_location: &str,
        to_location: &str,
    ) -> Result<WarehouseDelivery, ServiceError>;

    /// Report a package delivery state change
    async fn update_delivery_status(
        &self,
        package_id: &str,
        status: DeliveryState,
    ) -> Result<DeliveryStatus, ServiceError>;

    /// Current warehouse delivery tasks
    async fn list_deliveries(&self) -> Result<Vec<WarehouseDelivery>, ServiceError>;
}
