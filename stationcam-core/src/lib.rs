//! # Station Cam Core
//!
//! Domain model, error taxonomy and collaborator contracts for the warehouse
//! station. The authentication, identification and submission services are
//! traits; [`SimulatedBackend`] is the in-process stand-in used by demos and
//! tests.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod model;
pub mod services;
pub mod session_store;
pub mod simulated;

// Re-export main types
pub use auth::Authenticator;
pub use error::{AuthError, ErrorCategory, ServiceError, StationError, StationResult};
pub use model::{
    ApiResponse, DeliveryState, DeliveryStatus, Dimensions, ImagePayload, LoginCredentials,
    PackageScan, Priority, ProductScan, Role, ScanKind, ScanResult, TaskStatus, UserProfile,
    WarehouseDelivery,
};
pub use services::{AuthService, IdentificationService, SubmissionService};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore, SESSION_KEY};
pub use simulated::{
    reference_deliveries, simulated_package_scan, SimulatedBackend, SimulatedDelays,
    SimulatedOperation,
};
