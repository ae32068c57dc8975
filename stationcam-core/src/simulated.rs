//! In-process backend that stands in for the station's REST API
//!
//! Every call sleeps for a configurable delay and answers with canned or
//! randomized data wrapped in an [`ApiResponse`] envelope, exactly like the
//! remote API would. Failures can be injected per operation for tests.

use crate::error::{AuthError, ServiceError};
use crate::model::{
    ApiResponse, DeliveryState, DeliveryStatus, Dimensions, ImagePayload, LoginCredentials,
    PackageScan, Priority, ProductScan, Role, ScanKind, ScanResult, TaskStatus, UserProfile,
    WarehouseDelivery,
};
use crate::services::{AuthService, IdentificationService, SubmissionService};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const DEMO_PASSWORD: &str = "demo123";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Artificial latency of each simulated call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulatedDelays {
    /// Login round trip
    #[serde(with = "millis")]
    pub login: Duration,
    /// Delivery status update
    #[serde(with = "millis")]
    pub update_status: Duration,
    /// Package scan submission
    #[serde(with = "millis")]
    pub submit_package: Duration,
    /// Product scan submission
    #[serde(with = "millis")]
    pub submit_product: Duration,
    /// Image identification
    #[serde(with = "millis")]
    pub identify: Duration,
    /// Delivery task creation
    #[serde(with = "millis")]
    pub create_task: Duration,
    /// Delivery listing
    #[serde(with = "millis")]
    pub list_deliveries: Duration,
}

impl Default for SimulatedDelays {
    fn default() -> Self {
        Self {
            login: Duration::from_millis(1000),
            update_status: Duration::from_millis(800),
            submit_package: Duration::from_millis(600),
            submit_product: Duration::from_millis(1200),
            identify: Duration::from_millis(2000),
            create_task: Duration::from_millis(500),
            list_deliveries: Duration::from_millis(300),
        }
    }
}

impl SimulatedDelays {
    /// No latency at all
    pub fn instant() -> Self {
        Self {
            login: Duration::ZERO,
            update_status: Duration::ZERO,
            submit_package: Duration::ZERO,
            submit_product: Duration::ZERO,
            identify: Duration::ZERO,
            create_task: Duration::ZERO,
            list_deliveries: Duration::ZERO,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Operations that accept injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedOperation {
    /// `identify`
    Identify,
    /// `submit`
    Submit,
    /// `create_delivery_task`
    CreateTask,
    /// `update_delivery_status`
    UpdateStatus,
    /// `list_deliveries`
    ListDeliveries,
}

#[derive(Debug, Clone)]
enum Injected {
    Reject(String),
    Fail(String),
}

/// Simulated authentication, identification and submission backend
#[derive(Debug)]
pub struct SimulatedBackend {
    delays: SimulatedDelays,
    users: Vec<UserProfile>,
    rng: Mutex<StdRng>,
    tasks: DashMap<String, WarehouseDelivery>,
    submissions: DashMap<String, ScanResult>,
    injected: Mutex<HashMap<SimulatedOperation, Injected>>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// Backend with reference latencies and an entropy-seeded generator
    pub fn new() -> Self {
        Self::build(SimulatedDelays::default(), StdRng::from_entropy())
    }

    /// Backend with custom latencies
    pub fn with_delays(delays: SimulatedDelays) -> Self {
        Self::build(delays, StdRng::from_entropy())
    }

    /// Backend with no latency and a fixed seed, for tests
    pub fn instant(seed: u64) -> Self {
        Self::build(SimulatedDelays::instant(), StdRng::seed_from_u64(seed))
    }

    /// Replace the random generator with a seeded one
    pub fn seeded(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    fn build(delays: SimulatedDelays, rng: StdRng) -> Self {
        let tasks = DashMap::new();
        for task in reference_deliveries() {
            tasks.insert(task.id.clone(), task);
        }
        Self {
            delays,
            users: demo_users(),
            rng: Mutex::new(rng),
            tasks,
            submissions: DashMap::new(),
            injected: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next call of `operation` answer `success: false` with `message`
    pub fn reject_next(&self, operation: SimulatedOperation, message: impl Into<String>) {
        self.injected
            .lock()
            .insert(operation, Injected::Reject(message.into()));
    }

    /// Make the next call of `operation` fail outright
    pub fn fail_next(&self, operation: SimulatedOperation, reason: impl Into<String>) {
        self.injected
            .lock()
            .insert(operation, Injected::Fail(reason.into()));
    }

    /// Scans accepted so far, keyed by confirmation token
    pub fn submitted(&self) -> Vec<(String, ScanResult)> {
        self.submissions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of delivery tasks known to the backend
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    fn take_injected(&self, operation: SimulatedOperation) -> Option<Injected> {
        self.injected.lock().remove(&operation)
    }

    fn token(&self, len: usize) -> String {
        random_base36(&mut *self.rng.lock(), len)
    }

    /// Wrap `respond` with the injected failure for `operation`, if any
    fn envelope<T>(
        &self,
        operation: SimulatedOperation,
        name: &str,
        respond: impl FnOnce() -> ApiResponse<T>,
    ) -> Result<T, ServiceError> {
        match self.take_injected(operation) {
            Some(Injected::Fail(reason)) => Err(ServiceError::unavailable(name, reason)),
            Some(Injected::Reject(message)) => ApiResponse::<T>::fail(message).into_result(name),
            None => respond().into_result(name),
        }
    }

    fn identify_product(&self, image: &ImagePayload) -> ProductScan {
        let mut rng = self.rng.lock();
        let catalogue = demo_products();
        let pick = rng.gen_range(0..catalogue.len());
        let (name, category, rack, confidence, sku, dimensions, weight) = catalogue[pick];
        ProductScan {
            product_id: format!("PROD-{}", random_base36(&mut *rng, 6).to_uppercase()),
            product_name: name.to_string(),
            category: category.to_string(),
            rack_location: rack.to_string(),
            confidence,
            sku: sku.to_string(),
            dimensions: Some(dimensions),
            weight: Some(weight),
            image_ref: format!("{} image, {} bytes", image.mime_type, image.data.len()),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl AuthService for SimulatedBackend {
    async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile, AuthError> {
        tokio::time::sleep(self.delays.login).await;

        let user = self
            .users
            .iter()
            .find(|u| u.username == credentials.username)
            .ok_or(AuthError::UnknownUser)?;

        if credentials.password != DEMO_PASSWORD {
            return Err(AuthError::InvalidPassword);
        }

        info!("Login successful for {}", user.username);
        Ok(user.clone())
    }
}

#[async_trait]
impl IdentificationService for SimulatedBackend {
    async fn identify(
        &self,
        image: &ImagePayload,
        kind: ScanKind,
    ) -> Result<ScanResult, ServiceError> {
        if image.is_empty() {
            return Err(ServiceError::InvalidInput {
                operation: "identify".to_string(),
                reason: "image is empty".to_string(),
            });
        }
        tokio::time::sleep(self.delays.identify).await;

        self.envelope(SimulatedOperation::Identify, "identify", || match kind {
            ScanKind::Product => ApiResponse::ok(
                ScanResult::Product(self.identify_product(image)),
                "Product identified successfully",
            ),
            ScanKind::Package => ApiResponse::ok(
                ScanResult::Package(simulated_package_scan(&mut *self.rng.lock())),
                "Package label decoded successfully",
            ),
        })
    }
}

#[async_trait]
impl SubmissionService for SimulatedBackend {
    async fn submit(&self, scan: &ScanResult) -> Result<String, ServiceError> {
        let (delay, prefix, message, name) = match scan {
            ScanResult::Package(_) => (
                self.delays.submit_package,
                "scan-confirmation-",
                "QR scan result processed successfully",
                "submit package scan",
            ),
            ScanResult::Product(_) => (
                self.delays.submit_product,
                "product-identification-",
                "Product identified and logged successfully",
                "submit product scan",
            ),
        };
        tokio::time::sleep(delay).await;
        info!("Sending {} {} to backend", name, scan.subject_id());

        let token = self.envelope(SimulatedOperation::Submit, name, || {
            ApiResponse::ok(format!("{}{}", prefix, self.token(9)), message)
        })?;
        self.submissions.insert(token.clone(), scan.clone());
        Ok(token)
    }

    async fn create_delivery_task(
        &self,
        product_id: &str,
        from_location: &str,
        to_location: &str,
    ) -> Result<WarehouseDelivery, ServiceError> {
        tokio::time::sleep(self.delays.create_task).await;

        let task = self.envelope(
            SimulatedOperation::CreateTask,
            "create delivery task",
            || {
                let robot = self.rng.lock().gen_range(1..=5);
                ApiResponse::ok(
                    WarehouseDelivery {
                        id: format!("WD-{}", self.token(8).to_uppercase()),
                        product_id: product_id.to_string(),
                        from_location: from_location.to_string(),
                        to_location: to_location.to_string(),
                        status: TaskStatus::Queued,
                        priority: Priority::Medium,
                        estimated_time: clock_in(ChronoDuration::minutes(15)),
                        actual_time: None,
                        robot_id: Some(format!("ROBOT-{:03}", robot)),
                    },
                    "Warehouse delivery task created successfully",
                )
            },
        )?;
        debug!("Created delivery task {} for {}", task.id, product_id);
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_delivery_status(
        &self,
        package_id: &str,
        status: DeliveryState,
    ) -> Result<DeliveryStatus, ServiceError> {
        tokio::time::sleep(self.delays.update_status).await;

        self.envelope(
            SimulatedOperation::UpdateStatus,
            "update delivery status",
            || {
                ApiResponse::ok(
                    DeliveryStatus {
                        id: self.token(9),
                        status,
                        address: "Packaging Station A".to_string(),
                        recipient: "Station Operator".to_string(),
                        estimated_time: clock_in(ChronoDuration::minutes(30)),
                        package_id: package_id.to_string(),
                    },
                    "Delivery status updated successfully",
                )
            },
        )
    }

    async fn list_deliveries(&self) -> Result<Vec<WarehouseDelivery>, ServiceError> {
        tokio::time::sleep(self.delays.list_deliveries).await;

        self.envelope(
            SimulatedOperation::ListDeliveries,
            "list deliveries",
            || {
                let mut tasks: Vec<WarehouseDelivery> =
                    self.tasks.iter().map(|entry| entry.value().clone()).collect();
                tasks.sort_by(|a, b| a.id.cmp(&b.id));
                ApiResponse::ok(tasks, "Deliveries loaded")
            },
        )
    }
}

/// Random package scan, as produced when a label is decoded without a camera
pub fn simulated_package_scan<R: Rng + ?Sized>(rng: &mut R) -> PackageScan {
    PackageScan {
        package_id: format!("PKG-{}", random_base36(rng, 9).to_uppercase()),
        recipient_name: "Sarah Johnson".to_string(),
        address: "456 Oak Avenue, Springfield, IL 62701".to_string(),
        delivery_code: format!("DLV-{}", random_base36(rng, 6).to_uppercase()),
        timestamp: Utc::now(),
    }
}

/// The four deliveries a fresh warehouse dashboard starts with
pub fn reference_deliveries() -> Vec<WarehouseDelivery> {
    let task = |id: &str,
                product: &str,
                from: &str,
                to: &str,
                status: TaskStatus,
                priority: Priority,
                eta: &str,
                actual: Option<&str>,
                robot: Option<&str>| WarehouseDelivery {
        id: id.to_string(),
        product_id: product.to_string(),
        from_location: from.to_string(),
        to_location: to.to_string(),
        status,
        priority,
        estimated_time: eta.to_string(),
        actual_time: actual.map(str::to_string),
        robot_id: robot.map(str::to_string),
    };

    vec![
        task(
            "WD-001",
            "PROD-WBH001",
            "A-12-3",
            "Packaging Station A",
            TaskStatus::Delivered,
            Priority::Medium,
            "10:30 AM",
            Some("10:28 AM"),
            Some("ROBOT-001"),
        ),
        task(
            "WD-002",
            "PROD-SWB002",
            "B-08-1",
            "Packaging Station B",
            TaskStatus::InTransit,
            Priority::High,
            "11:15 AM",
            None,
            Some("ROBOT-002"),
        ),
        task(
            "WD-003",
            "PROD-LDL003",
            "C-15-2",
            "Packaging Station A",
            TaskStatus::Picking,
            Priority::Medium,
            "11:45 AM",
            None,
            Some("ROBOT-003"),
        ),
        task(
            "WD-004",
            "PROD-KBD004",
            "A-05-1",
            "Packaging Station C",
            TaskStatus::Queued,
            Priority::Low,
            "12:15 PM",
            None,
            None,
        ),
    ]
}

fn demo_users() -> Vec<UserProfile> {
    let user = |id: &str,
                username: &str,
                role: Role,
                station: Option<&str>,
                first: &str,
                last: &str| UserProfile {
        id: id.to_string(),
        username: username.to_string(),
        email: format!(
            "{}@warehouse.com",
            if role == Role::Operator { "operator" } else { username }
        ),
        role,
        station_id: station.map(str::to_string),
        first_name: first.to_string(),
        last_name: last.to_string(),
        avatar: None,
    };

    vec![
        user("1", "operator001", Role::Operator, Some("A1"), "John", "Smith"),
        user("2", "supervisor", Role::Supervisor, Some("B2"), "Sarah", "Johnson"),
        user("3", "admin", Role::Admin, None, "Michael", "Davis"),
    ]
}

type CatalogueEntry = (
    &'static str,
    &'static str,
    &'static str,
    f32,
    &'static str,
    Dimensions,
    f32,
);

fn demo_products() -> [CatalogueEntry; 3] {
    [
        (
            "Wireless Bluetooth Headphones",
            "Electronics",
            "A-12-3",
            0.94,
            "WBH-001",
            Dimensions { width: 15.0, height: 20.0, depth: 8.0 },
            0.25,
        ),
        (
            "Stainless Steel Water Bottle",
            "Home & Kitchen",
            "B-08-1",
            0.89,
            "SWB-002",
            Dimensions { width: 7.0, height: 25.0, depth: 7.0 },
            0.35,
        ),
        (
            "LED Desk Lamp",
            "Office Supplies",
            "C-15-2",
            0.91,
            "LDL-003",
            Dimensions { width: 12.0, height: 45.0, depth: 12.0 },
            0.8,
        ),
    ]
}

fn random_base36<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

fn clock_in(offset: ChronoDuration) -> String {
    (Utc::now() + offset).format("%I:%M %p").to_string()
}
