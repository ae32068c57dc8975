//! Integration tests for the collaborators: the simulated backend behind an
//! authenticator with a file session store, and a full scan round trip.

use stationcam_core::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_login_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(SimulatedBackend::instant(1));

    let auth = Authenticator::new(backend.clone(), Arc::new(FileSessionStore::new(dir.path())));
    assert!(auth.restore().is_none());
    let user = assert_ok!(
        auth.login(&LoginCredentials::new("operator001", "demo123"))
            .await
    );
    assert_eq!(user.role, Role::Operator);
    assert_eq!(user.station_id.as_deref(), Some("A1"));

    let restarted = Authenticator::new(backend.clone(), Arc::new(FileSessionStore::new(dir.path())));
    assert_eq!(restarted.restore(), Some(user));

    assert_ok!(restarted.logout().await);
    let again = Authenticator::new(backend, Arc::new(FileSessionStore::new(dir.path())));
    assert!(again.restore().is_none());
}

#[tokio::test]
async fn test_corrupt_session_file_starts_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path());
    std::fs::write(store.path(), "{ not json").unwrap();

    let auth = Authenticator::new(Arc::new(SimulatedBackend::instant(1)), Arc::new(store.clone()));
    assert!(auth.restore().is_none());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_failed_login_leaves_no_session() {
    let store = Arc::new(MemorySessionStore::new());
    let auth = Authenticator::new(Arc::new(SimulatedBackend::instant(1)), store.clone());

    let error = assert_err!(
        auth.login(&LoginCredentials::new("supervisor", "wrong"))
            .await
    );
    assert_eq!(error.category(), ErrorCategory::Authentication);
    assert!(store.is_empty());

    let error = assert_err!(auth.login(&LoginCredentials::new("", "")).await);
    assert_eq!(error.category(), ErrorCategory::Validation);
}

#[tokio::test]
async fn test_product_round_trip() {
    let backend = SimulatedBackend::instant(9);
    let image = ImagePayload::camera("image/jpeg", vec![0xff, 0xd8, 0xff]);

    let scan = assert_ok!(backend.identify(&image, ScanKind::Product).await);
    let product = match &scan {
        ScanResult::Product(product) => product.clone(),
        other => panic!("expected a product, got {:?}", other),
    };
    assert!((0.0..=1.0).contains(&product.confidence));

    let token = assert_ok!(backend.submit(&scan).await);
    assert!(token.starts_with("product-identification-"));

    let before = backend.task_count();
    let task = assert_ok!(
        backend
            .create_delivery_task(&product.product_id, &product.rack_location, "Packaging Station A")
            .await
    );
    assert!(task.id.starts_with("WD-"));
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(backend.task_count(), before + 1);

    let listed = assert_ok!(backend.list_deliveries().await);
    assert!(listed.iter().any(|d| d.id == task.id));
}

#[tokio::test]
async fn test_same_seed_same_ids() {
    let scan = |seed| async move {
        let backend = SimulatedBackend::instant(seed);
        let image = ImagePayload::upload("image/png", vec![1]);
        backend
            .identify(&image, ScanKind::Package)
            .await
            .map(|s| s.subject_id().to_string())
    };

    assert_eq!(scan(4).await.unwrap(), scan(4).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_reference_delays() {
    let backend = SimulatedBackend::new();
    let package = ScanResult::Package(simulated_package_scan(&mut rand::thread_rng()));

    let started = tokio::time::Instant::now();
    assert_ok!(backend.submit(&package).await);
    assert!(started.elapsed() >= Duration::from_millis(600));

    let started = tokio::time::Instant::now();
    assert_ok!(
        backend
            .login(&LoginCredentials::new("admin", "demo123"))
            .await
    );
    assert!(started.elapsed() >= Duration::from_millis(1000));
}
