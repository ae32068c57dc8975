//! Warehouse station walkthrough
//!
//! Logs in, runs the live feed, scans a product into a delivery task and
//! prints the delivery board. Everything runs against the simulated backend
//! and simulated cameras.

use stationcam::{
    init_logging, FlowState, LoginCredentials, Station, StationConfig, TaskStatus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let screenshots = std::env::temp_dir().join("stationcam-demo");
    std::fs::create_dir_all(&screenshots)?;
    let config = StationConfig {
        screenshot_dir: screenshots,
        ..StationConfig::default()
    };
    init_logging(&config.log_filter)?;

    let station = Station::simulated(config)?;

    println!("🔐 Logging in as operator001...");
    let user = station
        .authenticator()
        .login(&LoginCredentials::new("operator001", "demo123"))
        .await?;
    println!("   Welcome {} ({:?})", user.display_name(), user.role);

    // Live feed
    let feed = station.live_feed()?;
    let listing = feed.refresh_devices().await?;
    println!("📷 {} camera(s) found", listing.devices().len());
    feed.start().await?;
    let screenshot = feed.save_screenshot()?;
    println!("   Screenshot saved to {}", screenshot.display());
    feed.stop();

    // Product scan to delivery task
    let scanner = station.product_scanner()?;
    scanner.refresh_devices().await?;
    scanner.start_camera().await?;
    match scanner.capture_and_identify().await? {
        FlowState::Ready(product) => {
            println!(
                "📦 {} ({}) at {}, confidence {:.0}%",
                product.product_name,
                product.product_id,
                product.rack_location,
                product.confidence * 100.0
            );
            let task = scanner.create_delivery_task().await?;
            println!("🤖 Task {} queued for {}", task.id, task.to_location);
        }
        other => println!("⚠️  Scan ended in {}", other.label()),
    }

    // Dashboard
    let board = station.delivery_board().await?;
    let stats = board.stats();
    println!(
        "📊 {} tasks: {} delivered, {} in transit, {} queued",
        stats.total, stats.delivered, stats.in_transit, stats.queued
    );
    for delivery in board.with_status(TaskStatus::Queued) {
        println!("   {} {} -> {}", delivery.id, delivery.from_location, delivery.to_location);
    }

    station.authenticator().logout().await?;
    println!("👋 Logged out");
    Ok(())
}
