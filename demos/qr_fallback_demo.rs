//! Package scanner fallback
//!
//! The only camera is held by another application, so the scanner waits
//! out the fallback delay and produces a simulated package scan that the
//! operator then confirms.

use stationcam::{init_logging, FlowState, Station, StationConfig, SimulatedPlatform};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StationConfig {
        qr_fallback_delay_ms: Some(1500),
        ..StationConfig::default()
    };
    init_logging(&config.log_filter)?;

    let platform = SimulatedPlatform::default();
    platform.set_busy("cam-1", true);
    let station = Station::builder(config)
        .platform(Arc::new(platform.clone()))
        .build()?;

    let scanner = station.qr_scanner()?;
    let mut events = scanner.subscribe();
    scanner.refresh_devices().await?;

    println!("🔄 Starting scanner with a busy camera...");
    let state = scanner.start_scanning().await?;
    if let FlowState::PendingConfirmation(package) = &state {
        println!(
            "📦 Simulated scan: {} for {} ({})",
            package.package_id, package.recipient_name, package.delivery_code
        );
    }

    let state = scanner.confirm_scan().await?;
    println!("✅ Flow is {}", state.label());
    if let Some(notice) = scanner.flow().notice() {
        println!("   {}", notice);
    }

    for event in events.drain() {
        println!("   event: {}", event.event_type());
    }
    Ok(())
}
