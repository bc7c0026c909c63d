use std::sync::Arc;

use tracing::{info, warn};

use arenaslot::calendar::{self, TracingCalendar};
use arenaslot::config::{AppConfig, AppContext};
use arenaslot::fetcher::SlotFetcher;
use arenaslot::model::Phase;
use arenaslot::notify::ViewHub;
use arenaslot::schedule::ScheduleHandle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    arenaslot::observability::init(config.metrics_port);

    info!("arenaslot starting");
    info!("  api: {}", config.api_url);
    info!("  theme: {:?}", config.theme);
    info!("  auth: {}", if config.auth_token.is_some() { "token" } else { "none" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let ctx = AppContext::new(config)?;
    let catalog = ctx.catalog().facilities().await?;
    for facility in &catalog {
        info!("facility {} ({}): {} rooms", facility.id, facility.title, facility.resources.len());
    }

    let hub = Arc::new(ViewHub::new());
    let fetcher = Arc::new(SlotFetcher::new(ctx.api()));
    let schedule = ScheduleHandle::spawn(catalog, fetcher, hub.clone());
    let renderer = tokio::spawn(calendar::drive_calendar(Arc::new(TracingCalendar), hub.subscribe_views()));

    let config = ctx.config();
    if let Some(facility) = &config.facility {
        schedule.set_facility(facility.clone()).await?;
    }
    if let Some(date) = config.date {
        schedule.set_date(date).await?;
    }

    if config.facility.is_some() && config.date.is_some() {
        let view = schedule.wait_for(|v| v.phase == Phase::Loaded).await?;
        if view.last_fetch_failed {
            warn!("slot fetch failed, showing an empty schedule");
        }
        info!("{} free slots", view.slots.len());
    } else {
        info!("set ARENASLOT_FACILITY and ARENASLOT_DATE to load a schedule");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    drop(schedule);
    renderer.abort();
    Ok(())
}
