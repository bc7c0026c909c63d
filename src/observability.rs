use std::net::SocketAddr;

// ── API requests ────────────────────────────────────────────────

/// Counter: GraphQL requests issued. Labels: operation, status.
pub const API_REQUESTS_TOTAL: &str = "arenaslot_api_requests_total";

/// Histogram: GraphQL request latency in seconds. Labels: operation.
pub const API_REQUEST_DURATION_SECONDS: &str = "arenaslot_api_request_duration_seconds";

// ── Schedule ────────────────────────────────────────────────────

/// Counter: slot fetches. Labels: status (ok, error).
pub const SLOT_FETCHES_TOTAL: &str = "arenaslot_slot_fetches_total";

/// Histogram: slot fetch duration in seconds.
pub const SLOT_FETCH_DURATION_SECONDS: &str = "arenaslot_slot_fetch_duration_seconds";

/// Counter: slot loads dropped because the selection changed meanwhile.
pub const STALE_LOADS_DISCARDED_TOTAL: &str = "arenaslot_stale_loads_discarded_total";

/// Counter: slot clicks that could not be resolved to a slot or room.
pub const UNRESOLVED_CLICKS_TOTAL: &str = "arenaslot_unresolved_clicks_total";

/// Counter: in-place free-place updates applied.
pub const CAPACITY_UPDATES_TOTAL: &str = "arenaslot_capacity_updates_total";

// ── Booking ─────────────────────────────────────────────────────

/// Counter: booking submissions. Labels: status (ok, invalid, failed).
pub const BOOKINGS_TOTAL: &str = "arenaslot_bookings_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        tracing::warn!("failed to install Prometheus metrics exporter: {e}");
        return;
    }
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
