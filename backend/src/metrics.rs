// Prometheus metrics definitions for the stats admin backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("statsadmin_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    /// Table queries served, by table or view.
    pub static ref TABLE_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("statsadmin_table_queries_total", "Table queries served"),
        &["table"],
    )
    .unwrap();

    /// Names inserted by bulk imports.
    pub static ref IMPORTED_NAMES_TOTAL: IntCounter = IntCounter::new(
        "statsadmin_imported_names_total",
        "Names inserted by bulk imports",
    )
    .unwrap();

    /// Names skipped by bulk imports (already present or insert failed).
    pub static ref SKIPPED_NAMES_TOTAL: IntCounter = IntCounter::new(
        "statsadmin_skipped_names_total",
        "Names skipped by bulk imports",
    )
    .unwrap();

    /// Player mutations, by action (ban, unban, delete, reset, ...).
    pub static ref PLAYER_MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("statsadmin_player_mutations_total", "Player mutations"),
        &["action"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Count + fetch time of one table request, by table.
    pub static ref TABLE_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "statsadmin_table_query_duration_seconds",
            "Table query duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["table"],
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "statsadmin_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(TABLE_QUERIES_TOTAL.clone()),
        Box::new(IMPORTED_NAMES_TOTAL.clone()),
        Box::new(SKIPPED_NAMES_TOTAL.clone()),
        Box::new(PLAYER_MUTATIONS_TOTAL.clone()),
        Box::new(TABLE_QUERY_DURATION_SECONDS.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        // Already registered (tests call this more than once).
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a URL path for metric labels: replace numeric path segments with `:id`
/// to prevent cardinality explosion.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
