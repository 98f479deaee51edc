use once_cell::sync::Lazy;
use prometheus::{
    opts, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Registry, TextEncoder,
};

macro_rules! counter_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| IntCounterVec::new(opts!($name, $help), $labels).unwrap())
    };
}
macro_rules! histogram_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| {
            HistogramVec::new(HistogramOpts::new($name, $help).buckets(LATENCY_BUCKETS.to_vec()), $labels)
                .unwrap()
        })
    };
}
macro_rules! counter {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntCounter::new($name, $help).unwrap())
    };
}
macro_rules! gauge {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntGauge::new($name, $help).unwrap())
    };
}
macro_rules! gauge_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| IntGaugeVec::new(opts!($name, $help), $labels).unwrap())
    };
}
macro_rules! gauge_f64_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| GaugeVec::new(opts!($name, $help), $labels).unwrap())
    };
}

const LATENCY_BUCKETS: [f64; 14] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

// ── HTTP ────────────────────────────────────────────────────────────────────
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> =
    counter_vec!("http_requests_total", "Total HTTP requests", &["method", "path", "status"]);
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> =
    histogram_vec!("http_request_duration_seconds", "HTTP request latency", &["method", "path"]);
pub static HTTP_IN_FLIGHT: Lazy<IntGauge> = gauge!("http_requests_in_flight", "In-flight HTTP requests");
pub static HTTP_REQUEST_SIZE: Lazy<HistogramVec> =
    histogram_vec!("http_request_size_bytes", "HTTP request body size", &["method"]);
pub static HTTP_RESPONSE_SIZE: Lazy<HistogramVec> =
    histogram_vec!("http_response_size_bytes", "HTTP response body size", &["method"]);

// ── Contracts (billing) ──────────────────────────────────────────────────────
pub static CONTRACTS_ACTIVE: Lazy<IntGauge> = gauge!("contracts_active", "Currently active enterprise contracts");
pub static CONTRACT_ACTIVATIONS: Lazy<IntCounter> =
    counter!("contract_activations_total", "Contracts transitioned to active");
pub static CONTRACT_ACTIVATION_CONFLICTS: Lazy<IntCounter> = counter!(
    "contract_activation_conflicts_total",
    "Activation attempts rejected by the one-active-contract-per-org index"
);
pub static CONTRACT_CANCELLATIONS: Lazy<IntCounter> = counter!("contract_cancellations_total", "Contracts cancelled");
pub static CONTRACT_EXPIRATIONS: Lazy<IntCounter> = counter!("contract_expirations_total", "Contracts expired");
pub static VOLUME_TIER_UPDATES: Lazy<IntCounterVec> =
    counter_vec!("volume_tier_updates_total", "Volume discount tier set changes", &["dimension"]);

// ── Pricing / cost ───────────────────────────────────────────────────────────
pub static PRICING_RESOLUTIONS: Lazy<IntCounterVec> = counter_vec!(
    "pricing_resolutions_total",
    "Effective pricing resolutions",
    &["source"]
);
pub static COST_CALCULATIONS: Lazy<IntCounterVec> =
    counter_vec!("cost_calculations_total", "Tiered cost calculations", &["dimension"]);
pub static COST_CALCULATION_DURATION: Lazy<HistogramVec> =
    histogram_vec!("cost_calculation_duration_seconds", "Tiered cost calculation latency", &["dimension"]);

// ── Budgets / alerts ─────────────────────────────────────────────────────────
pub static BUDGET_ALERTS_EMITTED: Lazy<IntCounterVec> =
    counter_vec!("budget_alerts_emitted_total", "Usage alerts emitted by budget evaluation", &["severity"]);
pub static BUDGET_ALERTS_OPEN: Lazy<IntGauge> = gauge!("budget_alerts_open", "Currently unresolved usage alerts");
pub static BUDGETS_EVALUATED: Lazy<IntCounter> = counter!("budgets_evaluated_total", "Budget evaluation runs");

// ── Usage overview ───────────────────────────────────────────────────────────
pub static USAGE_OVERVIEW_REQUESTS: Lazy<IntCounter> =
    counter!("usage_overview_requests_total", "Usage overview reads");
pub static USAGE_OVERVIEW_DEGRADED: Lazy<IntCounter> = counter!(
    "usage_overview_degraded_total",
    "Usage overview reads that fell back to cached counters"
);

// ── Database ────────────────────────────────────────────────────────────────
pub static DB_QUERY_DURATION: Lazy<HistogramVec> =
    histogram_vec!("db_query_duration_seconds", "Database query latency", &["query"]);
pub static DB_CONNECTIONS_ACTIVE: Lazy<IntGauge> = gauge!("db_connections_active", "Active DB connections");
pub static DB_CONNECTIONS_IDLE: Lazy<IntGauge> = gauge!("db_connections_idle", "Idle DB connections");
pub static DB_QUERY_ERRORS: Lazy<IntCounter> = counter!("db_query_errors_total", "DB query errors");
pub static DB_TRANSACTIONS_TOTAL: Lazy<IntCounter> =
    counter!("db_transactions_total", "Total DB transactions");
pub static DB_POOL_SIZE: Lazy<IntGauge> = gauge!("db_pool_size", "DB connection pool size");

// ── Cache ───────────────────────────────────────────────────────────────────
pub static CACHE_HITS: Lazy<IntCounter> = counter!("cache_hits_total", "Cache hits");
pub static CACHE_MISSES: Lazy<IntCounter> = counter!("cache_misses_total", "Cache misses");
pub static CACHE_EVICTIONS: Lazy<IntCounter> = counter!("cache_evictions_total", "Cache evictions");
pub static CACHE_SIZE_BYTES: Lazy<IntGauge> = gauge!("cache_size_bytes", "Cache size in bytes");
pub static CACHE_ENTRIES: Lazy<IntGauge> = gauge!("cache_entries", "Number of cached entries");

// ── Migration ───────────────────────────────────────────────────────────────
pub static MIGRATION_TOTAL: Lazy<IntCounter> = counter!("migration_total", "Total migrations");
pub static MIGRATION_FAILURES: Lazy<IntCounter> = counter!("migration_failures_total", "Migration failures");
pub static MIGRATION_DURATION: Lazy<HistogramVec> =
    histogram_vec!("migration_duration_seconds", "Migration duration", &["status"]);

// ── Legacy usage tracker ─────────────────────────────────────────────────────
pub static LEGACY_TRACKER_MUTATIONS: Lazy<IntCounter> =
    counter!("legacy_usage_tracker_mutations_total", "Quota mutations recorded by the legacy tracker");
pub static LEGACY_TRACKER_DROPPED: Lazy<IntCounter> = counter!(
    "legacy_usage_tracker_dropped_total",
    "Quota mutations dropped because the queue was full"
);

// ── System ──────────────────────────────────────────────────────────────────
pub static PROCESS_START_TIME: Lazy<IntGauge> = gauge!("process_start_time_seconds", "Process start time");
pub static BUILD_INFO: Lazy<IntGaugeVec> =
    gauge_vec!("build_info", "Build information", &["version", "commit"]);

// ── SLO ─────────────────────────────────────────────────────────────────────
pub static SLO_ERROR_BUDGET: Lazy<GaugeVec> =
    gauge_f64_vec!("slo_error_budget_remaining", "SLO error budget remaining", &["slo"]);
pub static SLO_BURN_RATE: Lazy<GaugeVec> =
    gauge_f64_vec!("slo_burn_rate", "SLO burn rate", &["slo"]);
pub static SLO_AVAILABILITY: Lazy<GaugeVec> =
    gauge_f64_vec!("slo_availability", "Service availability ratio", &["window"]);

pub fn register_all(r: &Registry) -> prometheus::Result<()> {
    r.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    r.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    r.register(Box::new(HTTP_IN_FLIGHT.clone()))?;
    r.register(Box::new(HTTP_REQUEST_SIZE.clone()))?;
    r.register(Box::new(HTTP_RESPONSE_SIZE.clone()))?;
    r.register(Box::new(CONTRACTS_ACTIVE.clone()))?;
    r.register(Box::new(CONTRACT_ACTIVATIONS.clone()))?;
    r.register(Box::new(CONTRACT_ACTIVATION_CONFLICTS.clone()))?;
    r.register(Box::new(CONTRACT_CANCELLATIONS.clone()))?;
    r.register(Box::new(CONTRACT_EXPIRATIONS.clone()))?;
    r.register(Box::new(VOLUME_TIER_UPDATES.clone()))?;
    r.register(Box::new(PRICING_RESOLUTIONS.clone()))?;
    r.register(Box::new(COST_CALCULATIONS.clone()))?;
    r.register(Box::new(COST_CALCULATION_DURATION.clone()))?;
    r.register(Box::new(BUDGET_ALERTS_EMITTED.clone()))?;
    r.register(Box::new(BUDGET_ALERTS_OPEN.clone()))?;
    r.register(Box::new(BUDGETS_EVALUATED.clone()))?;
    r.register(Box::new(USAGE_OVERVIEW_REQUESTS.clone()))?;
    r.register(Box::new(USAGE_OVERVIEW_DEGRADED.clone()))?;
    r.register(Box::new(DB_QUERY_DURATION.clone()))?;
    r.register(Box::new(DB_CONNECTIONS_ACTIVE.clone()))?;
    r.register(Box::new(DB_CONNECTIONS_IDLE.clone()))?;
    r.register(Box::new(DB_QUERY_ERRORS.clone()))?;
    r.register(Box::new(DB_TRANSACTIONS_TOTAL.clone()))?;
    r.register(Box::new(DB_POOL_SIZE.clone()))?;
    r.register(Box::new(CACHE_HITS.clone()))?;
    r.register(Box::new(CACHE_MISSES.clone()))?;
    r.register(Box::new(CACHE_EVICTIONS.clone()))?;
    r.register(Box::new(CACHE_SIZE_BYTES.clone()))?;
    r.register(Box::new(CACHE_ENTRIES.clone()))?;
    r.register(Box::new(MIGRATION_TOTAL.clone()))?;
    r.register(Box::new(MIGRATION_FAILURES.clone()))?;
    r.register(Box::new(MIGRATION_DURATION.clone()))?;
    r.register(Box::new(LEGACY_TRACKER_MUTATIONS.clone()))?;
    r.register(Box::new(LEGACY_TRACKER_DROPPED.clone()))?;
    r.register(Box::new(PROCESS_START_TIME.clone()))?;
    r.register(Box::new(BUILD_INFO.clone()))?;
    r.register(Box::new(SLO_ERROR_BUDGET.clone()))?;
    r.register(Box::new(SLO_BURN_RATE.clone()))?;
    r.register(Box::new(SLO_AVAILABILITY.clone()))?;
    Ok(())
}

pub fn gather_metrics(r: &Registry) -> String {
    let encoder = TextEncoder::new();
    let families = r.gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).unwrap_or_default();
    String::from_utf8(buf).unwrap_or_default()
}

pub fn observe_http(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn observe_cost_calculation(dimension: &str, duration_secs: f64) {
    COST_CALCULATIONS.with_label_values(&[dimension]).inc();
    COST_CALCULATION_DURATION.with_label_values(&[dimension]).observe(duration_secs);
}

pub fn observe_budget_alert(severity: &str) {
    BUDGET_ALERTS_EMITTED.with_label_values(&[severity]).inc();
}

pub fn observe_db_query(query: &str, duration_secs: f64) {
    DB_QUERY_DURATION
        .with_label_values(&[query])
        .observe(duration_secs);
    DB_TRANSACTIONS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_registry() -> Registry {
        let r = Registry::new_custom(Some("t".into()), None).unwrap();
        register_all(&r).unwrap();
        r
    }

    #[test]
    fn test_http_request_counter() {
        let r = fresh_registry();
        HTTP_REQUESTS_TOTAL.with_label_values(&["GET", "/health", "200"]).inc();
        HTTP_REQUESTS_TOTAL.with_label_values(&["GET", "/health", "200"]).inc();
        let out = gather_metrics(&r);
        assert!(out.contains("http_requests_total"));
    }

    #[test]
    fn test_cost_calculation_observe() {
        let r = fresh_registry();
        observe_cost_calculation("spans", 0.002);
        let out = gather_metrics(&r);
        assert!(out.contains("cost_calculations_total"));
        assert!(out.contains("cost_calculation_duration_seconds"));
    }

    #[test]
    fn test_budget_alert_observe() {
        let r = fresh_registry();
        observe_budget_alert("critical");
        let out = gather_metrics(&r);
        assert!(out.contains("budget_alerts_emitted_total"));
    }

    #[test]
    fn test_db_query_observation() {
        let r = fresh_registry();
        observe_db_query("select_contracts", 0.012);
        let out = gather_metrics(&r);
        assert!(out.contains("db_query_duration_seconds"));
        assert!(out.contains("db_transactions_total"));
    }

    #[test]
    fn test_gather_returns_valid_prometheus_format() {
        let r = fresh_registry();
        CONTRACT_ACTIVATIONS.inc();
        let out = gather_metrics(&r);
        assert!(out.contains("# HELP"));
        assert!(out.contains("# TYPE"));
        assert!(out.contains("contract_activations_total"));
    }

    #[test]
    fn test_observe_http_records_duration() {
        let _r = fresh_registry();
        observe_http("POST", "/api/contracts", 201, 0.055);
        let sample_count = HTTP_REQUEST_DURATION
            .with_label_values(&["POST", "/api/contracts"])
            .get_sample_count();
        assert!(sample_count >= 1);
    }
}
