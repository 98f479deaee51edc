use axum::{
    routing::{get, post},
    Router,
};

use crate::{budget_handlers, contract_handlers, metrics_handler, pricing_handlers, state::AppState, usage_handlers};

/// C11 (ContractLifecycle) and C5 (VolumeTierStore) surface: create, inspect,
/// and transition contracts; manage their volume tier sets.
pub fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/api/contracts", post(contract_handlers::create_contract))
        .route("/api/contracts/:id", get(contract_handlers::get_contract))
        .route(
            "/api/orgs/:org_id/contracts",
            get(contract_handlers::get_contracts_by_org),
        )
        .route(
            "/api/orgs/:org_id/contracts/active",
            get(contract_handlers::get_active_contract),
        )
        .route(
            "/api/contracts/:id/activate",
            post(contract_handlers::activate_contract),
        )
        .route("/api/contracts/:id/cancel", post(contract_handlers::cancel_contract))
        .route("/api/contracts/:id/expire", post(contract_handlers::expire_contract))
        .route(
            "/api/contracts/:id/volume-tiers",
            post(contract_handlers::add_volume_tiers).put(contract_handlers::update_volume_tiers),
        )
        .route(
            "/api/contracts/:id/history",
            get(contract_handlers::get_contract_history),
        )
        .route(
            "/api/contracts/expiring",
            get(contract_handlers::get_expiring_contracts),
        )
}

/// C6/C7 surface: effective pricing lookups and tiered cost estimates.
pub fn pricing_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/orgs/:org_id/pricing",
            get(pricing_handlers::get_effective_pricing),
        )
        .route(
            "/api/orgs/:org_id/pricing/estimate",
            post(pricing_handlers::estimate_cost),
        )
        .route(
            "/api/orgs/:org_id/pricing/estimate-no-free-tier",
            post(pricing_handlers::estimate_cost_no_free_tier),
        )
}

/// C8 surface: dashboard overview, time series, and per-project breakdown,
/// plus org billing provisioning.
pub fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orgs/:org_id/usage/overview", get(usage_handlers::get_usage_overview))
        .route(
            "/api/orgs/:org_id/usage/time-series",
            get(usage_handlers::get_usage_time_series),
        )
        .route(
            "/api/orgs/:org_id/usage/by-project",
            get(usage_handlers::get_usage_by_project),
        )
        .route(
            "/api/orgs/:org_id/billing/provision",
            post(usage_handlers::provision_organization_billing),
        )
}

/// C9/C10 surface: budget CRUD, evaluation, and alert lifecycle.
pub fn budget_routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets", post(budget_handlers::create_budget))
        .route("/api/budgets/:id", get(budget_handlers::get_budget).delete(budget_handlers::delete_budget))
        .route("/api/orgs/:org_id/budgets", get(budget_handlers::list_budgets))
        .route(
            "/api/orgs/:org_id/budgets/check",
            post(budget_handlers::check_budgets),
        )
        .route("/api/orgs/:org_id/alerts", get(budget_handlers::get_alerts))
        .route(
            "/api/orgs/:org_id/alerts/:alert_id/acknowledge",
            post(budget_handlers::acknowledge_alert),
        )
        .route(
            "/api/orgs/:org_id/alerts/:alert_id/resolve",
            post(budget_handlers::resolve_alert),
        )
}

/// Liveness probe and Prometheus scrape endpoint.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler::metrics_endpoint))
}

async fn health_check() -> &'static str {
    "ok"
}
