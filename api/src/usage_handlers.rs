//! HTTP surface for C8 (UsageOverviewService) and C1 (UsageAggregateStore).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::UsageBucket;

use crate::{
    error::ApiResult,
    state::AppState,
    usage_aggregate_store::Granularity,
    usage_overview_service::UsageOverview,
};

pub async fn get_usage_overview(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<UsageOverview>> {
    let overview = state.usage.get_usage_overview(&state.db, &org_id).await?;
    Ok(Json(overview))
}

#[derive(Debug, Deserialize)]
pub struct TimeSeriesQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_granularity")]
    pub granularity: String,
}

fn default_granularity() -> String {
    "auto".to_string()
}

pub async fn get_usage_time_series(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(q): Query<TimeSeriesQuery>,
) -> ApiResult<Json<Vec<UsageBucket>>> {
    let granularity = if q.granularity == "auto" {
        match Granularity::for_window(q.start, q.end) {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
        }
        .to_string()
    } else {
        q.granularity
    };

    let buckets = state
        .usage
        .get_usage_time_series(&state.db, &org_id, q.start, q.end, &granularity)
        .await?;
    Ok(Json(buckets))
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn get_usage_by_project(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(q): Query<WindowQuery>,
) -> ApiResult<Json<Vec<UsageBucket>>> {
    let buckets = state.usage.get_usage_by_project(&state.db, &org_id, q.start, q.end).await?;
    Ok(Json(buckets))
}

pub async fn provision_organization_billing(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<()>> {
    state.usage.provision_organization_billing(&state.db, &org_id).await?;
    Ok(Json(()))
}
