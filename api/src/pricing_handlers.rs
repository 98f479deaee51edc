//! Thin HTTP surface over [`crate::pricing_resolver`] and
//! [`crate::tiered_cost_engine`]. Handlers only decode requests and shape
//! responses; all pricing logic lives in the modules they call.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use shared::{EffectivePricing, UsageSummary};

use crate::{error::ApiResult, state::AppState, tiered_cost_engine};

pub async fn get_effective_pricing(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<EffectivePricing>> {
    let pricing = state.pricing.get_effective_pricing(&state.db, &org_id).await?;
    Ok(Json(pricing))
}

#[derive(Debug, Serialize)]
pub struct CostEstimateResponse {
    pub total: rust_decimal::Decimal,
    pub spans_cost: rust_decimal::Decimal,
    pub bytes_cost: rust_decimal::Decimal,
    pub scores_cost: rust_decimal::Decimal,
}

impl From<tiered_cost_engine::CostBreakdown> for CostEstimateResponse {
    fn from(b: tiered_cost_engine::CostBreakdown) -> Self {
        Self {
            total: b.total,
            spans_cost: b.spans.cost,
            bytes_cost: b.bytes.cost,
            scores_cost: b.scores.cost,
        }
    }
}

/// `CalculateCostWithTiers`: the org-level free allowance applies.
pub async fn estimate_cost(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Json(usage): Json<UsageSummary>,
) -> ApiResult<Json<CostEstimateResponse>> {
    let pricing = state.pricing.get_effective_pricing(&state.db, &org_id).await?;
    let breakdown = tiered_cost_engine::calculate_cost_with_tiers(&pricing, usage);
    Ok(Json(breakdown.into()))
}

/// `CalculateCostWithTiersNoFreeTier`: used for project-scoped budget
/// estimates, where the org-level free allowance does not apply.
pub async fn estimate_cost_no_free_tier(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Json(usage): Json<UsageSummary>,
) -> ApiResult<Json<CostEstimateResponse>> {
    let pricing = state.pricing.get_effective_pricing(&state.db, &org_id).await?;
    let breakdown = tiered_cost_engine::calculate_cost_with_tiers_no_free_tier(&pricing, usage);
    Ok(Json(breakdown.into()))
}
