//! HTTP surface for C11 (ContractLifecycle). Handlers decode the request,
//! call into `ContractLifecycle`, and shape the response — validation and
//! transactional sequencing live in that module.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{Contract, ContractHistoryEntry, Id, VolumeDiscountTier};

use crate::{
    contract_lifecycle::{self, NewContract},
    error::ApiResult,
    state::AppState,
    volume_tier_store,
};

#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    pub org_id: String,
    pub contract_name: String,
    pub contract_number: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub minimum_commit_amount: Option<Decimal>,
    pub account_owner: String,
    pub sales_rep_email: String,
    pub custom_free_spans: Option<i64>,
    pub custom_price_per_100k_spans: Option<Decimal>,
    pub custom_free_gb: Option<Decimal>,
    pub custom_price_per_gb: Option<Decimal>,
    pub custom_free_scores: Option<i64>,
    pub custom_price_per_1k_scores: Option<Decimal>,
    pub created_by: String,
    pub notes: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

pub async fn create_contract(
    State(state): State<AppState>,
    Json(req): Json<CreateContractRequest>,
) -> ApiResult<Json<Contract>> {
    let new = NewContract {
        org_id: req.org_id,
        contract_name: req.contract_name,
        contract_number: req.contract_number,
        start_date: req.start_date,
        end_date: req.end_date,
        currency: req.currency,
        minimum_commit_amount: req.minimum_commit_amount,
        account_owner: req.account_owner,
        sales_rep_email: req.sales_rep_email,
        custom_free_spans: req.custom_free_spans,
        custom_price_per_100k_spans: req.custom_price_per_100k_spans,
        custom_free_gb: req.custom_free_gb,
        custom_price_per_gb: req.custom_price_per_gb,
        custom_free_scores: req.custom_free_scores,
        custom_price_per_1k_scores: req.custom_price_per_1k_scores,
        created_by: req.created_by,
        notes: req.notes,
    };

    let contract = state.contracts.create(&state.db, new).await?;
    Ok(Json(contract))
}

pub async fn get_contract(State(state): State<AppState>, Path(id): Path<Id>) -> ApiResult<Json<Contract>> {
    use crate::contract_store::ContractStore;
    let contract = ContractStore::new().get(&state.db, id).await?;
    Ok(Json(contract))
}

pub async fn get_contracts_by_org(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<Contract>>> {
    use crate::contract_store::ContractStore;
    let contracts = ContractStore::new().list_by_org(&state.db, &org_id).await?;
    Ok(Json(contracts))
}

pub async fn get_active_contract(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Option<Contract>>> {
    use crate::contract_store::ContractStore;
    let contract = ContractStore::new().get_active(&state.db, &org_id).await?;
    Ok(Json(contract))
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub user_id: String,
}

pub async fn activate_contract(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<ActivateRequest>,
) -> ApiResult<Json<Contract>> {
    let contract = contract_lifecycle::activate_in_transaction(&state.contracts, &state.db, id, &req.user_id).await?;
    Ok(Json(contract))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
    pub user_id: String,
}

pub async fn cancel_contract(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<Contract>> {
    let contract = state.contracts.cancel(&state.db, id, &req.reason, &req.user_id).await?;
    Ok(Json(contract))
}

#[derive(Debug, Deserialize)]
pub struct ExpireRequest {
    pub user_id: String,
}

pub async fn expire_contract(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<ExpireRequest>,
) -> ApiResult<Json<Contract>> {
    let contract = state.contracts.expire(&state.db, id, &req.user_id).await?;
    Ok(Json(contract))
}

#[derive(Debug, Deserialize)]
pub struct TierInput {
    pub dimension: shared::Dimension,
    pub tier_min: i64,
    pub tier_max: Option<i64>,
    pub price_per_unit: Decimal,
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct TierSetRequest {
    pub tiers: Vec<TierInput>,
    pub user_id: String,
}

fn to_tier_rows(contract_id: Id, inputs: Vec<TierInput>) -> Vec<VolumeDiscountTier> {
    let now = Utc::now();
    inputs
        .into_iter()
        .map(|t| VolumeDiscountTier {
            id: Id::new(),
            contract_id,
            dimension: t.dimension,
            tier_min: t.tier_min,
            tier_max: t.tier_max,
            price_per_unit: t.price_per_unit,
            priority: t.priority,
            created_at: now,
        })
        .collect()
}

pub async fn add_volume_tiers(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<TierSetRequest>,
) -> ApiResult<Json<Vec<VolumeDiscountTier>>> {
    let rows = to_tier_rows(id, req.tiers);
    volume_tier_store::validate_tier_set(&rows)?;

    let mut tx = state.db.begin().await.map_err(shared::BillingError::from)?;
    let result = state.contracts.add_volume_tiers(&mut tx, id, rows, &req.user_id).await?;
    tx.commit().await.map_err(shared::BillingError::from)?;
    Ok(Json(result))
}

pub async fn update_volume_tiers(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<TierSetRequest>,
) -> ApiResult<Json<Vec<VolumeDiscountTier>>> {
    let rows = to_tier_rows(id, req.tiers);
    volume_tier_store::validate_tier_set(&rows)?;

    let mut tx = state.db.begin().await.map_err(shared::BillingError::from)?;
    let result = state.contracts.update_volume_tiers(&mut tx, id, rows, &req.user_id).await?;
    tx.commit().await.map_err(shared::BillingError::from)?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    #[serde(default)]
    pub days: i64,
}

pub async fn get_expiring_contracts(
    State(state): State<AppState>,
    Query(q): Query<ExpiringQuery>,
) -> ApiResult<Json<Vec<Contract>>> {
    let contracts = state.contracts.get_expiring(&state.db, q.days).await?;
    Ok(Json(contracts))
}

pub async fn get_contract_history(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<Vec<ContractHistoryEntry>>> {
    let history = state.contracts.get_history(&state.db, id).await?;
    Ok(Json(history))
}
