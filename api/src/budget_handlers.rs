//! HTTP surface for C9/C10 (BudgetStore, AlertStore, BudgetEvaluator via
//! [`crate::budget_service`]).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{BudgetType, Id, UsageAlert, UsageBudget};

use crate::{
    budget_store::NewBudget,
    error::ApiResult,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    pub org_id: String,
    pub project_id: Option<Id>,
    pub name: String,
    pub budget_type: BudgetType,
    pub span_limit: Option<i64>,
    pub bytes_limit: Option<i64>,
    pub score_limit: Option<i64>,
    pub cost_limit: Option<Decimal>,
    #[serde(default)]
    pub alert_thresholds: Vec<i64>,
}

pub async fn create_budget(
    State(state): State<AppState>,
    Json(req): Json<CreateBudgetRequest>,
) -> ApiResult<Json<UsageBudget>> {
    let new = NewBudget {
        org_id: req.org_id,
        project_id: req.project_id,
        name: req.name,
        budget_type: req.budget_type,
        span_limit: req.span_limit,
        bytes_limit: req.bytes_limit,
        score_limit: req.score_limit,
        cost_limit: req.cost_limit,
        alert_thresholds: req.alert_thresholds,
    };

    use crate::budget_store::BudgetStore;
    let budget = BudgetStore::new().create(&state.db, new).await?;
    Ok(Json(budget))
}

pub async fn get_budget(State(state): State<AppState>, Path(id): Path<Id>) -> ApiResult<Json<UsageBudget>> {
    use crate::budget_store::BudgetStore;
    let budget = BudgetStore::new().get(&state.db, id).await?;
    Ok(Json(budget))
}

pub async fn list_budgets(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<UsageBudget>>> {
    use crate::budget_store::BudgetStore;
    let budgets = BudgetStore::new().list_active_for_org(&state.db, &org_id).await?;
    Ok(Json(budgets))
}

pub async fn delete_budget(State(state): State<AppState>, Path(id): Path<Id>) -> ApiResult<Json<()>> {
    use crate::budget_store::BudgetStore;
    BudgetStore::new().delete(&state.db, id).await?;
    Ok(Json(()))
}

pub async fn check_budgets(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<UsageAlert>>> {
    let alerts = state.budgets.check_budgets(&state.db, &org_id).await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    #[serde(default = "default_alert_limit")]
    pub limit: i64,
}

fn default_alert_limit() -> i64 {
    50
}

pub async fn get_alerts(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(q): Query<ListAlertsQuery>,
) -> ApiResult<Json<Vec<UsageAlert>>> {
    let alerts = state.budgets.get_alerts(&state.db, &org_id, q.limit).await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct OrgScopedAlertPath {
    pub org_id: String,
    pub alert_id: Id,
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(path): Path<OrgScopedAlertPath>,
) -> ApiResult<Json<()>> {
    state.budgets.acknowledge_alert(&state.db, &path.org_id, path.alert_id).await?;
    Ok(Json(()))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(path): Path<OrgScopedAlertPath>,
) -> ApiResult<Json<()>> {
    state.budgets.resolve_alert(&state.db, &path.org_id, path.alert_id).await?;
    Ok(Json(()))
}
