//! Relational store for [`UsageBudget`] rows, half of C9 (BudgetStore +
//! AlertStore). Deletion is soft (`is_active = false`); budgets referencing a
//! `project_id` are validated against the minimal `projects` table this crate
//! owns only for referential integrity (§4.6).

use rust_decimal::Decimal;
use shared::{BillingError, BillingResult, BudgetType, Id, UsageBudget};
use sqlx::PgExecutor;

#[derive(Clone)]
pub struct BudgetStore;

pub struct NewBudget {
    pub org_id: String,
    pub project_id: Option<Id>,
    pub name: String,
    pub budget_type: BudgetType,
    pub span_limit: Option<i64>,
    pub bytes_limit: Option<i64>,
    pub score_limit: Option<i64>,
    pub cost_limit: Option<Decimal>,
    pub alert_thresholds: Vec<i64>,
}

impl BudgetStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn get(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<UsageBudget> {
        sqlx::query_as::<_, UsageBudget>("SELECT * FROM usage_budgets WHERE id = $1")
            .bind(id)
            .fetch_optional(exec)
            .await?
            .ok_or_else(|| BillingError::BudgetNotFound(id.to_string()))
    }

    pub async fn list_active_for_org(&self, exec: impl PgExecutor<'_>, org_id: &str) -> BillingResult<Vec<UsageBudget>> {
        let rows = sqlx::query_as::<_, UsageBudget>(
            "SELECT * FROM usage_budgets WHERE org_id = $1 AND is_active ORDER BY created_at",
        )
        .bind(org_id)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    /// Distinct orgs carrying at least one active budget, the driver set for
    /// the background evaluation scheduler.
    pub async fn list_org_ids_with_active_budgets(&self, exec: impl PgExecutor<'_>) -> BillingResult<Vec<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT org_id FROM usage_budgets WHERE is_active ORDER BY org_id")
                .fetch_all(exec)
                .await?;
        Ok(rows)
    }

    /// Verifies `new.project_id`, if set, belongs to `new.org_id` before
    /// inserting. A mismatch returns `ProjectNotFound`, not a tenant-disclosing
    /// "project belongs to a different org" message.
    pub async fn create(&self, exec: impl PgExecutor<'_> + Copy, new: NewBudget) -> BillingResult<UsageBudget> {
        if let Some(project_id) = new.project_id {
            let owner: Option<String> = sqlx::query_scalar("SELECT org_id FROM projects WHERE id = $1")
                .bind(project_id)
                .fetch_optional(exec)
                .await?;
            match owner {
                Some(org) if org == new.org_id => {}
                _ => return Err(BillingError::ProjectNotFound(project_id.to_string())),
            }
        }

        let thresholds = if new.alert_thresholds.is_empty() {
            vec![50, 80, 100]
        } else {
            new.alert_thresholds
        };

        let now = chrono::Utc::now();
        let budget = UsageBudget {
            id: Id::new(),
            org_id: new.org_id,
            project_id: new.project_id,
            name: new.name,
            budget_type: new.budget_type,
            span_limit: new.span_limit,
            bytes_limit: new.bytes_limit,
            score_limit: new.score_limit,
            cost_limit: new.cost_limit,
            current_spans: 0,
            current_bytes: 0,
            current_scores: 0,
            current_cost: Decimal::ZERO,
            alert_thresholds: thresholds,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO usage_budgets (
                id, org_id, project_id, name, budget_type,
                span_limit, bytes_limit, score_limit, cost_limit,
                current_spans, current_bytes, current_scores, current_cost,
                alert_thresholds, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(budget.id)
        .bind(&budget.org_id)
        .bind(budget.project_id)
        .bind(&budget.name)
        .bind(budget.budget_type)
        .bind(budget.span_limit)
        .bind(budget.bytes_limit)
        .bind(budget.score_limit)
        .bind(budget.cost_limit)
        .bind(budget.current_spans)
        .bind(budget.current_bytes)
        .bind(budget.current_scores)
        .bind(budget.current_cost)
        .bind(&budget.alert_thresholds)
        .bind(budget.is_active)
        .bind(budget.created_at)
        .bind(budget.updated_at)
        .execute(exec)
        .await?;

        Ok(budget)
    }

    /// Replaces cumulative usage counters (not deltas) — the caller is
    /// expected to have already summed usage over the full budget window.
    pub async fn update_usage(
        &self,
        exec: impl PgExecutor<'_>,
        id: Id,
        spans: i64,
        bytes: i64,
        scores: i64,
        cost: Decimal,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE usage_budgets SET
                current_spans = $2, current_bytes = $3, current_scores = $4, current_cost = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(spans)
        .bind(bytes)
        .bind(scores)
        .bind(cost)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<()> {
        sqlx::query("UPDATE usage_budgets SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }
}

impl Default for BudgetStore {
    fn default() -> Self {
        Self::new()
    }
}
