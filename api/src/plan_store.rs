//! Relational store for [`Plan`] rows (C3 in the design doc: PlanCatalog).

use shared::{BillingError, BillingResult, Id, Plan};
use sqlx::PgExecutor;

#[derive(Clone)]
pub struct PlanStore;

impl PlanStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn get(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<Plan> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(exec)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound(id.to_string()))
    }

    pub async fn list_active(&self, exec: impl PgExecutor<'_>) -> BillingResult<Vec<Plan>> {
        let plans = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE is_active ORDER BY name")
            .fetch_all(exec)
            .await?;
        Ok(plans)
    }

    /// The system default plan, assigned to newly provisioned organizations.
    pub async fn get_default(&self, exec: impl PgExecutor<'_>) -> BillingResult<Plan> {
        sqlx::query_as::<_, Plan>(
            "SELECT * FROM plans WHERE is_default = TRUE AND is_active = TRUE LIMIT 1",
        )
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| BillingError::PlanNotFound("no default plan configured".into()))
    }

    pub async fn create(&self, exec: impl PgExecutor<'_>, plan: &Plan) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (
                id, name, is_active, is_default,
                free_spans, price_per_100k_spans,
                free_gb, price_per_gb,
                free_scores, price_per_1k_scores,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(plan.is_active)
        .bind(plan.is_default)
        .bind(plan.free_spans)
        .bind(plan.price_per_100k_spans)
        .bind(plan.free_gb)
        .bind(plan.price_per_gb)
        .bind(plan.free_scores)
        .bind(plan.price_per_1k_scores)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(exec)
        .await?;
        Ok(())
    }
}

impl Default for PlanStore {
    fn default() -> Self {
        Self::new()
    }
}
