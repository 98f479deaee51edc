//! Relational store for [`UsageAlert`] rows, the other half of C9.

use chrono::Utc;
use shared::{AlertStatus, BillingError, BillingResult, Id, UsageAlert};
use sqlx::PgExecutor;

#[derive(Clone)]
pub struct AlertStore;

impl AlertStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert(&self, exec: impl PgExecutor<'_>, alert: &UsageAlert) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_alerts (
                id, budget_id, org_id, project_id, alert_threshold, dimension, severity,
                threshold_value, actual_value, percent_used, status, triggered_at,
                acknowledged_at, resolved_at, notification_sent
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(alert.id)
        .bind(alert.budget_id)
        .bind(&alert.org_id)
        .bind(alert.project_id)
        .bind(alert.alert_threshold)
        .bind(alert.dimension)
        .bind(alert.severity)
        .bind(alert.threshold_value)
        .bind(alert.actual_value)
        .bind(alert.percent_used)
        .bind(alert.status)
        .bind(alert.triggered_at)
        .bind(alert.acknowledged_at)
        .bind(alert.resolved_at)
        .bind(alert.notification_sent)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn get(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<UsageAlert> {
        sqlx::query_as::<_, UsageAlert>("SELECT * FROM usage_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(exec)
            .await?
            .ok_or_else(|| BillingError::AlertNotFound(id.to_string()))
    }

    pub async fn list_for_org(&self, exec: impl PgExecutor<'_>, org_id: &str, limit: i64) -> BillingResult<Vec<UsageAlert>> {
        let rows = sqlx::query_as::<_, UsageAlert>(
            "SELECT * FROM usage_alerts WHERE org_id = $1 ORDER BY triggered_at DESC LIMIT $2",
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    pub async fn acknowledge(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<()> {
        sqlx::query("UPDATE usage_alerts SET status = $2, acknowledged_at = $3 WHERE id = $1")
            .bind(id)
            .bind(AlertStatus::Acknowledged)
            .bind(Utc::now())
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn resolve(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<()> {
        sqlx::query("UPDATE usage_alerts SET status = $2, resolved_at = $3 WHERE id = $1")
            .bind(id)
            .bind(AlertStatus::Resolved)
            .bind(Utc::now())
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn mark_notification_sent(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<()> {
        sqlx::query("UPDATE usage_alerts SET notification_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}
