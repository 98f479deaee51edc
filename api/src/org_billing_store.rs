//! Relational store for [`OrganizationBilling`] rows (C2: OrgBillingStore).

use chrono::{DateTime, Datelike, Utc};
use shared::{BillingError, BillingResult, Id, OrganizationBilling};
use sqlx::PgExecutor;

#[derive(Clone)]
pub struct OrgBillingStore;

impl OrgBillingStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn get(&self, exec: impl PgExecutor<'_>, org_id: &str) -> BillingResult<OrganizationBilling> {
        sqlx::query_as::<_, OrganizationBilling>("SELECT * FROM organization_billing WHERE org_id = $1")
            .bind(org_id)
            .fetch_optional(exec)
            .await?
            .ok_or_else(|| BillingError::BillingNotFound(org_id.to_string()))
    }

    pub async fn try_get(
        &self,
        exec: impl PgExecutor<'_>,
        org_id: &str,
    ) -> BillingResult<Option<OrganizationBilling>> {
        let row = sqlx::query_as::<_, OrganizationBilling>(
            "SELECT * FROM organization_billing WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(exec)
        .await?;
        Ok(row)
    }

    /// Creates a billing row for a newly provisioned organization. A concurrent
    /// second call observes the primary-key conflict and is treated as success by
    /// the caller (see `UsageOverviewService::provision_organization_billing`).
    pub async fn create(
        &self,
        exec: impl PgExecutor<'_>,
        org_id: &str,
        plan_id: Id,
        anchor_day: i32,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO organization_billing (
                org_id, plan_id, billing_cycle_start, billing_cycle_anchor_day,
                current_period_spans, current_period_bytes, current_period_scores, current_period_cost,
                free_spans_remaining, free_bytes_remaining, free_scores_remaining,
                last_synced_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, 0, 0, 0, 0, 0, 0, 0, $5, $5, $5)
            "#,
        )
        .bind(org_id)
        .bind(plan_id)
        .bind(now)
        .bind(anchor_day)
        .bind(now)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn update_period_counters(
        &self,
        exec: impl PgExecutor<'_>,
        org_id: &str,
        spans: i64,
        bytes: i64,
        scores: i64,
        cost: rust_decimal::Decimal,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE organization_billing SET
                current_period_spans = $2,
                current_period_bytes = $3,
                current_period_scores = $4,
                current_period_cost = $5,
                last_synced_at = NOW(),
                updated_at = NOW()
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .bind(spans)
        .bind(bytes)
        .bind(scores)
        .bind(cost)
        .execute(exec)
        .await?;
        Ok(())
    }

    /// End of the current billing cycle: one month from `billing_cycle_start`,
    /// snapped to `billing_cycle_anchor_day` and clamped to the last day of the
    /// target month so an anchor of 29-31 never overflows shorter months.
    pub fn period_end(billing_cycle_start: DateTime<Utc>, anchor_day: i32) -> DateTime<Utc> {
        let next_month_first = if billing_cycle_start.month() == 12 {
            billing_cycle_start
                .with_year(billing_cycle_start.year() + 1)
                .and_then(|d| d.with_month(1))
        } else {
            billing_cycle_start.with_month(billing_cycle_start.month() + 1)
        }
        .unwrap_or(billing_cycle_start)
        .with_day(1)
        .unwrap_or(billing_cycle_start);

        let last_day_of_month = last_day_of_month(next_month_first.year(), next_month_first.month());
        let day = anchor_day.min(last_day_of_month as i32).max(1) as u32;
        next_month_first.with_day(day).unwrap_or(next_month_first)
    }
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    chrono::NaiveDate::from_ymd_opt(y, m, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
        .day()
}

impl Default for OrgBillingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_end_advances_one_month_on_anchor_day() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let end = OrgBillingStore::period_end(start, 15);
        assert_eq!(end.month(), 2);
        assert_eq!(end.day(), 15);
    }

    #[test]
    fn period_end_clamps_to_last_day_of_shorter_month() {
        // anchor_day is restricted to [1,28] at provisioning time so this clamp
        // only ever matters for the legitimate day-28-in-February case.
        let start = Utc.with_ymd_and_hms(2026, 1, 28, 0, 0, 0).unwrap();
        let end = OrgBillingStore::period_end(start, 28);
        assert_eq!(end.month(), 2);
        assert_eq!(end.day(), 28);
    }

    #[test]
    fn period_end_wraps_december_into_next_year() {
        let start = Utc.with_ymd_and_hms(2026, 12, 5, 0, 0, 0).unwrap();
        let end = OrgBillingStore::period_end(start, 5);
        assert_eq!(end.year(), 2027);
        assert_eq!(end.month(), 1);
    }
}
