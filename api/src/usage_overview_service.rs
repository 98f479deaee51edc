//! C8: UsageOverviewService. The real-time read path: join columnar usage
//! aggregates with `OrganizationBilling` metadata, price the result through
//! the pricing resolver and tiered cost engine, and return a dashboard-ready
//! snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{BillingError, BillingResult, UsageBucket};
use sqlx::PgPool;

use crate::{
    cache::CacheLayer,
    org_billing_store::OrgBillingStore,
    plan_store::PlanStore,
    pricing_resolver::PricingResolver,
    tiered_cost_engine,
    usage_aggregate_store::{Granularity, UsageAggregateStore},
};

#[derive(Clone)]
pub struct UsageOverviewService {
    org_billing: OrgBillingStore,
    plans: PlanStore,
    pricing: PricingResolver,
    aggregates: UsageAggregateStore,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageOverview {
    pub org_id: String,
    pub spans: i64,
    pub bytes: i64,
    pub scores: i64,
    pub free_spans_remaining: i64,
    pub free_bytes_remaining: i64,
    pub free_scores_remaining: i64,
    pub free_spans_total: i64,
    pub free_bytes_total: i64,
    pub free_scores_total: i64,
    pub estimated_cost: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub degraded: bool,
}

impl UsageOverviewService {
    pub fn new(cache: Arc<CacheLayer>) -> Self {
        Self {
            org_billing: OrgBillingStore::new(),
            plans: PlanStore::new(),
            pricing: PricingResolver::new(cache),
            aggregates: UsageAggregateStore::new(),
        }
    }

    /// Loads billing metadata and effective pricing, queries the columnar
    /// store for cycle-to-date usage, and prices it. A transient aggregate
    /// read failure degrades to the cached `current_period_*` counters on
    /// `OrganizationBilling` with a warning log rather than failing the
    /// request outright.
    pub async fn get_usage_overview(&self, pool: &PgPool, org_id: &str) -> BillingResult<UsageOverview> {
        let billing = self.org_billing.get(pool, org_id).await?;
        let pricing = self
            .pricing
            .get_effective_pricing_with_billing(pool, org_id, billing.plan_id)
            .await?;

        let period_start = billing.billing_cycle_start;
        let period_end = OrgBillingStore::period_end(period_start, billing.billing_cycle_anchor_day);

        let (usage, degraded) = match self
            .aggregates
            .summarize(pool, org_id, None, period_start, Utc::now())
            .await
        {
            Ok(summary) => (summary, false),
            Err(err) => {
                tracing::warn!(org_id, error = %err, "aggregate store read failed, falling back to cached counters");
                (
                    shared::UsageSummary {
                        spans: billing.current_period_spans,
                        bytes: billing.current_period_bytes,
                        scores: billing.current_period_scores,
                    },
                    true,
                )
            }
        };

        let breakdown = tiered_cost_engine::calculate_cost_with_tiers(&pricing, usage);

        Ok(UsageOverview {
            org_id: org_id.to_string(),
            spans: usage.spans,
            bytes: usage.bytes,
            scores: usage.scores,
            free_spans_remaining: (pricing.free_spans - usage.spans).max(0),
            free_bytes_remaining: (pricing.free_tier_for(shared::Dimension::Bytes) - usage.bytes).max(0),
            free_scores_remaining: (pricing.free_scores - usage.scores).max(0),
            free_spans_total: pricing.free_spans,
            free_bytes_total: pricing.free_tier_for(shared::Dimension::Bytes),
            free_scores_total: pricing.free_scores,
            estimated_cost: breakdown.total,
            period_start,
            period_end,
            degraded,
        })
    }

    pub async fn get_usage_time_series(
        &self,
        pool: &PgPool,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: &str,
    ) -> BillingResult<Vec<UsageBucket>> {
        let granularity = Granularity::parse(granularity)
            .ok_or_else(|| BillingError::InvalidBudgetConfig(format!("unknown granularity: {granularity}")))?;
        self.aggregates.time_series(pool, org_id, start, end, granularity).await
    }

    pub async fn get_usage_by_project(
        &self,
        pool: &PgPool,
        org_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BillingResult<Vec<UsageBucket>> {
        self.aggregates.by_project(pool, org_id, start, end).await
    }

    /// Idempotently provisions an `OrganizationBilling` row for a newly
    /// created org, assigning the system default plan and today's
    /// day-of-month (clamped to 28) as the anchor. A duplicate-key race from a
    /// concurrent second call is treated as success.
    pub async fn provision_organization_billing(&self, pool: &PgPool, org_id: &str) -> BillingResult<()> {
        let plan = self.plans.get_default(pool).await?;
        let anchor_day = Utc::now().format("%d").to_string().parse::<i32>().unwrap_or(1).min(28);

        match self.org_billing.create(pool, org_id, plan.id, anchor_day).await {
            Ok(()) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                tracing::info!(org_id, "organization billing already provisioned, treating as success");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Legacy flat-rate entry point on `BillableUsageService` (§6); bypasses
/// contracts and volume tiers entirely. New code routes through
/// [`tiered_cost_engine::calculate_cost_with_tiers`] instead — this is kept
/// only for callers that have not migrated.
pub fn calculate_cost(summary: shared::UsageSummary, plan: &shared::Plan) -> Decimal {
    tiered_cost_engine::calculate_cost(summary, plan)
}
