//! Pure pricing resolution (C6: PricingResolver). Merges a plan with the active
//! contract's overrides into [`EffectivePricing`]; a missing active contract is
//! not an error, it just means plan defaults apply unchanged.

use std::sync::Arc;

use shared::{BillingResult, Contract, Dimension, EffectivePricing, Id, Plan, VolumeDiscountTier};
use sqlx::PgExecutor;

use crate::{
    cache::CacheLayer, contract_store::ContractStore, org_billing_store::OrgBillingStore, plan_store::PlanStore,
    volume_tier_store::VolumeTierStore,
};

/// Cache sub-key effective pricing is stored under, keyed by org id (§10:
/// pricing resolution is read-heavy and the inputs change rarely).
pub(crate) const CACHE_KEY: &str = "effective_pricing";

#[derive(Clone)]
pub struct PricingResolver {
    org_billing: OrgBillingStore,
    plans: PlanStore,
    contracts: ContractStore,
    tiers: VolumeTierStore,
    cache: Arc<CacheLayer>,
}

impl PricingResolver {
    pub fn new(cache: Arc<CacheLayer>) -> Self {
        Self {
            org_billing: OrgBillingStore::new(),
            plans: PlanStore::new(),
            contracts: ContractStore::new(),
            tiers: VolumeTierStore::new(),
            cache,
        }
    }

    /// Loads `OrganizationBilling` for `org_id`, then delegates to
    /// [`Self::get_effective_pricing_with_billing`].
    pub async fn get_effective_pricing(
        &self,
        exec: impl PgExecutor<'_> + Copy,
        org_id: &str,
    ) -> BillingResult<EffectivePricing> {
        let billing = self.org_billing.get(exec, org_id).await?;
        self.get_effective_pricing_with_billing(exec, org_id, billing.plan_id).await
    }

    /// Resolves pricing given an already-loaded `OrganizationBilling` row, so
    /// callers that already hold one (e.g. the overview service) avoid a
    /// redundant read. Read-through cached by org id; invalidated by
    /// [`ContractLifecycle`](crate::contract_lifecycle::ContractLifecycle) on
    /// activation, cancellation, expiry, and tier changes.
    pub async fn get_effective_pricing_with_billing(
        &self,
        exec: impl PgExecutor<'_> + Copy,
        org_id: &str,
        plan_id: Id,
    ) -> BillingResult<EffectivePricing> {
        if let (Some(cached), true) = self.cache.get(org_id, CACHE_KEY).await {
            if let Ok(pricing) = serde_json::from_str::<EffectivePricing>(&cached) {
                return Ok(pricing);
            }
        }

        let plan = self.plans.get(exec, plan_id).await?;
        let contract = self.contracts.get_active(exec, org_id).await?;

        let volume_tiers = match &contract {
            Some(c) => self.tiers.list_for_contract(exec, c.id).await?,
            None => Vec::new(),
        };

        let pricing = merge(org_id.to_string(), plan, contract, volume_tiers);

        if let Ok(serialized) = serde_json::to_string(&pricing) {
            self.cache.put(org_id, CACHE_KEY, serialized, None).await;
        }

        Ok(pricing)
    }
}

/// Pure merge step, split out from the I/O above so it is trivially unit
/// testable without a database: `coalesce(custom_<field>, plan_<field>)` per
/// dimension, with `nil` plan prices treated as zero.
fn merge(org_id: String, plan: Plan, contract: Option<Contract>, volume_tiers: Vec<VolumeDiscountTier>) -> EffectivePricing {
    let (free_spans, price_per_100k_spans, free_gb, price_per_gb, free_scores, price_per_1k_scores) =
        match &contract {
            None => (
                plan.free_spans,
                plan.price_per_100k_spans.unwrap_or_default(),
                plan.free_gb,
                plan.price_per_gb.unwrap_or_default(),
                plan.free_scores,
                plan.price_per_1k_scores.unwrap_or_default(),
            ),
            Some(c) => (
                c.custom_free_spans.unwrap_or(plan.free_spans),
                c.custom_price_per_100k_spans
                    .or(plan.price_per_100k_spans)
                    .unwrap_or_default(),
                c.custom_free_gb.unwrap_or(plan.free_gb),
                c.custom_price_per_gb.or(plan.price_per_gb).unwrap_or_default(),
                c.custom_free_scores.unwrap_or(plan.free_scores),
                c.custom_price_per_1k_scores
                    .or(plan.price_per_1k_scores)
                    .unwrap_or_default(),
            ),
        };

    let has_volume_tiers = !volume_tiers.is_empty();

    EffectivePricing {
        org_id,
        base_plan: plan,
        contract,
        free_spans,
        price_per_100k_spans,
        free_gb,
        price_per_gb,
        free_scores,
        price_per_1k_scores,
        has_volume_tiers,
        volume_tiers,
    }
}

/// Convenience re-export matching the spec's `CalculateDimensionWithTiers` entry
/// point, parameterized over the dimension descriptor table.
pub fn dimension_descriptor(dimension: Dimension) -> (&'static str, i64) {
    match dimension {
        Dimension::Spans => ("spans", dimension.unit_size()),
        Dimension::Bytes => ("bytes", dimension.unit_size()),
        Dimension::Scores => ("scores", dimension.unit_size()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use shared::ContractStatus;

    fn plan() -> Plan {
        Plan {
            id: Id::new(),
            name: "pro".into(),
            is_active: true,
            is_default: false,
            free_spans: 1_000_000,
            price_per_100k_spans: Some(dec!(0.50)),
            free_gb: dec!(10),
            price_per_gb: Some(dec!(2)),
            free_scores: 100,
            price_per_1k_scores: Some(dec!(0.10)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn contract() -> Contract {
        Contract {
            id: Id::new(),
            org_id: "org_1".into(),
            contract_name: "Acme enterprise".into(),
            contract_number: "C-0001".into(),
            start_date: Utc::now(),
            end_date: None,
            currency: "USD".into(),
            minimum_commit_amount: None,
            account_owner: "ae@example.com".into(),
            sales_rep_email: "sales@example.com".into(),
            status: ContractStatus::Active,
            custom_free_spans: Some(50_000_000),
            custom_price_per_100k_spans: Some(dec!(0.50)),
            custom_free_gb: None,
            custom_price_per_gb: None,
            custom_free_scores: None,
            custom_price_per_1k_scores: None,
            created_by: "admin".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            notes: None,
        }
    }

    // Invariant 4: EffectivePricing = Plan iff no active contract.
    #[test]
    fn no_contract_yields_plan_defaults() {
        let p = plan();
        let pricing = merge("org_1".into(), p.clone(), None, vec![]);
        assert_eq!(pricing.free_spans, p.free_spans);
        assert_eq!(pricing.price_per_100k_spans, p.price_per_100k_spans.unwrap());
        assert!(pricing.contract.is_none());
        assert!(!pricing.has_volume_tiers);
    }

    #[test]
    fn contract_overrides_take_precedence_per_field() {
        let p = plan();
        let c = contract();
        let pricing = merge("org_1".into(), p.clone(), Some(c), vec![]);
        assert_eq!(pricing.free_spans, 50_000_000);
        assert_eq!(pricing.price_per_100k_spans, dec!(0.50));
        // Fields the contract doesn't override fall back to the plan default.
        assert_eq!(pricing.free_gb, p.free_gb);
        assert_eq!(pricing.price_per_gb, p.price_per_gb.unwrap());
    }

    #[test]
    fn nil_plan_price_treated_as_zero_with_no_contract() {
        let mut p = plan();
        p.price_per_100k_spans = None;
        let pricing = merge("org_1".into(), p, None, vec![]);
        assert_eq!(pricing.price_per_100k_spans, Decimal::ZERO);
    }
}
