//! Pure usage-cost computation: progressive tier pricing in absolute usage
//! coordinates, flat-rate fallback, and per-organization total cost. All functions
//! are synchronous — handlers and services call these after loading pricing and
//! usage from the database.

use rust_decimal::Decimal;
use shared::{Dimension, EffectivePricing, UsageSummary, VolumeDiscountTier};

/// Cost contributed by a single dimension, plus the breakdown used for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionCost {
    pub dimension: Dimension,
    pub usage: i64,
    pub free_tier: i64,
    pub billable: i64,
    pub cost: Decimal,
}

/// Total cost across all billable dimensions for one organization.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub spans: DimensionCost,
    pub bytes: DimensionCost,
    pub scores: DimensionCost,
    pub total: Decimal,
}

/// Computes the cost for a single dimension in absolute usage coordinates.
///
/// `free_tier` is an offset into the tier number line, not a pre-subtracted
/// residual: a tier's billable overlap is `[max(free_tier, tier.min), min(usage,
/// tier.max))`. Subtracting `free_tier` from `usage` first and walking tiers
/// against the remainder double-counts free usage whenever `free_tier` does not
/// land on a tier boundary — that relative-coordinate shortcut is the bug this
/// engine exists to avoid.
pub fn calculate_dimension_with_tiers(
    usage: i64,
    free_tier: i64,
    dimension: Dimension,
    tiers: &[&VolumeDiscountTier],
    flat_price: Decimal,
) -> DimensionCost {
    let billable = (usage - free_tier).max(0);

    if usage <= free_tier {
        return DimensionCost {
            dimension,
            usage,
            free_tier,
            billable,
            cost: Decimal::ZERO,
        };
    }

    if tiers.is_empty() {
        let units = Decimal::from(billable) / Decimal::from(dimension.unit_size());
        return DimensionCost {
            dimension,
            usage,
            free_tier,
            billable,
            cost: units * flat_price,
        };
    }

    let mut cost = Decimal::ZERO;
    for tier in tiers {
        let tier_max = tier.tier_max.unwrap_or(usage);
        let overlap_start = free_tier.max(tier.tier_min);
        let overlap_end = usage.min(tier_max);

        if overlap_start >= overlap_end {
            continue;
        }

        let overlap_units = overlap_end - overlap_start;
        let units = Decimal::from(overlap_units) / Decimal::from(dimension.unit_size());
        cost += units * tier.price_per_unit;
    }

    DimensionCost {
        dimension,
        usage,
        free_tier,
        billable,
        cost,
    }
}

/// Computes the full cost breakdown for an organization, using tiers where the
/// contract defines them and falling back to flat pricing otherwise.
pub fn calculate_cost_with_tiers(pricing: &EffectivePricing, usage: UsageSummary) -> CostBreakdown {
    calculate_cost_inner(pricing, usage, true)
}

/// Same as [`calculate_cost_with_tiers`] but with no free-tier offset — used for
/// project-scoped budgets, where the org-level free allowance does not apply.
pub fn calculate_cost_with_tiers_no_free_tier(
    pricing: &EffectivePricing,
    usage: UsageSummary,
) -> CostBreakdown {
    calculate_cost_inner(pricing, usage, false)
}

fn calculate_cost_inner(
    pricing: &EffectivePricing,
    usage: UsageSummary,
    apply_free_tier: bool,
) -> CostBreakdown {
    let free_tier = |d: Dimension| if apply_free_tier { pricing.free_tier_for(d) } else { 0 };

    let spans = calculate_dimension_with_tiers(
        usage.spans,
        free_tier(Dimension::Spans),
        Dimension::Spans,
        &pricing.tiers_for(Dimension::Spans),
        pricing.flat_price_for(Dimension::Spans),
    );
    let bytes = calculate_dimension_with_tiers(
        usage.bytes,
        free_tier(Dimension::Bytes),
        Dimension::Bytes,
        &pricing.tiers_for(Dimension::Bytes),
        pricing.flat_price_for(Dimension::Bytes),
    );
    let scores = calculate_dimension_with_tiers(
        usage.scores,
        free_tier(Dimension::Scores),
        Dimension::Scores,
        &pricing.tiers_for(Dimension::Scores),
        pricing.flat_price_for(Dimension::Scores),
    );

    let total = spans.cost + bytes.cost + scores.cost;

    CostBreakdown {
        spans,
        bytes,
        scores,
        total,
    }
}

/// Legacy flat-rate cost calculation that ignores contracts and volume tiers
/// entirely. Retained for callers that have not migrated to
/// [`calculate_cost_with_tiers`]; no new code path in this crate uses it.
pub fn calculate_cost(summary: UsageSummary, plan: &shared::Plan) -> Decimal {
    let spans_billable = (summary.spans - plan.free_spans).max(0);
    let spans_cost = Decimal::from(spans_billable) / Decimal::from(Dimension::Spans.unit_size())
        * plan.price_per_100k_spans.unwrap_or(Decimal::ZERO);

    let bytes_free = plan.free_gb * Decimal::from(Dimension::Bytes.unit_size());
    let bytes_billable_dec = (Decimal::from(summary.bytes) - bytes_free).max(Decimal::ZERO);
    let bytes_cost = bytes_billable_dec / Decimal::from(Dimension::Bytes.unit_size())
        * plan.price_per_gb.unwrap_or(Decimal::ZERO);

    let scores_billable = (summary.scores - plan.free_scores).max(0);
    let scores_cost = Decimal::from(scores_billable) / Decimal::from(Dimension::Scores.unit_size())
        * plan.price_per_1k_scores.unwrap_or(Decimal::ZERO);

    spans_cost + bytes_cost + scores_cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shared::{Id, Plan};

    fn plan(free_spans: i64, price_spans: Decimal, free_gb: Decimal, price_gb: Decimal, free_scores: i64, price_scores: Decimal) -> Plan {
        Plan {
            id: Id::new(),
            name: "test".into(),
            is_active: true,
            is_default: true,
            free_spans,
            price_per_100k_spans: Some(price_spans),
            free_gb,
            price_per_gb: Some(price_gb),
            free_scores,
            price_per_1k_scores: Some(price_scores),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pricing(plan: Plan, tiers: Vec<VolumeDiscountTier>) -> EffectivePricing {
        EffectivePricing {
            org_id: "org_1".into(),
            free_spans: plan.free_spans,
            price_per_100k_spans: plan.price_per_100k_spans.unwrap(),
            free_gb: plan.free_gb,
            price_per_gb: plan.price_per_gb.unwrap(),
            free_scores: plan.free_scores,
            price_per_1k_scores: plan.price_per_1k_scores.unwrap(),
            has_volume_tiers: !tiers.is_empty(),
            volume_tiers: tiers,
            contract: None,
            base_plan: plan,
        }
    }

    fn tier(contract_id: Id, dimension: Dimension, min: i64, max: Option<i64>, price: Decimal) -> VolumeDiscountTier {
        VolumeDiscountTier {
            id: Id::new(),
            contract_id,
            dimension,
            tier_min: min,
            tier_max: max,
            price_per_unit: price,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    // S1: no contract, flat pricing, all three dimensions billed past free tier.
    #[test]
    fn s1_flat_pricing_three_dimensions() {
        let p = plan(1_000_000, dec!(0.50), dec!(10), dec!(2), 100, dec!(0.10));
        let pricing = pricing(p, vec![]);
        let usage = UsageSummary {
            spans: 5_000_000,
            bytes: 50 * (1i64 << 30),
            scores: 500,
        };
        let result = calculate_cost_with_tiers(&pricing, usage);
        assert_eq!(result.total, dec!(100.04));
    }

    // S2: contract overrides free_spans + price, tiers [0,100M)@0.30, [100M,inf)@0.25.
    #[test]
    fn s2_absolute_coordinate_tiers_with_offset_free_tier() {
        let contract_id = Id::new();
        let mut p = plan(1_000_000, dec!(0.50), dec!(10), dec!(2), 100, dec!(0.10));
        p.free_spans = 50_000_000;
        p.price_per_100k_spans = Some(dec!(0.50));
        let tiers = vec![
            tier(contract_id, Dimension::Spans, 0, Some(100_000_000), dec!(0.30)),
            tier(contract_id, Dimension::Spans, 100_000_000, None, dec!(0.25)),
        ];
        let pricing = pricing(p, tiers);
        let usage = UsageSummary {
            spans: 600_000_000,
            bytes: 0,
            scores: 0,
        };
        let result = calculate_cost_with_tiers(&pricing, usage);
        assert_eq!(result.spans.cost, dec!(1400.00));
        assert_eq!(result.total, dec!(1400.00));
    }

    // S3: free tier lands in the middle of the second tier.
    #[test]
    fn s3_free_tier_lands_mid_tier() {
        let contract_id = Id::new();
        let mut p = plan(0, dec!(0), dec!(0), dec!(0), 0, dec!(0));
        p.free_spans = 150_000_000;
        let tiers = vec![
            tier(contract_id, Dimension::Spans, 0, Some(100_000_000), dec!(1)),
            tier(contract_id, Dimension::Spans, 100_000_000, Some(200_000_000), dec!(0.75)),
            tier(contract_id, Dimension::Spans, 200_000_000, None, dec!(0.50)),
        ];
        let pricing = pricing(p, tiers);
        let usage = UsageSummary {
            spans: 300_000_000,
            bytes: 0,
            scores: 0,
        };
        let result = calculate_cost_with_tiers(&pricing, usage);
        assert_eq!(result.spans.cost, dec!(875.00));
    }

    #[test]
    fn usage_at_or_below_free_tier_costs_nothing() {
        let p = plan(1_000_000, dec!(0.50), dec!(10), dec!(2), 100, dec!(0.10));
        let pricing = pricing(p, vec![]);
        let usage = UsageSummary {
            spans: 1_000_000,
            bytes: 0,
            scores: 0,
        };
        let result = calculate_cost_with_tiers(&pricing, usage);
        assert_eq!(result.spans.cost, Decimal::ZERO);
    }

    #[test]
    fn relative_coordinate_shortcut_would_undercharge() {
        // Demonstrates why free_tier must offset into absolute tier space: if a
        // buggy implementation subtracted free_tier from usage first (400M - 150M
        // = 250M) and walked tiers from zero, it would spend the first 100M of
        // *billable* usage in the cheapest-looking low tier instead of the tier
        // usage actually falls in, undercharging relative to s3 below.
        let contract_id = Id::new();
        let mut p = plan(0, dec!(0), dec!(0), dec!(0), 0, dec!(0));
        p.free_spans = 150_000_000;
        let tiers = vec![
            tier(contract_id, Dimension::Spans, 0, Some(100_000_000), dec!(1)),
            tier(contract_id, Dimension::Spans, 100_000_000, Some(200_000_000), dec!(0.75)),
            tier(contract_id, Dimension::Spans, 200_000_000, None, dec!(0.50)),
        ];
        let pricing = pricing(p, tiers);
        let usage = UsageSummary {
            spans: 300_000_000,
            bytes: 0,
            scores: 0,
        };
        let correct = calculate_cost_with_tiers(&pricing, usage).spans.cost;

        // Relative-coordinate (buggy) computation: residual = usage - free_tier,
        // tiers walked from 0 against the residual directly.
        let residual = usage.spans - pricing.free_spans;
        let mut buggy_cost = Decimal::ZERO;
        for t in pricing.tiers_for(Dimension::Spans) {
            let tier_max = t.tier_max.unwrap_or(residual);
            let start = t.tier_min.min(residual);
            let end = residual.min(tier_max);
            if start >= end {
                continue;
            }
            let units = Decimal::from(end - start) / Decimal::from(Dimension::Spans.unit_size());
            buggy_cost += units * t.price_per_unit;
        }

        assert_ne!(correct, buggy_cost);
    }
}
