//! Relational store for [`VolumeDiscountTier`] rows (C5: VolumeTierStore).

use shared::{BillingError, BillingResult, Dimension, Id, VolumeDiscountTier};
use sqlx::PgExecutor;
use std::collections::HashMap;

#[derive(Clone)]
pub struct VolumeTierStore;

impl VolumeTierStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_contract(
        &self,
        exec: impl PgExecutor<'_>,
        contract_id: Id,
    ) -> BillingResult<Vec<VolumeDiscountTier>> {
        let rows = sqlx::query_as::<_, VolumeDiscountTier>(
            "SELECT * FROM volume_discount_tiers WHERE contract_id = $1 ORDER BY dimension, tier_min",
        )
        .bind(contract_id)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    /// Deletes the existing tier set for a contract. Callers replacing a tier
    /// set call this and then [`insert`](Self::insert) each new row inside the
    /// same transaction — see `contract_lifecycle::update_volume_tiers`.
    pub async fn delete_for_contract(&self, exec: impl PgExecutor<'_>, contract_id: Id) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM volume_discount_tiers WHERE contract_id = $1")
            .bind(contract_id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn insert(&self, exec: impl PgExecutor<'_>, tier: &VolumeDiscountTier) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO volume_discount_tiers (
                id, contract_id, dimension, tier_min, tier_max, price_per_unit, priority, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tier.id)
        .bind(tier.contract_id)
        .bind(tier.dimension)
        .bind(tier.tier_min)
        .bind(tier.tier_max)
        .bind(tier.price_per_unit)
        .bind(tier.priority)
        .bind(tier.created_at)
        .execute(exec)
        .await?;
        Ok(())
    }
}

impl Default for VolumeTierStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates a per-dimension tier set: the first tier (sorted by `tier_min`)
/// starts at 0, consecutive tiers are contiguous, and `tier_max = None` appears
/// only on the last tier. Runs before any write.
pub fn validate_tier_set(tiers: &[VolumeDiscountTier]) -> BillingResult<()> {
    let mut by_dimension: HashMap<Dimension, Vec<&VolumeDiscountTier>> = HashMap::new();
    for tier in tiers {
        by_dimension.entry(tier.dimension).or_default().push(tier);
    }

    for (dimension, mut group) in by_dimension {
        group.sort_by_key(|t| t.tier_min);

        let first = group[0];
        if first.tier_min != 0 {
            return Err(BillingError::InvalidTierConfig(format!(
                "{dimension}: first tier must start at 0, got {}",
                first.tier_min
            )));
        }

        for (i, tier) in group.iter().enumerate() {
            if let Some(tier_max) = tier.tier_max {
                if tier_max <= tier.tier_min {
                    return Err(BillingError::InvalidTierConfig(format!(
                        "{dimension}: tier_max {tier_max} must exceed tier_min {}",
                        tier.tier_min
                    )));
                }
            } else if i != group.len() - 1 {
                return Err(BillingError::InvalidTierConfig(format!(
                    "{dimension}: only the last tier may be unbounded"
                )));
            }

            if i > 0 {
                let prev = group[i - 1];
                let prev_max = prev.tier_max.ok_or_else(|| {
                    BillingError::InvalidTierConfig(format!(
                        "{dimension}: tier before {} is unbounded but is not last",
                        tier.tier_min
                    ))
                })?;
                if prev_max != tier.tier_min {
                    return Err(BillingError::InvalidTierConfig(format!(
                        "{dimension}: gap or overlap between tiers at {prev_max} and {}",
                        tier.tier_min
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn tier(dimension: Dimension, min: i64, max: Option<i64>) -> VolumeDiscountTier {
        VolumeDiscountTier {
            id: Id::new(),
            contract_id: Id::new(),
            dimension,
            tier_min: min,
            tier_max: max,
            price_per_unit: dec!(1.0),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn accepts_contiguous_tiers_ending_unbounded() {
        let tiers = vec![
            tier(Dimension::Spans, 0, Some(100)),
            tier(Dimension::Spans, 100, Some(200)),
            tier(Dimension::Spans, 200, None),
        ];
        assert!(validate_tier_set(&tiers).is_ok());
    }

    #[test]
    fn rejects_first_tier_not_starting_at_zero() {
        let tiers = vec![tier(Dimension::Spans, 10, None)];
        assert!(validate_tier_set(&tiers).is_err());
    }

    #[test]
    fn rejects_gap_between_tiers() {
        let tiers = vec![
            tier(Dimension::Spans, 0, Some(100)),
            tier(Dimension::Spans, 150, None),
        ];
        assert!(validate_tier_set(&tiers).is_err());
    }

    #[test]
    fn rejects_unbounded_tier_not_last() {
        let tiers = vec![
            tier(Dimension::Spans, 0, None),
            tier(Dimension::Spans, 100, Some(200)),
        ];
        assert!(validate_tier_set(&tiers).is_err());
    }

    #[test]
    fn dimensions_are_validated_independently() {
        let tiers = vec![
            tier(Dimension::Spans, 0, None),
            tier(Dimension::Bytes, 0, Some(100)),
            tier(Dimension::Bytes, 100, None),
        ];
        assert!(validate_tier_set(&tiers).is_ok());
    }
}
