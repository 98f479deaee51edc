//! ContractLifecycle (C11): create/activate/cancel/expire a contract and
//! manage its volume tiers, each step appending to the append-only
//! [`ContractHistoryEntry`] audit trail.
//!
//! Every multi-write path here runs generic over `impl PgExecutor<'_>`, the
//! same functions a bare `&PgPool` or a `&mut Transaction` both satisfy —
//! callers that need atomicity open a `Transaction` and thread `&mut *tx`
//! through the sequence; a `?`-propagated error drops it, rolling back.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use shared::{
    BillingError, BillingResult, Contract, ContractHistoryAction, ContractHistoryEntry, ContractStatus,
    Id, VolumeDiscountTier,
};
use sqlx::{PgExecutor, PgPool};

use crate::{
    cache::CacheLayer,
    contract_history_store::ContractHistoryStore,
    contract_store::ContractStore,
    org_billing_store::OrgBillingStore,
    volume_tier_store::{self, VolumeTierStore},
};

#[derive(Clone)]
pub struct ContractLifecycle {
    contracts: ContractStore,
    history: ContractHistoryStore,
    tiers: VolumeTierStore,
    org_billing: OrgBillingStore,
    cache: Arc<CacheLayer>,
}

pub struct NewContract {
    pub org_id: String,
    pub contract_name: String,
    pub contract_number: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub currency: String,
    pub minimum_commit_amount: Option<rust_decimal::Decimal>,
    pub account_owner: String,
    pub sales_rep_email: String,
    pub custom_free_spans: Option<i64>,
    pub custom_price_per_100k_spans: Option<rust_decimal::Decimal>,
    pub custom_free_gb: Option<rust_decimal::Decimal>,
    pub custom_price_per_gb: Option<rust_decimal::Decimal>,
    pub custom_free_scores: Option<i64>,
    pub custom_price_per_1k_scores: Option<rust_decimal::Decimal>,
    pub created_by: String,
    pub notes: Option<String>,
}

impl ContractLifecycle {
    pub fn new(cache: Arc<CacheLayer>) -> Self {
        Self {
            contracts: ContractStore::new(),
            history: ContractHistoryStore::new(),
            tiers: VolumeTierStore::new(),
            org_billing: OrgBillingStore::new(),
            cache,
        }
    }

    /// Validates the minimum-duration invariant, requires an
    /// `OrganizationBilling` row for `org_id` to exist, inserts the contract in
    /// `draft` status, and records a `created` history entry.
    pub async fn create(&self, exec: impl PgExecutor<'_> + Copy, new: NewContract) -> BillingResult<Contract> {
        validate_dates(new.start_date, new.end_date)?;

        self.org_billing
            .try_get(exec, &new.org_id)
            .await?
            .ok_or_else(|| BillingError::OrgNotFound(new.org_id.clone()))?;

        let now = Utc::now();
        let contract = Contract {
            id: Id::new(),
            org_id: new.org_id,
            contract_name: new.contract_name,
            contract_number: new.contract_number,
            start_date: new.start_date,
            end_date: new.end_date,
            currency: new.currency,
            minimum_commit_amount: new.minimum_commit_amount,
            account_owner: new.account_owner,
            sales_rep_email: new.sales_rep_email,
            status: ContractStatus::Draft,
            custom_free_spans: new.custom_free_spans,
            custom_price_per_100k_spans: new.custom_price_per_100k_spans,
            custom_free_gb: new.custom_free_gb,
            custom_price_per_gb: new.custom_price_per_gb,
            custom_free_scores: new.custom_free_scores,
            custom_price_per_1k_scores: new.custom_price_per_1k_scores,
            created_by: new.created_by.clone(),
            created_at: now,
            updated_at: now,
            notes: new.notes,
        };

        self.contracts.insert(exec, &contract).await?;
        self.history
            .append(
                exec,
                contract.id,
                ContractHistoryAction::Created,
                &new.created_by,
                json!({ "contract_number": contract.contract_number, "status": "draft" }),
                None,
            )
            .await?;

        Ok(contract)
    }

    /// Activates a draft contract. Must run inside a `Transaction` passed as
    /// `exec`: it reads the prior active contract for the org (if any),
    /// tombstones it to `expired`, flips the target to `active`, and appends
    /// two history entries. A concurrent second activator's commit is rejected
    /// by `idx_contracts_one_active_per_org`; [`ContractStore::activate`] maps
    /// that violation to [`BillingError::ContractAlreadyActive`], which this
    /// function surfaces unchanged as the caller's `Conflict`.
    pub async fn activate(&self, tx: &mut sqlx::PgConnection, contract_id: Id, user_id: &str) -> BillingResult<Contract> {
        let contract = self.contracts.get(&mut *tx, contract_id).await?;
        if contract.status != ContractStatus::Draft {
            return Err(BillingError::InvalidContractDates(format!(
                "contract {contract_id} must be in draft status to activate, was {:?}",
                contract.status
            )));
        }

        if let Some(prior) = self.contracts.get_active(&mut *tx, &contract.org_id).await? {
            self.contracts
                .set_status(&mut *tx, prior.id, ContractStatus::Expired)
                .await?;
            self.history
                .append(
                    &mut *tx,
                    prior.id,
                    ContractHistoryAction::Expired,
                    user_id,
                    json!({ "status": "expired" }),
                    Some("Automatically expired due to new contract activation".into()),
                )
                .await?;
        }

        self.contracts.activate(&mut *tx, contract_id, &contract.org_id).await?;
        self.history
            .append(
                &mut *tx,
                contract_id,
                ContractHistoryAction::Updated,
                user_id,
                json!({ "status": "active" }),
                Some("Contract activated".into()),
            )
            .await?;

        let mut activated = contract;
        activated.status = ContractStatus::Active;
        self.cache.invalidate(&activated.org_id, crate::pricing_resolver::CACHE_KEY).await;
        Ok(activated)
    }

    pub async fn cancel(&self, exec: impl PgExecutor<'_> + Copy, contract_id: Id, reason: &str, user_id: &str) -> BillingResult<Contract> {
        let contract = self.contracts.get(exec, contract_id).await?;
        if contract.status == ContractStatus::Cancelled {
            return Err(BillingError::InvalidContractDates(format!(
                "contract {contract_id} is already cancelled"
            )));
        }

        self.contracts.set_status(exec, contract_id, ContractStatus::Cancelled).await?;
        self.history
            .append(
                exec,
                contract_id,
                ContractHistoryAction::Cancelled,
                user_id,
                json!({ "status": "cancelled" }),
                Some(reason.to_string()),
            )
            .await?;

        let mut cancelled = contract;
        cancelled.status = ContractStatus::Cancelled;
        self.cache.invalidate(&cancelled.org_id, crate::pricing_resolver::CACHE_KEY).await;
        Ok(cancelled)
    }

    pub async fn expire(&self, exec: impl PgExecutor<'_> + Copy, contract_id: Id, user_id: &str) -> BillingResult<Contract> {
        let contract = self.contracts.get(exec, contract_id).await?;
        self.contracts.set_status(exec, contract_id, ContractStatus::Expired).await?;
        self.history
            .append(
                exec,
                contract_id,
                ContractHistoryAction::Expired,
                user_id,
                json!({ "status": "expired" }),
                Some("Contract reached its end date".into()),
            )
            .await?;

        let mut expired = contract;
        expired.status = ContractStatus::Expired;
        self.cache.invalidate(&expired.org_id, crate::pricing_resolver::CACHE_KEY).await;
        Ok(expired)
    }

    /// Validates the new tier set, then inserts it for a contract with no
    /// prior tiers. Use [`Self::update_volume_tiers`] to replace an existing
    /// set.
    pub async fn add_volume_tiers(
        &self,
        tx: &mut sqlx::PgConnection,
        contract_id: Id,
        new_tiers: Vec<VolumeDiscountTier>,
        user_id: &str,
    ) -> BillingResult<Vec<VolumeDiscountTier>> {
        volume_tier_store::validate_tier_set(&new_tiers)?;

        for tier in &new_tiers {
            self.tiers.insert(&mut *tx, tier).await?;
        }

        self.log_pricing_changed(&mut *tx, contract_id, &new_tiers, user_id).await?;
        let contract = self.contracts.get(&mut *tx, contract_id).await?;
        self.cache.invalidate(&contract.org_id, crate::pricing_resolver::CACHE_KEY).await;
        Ok(new_tiers)
    }

    /// Validates the new tier set *before* opening any write, then deletes the
    /// contract's prior tier set and inserts the new one.
    pub async fn update_volume_tiers(
        &self,
        tx: &mut sqlx::PgConnection,
        contract_id: Id,
        new_tiers: Vec<VolumeDiscountTier>,
        user_id: &str,
    ) -> BillingResult<Vec<VolumeDiscountTier>> {
        volume_tier_store::validate_tier_set(&new_tiers)?;

        self.tiers.delete_for_contract(&mut *tx, contract_id).await?;
        for tier in &new_tiers {
            self.tiers.insert(&mut *tx, tier).await?;
        }

        self.log_pricing_changed(&mut *tx, contract_id, &new_tiers, user_id).await?;
        let contract = self.contracts.get(&mut *tx, contract_id).await?;
        self.cache.invalidate(&contract.org_id, crate::pricing_resolver::CACHE_KEY).await;
        Ok(new_tiers)
    }

    async fn log_pricing_changed(
        &self,
        exec: impl PgExecutor<'_>,
        contract_id: Id,
        tiers: &[VolumeDiscountTier],
        user_id: &str,
    ) -> BillingResult<()> {
        let dimensions: std::collections::BTreeSet<String> =
            tiers.iter().map(|t| t.dimension.to_string()).collect();
        self.history
            .append(
                exec,
                contract_id,
                ContractHistoryAction::PricingChanged,
                user_id,
                json!({ "tier_count": tiers.len(), "dimensions": dimensions }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Active contracts whose `end_date` falls within `days` days of now.
    /// `days` may be negative (already-expired); timestamp-based, not
    /// date-truncated, so a daily 00:00 worker catches contracts that expired
    /// mid-day yesterday.
    pub async fn get_expiring(&self, exec: impl PgExecutor<'_>, days: i64) -> BillingResult<Vec<Contract>> {
        let horizon = Utc::now() + ChronoDuration::hours(days * 24);
        self.contracts.get_expiring(exec, horizon).await
    }

    pub async fn get_history(&self, exec: impl PgExecutor<'_>, contract_id: Id) -> BillingResult<Vec<ContractHistoryEntry>> {
        self.history.list_for_contract(exec, contract_id).await
    }
}

fn validate_dates(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> BillingResult<()> {
    if let Some(end) = end {
        if end < start + ChronoDuration::days(1) {
            return Err(BillingError::InvalidContractDates(
                "end_date must be at least one day after start_date".into(),
            ));
        }
    }
    Ok(())
}

/// Runs `activate` inside a fresh transaction on `pool`, committing on success
/// and mapping the partial-unique-index race to `Conflict` on the caller's
/// behalf. HTTP handlers call this; the bare `activate` method above is what
/// tests exercise directly against an open transaction.
pub async fn activate_in_transaction(
    lifecycle: &ContractLifecycle,
    pool: &PgPool,
    contract_id: Id,
    user_id: &str,
) -> BillingResult<Contract> {
    let mut tx = pool.begin().await?;
    let result = lifecycle.activate(&mut tx, contract_id, user_id).await?;
    tx.commit().await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_end_date_equal_to_start_date() {
        let start = Utc::now();
        assert!(validate_dates(start, Some(start)).is_err());
    }

    #[test]
    fn accepts_end_date_one_day_after_start() {
        let start = Utc::now();
        assert!(validate_dates(start, Some(start + ChronoDuration::days(1))).is_ok());
    }

    #[test]
    fn accepts_no_end_date() {
        assert!(validate_dates(Utc::now(), None).is_ok());
    }
}
