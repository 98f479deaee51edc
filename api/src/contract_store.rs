//! Relational store for [`Contract`] rows (C4: ContractStore). At most one
//! active contract per org is enforced by the database partial unique index
//! `idx_contracts_one_active_per_org`; this store surfaces its violation as
//! [`BillingError::ContractAlreadyActive`].

use chrono::{DateTime, Utc};
use shared::{BillingError, BillingResult, Contract, ContractStatus, Id};
use sqlx::PgExecutor;

#[derive(Clone)]
pub struct ContractStore;

impl ContractStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn get(&self, exec: impl PgExecutor<'_>, id: Id) -> BillingResult<Contract> {
        sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(exec)
            .await?
            .ok_or_else(|| BillingError::ContractNotFound(id.to_string()))
    }

    pub async fn list_by_org(&self, exec: impl PgExecutor<'_>, org_id: &str) -> BillingResult<Vec<Contract>> {
        let rows = sqlx::query_as::<_, Contract>(
            "SELECT * FROM contracts WHERE org_id = $1 ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }

    /// The active contract for an org, if any. A missing active contract is a
    /// valid empty result, not an error — callers fall back to plan defaults.
    pub async fn get_active(&self, exec: impl PgExecutor<'_>, org_id: &str) -> BillingResult<Option<Contract>> {
        let row = sqlx::query_as::<_, Contract>(
            "SELECT * FROM contracts WHERE org_id = $1 AND status = 'active'",
        )
        .bind(org_id)
        .fetch_optional(exec)
        .await?;
        Ok(row)
    }

    pub async fn insert(&self, exec: impl PgExecutor<'_>, contract: &Contract) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, org_id, contract_name, contract_number, start_date, end_date,
                currency, minimum_commit_amount, account_owner, sales_rep_email, status,
                custom_free_spans, custom_price_per_100k_spans,
                custom_free_gb, custom_price_per_gb,
                custom_free_scores, custom_price_per_1k_scores,
                created_by, created_at, updated_at, notes
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            "#,
        )
        .bind(contract.id)
        .bind(&contract.org_id)
        .bind(&contract.contract_name)
        .bind(&contract.contract_number)
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(&contract.currency)
        .bind(contract.minimum_commit_amount)
        .bind(&contract.account_owner)
        .bind(&contract.sales_rep_email)
        .bind(contract.status)
        .bind(contract.custom_free_spans)
        .bind(contract.custom_price_per_100k_spans)
        .bind(contract.custom_free_gb)
        .bind(contract.custom_price_per_gb)
        .bind(contract.custom_free_scores)
        .bind(contract.custom_price_per_1k_scores)
        .bind(&contract.created_by)
        .bind(contract.created_at)
        .bind(contract.updated_at)
        .bind(&contract.notes)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        exec: impl PgExecutor<'_>,
        id: Id,
        status: ContractStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE contracts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(exec)
            .await?;
        Ok(())
    }

    /// Activates `id`, mapping a unique-index violation on the partial index to
    /// [`BillingError::ContractAlreadyActive`]. Callers are still responsible for
    /// tombstoning the prior active contract inside the same transaction — the
    /// index only arbitrates the final commit race.
    pub async fn activate(
        &self,
        exec: impl PgExecutor<'_>,
        id: Id,
        org_id: &str,
    ) -> BillingResult<()> {
        let result = sqlx::query(
            "UPDATE contracts SET status = 'active', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(exec)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err))
                if db_err.constraint() == Some("idx_contracts_one_active_per_org") =>
            {
                Err(BillingError::ContractAlreadyActive(org_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update_end_date(
        &self,
        exec: impl PgExecutor<'_>,
        id: Id,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE contracts SET end_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(end_date)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn get_expiring(
        &self,
        exec: impl PgExecutor<'_>,
        horizon: DateTime<Utc>,
    ) -> BillingResult<Vec<Contract>> {
        let rows = sqlx::query_as::<_, Contract>(
            r#"
            SELECT * FROM contracts
            WHERE status = 'active' AND end_date IS NOT NULL AND end_date <= $1
            ORDER BY end_date ASC
            "#,
        )
        .bind(horizon)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }
}

impl Default for ContractStore {
    fn default() -> Self {
        Self::new()
    }
}
