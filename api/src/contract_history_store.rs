//! Append-only store for [`ContractHistoryEntry`] rows, the audit trail half
//! of C4 (ContractStore). Never updated or deleted, only appended to and read
//! back in `changed_at` order.

use shared::{BillingResult, ContractHistoryAction, ContractHistoryEntry, Id};
use sqlx::PgExecutor;

#[derive(Clone)]
pub struct ContractHistoryStore;

impl ContractHistoryStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn append(
        &self,
        exec: impl PgExecutor<'_>,
        contract_id: Id,
        action: ContractHistoryAction,
        changed_by: &str,
        changes: serde_json::Value,
        reason: Option<String>,
    ) -> BillingResult<Id> {
        let id = Id::new();
        sqlx::query(
            r#"
            INSERT INTO contract_history (id, contract_id, action, changed_by, changed_at, changes, reason)
            VALUES ($1, $2, $3, $4, NOW(), $5, $6)
            "#,
        )
        .bind(id)
        .bind(contract_id)
        .bind(action)
        .bind(changed_by)
        .bind(changes)
        .bind(reason)
        .execute(exec)
        .await?;
        Ok(id)
    }

    pub async fn list_for_contract(
        &self,
        exec: impl PgExecutor<'_>,
        contract_id: Id,
    ) -> BillingResult<Vec<ContractHistoryEntry>> {
        let rows = sqlx::query_as::<_, ContractHistoryEntry>(
            "SELECT * FROM contract_history WHERE contract_id = $1 ORDER BY changed_at ASC",
        )
        .bind(contract_id)
        .fetch_all(exec)
        .await?;
        Ok(rows)
    }
}

impl Default for ContractHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
