use thiserror::Error;

/// Domain-level error kinds shared by every store and service in the billing core.
///
/// Infrastructure failures are folded into `Internal` via `From<sqlx::Error>` so that
/// callers never have to match on a raw driver error; the original is preserved for
/// logging at the point of conversion.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("organization billing record not found: {0}")]
    BillingNotFound(String),

    #[error("budget not found: {0}")]
    BudgetNotFound(String),

    #[error("alert not found: {0}")]
    AlertNotFound(String),

    #[error("volume discount tier not found: {0}")]
    TierNotFound(String),

    #[error("organization not found: {0}")]
    OrgNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("organization {0} already has an active contract")]
    ContractAlreadyActive(String),

    #[error("organization billing already provisioned: {0}")]
    BillingAlreadyExists(String),

    #[error("invalid contract dates: {0}")]
    InvalidContractDates(String),

    #[error("invalid volume tier configuration: {0}")]
    InvalidTierConfig(String),

    #[error("invalid budget configuration: {0}")]
    InvalidBudgetConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Internal(err.to_string())
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;
