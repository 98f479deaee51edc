use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::ids::Id;

/// One of the three billable signals this core meters. `unit_size` is the divisor
/// applied before a per-unit price is multiplied in, e.g. spans are priced per
/// 100,000 and bytes per gibibyte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_dimension", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Spans,
    Bytes,
    Scores,
}

impl Dimension {
    /// Divisor applied to raw usage before multiplying by a per-unit price.
    pub fn unit_size(self) -> i64 {
        match self {
            Dimension::Spans => 100_000,
            Dimension::Bytes => 1 << 30, // 1 GiB
            Dimension::Scores => 1_000,
        }
    }

    pub fn all() -> [Dimension; 3] {
        [Dimension::Spans, Dimension::Bytes, Dimension::Scores]
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dimension::Spans => "spans",
            Dimension::Bytes => "bytes",
            Dimension::Scores => "scores",
        };
        write!(f, "{s}")
    }
}

/// A dimension an alert can be raised against; shares `Dimension` plus the
/// aggregate `cost` figure, which has no corresponding usage counter of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_dimension", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertDimension {
    Spans,
    Bytes,
    Scores,
    Cost,
}

impl std::fmt::Display for AlertDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertDimension::Spans => "spans",
            AlertDimension::Bytes => "bytes",
            AlertDimension::Scores => "scores",
            AlertDimension::Cost => "cost",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contract_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contract_history_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContractHistoryAction {
    Created,
    Updated,
    Cancelled,
    Expired,
    PricingChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "budget_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Monthly,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

/// A billing plan. Free allowances are always present; `nil` prices mean the
/// dimension is unlimited-free and cannot be billed past the allowance (used by
/// the free plan).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Id,
    pub name: String,
    pub is_active: bool,
    pub is_default: bool,
    pub free_spans: i64,
    pub price_per_100k_spans: Option<Decimal>,
    pub free_gb: Decimal,
    pub price_per_gb: Option<Decimal>,
    pub free_scores: i64,
    pub price_per_1k_scores: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An enterprise contract. Custom fields are `None` unless the contract overrides
/// the base plan for that dimension.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub id: Id,
    pub org_id: String,
    pub contract_name: String,
    pub contract_number: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub currency: String,
    pub minimum_commit_amount: Option<Decimal>,
    pub account_owner: String,
    pub sales_rep_email: String,
    pub status: ContractStatus,
    pub custom_free_spans: Option<i64>,
    pub custom_price_per_100k_spans: Option<Decimal>,
    pub custom_free_gb: Option<Decimal>,
    pub custom_price_per_gb: Option<Decimal>,
    pub custom_free_scores: Option<i64>,
    pub custom_price_per_1k_scores: Option<Decimal>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VolumeDiscountTier {
    pub id: Id,
    pub contract_id: Id,
    pub dimension: Dimension,
    pub tier_min: i64,
    pub tier_max: Option<i64>,
    pub price_per_unit: Decimal,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractHistoryEntry {
    pub id: Id,
    pub contract_id: Id,
    pub action: ContractHistoryAction,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub changes: serde_json::Value,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationBilling {
    pub org_id: String,
    pub plan_id: Id,
    pub billing_cycle_start: DateTime<Utc>,
    pub billing_cycle_anchor_day: i32,
    pub current_period_spans: i64,
    pub current_period_bytes: i64,
    pub current_period_scores: i64,
    pub current_period_cost: Decimal,
    pub free_spans_remaining: i64,
    pub free_bytes_remaining: i64,
    pub free_scores_remaining: i64,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageBudget {
    pub id: Id,
    pub org_id: String,
    pub project_id: Option<Id>,
    pub name: String,
    pub budget_type: BudgetType,
    pub span_limit: Option<i64>,
    pub bytes_limit: Option<i64>,
    pub score_limit: Option<i64>,
    pub cost_limit: Option<Decimal>,
    pub current_spans: i64,
    pub current_bytes: i64,
    pub current_scores: i64,
    pub current_cost: Decimal,
    pub alert_thresholds: Vec<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageAlert {
    pub id: Id,
    pub budget_id: Option<Id>,
    pub org_id: String,
    pub project_id: Option<Id>,
    pub alert_threshold: i64,
    pub dimension: AlertDimension,
    pub severity: AlertSeverity,
    pub threshold_value: i64,
    pub actual_value: i64,
    pub percent_used: Decimal,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notification_sent: bool,
}

/// Resolved, in-memory pricing for an organization: plan defaults merged with the
/// active contract's overrides. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePricing {
    pub org_id: String,
    pub base_plan: Plan,
    pub contract: Option<Contract>,
    pub free_spans: i64,
    pub price_per_100k_spans: Decimal,
    pub free_gb: Decimal,
    pub price_per_gb: Decimal,
    pub free_scores: i64,
    pub price_per_1k_scores: Decimal,
    pub has_volume_tiers: bool,
    pub volume_tiers: Vec<VolumeDiscountTier>,
}

impl EffectivePricing {
    pub fn tiers_for(&self, dimension: Dimension) -> Vec<&VolumeDiscountTier> {
        let mut tiers: Vec<&VolumeDiscountTier> = self
            .volume_tiers
            .iter()
            .filter(|t| t.dimension == dimension)
            .collect();
        tiers.sort_by_key(|t| t.tier_min);
        tiers
    }

    pub fn free_tier_for(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Spans => self.free_spans,
            Dimension::Bytes => {
                let bytes = self.free_gb * Decimal::from(Dimension::Bytes.unit_size());
                bytes.trunc().to_string().parse().unwrap_or(0)
            }
            Dimension::Scores => self.free_scores,
        }
    }

    pub fn flat_price_for(&self, dimension: Dimension) -> Decimal {
        match dimension {
            Dimension::Spans => self.price_per_100k_spans,
            Dimension::Bytes => self.price_per_gb,
            Dimension::Scores => self.price_per_1k_scores,
        }
    }
}

/// Usage summary pulled from the columnar aggregate store for a billing window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub spans: i64,
    pub bytes: i64,
    pub scores: i64,
}

/// A single hourly or daily bucket row read back from the aggregate store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageBucket {
    pub org_id: String,
    pub project_id: Option<String>,
    pub bucket_time: DateTime<Utc>,
    pub span_count: i64,
    pub bytes_processed: i64,
    pub score_count: i64,
    pub ai_provider_cost: Decimal,
}
