//! Pure budget evaluation: maps a budget and its current usage counters onto at
//! most one alert per dimension. Persistence and notification dispatch happen
//! outside this module; `BudgetEvaluator` only decides what should fire.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shared::{AlertDimension, AlertSeverity, AlertStatus, Id, UsageAlert, UsageBudget};

const CRITICAL_THRESHOLD_PCT: i64 = 100;
const WARNING_THRESHOLD_PCT: i64 = 80;

fn severity_for_threshold(threshold: i64) -> AlertSeverity {
    if threshold >= CRITICAL_THRESHOLD_PCT {
        AlertSeverity::Critical
    } else if threshold >= WARNING_THRESHOLD_PCT {
        AlertSeverity::Warning
    } else {
        AlertSeverity::Info
    }
}

struct DimensionUsage {
    dimension: AlertDimension,
    current: i64,
    limit: Option<i64>,
}

/// Evaluates a single budget against its current counters and returns the alerts
/// that should be emitted for this run. At most one alert per dimension — the
/// highest threshold crossed — matching the dedup rule a caller running this
/// repeatedly on unchanged usage must not duplicate.
pub fn evaluate_budget(budget: &UsageBudget) -> Vec<UsageAlert> {
    let mut thresholds = budget.alert_thresholds.clone();
    thresholds.sort_unstable();

    let cost_current_cents = (budget.current_cost * Decimal::from(100))
        .to_i64()
        .unwrap_or(i64::MAX);
    let cost_limit_cents = budget
        .cost_limit
        .map(|l| (l * Decimal::from(100)).to_i64().unwrap_or(i64::MAX));

    let dims = [
        DimensionUsage {
            dimension: AlertDimension::Spans,
            current: budget.current_spans,
            limit: budget.span_limit,
        },
        DimensionUsage {
            dimension: AlertDimension::Bytes,
            current: budget.current_bytes,
            limit: budget.bytes_limit,
        },
        DimensionUsage {
            dimension: AlertDimension::Scores,
            current: budget.current_scores,
            limit: budget.score_limit,
        },
        DimensionUsage {
            dimension: AlertDimension::Cost,
            current: cost_current_cents,
            limit: cost_limit_cents,
        },
    ];

    let mut alerts = Vec::new();
    for dim in &dims {
        let Some(limit) = dim.limit else { continue };
        if limit <= 0 {
            continue;
        }

        let percent_used = Decimal::from(dim.current) * Decimal::from(100) / Decimal::from(limit);
        let percent_used_whole = percent_used.to_i64().unwrap_or(0);

        // Highest threshold crossed, descending.
        if let Some(&threshold) = thresholds.iter().rev().find(|&&t| percent_used_whole >= t) {
            let threshold_value = match dim.dimension {
                AlertDimension::Cost => (Decimal::from(limit) * Decimal::from(threshold) / Decimal::from(100))
                    .to_i64()
                    .unwrap_or(limit),
                _ => (Decimal::from(limit) * Decimal::from(threshold) / Decimal::from(100))
                    .round()
                    .to_i64()
                    .unwrap_or(limit),
            };

            alerts.push(UsageAlert {
                id: Id::new(),
                budget_id: Some(budget.id),
                org_id: budget.org_id.clone(),
                project_id: budget.project_id,
                alert_threshold: threshold,
                dimension: dim.dimension,
                severity: severity_for_threshold(threshold),
                threshold_value,
                actual_value: dim.current,
                percent_used,
                status: AlertStatus::Triggered,
                triggered_at: Utc::now(),
                acknowledged_at: None,
                resolved_at: None,
                notification_sent: false,
            });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn budget() -> UsageBudget {
        UsageBudget {
            id: Id::new(),
            org_id: "org_1".into(),
            project_id: None,
            name: "monthly".into(),
            budget_type: shared::BudgetType::Monthly,
            span_limit: None,
            bytes_limit: None,
            score_limit: None,
            cost_limit: None,
            current_spans: 0,
            current_bytes: 0,
            current_scores: 0,
            current_cost: Decimal::ZERO,
            alert_thresholds: vec![50, 80, 100],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // S5: cost_limit=$100, current_cost=$82, thresholds=[50,80,100].
    #[test]
    fn s5_emits_single_warning_for_highest_threshold_crossed() {
        let mut b = budget();
        b.cost_limit = Some(dec!(100));
        b.current_cost = dec!(82);

        let alerts = evaluate_budget(&b);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].dimension, AlertDimension::Cost);
        assert_eq!(alerts[0].alert_threshold, 80);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn no_alert_below_lowest_threshold() {
        let mut b = budget();
        b.cost_limit = Some(dec!(100));
        b.current_cost = dec!(10);

        assert!(evaluate_budget(&b).is_empty());
    }

    #[test]
    fn critical_severity_at_or_above_100_percent() {
        let mut b = budget();
        b.span_limit = Some(1_000_000);
        b.current_spans = 1_200_000;

        let alerts = evaluate_budget(&b);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].alert_threshold, 100);
    }

    #[test]
    fn unset_limit_is_never_evaluated() {
        let b = budget();
        assert!(evaluate_budget(&b).is_empty());
    }

    #[test]
    fn emits_at_most_one_alert_per_dimension() {
        let mut b = budget();
        b.span_limit = Some(100);
        b.current_spans = 200;
        b.bytes_limit = Some(100);
        b.current_bytes = 60;

        let alerts = evaluate_budget(&b);
        assert_eq!(alerts.len(), 2);
        let spans_alerts: Vec<_> = alerts.iter().filter(|a| a.dimension == AlertDimension::Spans).collect();
        assert_eq!(spans_alerts.len(), 1);
    }
}
