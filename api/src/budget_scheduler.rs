//! Background scheduler driving C10 (BudgetEvaluator) for every org carrying
//! an active budget, on a fixed interval (§4.5, §2 data flow). Mirrors the
//! host platform's own hourly background-job pattern: a `tokio::spawn`ed loop
//! ticking a `tokio::time::interval`, each run logged and isolated so one
//! org's failure doesn't stop the rest.

use std::time::Duration;

use sqlx::PgPool;

use crate::budget_service::BudgetService;

const DEFAULT_INTERVAL_SECS: u64 = 3600;

fn interval_from_env() -> Duration {
    let secs = std::env::var("BUDGET_CHECK_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    Duration::from_secs(secs)
}

/// Spawns the background budget-check task. Runs once per tick: lists every
/// org with at least one active budget, evaluates and persists alerts for
/// each. A single org's failure is logged and does not abort the run.
pub fn spawn_budget_check_task(pool: PgPool, budgets: BudgetService) {
    let interval_duration = interval_from_env();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval_duration);

        loop {
            interval.tick().await;
            tracing::info!("budget_scheduler: starting evaluation run");

            match budgets.list_org_ids_with_active_budgets(&pool).await {
                Ok(org_ids) => {
                    let mut alerts_emitted = 0usize;
                    for org_id in &org_ids {
                        match budgets.check_budgets(&pool, org_id).await {
                            Ok(alerts) => alerts_emitted += alerts.len(),
                            Err(err) => {
                                tracing::error!(org_id, error = %err, "budget_scheduler: evaluation failed for org");
                            }
                        }
                    }
                    tracing::info!(
                        orgs_evaluated = org_ids.len(),
                        alerts_emitted,
                        "budget_scheduler: evaluation run complete"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "budget_scheduler: failed to list orgs with active budgets");
                }
            }
        }
    });
}
