use crate::budget_service::BudgetService;
use crate::cache::{CacheConfig, CacheLayer};
use crate::contract_lifecycle::ContractLifecycle;
use crate::legacy_usage_tracker::UsageTracker;
use crate::pricing_resolver::PricingResolver;
use crate::usage_overview_service::UsageOverviewService;
use prometheus::Registry;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers. The four billing services are
/// thin, cheaply-cloneable wrappers around pure functions and a handful of
/// prepared queries — they hold no connection state of their own and always
/// take `&state.db` (or a transaction) explicitly, per §4.7.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub started_at: Instant,
    pub cache: Arc<CacheLayer>,
    pub registry: Registry,
    pub pricing: PricingResolver,
    pub contracts: ContractLifecycle,
    pub usage: UsageOverviewService,
    pub budgets: BudgetService,
    pub legacy_tracker: UsageTracker,
}

impl AppState {
    pub fn new(db: PgPool, registry: Registry, legacy_tracker: UsageTracker) -> Self {
        let config = CacheConfig::from_env();
        let cache = Arc::new(CacheLayer::new(config));
        Self {
            db,
            started_at: Instant::now(),
            pricing: PricingResolver::new(cache.clone()),
            contracts: ContractLifecycle::new(cache.clone()),
            usage: UsageOverviewService::new(cache.clone()),
            budgets: BudgetService::new(),
            legacy_tracker,
            cache,
            registry,
        }
    }
}
