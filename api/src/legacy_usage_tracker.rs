//! Legacy usage tracker (superseded, retained for compatibility — §4.8).
//!
//! Mirrors the pre-existing monthly `UsageRecord`/`UsageQuota` path this
//! service coexists with: an in-memory quota cache keyed by org with a
//! 5-minute per-entry TTL, swept by a 1-minute background tick that also
//! performs month-rollover resets. Quota mutations are pushed onto a bounded
//! in-memory queue (drop-oldest on overflow) and drained by a single
//! background consumer, replacing the naive fire-and-forget task spawn the
//! design notes (§9) flag as a defect — shutdown here is an observable,
//! awaited join rather than an abandoned task.
//!
//! The queue is a plain `VecDeque` behind a `std::sync::Mutex` rather than an
//! `mpsc` channel: tokio's `mpsc::Sender::try_send` hands back the very
//! mutation that just failed to enqueue on `Full`, it cannot evict the
//! channel's existing head, so a channel can only ever implement
//! drop-newest. A manually bounded deque lets `record` pop the front entry
//! itself when the queue is already at capacity.
//!
//! New code must not route cost-bearing decisions through this path; it
//! exists only so the coexisting legacy quota surface keeps working
//! untouched.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::sync::{Notify, RwLock};

const ENTRY_TTL: Duration = Duration::from_secs(5 * 60);
const SYNC_TICK: Duration = Duration::from_secs(60);
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct CachedQuota {
    requests: i64,
    tokens: i64,
    cost: Decimal,
    period_month: u32,
    inserted_at: Instant,
}

#[derive(Debug, Clone)]
pub struct QuotaMutation {
    pub org_id: String,
    pub requests_delta: i64,
    pub tokens_delta: i64,
    pub cost_delta: Decimal,
}

struct Inner {
    cache: RwLock<HashMap<String, CachedQuota>>,
    queue: Mutex<VecDeque<QuotaMutation>>,
    work_available: Notify,
    stopping: AtomicBool,
}

/// Handle to the running tracker: `record` enqueues mutations for the
/// background consumer, `shutdown` lets callers observe a clean stop.
#[derive(Clone)]
pub struct UsageTracker {
    inner: Arc<Inner>,
}

impl UsageTracker {
    /// Spawns the background sync tick and the mutation consumer, both bound
    /// to `pool`, and returns a handle plus a shutdown future the caller can
    /// await to guarantee both tasks have actually stopped.
    pub fn spawn(pool: PgPool) -> (Self, impl std::future::Future<Output = ()>) {
        let inner = Arc::new(Inner {
            cache: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
            work_available: Notify::new(),
            stopping: AtomicBool::new(false),
        });

        let consumer_inner = inner.clone();
        let consumer_pool = pool.clone();
        let consumer = tokio::spawn(run_consumer(consumer_inner, consumer_pool));

        let sync_inner = inner.clone();
        let sync = tokio::spawn(run_sync_tick(sync_inner, pool));

        let tracker = Self { inner: inner.clone() };
        let shutdown = async move {
            inner.stopping.store(true, Ordering::SeqCst);
            inner.work_available.notify_waiters();
            let _ = sync.await;
            let _ = consumer.await;
        };
        (tracker, shutdown)
    }

    /// Enqueues a quota mutation. When the queue is already at capacity the
    /// oldest queued mutation is dropped to make room rather than blocking
    /// the caller or growing unbounded.
    pub fn record(&self, mutation: QuotaMutation) {
        {
            let mut queue = self.inner.queue.lock().unwrap();
            if queue.len() >= QUEUE_CAPACITY {
                if let Some(dropped) = queue.pop_front() {
                    tracing::warn!(org_id = %dropped.org_id, "legacy usage tracker queue full, dropping oldest");
                    crate::metrics::LEGACY_TRACKER_DROPPED.inc();
                }
            }
            queue.push_back(mutation);
        }
        crate::metrics::LEGACY_TRACKER_MUTATIONS.inc();
        self.inner.work_available.notify_one();
    }

    pub async fn cached_cost(&self, org_id: &str) -> Option<Decimal> {
        let cache = self.inner.cache.read().await;
        cache.get(org_id).filter(|e| e.inserted_at.elapsed() < ENTRY_TTL).map(|e| e.cost)
    }
}

async fn run_consumer(inner: Arc<Inner>, pool: PgPool) {
    loop {
        drain_queue(&inner, &pool).await;

        if inner.stopping.load(Ordering::SeqCst) {
            drain_queue(&inner, &pool).await;
            break;
        }

        inner.work_available.notified().await;
    }
}

async fn drain_queue(inner: &Arc<Inner>, pool: &PgPool) {
    loop {
        let mutation = { inner.queue.lock().unwrap().pop_front() };
        let Some(mutation) = mutation else {
            break;
        };

        if let Err(err) = apply_mutation(pool, &mutation).await {
            tracing::error!(org_id = %mutation.org_id, error = %err, "failed to persist legacy quota mutation");
            continue;
        }

        let now_month = chrono::Utc::now().format("%Y%m").to_string().parse::<u32>().unwrap_or(0);
        let mut cache = inner.cache.write().await;
        let entry = cache.entry(mutation.org_id.clone()).or_insert(CachedQuota {
            requests: 0,
            tokens: 0,
            cost: Decimal::ZERO,
            period_month: now_month,
            inserted_at: Instant::now(),
        });
        entry.requests += mutation.requests_delta;
        entry.tokens += mutation.tokens_delta;
        entry.cost += mutation.cost_delta;
        entry.inserted_at = Instant::now();
    }
}

async fn apply_mutation(pool: &PgPool, mutation: &QuotaMutation) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO usage_records (id, org_id, period_start, requests, tokens, cost)
        VALUES ($1, $2, date_trunc('month', NOW()), $3, $4, $5)
        "#,
    )
    .bind(shared::Id::new())
    .bind(&mutation.org_id)
    .bind(mutation.requests_delta)
    .bind(mutation.tokens_delta)
    .bind(mutation.cost_delta)
    .execute(pool)
    .await?;
    Ok(())
}

/// Runs until the tracker is shut down, on each tick purging expired entries
/// and resetting any entry whose cached `period_month` no longer matches the
/// current month.
async fn run_sync_tick(inner: Arc<Inner>, _pool: PgPool) {
    let mut ticker = tokio::time::interval(SYNC_TICK);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if inner.stopping.load(Ordering::SeqCst) {
                    tracing::info!("legacy usage tracker sync tick shutting down");
                    break;
                }
                let now_month = chrono::Utc::now().format("%Y%m").to_string().parse::<u32>().unwrap_or(0);
                let mut cache = inner.cache.write().await;
                cache.retain(|_, entry| entry.inserted_at.elapsed() < ENTRY_TTL);
                for entry in cache.values_mut() {
                    if entry.period_month != now_month {
                        entry.requests = 0;
                        entry.tokens = 0;
                        entry.cost = Decimal::ZERO;
                        entry.period_month = now_month;
                    }
                }
            }
            _ = inner.work_available.notified() => {
                if inner.stopping.load(Ordering::SeqCst) {
                    tracing::info!("legacy usage tracker sync tick shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_inner() -> Inner {
        Inner {
            cache: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            work_available: Notify::new(),
            stopping: AtomicBool::new(false),
        }
    }

    #[tokio::test]
    async fn cached_cost_is_none_before_any_mutation() {
        let inner = test_inner();
        let cache = inner.cache.read().await;
        assert!(cache.get("org_1").is_none());
    }

    fn mutation(org_id: &str) -> QuotaMutation {
        QuotaMutation {
            org_id: org_id.to_string(),
            requests_delta: 1,
            tokens_delta: 10,
            cost_delta: Decimal::ZERO,
        }
    }

    #[test]
    fn record_drops_oldest_when_queue_is_full() {
        let inner = Arc::new(test_inner());
        let tracker = UsageTracker { inner: inner.clone() };

        for i in 0..QUEUE_CAPACITY {
            tracker.record(mutation(&format!("org_{i}")));
        }
        // Queue is now at capacity with org_0..org_{QUEUE_CAPACITY-1}; one more
        // push must evict the oldest entry (org_0), not the one just enqueued.
        tracker.record(mutation("org_overflow"));

        let queue = inner.queue.lock().unwrap();
        assert_eq!(queue.len(), QUEUE_CAPACITY);
        assert_eq!(queue.front().unwrap().org_id, "org_1");
        assert_eq!(queue.back().unwrap().org_id, "org_overflow");
    }
}
