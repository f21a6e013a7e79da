use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::LifecyclePolicy;
use crate::domain::{BankStatus, TransactionStatus};
use crate::ports::BankClient;
use crate::services::rate_limiter::RateLimiter;
use crate::services::transaction_store::{SharedRecord, TransactionStore};

/// Counters for one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub visited: usize,
    pub polled: usize,
    pub evicted: usize,
}

enum Visit {
    Idle,
    Polled,
    Evicted,
}

/// Re-polls transactions nobody returned to and drops the ones whose time
/// is up.
pub struct Sweeper {
    store: TransactionStore,
    bank: Arc<dyn BankClient>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
    rate_limiter: RateLimiter,
}

impl Sweeper {
    pub fn new(
        store: TransactionStore,
        bank: Arc<dyn BankClient>,
        clock: Arc<dyn Clock>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            bank,
            clock,
            rate_limiter: RateLimiter::new(policy.min_check_interval),
            policy,
        }
    }

    /// Runs the sweep loop forever on the policy's tick.
    pub async fn run(self, name: &'static str) {
        info!(product = name, "transaction sweeper started");

        let mut ticker = interval(self.policy.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let stats = self.sweep_once().await;
            if stats.polled > 0 || stats.evicted > 0 {
                debug!(
                    product = name,
                    visited = stats.visited,
                    polled = stats.polled,
                    evicted = stats.evicted,
                    "sweep finished"
                );
            }
        }
    }

    /// One pass over every tracked transaction.
    pub async fn sweep_once(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        for (transaction_id, handle) in self.store.entries().await {
            stats.visited += 1;
            match self.visit(&transaction_id, &handle).await {
                Visit::Idle => {}
                Visit::Polled => stats.polled += 1,
                Visit::Evicted => stats.evicted += 1,
            }
        }

        stats
    }

    async fn visit(&self, transaction_id: &str, handle: &SharedRecord) -> Visit {
        let now = self.clock.now();

        {
            let mut record = handle.lock().await;

            if record.is_terminal() {
                if now > record.recheck_not_before() {
                    let status = record.status();
                    drop(record);
                    self.store.delete(transaction_id).await;
                    info!(transaction_id, %status, "transaction retention elapsed, closed");
                    return Visit::Evicted;
                }
                return Visit::Idle;
            }

            if now - record.started_at() > self.policy.max_transaction_age {
                drop(record);
                self.store.delete(transaction_id).await;
                info!(
                    transaction_id,
                    "transaction reached its maximum age without any status change, closed"
                );
                return Visit::Evicted;
            }

            if now <= record.recheck_not_before() {
                return Visit::Idle;
            }

            if self.rate_limiter.try_acquire(&mut record, now).is_err() {
                // Checked by a returning user moments ago; try again next tick.
                return Visit::Idle;
            }
        }

        let result = self.bank.transaction_status(transaction_id).await;

        let Some(handle) = self.store.get(transaction_id).await else {
            return Visit::Polled;
        };
        let now = self.clock.now();
        let mut record = handle.lock().await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                record.set_recheck_not_before(now + self.policy.recheck_interval);
                warn!(
                    transaction_id,
                    error = %e,
                    retry_at = %record.recheck_not_before(),
                    "transaction status could not be requested"
                );
                return Visit::Polled;
            }
        };

        record.observe(report.status, report.consumer);
        if report.status == BankStatus::Failure {
            record.set_recheck_not_before(now + self.policy.recheck_interval);
            warn!(transaction_id, "bank reported failure for status request, retrying later");
            return Visit::Polled;
        }

        match record.status() {
            TransactionStatus::Success => {
                record.extend_recheck_not_before(now + self.policy.success_retention);
                info!(
                    transaction_id,
                    kept_until = %record.recheck_not_before(),
                    "transaction succeeded but user has not returned yet"
                );
                Visit::Polled
            }
            TransactionStatus::Cancelled | TransactionStatus::Expired => {
                let status = record.status();
                drop(record);
                self.store.delete(transaction_id).await;
                info!(transaction_id, %status, "transaction closed by bank");
                Visit::Evicted
            }
            TransactionStatus::Open | TransactionStatus::Unknown => {
                record.set_recheck_not_before(now + self.policy.recheck_interval);
                info!(
                    transaction_id,
                    retry_at = %record.recheck_not_before(),
                    "transaction is still not closed"
                );
                Visit::Polled
            }
        }
    }
}
