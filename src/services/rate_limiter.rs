use chrono::{DateTime, Duration, Utc};

use crate::domain::TransactionRecord;

/// Minimum spacing between two live bank status checks of one transaction.
///
/// The limiter keeps no state of its own: the last check time lives on the
/// record, and callers hold the record's lock across `try_acquire` so the
/// comparison and the stamp happen as one step.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Seconds until the next check is allowed, rounded up, or `None` if a
    /// check is allowed now.
    pub fn retry_after(&self, record: &TransactionRecord, now: DateTime<Utc>) -> Option<u64> {
        let last = record.last_status_check_at()?;
        let next_allowed = last + self.min_interval;
        if now >= next_allowed {
            return None;
        }

        // A clock that stepped backwards must not produce a hint beyond the
        // interval itself.
        let remaining = (next_allowed - now).min(self.min_interval);
        Some(ceil_secs(remaining).max(1))
    }

    /// Claims the next status check for `record`, stamping it with `now`.
    /// On refusal returns the `Retry-After` hint in seconds.
    pub fn try_acquire(&self, record: &mut TransactionRecord, now: DateTime<Utc>) -> Result<(), u64> {
        if let Some(retry_after) = self.retry_after(record, now) {
            return Err(retry_after);
        }
        record.stamp_status_check(now);
        Ok(())
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let millis = duration.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}
