//! Per-visitor token-bucket rate limiting.
//!
//! Each identity key owns a bucket that refills continuously at the
//! registry's configured rate, up to a burst capacity. The whole table sits
//! behind one exclusive lock; every operation touches a single key, so the
//! critical section stays O(1) regardless of table size. Entries for idle
//! keys are reclaimed by [`VisitorRegistry::sweep`], which the server runs
//! on a fixed schedule.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Refill rate and burst capacity for one registry instance.
///
/// Distinct registries exist for distinct action classes (posting vs
/// voting); the values are policy, the mechanism handles any pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePolicy {
    /// Tokens added per second of elapsed time.
    pub refill_per_sec: f64,
    /// Maximum tokens a bucket can hold.
    pub burst: u32,
}

impl RatePolicy {
    /// One action every `period_secs` seconds on average.
    pub fn per_seconds(period_secs: f64, burst: u32) -> Self {
        Self {
            refill_per_sec: 1.0 / period_secs,
            burst,
        }
    }

    /// `events` actions per hour on average.
    pub fn per_hour(events: f64, burst: u32) -> Self {
        Self {
            refill_per_sec: events / 3600.0,
            burst,
        }
    }
}

struct VisitorRecord {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// In-memory table of per-key token buckets with last-activity tracking.
pub struct VisitorRegistry {
    policy: RatePolicy,
    visitors: Mutex<HashMap<String, VisitorRecord>>,
}

impl VisitorRegistry {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            visitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// Decide whether the key may act right now, consuming one token if so.
    ///
    /// Never fails: a key not in the table is a fresh, fully provisioned
    /// bucket. A denied call consumes nothing but still refreshes the
    /// entry's last-seen time.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`Self::allow`] with an injected clock, for deterministic tests.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut visitors = self.visitors.lock().unwrap();
        let record = visitors
            .entry(key.to_string())
            .or_insert_with(|| VisitorRecord {
                tokens: f64::from(self.policy.burst),
                last_refill: now,
                last_seen: now,
            });
        record.last_seen = now;

        let elapsed = now.saturating_duration_since(record.last_refill);
        record.tokens = (record.tokens + elapsed.as_secs_f64() * self.policy.refill_per_sec)
            .min(f64::from(self.policy.burst));
        record.last_refill = now;

        if record.tokens >= 1.0 {
            record.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Remove entries unseen for `retention` or longer; returns the count.
    ///
    /// Idempotent: with no stale entries it is a no-op. Entries inserted
    /// while a pass runs are visited on the next pass, which is enough for
    /// eventual bounding.
    pub fn sweep(&self, retention: Duration) -> usize {
        self.sweep_at(retention, Instant::now())
    }

    /// [`Self::sweep`] with an injected clock, for deterministic tests.
    pub fn sweep_at(&self, retention: Duration, now: Instant) -> usize {
        let mut visitors = self.visitors.lock().unwrap();
        let before = visitors.len();
        visitors.retain(|_, record| now.saturating_duration_since(record.last_seen) < retention);
        before - visitors.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.visitors.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
