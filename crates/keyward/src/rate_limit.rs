//! Per-key token buckets.
//!
//! Each stored key with a `rate_limit` gets a bucket holding up to `limit`
//! tokens, refilled at `limit` tokens per minute. Time comes from the
//! caller so tests can drive it with a manual clock.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use keyward_core::KeyId;

/// One whole token, in the bucket's internal units. A bucket gains `limit`
/// units per millisecond, so `limit` tokens take exactly one minute.
const TOKEN: u64 = 60_000;

#[derive(Debug)]
struct BucketState {
    units: u64,
    last_refill: i64,
    limit: u32,
}

impl BucketState {
    fn new(limit: u32, now: i64) -> Self {
        Self {
            units: Self::capacity(limit),
            last_refill: now,
            limit,
        }
    }

    fn capacity(limit: u32) -> u64 {
        u64::from(limit) * TOKEN
    }

    /// Consume one token, refilling first. Returns `Err(retry_after_ms)` if
    /// the bucket is empty.
    fn try_acquire(&mut self, now: i64) -> Result<(), u64> {
        if self.limit == 0 {
            return Err(TOKEN);
        }

        let limit = u64::from(self.limit);
        // A clock stepping backwards refills nothing.
        let elapsed = u64::try_from(now - self.last_refill).unwrap_or(0);
        self.units = self
            .units
            .saturating_add(elapsed.saturating_mul(limit))
            .min(Self::capacity(self.limit));
        self.last_refill = self.last_refill.max(now);

        if self.units >= TOKEN {
            self.units -= TOKEN;
            Ok(())
        } else {
            let deficit = TOKEN - self.units;
            Err(deficit.div_ceil(limit))
        }
    }
}

/// Token-bucket limiter keyed by stored key id.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<KeyId, BucketState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one request from `id`'s budget of `limit_per_minute`.
    ///
    /// A changed limit for the same id starts a fresh bucket.
    pub fn check(&self, id: KeyId, limit_per_minute: u32, now: i64) -> Result<(), u64> {
        // Bucket state stays consistent even if a holder panicked.
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets
            .entry(id)
            .or_insert_with(|| BucketState::new(limit_per_minute, now));
        if bucket.limit != limit_per_minute {
            *bucket = BucketState::new(limit_per_minute, now);
        }
        bucket.try_acquire(now)
    }

    /// Drop the bucket for `id`, e.g. after revocation.
    pub fn forget(&self, id: &KeyId) {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u8) -> KeyId {
        KeyId::from_bytes([n; 16])
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.check(id(1), 3, 0).is_ok());
        }
        // One token refills every 20s at 3/min.
        assert_eq!(limiter.check(id(1), 3, 0), Err(20_000));
        assert_eq!(limiter.check(id(1), 3, 5_000), Err(15_000));
        assert!(limiter.check(id(1), 3, 20_000).is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(id(1), 1, 0).is_ok());
        assert!(limiter.check(id(1), 1, 0).is_err());
        assert!(limiter.check(id(2), 1, 0).is_ok());
        assert_eq!(limiter.tracked(), 2);

        limiter.forget(&id(1));
        assert!(limiter.check(id(1), 1, 0).is_ok());
    }

    #[test]
    fn test_zero_limit_always_rejects() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.check(id(1), 0, 0), Err(60_000));
    }

    #[test]
    fn test_clock_going_backwards() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(id(1), 1, 60_000).is_ok());
        assert!(limiter.check(id(1), 1, 0).is_err());
        assert!(limiter.check(id(1), 1, 120_000).is_ok());
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_limit_within_instant(limit in 1u32..200, attempts in 0usize..400) {
            let limiter = RateLimiter::new();
            let granted = (0..attempts)
                .filter(|_| limiter.check(id(7), limit, 1_000).is_ok())
                .count();
            prop_assert_eq!(granted, attempts.min(limit as usize));
        }
    }
}
