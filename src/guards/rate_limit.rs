//! Rate limiting guard
//!
//! Fixed-window counters per (client, tier) held in a concurrent map. The
//! bucket map is the only mutable state shared between in-flight requests;
//! the map's per-shard entry lock serializes updates to a given bucket so
//! concurrent requests from one client never lose increments. A burst
//! straddling a window boundary can pass up to twice the cap, the usual
//! fixed-window tradeoff.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;

use crate::domain::{RateLimitTier, TierId};
use super::{Guard, Rejection, RequestContext, Verdict};

/// Per (client, tier) counter window. Lives in process memory only.
#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Snapshot of a client's window after an admission check, used by the
/// transport layer for `X-RateLimit-*` and `Retry-After` headers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    /// Requests counted in the current window, including this one.
    pub current: u32,
    /// Time until the window resets.
    pub retry_after: Duration,
}

impl RateLimitStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current)
    }
}

/// Every this many checks, expired buckets are swept from the map. Client
/// ids come from spoofable headers, so without eviction an attacker cycling
/// forged addresses grows the map for the process lifetime.
const SWEEP_INTERVAL: usize = 1024;

/// Fixed-window rate limiter over the configured tiers.
pub struct RateLimiter {
    default_tier: RateLimitTier,
    strict_tier: RateLimitTier,
    buckets: DashMap<(String, TierId), Bucket>,
    checks: AtomicUsize,
}

impl RateLimiter {
    pub fn new(default_tier: RateLimitTier, strict_tier: RateLimitTier) -> Self {
        Self {
            default_tier,
            strict_tier,
            buckets: DashMap::new(),
            checks: AtomicUsize::new(0),
        }
    }

    fn tier(&self, id: TierId) -> RateLimitTier {
        match id {
            TierId::Default => self.default_tier,
            TierId::Strict => self.strict_tier,
        }
    }

    /// Count a request against a client's window and report the result.
    pub fn check(&self, client_id: &str, tier_id: TierId) -> RateLimitStatus {
        self.check_at(client_id, tier_id, Instant::now())
    }

    /// Clock-explicit variant of [`check`] used by tests.
    ///
    /// [`check`]: RateLimiter::check
    fn check_at(&self, client_id: &str, tier_id: TierId, now: Instant) -> RateLimitStatus {
        let tier = self.tier(tier_id);
        // Scoped so the shard lock is released before a sweep runs.
        let status = {
            let mut bucket = self
                .buckets
                .entry((client_id.to_string(), tier_id))
                .or_insert_with(|| Bucket {
                    window_start: now,
                    count: 0,
                });

            // Window elapsed: start a fresh one at the current instant.
            if now.duration_since(bucket.window_start) >= tier.window {
                bucket.window_start = now;
                bucket.count = 0;
            }

            bucket.count += 1;

            let elapsed = now.duration_since(bucket.window_start);
            RateLimitStatus {
                allowed: bucket.count <= tier.max_requests,
                limit: tier.max_requests,
                current: bucket.count,
                retry_after: tier.window.saturating_sub(elapsed),
            }
        };

        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired(now);
        }

        status
    }

    /// Drop buckets whose window has fully elapsed; they carry no state a
    /// future request needs, since an elapsed bucket is reset on next use.
    fn purge_expired(&self, now: Instant) {
        self.buckets.retain(|(_, tier_id), bucket| {
            now.duration_since(bucket.window_start) < self.tier(*tier_id).window
        });
    }
}

impl Guard for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn evaluate(&self, ctx: &mut RequestContext) -> Verdict {
        let status = self.check(&ctx.client_id, ctx.policy.tier);
        let verdict = if status.allowed {
            Verdict::Allow
        } else {
            warn!(
                client_id = %ctx.client_id,
                tier = ?ctx.policy.tier,
                current = status.current,
                limit = status.limit,
                "rate limit exceeded"
            );
            Verdict::Reject(Rejection::rate_limited(format!(
                "Rate limit exceeded. Maximum {} requests per {} seconds.",
                status.limit,
                self.tier(ctx.policy.tier).window.as_secs()
            )))
        };
        // Kept even on rejection so the 429 response carries window headers.
        ctx.rate_status = Some(status);
        verdict
    }
}
