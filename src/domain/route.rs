//! Per-route admission metadata
//!
//! Routes declare their rate-limit tier and whether they are public (skip
//! bearer authentication) at registration time. The guard pipeline consults
//! this table per request; nothing is discovered via reflection or attributes.

use std::time::Duration;

/// Identifier for a named rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierId {
    /// General API traffic: 10 requests / 60s unless reconfigured.
    Default,
    /// Sensitive routes: 2 requests / 60s unless reconfigured.
    Strict,
}

/// A rate-limit policy: window length plus request cap. Which [`TierId`] a
/// policy serves is decided where the limiter is assembled.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitTier {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitTier {
    pub const fn new(window_secs: u64, max_requests: u32) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }
}

/// Admission metadata attached to a route at registration time.
///
/// `public` marks the route as skipping bearer-token authentication. The
/// API-key origin check always runs regardless of this flag.
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub public: bool,
    pub tier: TierId,
}

impl RoutePolicy {
    /// Bearer auth required, default tier.
    pub const fn protected() -> Self {
        Self {
            public: false,
            tier: TierId::Default,
        }
    }

    /// Bearer auth skipped, default tier.
    pub const fn public() -> Self {
        Self {
            public: true,
            tier: TierId::Default,
        }
    }

    pub const fn with_tier(mut self, tier: TierId) -> Self {
        self.tier = tier;
        self
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::protected()
    }
}

/// Registration table mapping path prefixes to route policies.
///
/// Lookup walks entries in registration order and matches on whole path
/// segments, the first hit wins. Unregistered paths fall back to `RoutePolicy::default()`
/// (protected, default tier) so a forgotten registration cannot accidentally
/// open a route.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(String, RoutePolicy)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: impl Into<String>, policy: RoutePolicy) -> Self {
        self.routes.push((prefix.into(), policy));
        self
    }

    pub fn policy_for(&self, path: &str) -> RoutePolicy {
        self.routes
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, policy)| *policy)
            .unwrap_or_default()
    }
}

/// Prefix match on whole path segments: `/health` covers `/health` and
/// `/health/live` but not `/healthz-admin`, so a public registration cannot
/// silently widen to sibling paths.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}
