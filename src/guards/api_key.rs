//! Domain-bound API key guard
//!
//! Runs on every route, public ones included: a route may be reachable
//! without a user token yet still require proof that the caller is a
//! registered frontend origin. The origin header (with referer fallback,
//! resolved when the request context is built) must match the trusted
//! registry exactly, and the presented `x-api-key` must equal the single
//! configured secret. Audit logs carry origin and outcome only, never key
//! material.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::OriginRegistry;
use super::{Guard, Rejection, RequestContext, Verdict};

/// Constant-time string comparison. Plain `==` short-circuits on the first
/// differing byte, leaking how much of the key a caller guessed; XOR-fold
/// keeps comparison time dependent on length alone.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Validates the presented API key against the value expected for the
/// requesting origin.
pub struct ApiKeyValidator {
    registry: Arc<OriginRegistry>,
    /// `None` when `API_KEY` is unconfigured; every key check then fails.
    expected_key: Option<String>,
}

impl ApiKeyValidator {
    pub fn new(registry: Arc<OriginRegistry>, expected_key: Option<String>) -> Self {
        let expected_key = expected_key.filter(|k| !k.is_empty());
        Self {
            registry,
            expected_key,
        }
    }
}

impl Guard for ApiKeyValidator {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn evaluate(&self, ctx: &mut RequestContext) -> Verdict {
        let origin = match ctx.origin.as_deref() {
            Some(origin) => origin,
            None => {
                warn!(client_id = %ctx.client_id, outcome = "rejected", "origin and referer headers absent");
                return Verdict::Reject(Rejection::forbidden("Request origin unknown"));
            }
        };

        if !self.registry.contains(origin) {
            warn!(client_id = %ctx.client_id, origin = %origin, outcome = "rejected", "origin not in trusted registry");
            return Verdict::Reject(Rejection::forbidden(format!(
                "Origin not allowed: {}",
                origin
            )));
        }

        let key_matches = match (ctx.api_key.as_deref(), self.expected_key.as_deref()) {
            (Some(presented), Some(expected)) => constant_time_eq(presented, expected),
            _ => false,
        };

        if !key_matches {
            warn!(client_id = %ctx.client_id, origin = %origin, outcome = "rejected", "api key missing or mismatched");
            return Verdict::Reject(Rejection::unauthorized("Invalid API key"));
        }

        info!(client_id = %ctx.client_id, origin = %origin, outcome = "allowed", "api key accepted");
        Verdict::Allow
    }
}
