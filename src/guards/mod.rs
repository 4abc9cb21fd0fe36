//! Request admission guards
//!
//! Every inbound request is evaluated by an ordered pipeline of guards before
//! it reaches a handler: rate limiting, then bearer-token authentication, then
//! the domain-bound API-key check. Evaluation short-circuits on the first
//! rejection, and the order is part of the observable contract: a rate-limited
//! request from a forbidden origin reports `RateLimited`, not `Forbidden`.
//! Volume abuse is rejected before any token work is spent, but even public
//! routes stay gated behind the origin-bound API key.

pub mod api_key;
pub mod auth;
pub mod rate_limit;

pub use api_key::ApiKeyValidator;
pub use auth::{Claims, TokenAuthenticator};
pub use rate_limit::{RateLimitStatus, RateLimiter};

use tracing::warn;

use crate::domain::RoutePolicy;

/// Per-request view assembled by the middleware from the incoming request and
/// the route table. Owned by a single pipeline invocation and dropped when the
/// request completes; guards read the headers and may attach results
/// (`identity`, `rate_status`) for downstream use.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Rate-limit bucketing key: forwarded-for chain head, real-ip, or peer
    /// address, whichever is present first.
    pub client_id: String,
    /// `origin` header, falling back to `referer` when absent.
    pub origin: Option<String>,
    /// `x-api-key` header.
    pub api_key: Option<String>,
    /// Token from `Authorization: Bearer <token>`.
    pub bearer: Option<String>,
    /// Admission metadata the route declared at registration.
    pub policy: RoutePolicy,
    /// Resolved identity, set by the token guard on successful validation.
    pub identity: Option<Claims>,
    /// Window status, set by the rate-limit guard whether it allows or not.
    pub rate_status: Option<RateLimitStatus>,
}

impl RequestContext {
    pub fn new(client_id: impl Into<String>, policy: RoutePolicy) -> Self {
        Self {
            client_id: client_id.into(),
            origin: None,
            api_key: None,
            bearer: None,
            policy,
            identity: None,
            rate_status: None,
        }
    }
}

/// Rejection category, mapped to an HTTP status by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Too many requests in the current window (HTTP 429).
    RateLimited,
    /// Missing or invalid credential: bearer token or API key (HTTP 401).
    Unauthorized,
    /// Unknown or untrusted origin (HTTP 403).
    Forbidden,
}

impl RejectKind {
    /// Stable machine-readable error code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RejectKind::RateLimited => "rate_limit_exceeded",
            RejectKind::Unauthorized => "unauthorized",
            RejectKind::Forbidden => "forbidden",
        }
    }
}

/// A terminal per-request rejection. Never retried by the pipeline itself;
/// retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub kind: RejectKind,
    pub message: String,
}

impl Rejection {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Unauthorized,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Forbidden,
            message: message.into(),
        }
    }
}

/// Outcome of a guard or of the whole pipeline.
#[derive(Debug, Clone)]
pub enum Verdict {
    Allow,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// A pipeline stage that inspects a request and returns Allow or a typed
/// rejection. Guards are constructed once at boot and shared across workers,
/// so implementations must be internally synchronized where they mutate state.
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &mut RequestContext) -> Verdict;
}

/// Ordered guard pipeline with short-circuit evaluation.
pub struct GuardPipeline {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardPipeline {
    /// Build a pipeline with an explicit guard order. Prefer [`standard`]
    /// outside of tests.
    ///
    /// [`standard`]: GuardPipeline::standard
    pub fn new(guards: Vec<Box<dyn Guard>>) -> Self {
        Self { guards }
    }

    /// The fixed production order: rate limiter, token authenticator, API-key
    /// validator.
    pub fn standard(
        rate_limiter: RateLimiter,
        authenticator: TokenAuthenticator,
        api_key: ApiKeyValidator,
    ) -> Self {
        Self::new(vec![
            Box::new(rate_limiter),
            Box::new(authenticator),
            Box::new(api_key),
        ])
    }

    /// Evaluate guards in order; the first rejecting guard's verdict is the
    /// pipeline's verdict and no further guards run.
    pub fn evaluate(&self, ctx: &mut RequestContext) -> Verdict {
        for guard in &self.guards {
            if let Verdict::Reject(rejection) = guard.evaluate(ctx) {
                warn!(
                    guard = guard.name(),
                    client_id = %ctx.client_id,
                    code = rejection.kind.code(),
                    "request rejected"
                );
                return Verdict::Reject(rejection);
            }
        }
        Verdict::Allow
    }
}
