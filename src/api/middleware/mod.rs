//! API Middleware Module
//!
//! Admission middleware for the HTTP surface: builds the per-request context
//! from headers, runs the guard pipeline, and maps verdicts to responses.

pub mod extract;
pub mod service;

pub use extract::{
    build_context, extract_api_key, extract_bearer, extract_client_id, extract_origin,
    AuthenticatedUser, IdentityExt, API_KEY_HEADER,
};
pub use service::{
    GuardMiddleware, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET, RETRY_AFTER,
};
