//! Request header extraction
//!
//! Builds the guard pipeline's request context from an actix `ServiceRequest`
//! and exposes the resolved identity to handlers via request extensions.

use actix_web::{
    dev::ServiceRequest,
    http::header::{AUTHORIZATION, ORIGIN, REFERER},
    HttpMessage,
};

use crate::domain::RoutePolicy;
use crate::guards::{Claims, RequestContext};

/// Header name for the domain-bound API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extension type carrying the identity resolved by the token guard.
#[derive(Clone)]
pub struct AuthenticatedUser(pub Claims);

/// Handler-side access to the authenticated identity.
pub trait IdentityExt {
    fn identity(&self) -> Option<Claims>;
}

impl<T: HttpMessage> IdentityExt for T {
    fn identity(&self) -> Option<Claims> {
        self.extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.0.clone())
    }
}

/// Origin header, falling back to referer when absent.
pub fn extract_origin(req: &ServiceRequest) -> Option<String> {
    for header in [ORIGIN, REFERER] {
        if let Some(value) = req.headers().get(&header) {
            if let Ok(s) = value.to_str() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Token from `Authorization: Bearer <token>`.
pub fn extract_bearer(req: &ServiceRequest) -> Option<String> {
    let auth = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ").map(|t| t.to_string())
}

pub fn extract_api_key(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(API_KEY_HEADER)?
        .to_str()
        .ok()
        .map(|s| s.to_string())
}

/// Client identifier for rate-limit bucketing: first hop of X-Forwarded-For,
/// then X-Real-IP, then the peer address.
pub fn extract_client_id(req: &ServiceRequest) -> String {
    if let Some(forwarded) = req.headers().get("X-Forwarded-For") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first) = forwarded_str.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Assemble the per-request context the guard pipeline evaluates.
pub fn build_context(req: &ServiceRequest, policy: RoutePolicy) -> RequestContext {
    let mut ctx = RequestContext::new(extract_client_id(req), policy);
    ctx.origin = extract_origin(req);
    ctx.api_key = extract_api_key(req);
    ctx.bearer = extract_bearer(req);
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_origin_falls_back_to_referer() {
        let req = TestRequest::default()
            .insert_header(("referer", "https://a.com/page"))
            .to_srv_request();
        assert_eq!(extract_origin(&req).as_deref(), Some("https://a.com/page"));

        let req = TestRequest::default()
            .insert_header(("origin", "https://a.com"))
            .insert_header(("referer", "https://b.com"))
            .to_srv_request();
        assert_eq!(extract_origin(&req).as_deref(), Some("https://a.com"));

        let req = TestRequest::default().to_srv_request();
        assert!(extract_origin(&req).is_none());
    }

    #[test]
    fn test_bearer_extraction_requires_prefix() {
        let req = TestRequest::default()
            .insert_header(("authorization", "Bearer abc.def.ghi"))
            .to_srv_request();
        assert_eq!(extract_bearer(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header(("authorization", "Basic dXNlcg=="))
            .to_srv_request();
        assert!(extract_bearer(&req).is_none());
    }

    #[test]
    fn test_client_id_prefers_forwarded_for() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("X-Real-IP", "10.0.0.2"))
            .to_srv_request();
        assert_eq!(extract_client_id(&req), "203.0.113.7");

        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "10.0.0.2"))
            .to_srv_request();
        assert_eq!(extract_client_id(&req), "10.0.0.2");
    }

    #[test]
    fn test_build_context_collects_all_headers() {
        let req = TestRequest::default()
            .insert_header(("origin", "https://a.com"))
            .insert_header(("x-api-key", "secret123"))
            .insert_header(("authorization", "Bearer tok"))
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_srv_request();
        let ctx = build_context(&req, RoutePolicy::public());
        assert_eq!(ctx.origin.as_deref(), Some("https://a.com"));
        assert_eq!(ctx.api_key.as_deref(), Some("secret123"));
        assert_eq!(ctx.bearer.as_deref(), Some("tok"));
        assert_eq!(ctx.client_id, "203.0.113.7");
        assert!(ctx.policy.public);
    }
}
