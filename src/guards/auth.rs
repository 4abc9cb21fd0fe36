//! Bearer-token authentication guard
//!
//! Two states per request: routes registered as public bypass token
//! inspection entirely; everything else must present a decodable, unexpired
//! bearer token. Token mechanics (HS256 signature, exp validation) are
//! delegated to `jsonwebtoken`; this guard owns only the decision to check or
//! skip and the interpretation of the verdict.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Guard, Rejection, RequestContext, Verdict};

/// Identity claims carried by an accepted bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user or service id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiry as a unix timestamp; validated on decode.
    pub exp: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token secret configured")]
    Unconfigured,
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Validates tokens on non-public routes and attaches the resolved identity
/// to the request context.
pub struct TokenAuthenticator {
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenAuthenticator {
    /// `secret` is the shared HS256 secret. `None` (or empty) fails closed:
    /// every non-public request is rejected until a secret is configured.
    pub fn new(secret: Option<&str>) -> Self {
        let decoding_key = secret
            .filter(|s| !s.is_empty())
            .map(|s| DecodingKey::from_secret(s.as_bytes()));
        let mut validation = Validation::default();
        validation.validate_exp = true;
        Self {
            decoding_key,
            validation,
        }
    }

    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self.decoding_key.as_ref().ok_or(AuthError::Unconfigured)?;
        let data = decode::<Claims>(token, key, &self.validation)?;
        Ok(data.claims)
    }
}

impl Guard for TokenAuthenticator {
    fn name(&self) -> &'static str {
        "token_auth"
    }

    fn evaluate(&self, ctx: &mut RequestContext) -> Verdict {
        if ctx.policy.public {
            debug!(client_id = %ctx.client_id, "public route, token check skipped");
            return Verdict::Allow;
        }

        let token = match ctx.bearer.as_deref() {
            Some(token) => token,
            None => {
                warn!(client_id = %ctx.client_id, "missing bearer token");
                return Verdict::Reject(Rejection::unauthorized(
                    "Bearer token required. Provide via Authorization: Bearer <token>",
                ));
            }
        };

        match self.decode(token) {
            Ok(claims) => {
                info!(client_id = %ctx.client_id, sub = %claims.sub, "token accepted");
                ctx.identity = Some(claims);
                Verdict::Allow
            }
            Err(e) => {
                warn!(client_id = %ctx.client_id, error = %e, "token rejected");
                Verdict::Reject(Rejection::unauthorized("Invalid or expired token"))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::RoutePolicy;
    use crate::guards::RejectKind;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    pub(crate) fn make_token(secret: &str, sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email: None,
            exp: unix_now() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn ctx(policy: RoutePolicy, bearer: Option<String>) -> RequestContext {
        let mut ctx = RequestContext::new("test-client", policy);
        ctx.bearer = bearer;
        ctx
    }

    #[test]
    fn test_public_route_bypasses_token_inspection() {
        let auth = TokenAuthenticator::new(Some("s3cret"));
        let mut ctx = ctx(RoutePolicy::public(), None);
        assert!(auth.evaluate(&mut ctx).is_allow());
        assert!(ctx.identity.is_none());
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let auth = TokenAuthenticator::new(Some("s3cret"));
        let mut ctx = ctx(RoutePolicy::protected(), None);
        match auth.evaluate(&mut ctx) {
            Verdict::Reject(r) => assert_eq!(r.kind, RejectKind::Unauthorized),
            Verdict::Allow => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_valid_token_attaches_identity() {
        let auth = TokenAuthenticator::new(Some("s3cret"));
        let token = make_token("s3cret", "user-42");
        let mut ctx = ctx(RoutePolicy::protected(), Some(token));
        assert!(auth.evaluate(&mut ctx).is_allow());
        assert_eq!(ctx.identity.as_ref().unwrap().sub, "user-42");
    }

    #[test]
    fn test_wrong_signature_is_unauthorized() {
        let auth = TokenAuthenticator::new(Some("s3cret"));
        let token = make_token("other-secret", "user-42");
        let mut ctx = ctx(RoutePolicy::protected(), Some(token));
        assert!(!auth.evaluate(&mut ctx).is_allow());
        assert!(ctx.identity.is_none());
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let auth = TokenAuthenticator::new(Some("s3cret"));
        let claims = Claims {
            sub: "user-42".to_string(),
            email: None,
            exp: unix_now() - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        let mut ctx = ctx(RoutePolicy::protected(), Some(token));
        assert!(!auth.evaluate(&mut ctx).is_allow());
    }

    #[test]
    fn test_unconfigured_secret_fails_closed() {
        let auth = TokenAuthenticator::new(None);
        let token = make_token("s3cret", "user-42");
        let mut ctx = ctx(RoutePolicy::protected(), Some(token));
        assert!(!auth.evaluate(&mut ctx).is_allow());
        // Public routes are still reachable.
        let mut public = ctx_public();
        assert!(auth.evaluate(&mut public).is_allow());
    }

    fn ctx_public() -> RequestContext {
        RequestContext::new("test-client", RoutePolicy::public())
    }
}
