//! Guard pipeline middleware
//!
//! Actix-web middleware that evaluates the admission pipeline (rate limit,
//! bearer auth, API key) for every request and short-circuits rejected
//! requests with the matching HTTP status before the route handler runs.

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    Error, HttpMessage, HttpResponse,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::domain::RouteTable;
use crate::guards::{GuardPipeline, RateLimitStatus, RejectKind, Rejection, Verdict};
use super::extract::{build_context, AuthenticatedUser};

/// Rate limit headers
pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";

/// Middleware factory wrapping the guard pipeline and route table.
pub struct GuardMiddleware {
    pipeline: Arc<GuardPipeline>,
    routes: Arc<RouteTable>,
}

impl GuardMiddleware {
    pub fn new(pipeline: Arc<GuardPipeline>, routes: Arc<RouteTable>) -> Self {
        Self { pipeline, routes }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GuardMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Transform = GuardMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(GuardMiddlewareService {
            service: Rc::new(service),
            pipeline: self.pipeline.clone(),
            routes: self.routes.clone(),
        })
    }
}

/// The actual middleware service
pub struct GuardMiddlewareService<S> {
    service: Rc<S>,
    pipeline: Arc<GuardPipeline>,
    routes: Arc<RouteTable>,
}

impl<S, B> Service<ServiceRequest> for GuardMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let pipeline = self.pipeline.clone();
        let policy = self.routes.policy_for(req.path());

        Box::pin(async move {
            let mut ctx = build_context(&req, policy);
            let verdict = pipeline.evaluate(&mut ctx);
            let rate_status = ctx.rate_status;

            match verdict {
                Verdict::Allow => {
                    // Surface the resolved identity to handlers.
                    if let Some(claims) = ctx.identity.take() {
                        req.extensions_mut().insert(AuthenticatedUser(claims));
                    }

                    let res = service.call(req).await?;
                    let mut res = res.map_into_left_body();
                    if let Some(status) = rate_status {
                        add_rate_limit_headers(res.headers_mut(), &status);
                    }
                    Ok(res)
                }
                Verdict::Reject(rejection) => {
                    let response = rejection_response(&rejection, rate_status.as_ref());
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    let reset_at = chrono::Utc::now()
        + chrono::Duration::from_std(status.retry_after)
            .unwrap_or_else(|_| chrono::Duration::zero());

    let pairs = [
        (RATE_LIMIT_LIMIT, status.limit.to_string()),
        (RATE_LIMIT_REMAINING, status.remaining().to_string()),
        (RATE_LIMIT_RESET, reset_at.timestamp().to_string()),
    ];
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            headers.insert(name, value);
        }
    }
}

/// Map a pipeline rejection to its HTTP response. Reason strings are
/// user-visible; registry contents and key material never are.
fn rejection_response(
    rejection: &Rejection,
    rate_status: Option<&RateLimitStatus>,
) -> HttpResponse {
    let body = serde_json::json!({
        "error": rejection.kind.code(),
        "message": rejection.message,
    });

    match rejection.kind {
        RejectKind::RateLimited => {
            let retry_after_secs = rate_status
                .map(|s| s.retry_after.as_secs().max(1))
                .unwrap_or(1);
            let reset_at = chrono::Utc::now() + chrono::Duration::seconds(retry_after_secs as i64);
            let mut builder = HttpResponse::TooManyRequests();
            builder.insert_header((RETRY_AFTER, retry_after_secs.to_string()));
            if let Some(status) = rate_status {
                builder
                    .insert_header((RATE_LIMIT_LIMIT, status.limit.to_string()))
                    .insert_header((RATE_LIMIT_REMAINING, "0"))
                    .insert_header((RATE_LIMIT_RESET, reset_at.timestamp().to_string()));
            }
            builder.json(body)
        }
        RejectKind::Unauthorized => HttpResponse::Unauthorized().json(body),
        RejectKind::Forbidden => HttpResponse::Forbidden().json(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::extract::IdentityExt;
    use crate::domain::{OriginRegistry, RateLimitTier, RoutePolicy, TierId};
    use crate::guards::{ApiKeyValidator, RateLimiter, TokenAuthenticator};
    use actix_web::{http::StatusCode, test, web, App, HttpRequest, HttpResponse};

    const JWT_SECRET: &str = "middleware-test-secret";

    fn middleware() -> GuardMiddleware {
        let pipeline = GuardPipeline::standard(
            RateLimiter::new(
                RateLimitTier::new(60, 10),
                RateLimitTier::new(60, 2),
            ),
            TokenAuthenticator::new(Some(JWT_SECRET)),
            ApiKeyValidator::new(
                Arc::new(OriginRegistry::parse("https://a.com,https://b.com")),
                Some("secret123".to_string()),
            ),
        );
        let routes = RouteTable::new()
            .route("/health", RoutePolicy::public())
            .route(
                "/api/v1/status",
                RoutePolicy::protected().with_tier(TierId::Strict),
            );
        GuardMiddleware::new(Arc::new(pipeline), Arc::new(routes))
    }

    async fn status_handler(req: HttpRequest) -> HttpResponse {
        let sub = req.identity().map(|c| c.sub);
        HttpResponse::Ok().json(serde_json::json!({ "sub": sub }))
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .wrap(middleware())
                    .route(
                        "/health",
                        web::get().to(|| async { HttpResponse::Ok().body("ok") }),
                    )
                    .route("/api/v1/status", web::get().to(status_handler)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_public_route_without_token_passes_with_origin_and_key() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("origin", "https://a.com"))
            .insert_header(("x-api-key", "secret123"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(RATE_LIMIT_LIMIT));
    }

    #[actix_web::test]
    async fn test_wrong_api_key_is_401() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("origin", "https://a.com"))
            .insert_header(("x-api-key", "wrong"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_untrusted_origin_is_403() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("origin", "https://c.com"))
            .insert_header(("x-api-key", "secret123"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_missing_origin_is_403_even_on_public_route() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("x-api-key", "secret123"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_protected_route_requires_token_and_exposes_identity() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri("/api/v1/status")
            .insert_header(("origin", "https://a.com"))
            .insert_header(("x-api-key", "secret123"))
            .insert_header(("X-Forwarded-For", "203.0.113.50"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let token = crate::guards::auth::tests::make_token(JWT_SECRET, "user-7");
        let req = test::TestRequest::get()
            .uri("/api/v1/status")
            .insert_header(("origin", "https://a.com"))
            .insert_header(("x-api-key", "secret123"))
            .insert_header(("authorization", format!("Bearer {}", token)))
            .insert_header(("X-Forwarded-For", "203.0.113.51"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sub"], "user-7");
    }

    #[actix_web::test]
    async fn test_strict_tier_third_request_is_429_with_retry_after() {
        let app = app!();
        let token = crate::guards::auth::tests::make_token(JWT_SECRET, "user-8");
        let mut last_status = StatusCode::OK;
        let mut last_has_retry_after = false;
        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri("/api/v1/status")
                .insert_header(("origin", "https://a.com"))
                .insert_header(("x-api-key", "secret123"))
                .insert_header(("authorization", format!("Bearer {}", token)))
                .insert_header(("X-Forwarded-For", "203.0.113.52"))
                .to_request();
            let res = test::call_service(&app, req).await;
            last_status = res.status();
            last_has_retry_after = res.headers().contains_key(RETRY_AFTER);
        }
        assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
        assert!(last_has_retry_after);
    }
}
