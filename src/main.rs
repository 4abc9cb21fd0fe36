//! Gatekeeper
//!
//! Request-admission and authorization layer fronting an HTTP API. Every
//! inbound request passes an ordered guard pipeline (rate limiting, bearer
//! auth, domain-bound API key) before reaching a handler.

use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_web::{http, middleware, web, App, HttpServer};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

mod api;
mod config;
mod domain;
mod guards;

use crate::api::middleware::GuardMiddleware;
use crate::config::Settings;
use crate::domain::{OriginRegistry, RateLimitTier};
use crate::guards::{ApiKeyValidator, GuardPipeline, RateLimiter, TokenAuthenticator};

/// Application state shared across all handlers
pub struct AppState {
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gatekeeper=info".parse().unwrap())
                .add_directive("actix_web=info".parse().unwrap()),
        )
        .json()
        .init();

    // Load configuration
    let settings = Settings::load().expect("Failed to load configuration");
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting Gatekeeper v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    // Build the trusted origin registry. Absent configuration degrades to an
    // empty registry that denies every origin.
    let registry = Arc::new(OriginRegistry::parse(&settings.security.allowed_origins));
    if registry.is_empty() {
        warn!("ALLOWED_ORIGINS is empty; all origins will be rejected");
    } else {
        info!(origins = registry.len(), "trusted origin registry loaded");
    }
    if settings.security.api_key.as_deref().unwrap_or("").is_empty() {
        warn!("API_KEY is not configured; all API key checks will fail");
    }
    if settings.security.jwt_secret.as_deref().unwrap_or("").is_empty() {
        warn!("JWT_SECRET is not configured; all non-public routes will reject");
    }

    // Assemble the guard pipeline in its fixed order.
    let rate_limiter = RateLimiter::new(
        RateLimitTier::new(
            settings.rate_limit.default_window_secs,
            settings.rate_limit.default_limit,
        ),
        RateLimitTier::new(
            settings.rate_limit.strict_window_secs,
            settings.rate_limit.strict_limit,
        ),
    );
    let authenticator = TokenAuthenticator::new(settings.security.jwt_secret.as_deref());
    let api_key_validator =
        ApiKeyValidator::new(registry.clone(), settings.security.api_key.clone());
    let pipeline = Arc::new(GuardPipeline::standard(
        rate_limiter,
        authenticator,
        api_key_validator,
    ));
    let routes = Arc::new(api::route_table());

    let workers = settings
        .server
        .workers
        .unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState {
        started_at: Instant::now(),
    });

    // Configure and start HTTP server
    HttpServer::new(move || {
        // CORS allows exactly the origins the admission layer trusts.
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::AUTHORIZATION,
                http::header::ACCEPT,
                http::header::CONTENT_TYPE,
                http::header::HeaderName::from_static("x-api-key"),
            ])
            .expose_headers(vec![http::header::HeaderName::from_static("retry-after")])
            .supports_credentials()
            .max_age(3600);
        for origin in registry.origins() {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(app_state.clone())
            // Guard pipeline middleware for admission decisions
            .wrap(GuardMiddleware::new(pipeline.clone(), routes.clone()))
            // Middleware (order matters - these wrap around GuardMiddleware)
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "gatekeeper"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            // Routes
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
