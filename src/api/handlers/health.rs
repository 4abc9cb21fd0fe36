//! Health check endpoint
//!
//! Registered public: bearer auth is skipped, but the origin-bound API key
//! check still applies like everywhere else.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };

    HttpResponse::Ok().json(response)
}
