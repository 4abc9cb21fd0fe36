//! Authenticated service status endpoint
//!
//! Sits on the strict rate tier and requires a bearer token; the handler reads
//! the identity the token guard attached to the request.

use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

use crate::api::middleware::IdentityExt;

#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub authenticated_as: Option<String>,
}

/// GET /api/v1/status - Service status for authenticated callers
pub async fn service_status(req: HttpRequest) -> HttpResponse {
    let response = StatusResponse {
        service: "gatekeeper",
        version: env!("CARGO_PKG_VERSION"),
        authenticated_as: req.identity().map(|claims| claims.sub),
    };

    HttpResponse::Ok().json(response)
}
