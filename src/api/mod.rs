//! API module - HTTP routes and handlers

pub mod handlers;
pub mod middleware;

use actix_web::web;

use crate::domain::{RoutePolicy, RouteTable, TierId};

/// Admission metadata for every registered route.
///
/// Kept next to [`configure_routes`] so a new route and its policy are added
/// in the same place. Paths absent from this table are treated as protected
/// on the default tier.
pub fn route_table() -> RouteTable {
    RouteTable::new()
        .route("/health", RoutePolicy::public())
        .route(
            "/api/v1/status",
            RoutePolicy::protected().with_tier(TierId::Strict),
        )
}

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/status", web::get().to(handlers::status::service_status)),
    )
    .route("/health", web::get().to(handlers::health::health_check));
}
