//! Domain types and models

mod origin;
mod route;

pub use origin::OriginRegistry;
pub use route::{RateLimitTier, RoutePolicy, RouteTable, TierId};
