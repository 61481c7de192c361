//! HTTP surface: routing, identity, request logging.

pub mod identity;
mod middleware;
mod public;
pub mod routes;
mod write;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{HttpState, build_router};
