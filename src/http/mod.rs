//! HTTP surface: health, live stats and the WebSocket endpoint

pub mod routes;

pub use routes::build_router;
