//! HTTP surface: request/response shapes, handlers and router wiring.

pub mod handlers;
pub mod requests;
pub mod responses;
pub mod routes;

pub use routes::{create_router, AppState};
