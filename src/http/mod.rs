//! HTTP transport for the voice channel
//!
//! - POST /channel/invoke - JSON `MethodCall` in, JSON `MethodResponse` out
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
