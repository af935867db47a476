//! HTTP sign endpoint
//!
//! Lets clients that must not hold the shared secret obtain channel
//! signatures:
//! - POST /api/unisound - Sign `{key, time}`
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SignCredentials};
