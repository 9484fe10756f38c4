//! Tirage API crate - axum HTTP surface for the chat core.
//!
//! Exposes the chat pipeline (plain and SSE), the grid pitch endpoint and a
//! health check reporting the breaker state.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
