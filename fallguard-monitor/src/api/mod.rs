//! HTTP API for the fall monitor
//!
//! Frame submission, operator decisions, diagnostics and the SSE event
//! stream. All JSON.

pub mod handlers;
pub mod health;
pub mod sse;

pub use handlers::{confirm_fall, deny_fall, detect, status};
pub use health::health_routes;
pub use sse::event_stream;
