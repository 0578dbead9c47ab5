//! # FallGuard Common Library
//!
//! Shared code for the FallGuard services including:
//! - Configuration loading and validation
//! - Event types (FallguardEvent enum) and the broadcast EventBus
//! - Common error type
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
