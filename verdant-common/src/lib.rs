//! # Verdant Common Library
//!
//! Shared code for the Verdant venue discovery services including:
//! - Common error types
//! - Domain event types (VenueEvent enum) and EventBus
//! - Configuration and root folder resolution
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
