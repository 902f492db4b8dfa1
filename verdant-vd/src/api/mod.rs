//! HTTP API handlers

pub mod discovered_venues;
pub mod health;
pub mod ingest;
pub mod sse;
pub mod stats;
