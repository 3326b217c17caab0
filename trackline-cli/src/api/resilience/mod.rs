//! Resilience features for outbound carrier traffic
//!
//! Bounds the number of in-flight carrier lookups so third-party rate limits
//! are respected.

pub mod config;
pub mod concurrency;

pub use config::ConcurrencyConfig;
pub use concurrency::{ConcurrencyLimiter, ConcurrencyStats};
