//! Core types and shared functionality for shipquote.
//!
//! This crate provides:
//! - Shipping rate and location caches with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheConfig, CacheDb, CacheStats, Location, RateEntry, RateQuery, RateQuote, ShippingCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
