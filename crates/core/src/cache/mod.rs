//! SQLite-backed caches for shipping rates and locations.
//!
//! This module provides a persistent cache using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - Append-only shipping rate rows keyed by a hashed composite key
//! - TTL expiry, hit counting and an expiry sweep
//! - An upserted location reference table with text search
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod locations;
pub mod migrations;
pub mod rates;
pub mod shipping;

use chrono::{DateTime, SecondsFormat, Utc};

pub use crate::Error;

pub use connection::CacheDb;
pub use locations::Location;
pub use rates::{NewRateEntry, RateEntry, RateQuery, RateQuote};
pub use shipping::{CacheConfig, CacheStats, ShippingCache};

/// Format a timestamp for storage.
///
/// Fixed-width microsecond RFC 3339 keeps string order equal to time order,
/// which the `expires_at`/`created_at` comparisons in SQL rely on.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let fractional = whole + Duration::microseconds(5);
        assert_eq!(timestamp(whole), "2024-01-01T00:00:00.000000Z");
        assert_eq!(timestamp(whole).len(), timestamp(fractional).len());
        assert!(timestamp(whole) < timestamp(fractional));
    }
}
