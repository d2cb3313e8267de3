//! Read-through shipping rate cache.
//!
//! [`ShippingCache`] sits in front of the rate vendor. Reads fail open: a
//! store error is logged and reported as a miss, so callers always fall
//! through to the vendor. Writes are best effort: a failed insert is logged
//! and never reaches the caller.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::connection::CacheDb;
use super::rates::{NewRateEntry, RateEntry, RateQuery, RateQuote};
use super::timestamp;
use crate::Error;

/// Settings injected into [`ShippingCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of a written rate row.
    pub ttl: Duration,
    /// Estimated cost of one vendor call, for [`CacheStats::estimated_savings`].
    pub cost_per_call: i64,
    /// Maximum rows returned by [`ShippingCache::fallback`].
    pub fallback_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: Duration::hours(24), cost_per_call: 100, fallback_limit: 20 }
    }
}

/// Aggregate cache counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub total_hits: u64,
    pub expired_entries: u64,
    /// `total_hits * cost_per_call`.
    pub estimated_savings: i64,
}

/// Shipping rate cache over a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct ShippingCache {
    db: CacheDb,
    config: CacheConfig,
}

impl ShippingCache {
    pub fn new(db: CacheDb, config: CacheConfig) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Freshest non-expired row for the query.
    ///
    /// A hit bumps the row's hit counter; the returned row shows the count
    /// as it was read. Store failures are logged and reported as `None`.
    pub async fn get(&self, query: &RateQuery) -> Result<Option<RateEntry>, Error> {
        query.validate()?;
        let now = timestamp(Utc::now());

        let entry = match self.db.find_latest_rate(&query.key_hash(), &now).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, origin = %query.origin, destination = %query.destination, "rate cache read failed, treating as miss");
                return Ok(None);
            }
        };

        match &entry {
            Some(hit) => {
                tracing::debug!(id = hit.id, hit_count = hit.hit_count, "rate cache hit");
                self.record_hits(vec![hit.id], &now).await;
            }
            None => tracing::debug!(courier = %query.courier, "rate cache miss"),
        }

        Ok(entry)
    }

    /// Rows of the latest non-expired vendor answer, one per service,
    /// cheapest first.
    ///
    /// Rows of one answer share `created_at`; services missing from the
    /// latest answer are not filled in from older ones. Every returned row
    /// gets a hit. Store failures are logged and
    /// reported as an empty result.
    pub async fn lookup(&self, query: &RateQuery) -> Result<Vec<RateEntry>, Error> {
        query.validate()?;
        let now = timestamp(Utc::now());

        let rows = match self.db.find_fresh_rates(&query.key_hash(), &now).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, origin = %query.origin, destination = %query.destination, "rate cache read failed, treating as miss");
                return Ok(Vec::new());
            }
        };

        let latest = rows.first().map(|row| row.created_at.clone()).unwrap_or_default();
        let rows = rows.into_iter().take_while(|row| row.created_at == latest).collect();
        let mut entries = freshest_per_service(rows, usize::MAX);
        entries.sort_by_key(|entry| entry.price);

        if !entries.is_empty() {
            tracing::debug!(services = entries.len(), "rate cache hit");
            self.record_hits(entries.iter().map(|entry| entry.id).collect(), &now).await;
        }

        Ok(entries)
    }

    /// Append one row for a fresh vendor answer.
    ///
    /// Failures are logged and swallowed.
    pub async fn set(&self, query: &RateQuery, quote: &RateQuote, raw_payload: Option<&serde_json::Value>) {
        self.set_many(query, std::slice::from_ref(quote), raw_payload).await;
    }

    /// Append one row per quote of a vendor answer, in a single transaction.
    ///
    /// Failures are logged and swallowed.
    pub async fn set_many(&self, query: &RateQuery, quotes: &[RateQuote], raw_payload: Option<&serde_json::Value>) {
        if quotes.is_empty() {
            return;
        }
        if let Err(e) = query.validate() {
            tracing::warn!(error = %e, "refusing to cache rates for invalid query");
            return;
        }

        let created = Utc::now();
        let created_at = timestamp(created);
        let expires_at = timestamp(created + self.config.ttl);
        let payload_json = raw_payload.map(|payload| payload.to_string());

        let entries = quotes
            .iter()
            .map(|quote| NewRateEntry {
                query: query.clone(),
                quote: quote.clone(),
                payload_json: payload_json.clone(),
                created_at: created_at.clone(),
                expires_at: expires_at.clone(),
            })
            .collect();

        match self.db.insert_rates(entries).await {
            Ok(count) => tracing::debug!(count, courier = %query.courier, "cached vendor rates"),
            Err(e) => tracing::warn!(error = %e, "failed to cache vendor rates"),
        }
    }

    /// Delete every row for the query, expired or not.
    ///
    /// Returns `false` when the store could not be reached.
    pub async fn invalidate(&self, query: &RateQuery) -> bool {
        match self.db.delete_rates_by_key(&query.key_hash()).await {
            Ok(deleted) => {
                tracing::info!(deleted, origin = %query.origin, destination = %query.destination, "invalidated rate cache");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to invalidate rate cache");
                false
            }
        }
    }

    /// Aggregate counters over all rows.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let (total_entries, total_hits, expired_entries) = self.db.rate_totals(&timestamp(Utc::now())).await?;
        Ok(CacheStats {
            total_entries,
            total_hits,
            expired_entries,
            estimated_savings: (total_hits as i64).saturating_mul(self.config.cost_per_call),
        })
    }

    /// Delete rows whose `expires_at` has passed. Returns the count removed.
    pub async fn cleanup_expired(&self) -> Result<u64, Error> {
        let deleted = self.db.purge_expired_rates(&timestamp(Utc::now())).await?;
        tracing::info!(deleted, "removed expired rate cache rows");
        Ok(deleted)
    }

    /// Loose read used after a vendor failure.
    ///
    /// Same origin, destination and courier at any weight, including expired
    /// rows. Closest weight wins, then freshest; one row per service. Store
    /// failures yield an empty result.
    pub async fn fallback(&self, query: &RateQuery) -> Vec<RateEntry> {
        let q = query.normalized();
        let limit = self.config.fallback_limit;
        // Over-fetch so that deduplicating by service can still fill the limit.
        let fetch = limit.saturating_mul(4);

        match self.db.find_route_rates(&q.origin, &q.destination, &q.courier, q.weight, fetch).await {
            Ok(rows) => freshest_per_service(rows, limit),
            Err(e) => {
                tracing::warn!(error = %e, "rate cache fallback read failed");
                Vec::new()
            }
        }
    }

    async fn record_hits(&self, ids: Vec<i64>, now: &str) {
        if let Err(e) = self.db.increment_hits(ids, now).await {
            tracing::warn!(error = %e, "failed to record rate cache hit");
        }
    }
}

/// Keep the first row of each service, preserving order.
fn freshest_per_service(rows: Vec<RateEntry>, limit: usize) -> Vec<RateEntry> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.service.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(service: &str, price: i64) -> RateQuote {
        RateQuote {
            courier: "jne".into(),
            courier_name: Some("JNE".into()),
            service: Some(service.into()),
            description: None,
            price,
            etd: Some("1-2 day".into()),
        }
    }

    async fn seed(db: &CacheDb, query: &RateQuery, service: &str, price: i64, age: Duration, ttl: Duration) -> i64 {
        let created = Utc::now() - age;
        db.insert_rate(&NewRateEntry {
            query: query.clone(),
            quote: quote(service, price),
            payload_json: None,
            created_at: timestamp(created),
            expires_at: timestamp(created + ttl),
        })
        .await
        .unwrap()
    }

    async fn cache() -> ShippingCache {
        ShippingCache::new(CacheDb::open_in_memory().await.unwrap(), CacheConfig::default())
    }

    #[tokio::test]
    async fn test_hit_increments_counter() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        let id = seed(cache.db(), &query, "REG", 9000, Duration::minutes(1), Duration::hours(1)).await;
        cache.db().increment_hits(vec![id, id, id], &timestamp(Utc::now())).await.unwrap();

        let hit = cache.get(&query).await.unwrap().unwrap();
        assert_eq!(hit.id, id);
        assert_eq!(hit.hit_count, 3);

        let again = cache.get(&query).await.unwrap().unwrap();
        assert_eq!(again.hit_count, 4);
    }

    #[tokio::test]
    async fn test_expired_entry_is_never_returned() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        seed(cache.db(), &query, "REG", 9000, Duration::hours(2), Duration::hours(1)).await;

        assert!(cache.get(&query).await.unwrap().is_none());
        assert!(cache.lookup(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_freshest_entry_wins() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        seed(cache.db(), &query, "REG", 9000, Duration::minutes(30), Duration::hours(1)).await;
        let newer = seed(cache.db(), &query, "REG", 9900, Duration::minutes(5), Duration::hours(1)).await;
        seed(cache.db(), &query, "REG", 8000, Duration::minutes(20), Duration::hours(1)).await;

        let hit = cache.get(&query).await.unwrap().unwrap();
        assert_eq!(hit.id, newer);
        assert_eq!(hit.price, 9900);
    }

    #[tokio::test]
    async fn test_get_rejects_invalid_query() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 0, "jne");
        assert!(matches!(cache.get(&query).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_fails_open_when_store_is_closed() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = ShippingCache::new(db.clone(), CacheConfig::default());
        db.close().await.unwrap();

        let query = RateQuery::new("501", "114", 1000, "jne");
        assert!(cache.get(&query).await.unwrap().is_none());
        assert!(cache.lookup(&query).await.unwrap().is_empty());
        assert!(cache.fallback(&query).await.is_empty());
    }

    #[tokio::test]
    async fn test_set_swallows_store_failure() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = ShippingCache::new(db.clone(), CacheConfig::default());
        db.close().await.unwrap();

        let query = RateQuery::new("501", "114", 1000, "jne");
        cache.set(&query, &quote("REG", 9000), None).await;
        assert!(!cache.invalidate(&query).await);
        assert!(cache.stats().await.is_err());
    }

    #[tokio::test]
    async fn test_set_then_lookup_returns_one_row_per_service() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        let payload = serde_json::json!({"data": [{"service": "REG"}]});

        cache.set_many(&query, &[quote("YES", 18000), quote("REG", 9000)], Some(&payload)).await;

        let rows = cache.lookup(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service.as_deref(), Some("REG"));
        assert_eq!(rows[0].price, 9000);
        assert_eq!(rows[1].service.as_deref(), Some("YES"));
        assert_eq!(rows[1].payload_json.as_deref(), Some(payload.to_string().as_str()));
        assert!(rows.iter().all(|row| row.hit_count == 0));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_hits, 2);
    }

    #[tokio::test]
    async fn test_lookup_serves_only_the_latest_answer() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        let created = Utc::now();
        let answer = |quote: RateQuote, age: Duration| NewRateEntry {
            query: query.clone(),
            quote,
            payload_json: None,
            created_at: timestamp(created - age),
            expires_at: timestamp(created - age + Duration::hours(1)),
        };
        cache
            .db()
            .insert_rates(vec![
                answer(quote("REG", 9000), Duration::minutes(10)),
                answer(quote("YES", 18000), Duration::minutes(10)),
            ])
            .await
            .unwrap();
        cache
            .db()
            .insert_rates(vec![answer(quote("REG", 9500), Duration::minutes(1))])
            .await
            .unwrap();

        let rows = cache.lookup(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service.as_deref(), Some("REG"));
        assert_eq!(rows[0].price, 9500);
    }

    #[tokio::test]
    async fn test_set_uses_configured_ttl() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = ShippingCache::new(db, CacheConfig { ttl: Duration::milliseconds(-1), ..Default::default() });
        let query = RateQuery::new("501", "114", 1000, "jne");

        cache.set(&query, &quote("REG", 9000), None).await;
        assert!(cache.get(&query).await.unwrap().is_none());
        assert_eq!(cache.stats().await.unwrap().expired_entries, 1);
    }

    #[tokio::test]
    async fn test_invalidate_removes_all_rows_for_key() {
        let cache = cache().await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        let other = RateQuery::new("501", "114", 2000, "jne");
        seed(cache.db(), &query, "REG", 9000, Duration::hours(3), Duration::hours(1)).await;
        seed(cache.db(), &query, "REG", 9000, Duration::zero(), Duration::hours(1)).await;
        seed(cache.db(), &other, "REG", 9000, Duration::zero(), Duration::hours(1)).await;

        assert!(cache.invalidate(&query).await);
        assert!(cache.get(&query).await.unwrap().is_none());
        assert!(cache.get(&other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_and_cleanup() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = ShippingCache::new(db, CacheConfig { cost_per_call: 250, ..Default::default() });
        let query = RateQuery::new("501", "114", 1000, "jne");
        seed(cache.db(), &query, "REG", 9000, Duration::zero(), Duration::hours(1)).await;
        seed(cache.db(), &query, "YES", 18000, Duration::hours(3), Duration::hours(1)).await;

        cache.get(&query).await.unwrap();
        cache.get(&query).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(
            stats,
            CacheStats { total_entries: 2, total_hits: 2, expired_entries: 1, estimated_savings: 500 }
        );

        assert_eq!(cache.cleanup_expired().await.unwrap(), 1);
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 0);
    }

    #[tokio::test]
    async fn test_fallback_prefers_closest_weight_and_ignores_expiry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = ShippingCache::new(db, CacheConfig { fallback_limit: 2, ..Default::default() });
        let close = RateQuery::new("501", "114", 1200, "jne");
        let far = RateQuery::new("501", "114", 9000, "jne");
        seed(cache.db(), &close, "REG", 9000, Duration::hours(72), Duration::hours(1)).await;
        seed(cache.db(), &far, "REG", 50000, Duration::zero(), Duration::hours(1)).await;
        seed(cache.db(), &far, "YES", 90000, Duration::zero(), Duration::hours(1)).await;
        seed(cache.db(), &far, "OKE", 40000, Duration::zero(), Duration::hours(1)).await;

        let rows = cache.fallback(&RateQuery::new("501", "114", 1000, "JNE")).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].weight, 1200);
        assert_eq!(rows[0].service.as_deref(), Some("REG"));
        assert_ne!(rows[1].service.as_deref(), Some("REG"));
    }
}
