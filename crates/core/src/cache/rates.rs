//! Shipping rate cache rows.
//!
//! Rows are append-only: every vendor answer inserts new rows and reads pick
//! the freshest non-expired one. Stale rows stay until the expiry sweep.

use super::connection::CacheDb;
use super::hash::compute_rate_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// Composite lookup key for a shipping rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuery {
    /// Origin location identifier.
    pub origin: String,
    /// Destination location identifier.
    pub destination: String,
    /// Parcel weight in grams.
    pub weight: u32,
    /// Courier identifier (e.g. `jne`).
    pub courier: String,
}

impl RateQuery {
    pub fn new(
        origin: impl Into<String>, destination: impl Into<String>, weight: u32, courier: impl Into<String>,
    ) -> Self {
        Self { origin: origin.into(), destination: destination.into(), weight, courier: courier.into() }
    }

    /// Validate that every key field is present and the weight is positive.
    pub fn validate(&self) -> Result<(), Error> {
        if self.origin.trim().is_empty() {
            return Err(Error::InvalidInput("origin is required".into()));
        }
        if self.destination.trim().is_empty() {
            return Err(Error::InvalidInput("destination is required".into()));
        }
        if self.courier.trim().is_empty() {
            return Err(Error::InvalidInput("courier is required".into()));
        }
        if self.weight == 0 {
            return Err(Error::InvalidInput("weight must be a positive integer".into()));
        }
        Ok(())
    }

    /// Trimmed identifiers and a lower-cased courier.
    pub fn normalized(&self) -> Self {
        Self {
            origin: self.origin.trim().to_string(),
            destination: self.destination.trim().to_string(),
            weight: self.weight,
            courier: self.courier.trim().to_lowercase(),
        }
    }

    /// Hash of the normalized key, as stored in `shipping_rates.key_hash`.
    pub fn key_hash(&self) -> String {
        let q = self.normalized();
        compute_rate_key(&q.origin, &q.destination, q.weight, &q.courier)
    }
}

/// A single priced courier service, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub courier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price in the currency's minor unit.
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etd: Option<String>,
}

/// A stored shipping rate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub weight: u32,
    pub courier: String,
    pub courier_name: Option<String>,
    pub service: Option<String>,
    pub description: Option<String>,
    pub price: i64,
    pub etd: Option<String>,
    pub payload_json: Option<String>,
    pub hit_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

impl RateEntry {
    /// The canonical quote carried by this row.
    pub fn quote(&self) -> RateQuote {
        RateQuote {
            courier: self.courier.clone(),
            courier_name: self.courier_name.clone(),
            service: self.service.clone(),
            description: self.description.clone(),
            price: self.price,
            etd: self.etd.clone(),
        }
    }
}

/// Row to insert, with explicit timestamps.
#[derive(Debug, Clone)]
pub struct NewRateEntry {
    pub query: RateQuery,
    pub quote: RateQuote,
    pub payload_json: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

const RATE_COLUMNS: &str = "id, origin, destination, weight, courier, courier_name, service, description,
     price, etd, payload_json, hit_count, created_at, updated_at, expires_at";

fn rate_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RateEntry> {
    Ok(RateEntry {
        id: row.get(0)?,
        origin: row.get(1)?,
        destination: row.get(2)?,
        weight: row.get(3)?,
        courier: row.get(4)?,
        courier_name: row.get(5)?,
        service: row.get(6)?,
        description: row.get(7)?,
        price: row.get(8)?,
        etd: row.get(9)?,
        payload_json: row.get(10)?,
        hit_count: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        expires_at: row.get(14)?,
    })
}

fn insert_rate(conn: &rusqlite::Connection, entry: &NewRateEntry) -> Result<i64, Error> {
    let q = entry.query.normalized();
    let key_hash = compute_rate_key(&q.origin, &q.destination, q.weight, &q.courier);
    conn.execute(
        "INSERT INTO shipping_rates (
            key_hash, origin, destination, weight, courier, courier_name, service, description,
            price, etd, payload_json, hit_count, created_at, updated_at, expires_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?12, ?13)",
        params![
            key_hash,
            q.origin,
            q.destination,
            q.weight,
            q.courier,
            &entry.quote.courier_name,
            &entry.quote.service,
            &entry.quote.description,
            entry.quote.price,
            &entry.quote.etd,
            &entry.payload_json,
            &entry.created_at,
            &entry.expires_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl CacheDb {
    /// Insert one rate row. Returns the new row id.
    pub async fn insert_rate(&self, entry: &NewRateEntry) -> Result<i64, Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<i64, Error> { insert_rate(conn, &entry) })
            .await
            .map_err(Error::from)
    }

    /// Insert several rate rows in one transaction.
    ///
    /// Either every row is written or none is.
    pub async fn insert_rates(&self, entries: Vec<NewRateEntry>) -> Result<usize, Error> {
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert_rate(&tx, entry)?;
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Non-expired rows for a key, freshest first.
    pub async fn find_fresh_rates(&self, key_hash: &str, now: &str) -> Result<Vec<RateEntry>, Error> {
        let key_hash = key_hash.to_string();
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RateEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RATE_COLUMNS} FROM shipping_rates
                     WHERE key_hash = ?1 AND expires_at > ?2
                     ORDER BY created_at DESC, id DESC"
                ))?;
                let rows = stmt.query_map(params![key_hash, now], rate_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Freshest non-expired row for a key.
    pub async fn find_latest_rate(&self, key_hash: &str, now: &str) -> Result<Option<RateEntry>, Error> {
        let key_hash = key_hash.to_string();
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<Option<RateEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RATE_COLUMNS} FROM shipping_rates
                     WHERE key_hash = ?1 AND expires_at > ?2
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1"
                ))?;

                match stmt.query_row(params![key_hash, now], rate_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Rows for the same route and courier at any weight, expired or not.
    ///
    /// Ordered by closeness of weight, then freshest first.
    pub async fn find_route_rates(
        &self, origin: &str, destination: &str, courier: &str, weight: u32, limit: usize,
    ) -> Result<Vec<RateEntry>, Error> {
        let origin = origin.to_string();
        let destination = destination.to_string();
        let courier = courier.to_string();
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<RateEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RATE_COLUMNS} FROM shipping_rates
                     WHERE origin = ?1 AND destination = ?2 AND courier = ?3
                     ORDER BY ABS(weight - ?4) ASC, created_at DESC, id DESC
                     LIMIT ?5"
                ))?;
                let rows = stmt.query_map(params![origin, destination, courier, weight, limit], rate_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Add one to the hit counter of each row.
    pub async fn increment_hits(&self, ids: Vec<i64>, now: &str) -> Result<u64, Error> {
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut stmt = conn.prepare(
                    "UPDATE shipping_rates SET hit_count = hit_count + 1, updated_at = ?2 WHERE id = ?1",
                )?;
                let mut updated = 0u64;
                for id in &ids {
                    updated += stmt.execute(params![id, now])? as u64;
                }
                Ok(updated)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every row for a key, expired or not.
    ///
    /// Returns the number of deleted rows.
    pub async fn delete_rates_by_key(&self, key_hash: &str) -> Result<u64, Error> {
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM shipping_rates WHERE key_hash = ?1", params![key_hash])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete rows that expired before `now`.
    ///
    /// Returns the number of deleted rows.
    pub async fn purge_expired_rates(&self, now: &str) -> Result<u64, Error> {
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM shipping_rates WHERE expires_at < ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Row count, summed hit count and expired row count.
    pub async fn rate_totals(&self, now: &str) -> Result<(u64, u64, u64), Error> {
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<(u64, u64, u64), Error> {
                let totals = conn.query_row(
                    "SELECT
                        COUNT(*),
                        COALESCE(SUM(hit_count), 0),
                        COALESCE(SUM(CASE WHEN expires_at < ?1 THEN 1 ELSE 0 END), 0)
                     FROM shipping_rates",
                    params![now],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
                )?;
                Ok((totals.0 as u64, totals.1 as u64, totals.2 as u64))
            })
            .await
            .map_err(Error::from)
    }
}
