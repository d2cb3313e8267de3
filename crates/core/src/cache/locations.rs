//! Location reference table.
//!
//! Locations are keyed by the vendor's unique code and written with upserts,
//! so repeated vendor answers refresh rows instead of duplicating them.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// A searchable place (typically a subdistrict).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Vendor-assigned unique code.
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Denormalized display string, e.g. `"Kebon Jeruk, Jakarta Barat, DKI Jakarta"`.
    pub full_name: String,
}

const LOCATION_COLUMNS: &str = "code, name, province, city, district, type, full_name";

fn location_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        code: row.get(0)?,
        name: row.get(1)?,
        province: row.get(2)?,
        city: row.get(3)?,
        district: row.get(4)?,
        kind: row.get(5)?,
        full_name: row.get(6)?,
    })
}

/// Split a search string into LIKE patterns, one per whitespace token.
fn like_patterns(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| {
            let escaped = token.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{escaped}%")
        })
        .collect()
}

/// Prefix pattern for ranking names that start with the first token.
fn prefix_pattern(query: &str) -> String {
    let first = query.split_whitespace().next().unwrap_or_default();
    let escaped = first.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{escaped}%")
}

impl CacheDb {
    /// Insert or update locations by code in one transaction.
    ///
    /// Returns the number of rows written.
    pub async fn upsert_locations(&self, locations: &[Location]) -> Result<usize, Error> {
        let locations = locations.to_vec();
        let now = super::timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO locations (code, name, province, city, district, type, full_name, created_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                        ON CONFLICT(code) DO UPDATE SET
                            name = excluded.name,
                            province = excluded.province,
                            city = excluded.city,
                            district = excluded.district,
                            type = excluded.type,
                            full_name = excluded.full_name,
                            updated_at = excluded.updated_at",
                    )?;
                    for location in &locations {
                        stmt.execute(params![
                            &location.code,
                            &location.name,
                            &location.province,
                            &location.city,
                            &location.district,
                            &location.kind,
                            &location.full_name,
                            &now,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(locations.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a location by code.
    pub async fn get_location(&self, code: &str) -> Result<Option<Location>, Error> {
        let code = code.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Location>, Error> {
                let mut stmt = conn.prepare(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE code = ?1"))?;
                match stmt.query_row(params![code], location_from_row) {
                    Ok(location) => Ok(Some(location)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored locations.
    pub async fn count_locations(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Search locations whose full name contains every token of `query`.
    ///
    /// Matching is case-insensitive. Names starting with the first token
    /// rank first, then shorter full names.
    pub async fn search_locations(&self, query: &str, limit: usize) -> Result<Vec<Location>, Error> {
        let patterns = like_patterns(query);
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let prefix = prefix_pattern(query);
        let filter = vec!["full_name LIKE ? ESCAPE '\\'"; patterns.len()].join(" AND ");
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations
             WHERE {filter}
             ORDER BY CASE WHEN name LIKE ? ESCAPE '\\' THEN 0 ELSE 1 END, LENGTH(full_name), full_name
             LIMIT {limit}"
        );
        let mut bindings = patterns;
        bindings.push(prefix);
        self.query_locations(sql, bindings).await
    }

    /// Search locations whose full name contains any token of `query`.
    ///
    /// Rows matching more tokens rank first. Used as the fallback when the
    /// vendor is unavailable.
    pub async fn search_locations_loose(&self, query: &str, limit: usize) -> Result<Vec<Location>, Error> {
        let patterns = like_patterns(query);
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let prefix = prefix_pattern(query);
        let matched = vec!["(full_name LIKE ? ESCAPE '\\')"; patterns.len()].join(" + ");
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM (
                SELECT *, ({matched}) AS matched FROM locations
             )
             WHERE matched > 0
             ORDER BY matched DESC, CASE WHEN name LIKE ? ESCAPE '\\' THEN 0 ELSE 1 END, LENGTH(full_name), full_name
             LIMIT {limit}"
        );
        let mut bindings = patterns;
        bindings.push(prefix);
        self.query_locations(sql, bindings).await
    }

    async fn query_locations(&self, sql: String, bindings: Vec<String>) -> Result<Vec<Location>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Location>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(bindings.iter()), location_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }
}
