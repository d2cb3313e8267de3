//! Test doubles shared by the route tests.

use crate::handler::AppState;
use async_trait::async_trait;
use shipquote_client::{ShippingVendor, VendorError, VendorRates};
use shipquote_core::{CacheConfig, CacheDb, Location, RateQuery, RateQuote, ShippingCache};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Vendor with canned answers and call counters.
pub struct MockVendor {
    pub locations: Result<Vec<Location>, VendorError>,
    pub rates: Result<Vec<RateQuote>, VendorError>,
    pub location_calls: AtomicUsize,
    pub rate_calls: AtomicUsize,
}

impl Default for MockVendor {
    fn default() -> Self {
        Self {
            locations: Ok(Vec::new()),
            rates: Ok(Vec::new()),
            location_calls: AtomicUsize::new(0),
            rate_calls: AtomicUsize::new(0),
        }
    }
}

impl MockVendor {
    pub fn with_locations(locations: Vec<Location>) -> Self {
        Self { locations: Ok(locations), ..Default::default() }
    }

    pub fn with_rates(rates: Vec<RateQuote>) -> Self {
        Self { rates: Ok(rates), ..Default::default() }
    }

    /// Every call fails with the given error.
    pub fn failing(err: VendorError) -> Self {
        Self { locations: Err(err.clone()), rates: Err(err), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.location_calls.load(Ordering::SeqCst) + self.rate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShippingVendor for MockVendor {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn search_locations(&self, _search: &str) -> Result<Vec<Location>, VendorError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.locations.clone()
    }

    async fn calculate_rates(&self, query: &RateQuery) -> Result<VendorRates, VendorError> {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        let quotes = self.rates.clone()?;
        let raw = serde_json::json!({ "data": quotes, "query": query });
        Ok(VendorRates { quotes, raw })
    }
}

/// State over a fresh in-memory store; also returns the vendor for call counts.
pub async fn state_with(vendor: MockVendor) -> (AppState, Arc<MockVendor>) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let vendor = Arc::new(vendor);
    let state = AppState::new(ShippingCache::new(db, CacheConfig::default()), vendor.clone());
    (state, vendor)
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(code: &str, name: &str, city: &str) -> Location {
    Location {
        code: code.to_string(),
        name: name.to_string(),
        province: Some("DKI Jakarta".to_string()),
        city: Some(city.to_string()),
        district: Some(name.to_string()),
        kind: Some("subdistrict".to_string()),
        full_name: format!("{name}, {city}, DKI Jakarta"),
    }
}

pub fn quote(service: &str, price: i64) -> RateQuote {
    RateQuote {
        courier: "jne".to_string(),
        courier_name: Some("JNE".to_string()),
        service: Some(service.to_string()),
        description: None,
        price,
        etd: Some("2 day".to_string()),
    }
}
