//! Composite cache key generation.

use sha2::{Digest, Sha256};

/// Compute the lookup key for a shipping rate query.
///
/// Inputs are expected to be normalized already (see
/// [`RateQuery::normalized`](super::RateQuery::normalized)).
pub fn compute_rate_key(origin: &str, destination: &str, weight: u32, courier: &str) -> String {
    let mut hasher = Sha256::new();
    let weight = weight.to_string();
    // Length-prefixed so no field value can shift bytes into its neighbour.
    for field in [origin, destination, weight.as_str(), courier] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
