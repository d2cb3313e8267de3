//! Client code for shipquote.
//!
//! This crate provides the shipping vendor HTTP client and the
//! [`ShippingVendor`] seam the server's read-through endpoints use.

pub mod vendor;

pub use vendor::{ShippingVendor, VendorClient, VendorConfig, VendorError, VendorRates};
