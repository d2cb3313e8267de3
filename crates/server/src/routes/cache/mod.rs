//! Rate cache maintenance endpoints.

pub mod invalidate;
pub mod purge;
pub mod stats;
