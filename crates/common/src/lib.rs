//! Ambient utilities shared by the referral crates: logging setup and
//! Prometheus metrics.

pub mod utils;
pub mod metrics;
