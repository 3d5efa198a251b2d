//! Referral module: three-layer architecture (domain, repository, service).
//!
//! The tree queries, the distribution workflow and the leaderboard only talk
//! to [`repository::ReferralRepository`], so they run unchanged against
//! Postgres or the in-memory store.

pub mod domain;
pub mod errors;
pub mod repository;
pub mod repo;
pub mod tree;
pub mod distribution;
pub mod leaderboard;
pub mod service;

pub use errors::ReferralError;
pub use service::ReferralService;

#[cfg(test)]
mod tests;
