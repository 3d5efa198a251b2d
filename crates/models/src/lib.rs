//! Persistence model of the referral network: users (the forest), invites
//! and the append-only points ledger.

pub mod errors;
pub mod db;
pub mod user;
pub mod invite;
pub mod points_transaction;

pub use invite::InviteStatus;
pub use user::Role;

#[cfg(test)]
mod tests;
