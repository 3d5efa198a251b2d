//! Service layer of the referral network.
//! - Business rules live in `referral`, persistence behind a repository trait.
//! - Reuses validation and entity definitions in `models` crate.

pub mod pagination;
pub mod referral;
#[cfg(test)]
pub mod test_support;
