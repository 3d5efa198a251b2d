use thiserror::Error;
use uuid::Uuid;

use super::domain::DistributionReport;

/// Business errors of the referral engine
#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Traversal hit the depth cap or revisited a node. Store-integrity bug.
    #[error("corrupt referral graph at user {user_id} (depth {depth})")]
    CorruptGraph { user_id: Uuid, depth: u32 },
    #[error("distribution incomplete for invite {}: failed levels {:?}", .0.invite_id, .0.failed_levels())]
    PartialDistributionFailure(DistributionReport),
    #[error("repository error: {0}")]
    Repository(String),
}

impl ReferralError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ReferralError::InvalidInput(_) => 2001,
            ReferralError::NotFound(_) => 2002,
            ReferralError::InvalidState(_) => 2003,
            ReferralError::Forbidden(_) => 2004,
            ReferralError::Conflict(_) => 2005,
            ReferralError::PartialDistributionFailure(_) => 2101,
            ReferralError::CorruptGraph { .. } => 2102,
            ReferralError::Repository(_) => 2200,
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }
}

impl From<models::errors::ModelError> for ReferralError {
    fn from(e: models::errors::ModelError) -> Self {
        use models::errors::ModelError;
        match e {
            ModelError::Validation(m) => ReferralError::InvalidInput(m),
            ModelError::Conflict(m) => ReferralError::Conflict(m),
            ModelError::Db(m) => ReferralError::Repository(m),
        }
    }
}
