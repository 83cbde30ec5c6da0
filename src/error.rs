//! Error types for the stores and the gamification service.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic write lost against a concurrent update.
    #[error("version conflict for {user_id}: expected {expected}, found {found}")]
    VersionConflict {
        user_id: String,
        expected: u64,
        found: u64,
    },

    #[error("record not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Day or one-shot challenge already marked done; nothing was awarded.
    #[error("already completed: {0}")]
    AlreadyCompleted(String),

    #[error("unknown reference: {0}")]
    InvalidReference(String),

    #[error("not participating in an active challenge {0}")]
    NotParticipating(String),

    #[error("already joined challenge {0}")]
    AlreadyJoined(String),

    #[error("challenge {0} is not available")]
    ChallengeUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Retries exhausted on an optimistic ledger write.
    #[error("concurrent update conflict for user {0}")]
    ConcurrentUpdateConflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
