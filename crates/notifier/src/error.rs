//! Error taxonomy for the dispatch pipeline.
//!
//! - [`TransportError`]: the queue could not accept or hand out a task. This
//!   is the only error the dispatcher surfaces to its caller.
//! - [`StoreError`]: the record store failed. Always treated as transient.
//! - [`ProcessingError`]: why a single task failed; [`ProcessingError::is_permanent`]
//!   decides between discarding and retrying.

use thiserror::Error;

use herald_common::error::AppError;

/// The queue transport failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode queued task: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Queue closed: {0}")]
    Closed(String),
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

/// The record store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failure while materializing one envelope.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("User with ID {0} does not exist")]
    RecipientNotFound(i64),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Failed to create notification: {0}")]
    Store(#[from] StoreError),
}

impl ProcessingError {
    /// True when retrying cannot change the result.
    ///
    /// Only the variants listed here are permanent; anything else, including
    /// variants added later, is retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::RecipientNotFound(_) | Self::InvalidEnvelope(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_recipient_is_permanent() {
        assert!(ProcessingError::RecipientNotFound(999).is_permanent());
    }

    #[test]
    fn test_invalid_envelope_is_permanent() {
        assert!(ProcessingError::InvalidEnvelope("empty title".into()).is_permanent());
    }

    #[test]
    fn test_store_failures_are_transient() {
        let unavailable = ProcessingError::from(StoreError::Unavailable("timeout".into()));
        assert!(!unavailable.is_permanent());

        let pool = ProcessingError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert!(!pool.is_permanent());

        // A missing row from the driver is still a store failure, not a missing recipient.
        let row = ProcessingError::from(StoreError::Database(sqlx::Error::RowNotFound));
        assert!(!row.is_permanent());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ProcessingError::RecipientNotFound(999).to_string(),
            "User with ID 999 does not exist"
        );
        let err = ProcessingError::from(StoreError::Unavailable("connection reset".into()));
        assert_eq!(
            err.to_string(),
            "Failed to create notification: Store unavailable: connection reset"
        );
    }

    #[test]
    fn test_transport_error_maps_to_unavailable() {
        let app: AppError = TransportError::Closed("shutting down".into()).into();
        assert!(matches!(app, AppError::Unavailable(_)));
    }
}
