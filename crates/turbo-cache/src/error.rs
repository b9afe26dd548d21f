//! Store error types.

use thiserror::Error;

/// Errors that can occur when talking to a persistent store.
///
/// [`MemoryStore`](crate::MemoryStore) never fails. The variants describe what
/// networked or on-disk [`PersistentStore`](crate::PersistentStore)
/// implementations report. Callers retry every variant; use
/// [`is_transient`](Self::is_transient) to tell passing failures from lasting ones.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or connect to the store.
    #[error("Failed to open store: {0}")]
    Open(String),

    /// Failed to serialize or deserialize a record.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend rejected or failed the operation.
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// The backend is temporarily unreachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backend is rate limiting this caller.
    #[error("Store throttled: {0}")]
    Throttled(String),

    /// A compare-and-swap backend lost a race with another writer.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Throttled(_) | Self::ConcurrentModification(_)
        )
    }
}
