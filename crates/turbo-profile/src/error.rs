//! Profile error types.

use thiserror::Error;
use turbo_cache::StoreError;

/// Errors returned by [`Profile`](crate::Profile) operations.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The session has ended; the profile is inert.
    #[error("Profile session has ended")]
    SessionEnded,

    /// Saving dirty fields failed after exhausting retries.
    #[error("Failed to save profile {key} after {attempts} attempt(s): {source}")]
    SaveFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Atomically updating a field failed after exhausting retries.
    #[error("Failed to update field {field} of profile {key} after {attempts} attempt(s): {source}")]
    UpdateFailed {
        key: String,
        field: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

/// A single field could not be encoded or decoded.
///
/// Never escapes a profile: the field falls back to its raw value.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The stored value is not in the codec's format.
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
