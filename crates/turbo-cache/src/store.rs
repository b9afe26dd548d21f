//! Persistent store abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::StoreError;

/// A stored record: field name to (encoded) JSON value.
pub type Record = Map<String, Value>;

/// Transform applied by [`PersistentStore::atomic_update`].
///
/// Receives the currently stored record (empty when the key is absent) and
/// returns the record to store. Backends may call it more than once under
/// contention, so it must depend only on its input.
pub type Transform<'a> = dyn Fn(Record) -> Record + Send + Sync + 'a;

/// Remote key-value backend holding one [`Record`] per key.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Read the record stored under `key`.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read(&self, key: &str) -> Result<Option<Record>, StoreError>;

    /// Atomically replace the record under `key` with `transform(current)`.
    ///
    /// The read, the transform and the write happen against one consistent
    /// snapshot: no other writer's update is lost or interleaved. Returns the
    /// record that was written.
    async fn atomic_update(
        &self,
        key: &str,
        transform: &Transform<'_>,
    ) -> Result<Record, StoreError>;
}

#[async_trait]
impl<S> PersistentStore for Arc<S>
where
    S: PersistentStore + ?Sized,
{
    async fn read(&self, key: &str) -> Result<Option<Record>, StoreError> {
        (**self).read(key).await
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &Transform<'_>,
    ) -> Result<Record, StoreError> {
        (**self).atomic_update(key, transform).await
    }
}
