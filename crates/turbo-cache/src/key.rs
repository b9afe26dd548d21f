//! Key building and namespacing.

use async_trait::async_trait;

use crate::store::{PersistentStore, Record, Transform};
use crate::StoreError;

/// Helper to build cache keys with namespacing.
///
/// # Example
///
/// ```rust,ignore
/// let key = cache_key!("cart", user_id);
/// // Returns "cart:user123"
/// ```
#[macro_export]
macro_rules! cache_key {
    ($prefix:expr, $($part:expr),+) => {{
        let mut key = String::from($prefix);
        $(
            key.push(':');
            key.push_str(&$part.to_string());
        )+
        key
    }};
}

/// Store handle scoped to one namespace of a shared backend.
///
/// Every key is stored as `<namespace>/<key>`, so two namespaces over the same
/// backend never see each other's records.
#[derive(Debug, Clone)]
pub struct NamespacedStore<S> {
    inner: S,
    namespace: String,
}

impl<S> NamespacedStore<S> {
    /// Scope `inner` to `namespace`.
    pub fn new(inner: S, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    /// The namespace this handle writes into.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The backend key used for a logical `key`.
    pub fn scoped_key(&self, key: &str) -> String {
        format!("{}/{}", self.namespace, key)
    }
}

#[async_trait]
impl<S: PersistentStore> PersistentStore for NamespacedStore<S> {
    async fn read(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.inner.read(&self.scoped_key(key)).await
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &Transform<'_>,
    ) -> Result<Record, StoreError> {
        self.inner
            .atomic_update(&self.scoped_key(key), transform)
            .await
    }
}
