//! Key-Value store layer for TurboCommerce.
//!
//! Defines the [`PersistentStore`] capability the profile engine persists
//! through: plain reads plus an atomic read-modify-write of one record.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::{MemoryStore, NamespacedStore, PersistentStore};
//!
//! let store = NamespacedStore::new(MemoryStore::new(), "players");
//!
//! // Atomically merge a field into the stored record
//! store
//!     .atomic_update("1234:PlayerData", &|mut record| {
//!         record.insert("gold".into(), 10.into());
//!         record
//!     })
//!     .await?;
//!
//! // Read it back
//! let record = store.read("1234:PlayerData").await?;
//! ```

mod error;
mod key;
mod memory;
mod store;

pub use error::StoreError;
pub use key::NamespacedStore;
pub use memory::MemoryStore;
pub use store::{PersistentStore, Record, Transform};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{cache_key, MemoryStore, NamespacedStore, PersistentStore, Record, StoreError};
}
