//! Session-scoped profile cache for TurboCommerce.
//!
//! A [`Profile`] reads one record from a [`PersistentStore`], lets the caller
//! change it in memory as often as needed, and persists only the changed
//! fields through atomic read-modify-write updates with exponential backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_profile::prelude::*;
//!
//! let template = Template::new()
//!     .with_field("gold", json!(0))
//!     .with_field("inventory", json!({}));
//!
//! let factory = ProfileFactory::new(MemoryStore::new(), "players", "PlayerData", template);
//! let mut profile = factory.load_profile(user_id).await?;
//!
//! profile.set("gold", json!(10));
//! profile.save().await?;
//! profile.end_session().await?;
//! ```

mod codec;
mod config;
mod error;
mod events;
mod factory;
mod lock;
mod profile;
mod retry;
mod template;

pub use codec::{Base64JsonCodec, Compressor, IdentityCodec};
pub use config::ProfileConfig;
pub use error::{CodecError, ProfileError};
pub use events::{EventChannel, EventKind, FailureKind, ProfileEvent, ProfileObserver, SubscriptionId};
pub use factory::ProfileFactory;
pub use lock::KeyLocks;
pub use profile::Profile;
pub use retry::{atomic_update_with_retry, BackoffStrategy, RetryError, RetryPolicy};
pub use template::Template;
pub use turbo_cache::{MemoryStore, NamespacedStore, PersistentStore, Record, StoreError, Transform};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        EventKind, FailureKind, MemoryStore, PersistentStore, Profile, ProfileConfig, ProfileError,
        ProfileEvent, ProfileFactory, Template,
    };
}
