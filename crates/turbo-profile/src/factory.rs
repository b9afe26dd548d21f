//! Profile construction for one namespace.

use std::sync::Arc;

use turbo_cache::{cache_key, NamespacedStore, PersistentStore};

use crate::codec::{Compressor, IdentityCodec};
use crate::events::{EventChannel, EventKind, ProfileObserver, SubscriptionId};
use crate::lock::KeyLocks;
use crate::{Profile, ProfileConfig, ProfileError, Template};

/// Creates profiles that share a backend, a template and a lock registry.
///
/// # Example
///
/// ```rust,ignore
/// let factory = ProfileFactory::new(store, "players", "PlayerData", template)
///     .with_config(ProfileConfig::load("profile.toml")?);
///
/// let mut profile = factory.load_profile("1234").await?;
/// ```
pub struct ProfileFactory {
    store: Arc<dyn PersistentStore>,
    master_key: String,
    template: Template,
    config: ProfileConfig,
    compressor: Arc<dyn Compressor>,
    locks: KeyLocks,
    events: EventChannel,
}

impl ProfileFactory {
    /// Create a factory writing into `namespace` of `store`.
    ///
    /// Every profile key ends with `master_key`, so different record kinds
    /// for the same identity don't collide.
    pub fn new<S>(
        store: S,
        namespace: impl Into<String>,
        master_key: impl Into<String>,
        template: Template,
    ) -> Self
    where
        S: PersistentStore + 'static,
    {
        Self {
            store: Arc::new(NamespacedStore::new(store, namespace)),
            master_key: master_key.into(),
            template,
            config: ProfileConfig::default(),
            compressor: Arc::new(IdentityCodec),
            locks: KeyLocks::new(),
            events: EventChannel::new(),
        }
    }

    /// Set the config applied to new profiles.
    pub fn with_config(mut self, config: ProfileConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the codec applied to new profiles.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// The config applied to new profiles.
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Subscribe to every event of every profile created afterwards.
    pub fn subscribe(&mut self, observer: Arc<dyn ProfileObserver>) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    /// Subscribe to one kind of event of every profile created afterwards.
    pub fn subscribe_to(&mut self, kind: EventKind, observer: Arc<dyn ProfileObserver>) -> SubscriptionId {
        self.events.subscribe_to(kind, observer)
    }

    /// The logical key of `identity`'s record.
    pub fn key_for(&self, identity: impl std::fmt::Display) -> String {
        cache_key!(identity.to_string(), self.master_key)
    }

    /// Create an unloaded profile for `identity`.
    pub fn profile(&self, identity: impl std::fmt::Display) -> Profile {
        let key = self.key_for(identity);
        let profile = Profile::new(Arc::clone(&self.store), key, self.template.clone())
            .with_config(&self.config)
            .with_compressor(Arc::clone(&self.compressor))
            .with_events(self.events.clone());

        if self.config.single_flight {
            profile.with_key_locks(self.locks.clone())
        } else {
            profile
        }
    }

    /// Create and load a profile for `identity`.
    pub async fn load_profile(&self, identity: impl std::fmt::Display) -> Result<Profile, ProfileError> {
        let mut profile = self.profile(identity);
        profile.load().await?;
        Ok(profile)
    }
}

impl std::fmt::Debug for ProfileFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileFactory")
            .field("master_key", &self.master_key)
            .field("template", &self.template)
            .field("config", &self.config)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
