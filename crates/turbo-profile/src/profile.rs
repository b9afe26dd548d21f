//! Cached profile record with delta saves.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use turbo_cache::{PersistentStore, Record};

use crate::codec::{decode_or_raw, encode_or_raw, Compressor, IdentityCodec};
use crate::events::{EventChannel, EventKind, FailureKind, ProfileEvent, ProfileObserver, SubscriptionId};
use crate::lock::KeyLocks;
use crate::retry::{atomic_update_with_retry, RetryPolicy};
use crate::{ProfileConfig, ProfileError, Template};

/// One session's cached copy of a stored record.
///
/// Reads the record once with [`load`](Self::load), mutates it in memory with
/// [`set`](Self::set), and writes back only the changed fields with
/// [`save`](Self::save). [`update`](Self::update) applies a transform to the
/// stored value directly, for counters that must not lose concurrent writes.
/// After [`end_session`](Self::end_session) the profile is inert.
///
/// # Example
///
/// ```rust,ignore
/// let mut profile = Profile::new(store, "1234:PlayerData", template);
/// profile.load().await?;
///
/// profile.set("gold", json!(10));
/// profile.save().await?;
///
/// profile.update("logins", |n| json!(n.as_i64().unwrap_or(0) + 1)).await?;
/// profile.end_session().await?;
/// ```
pub struct Profile {
    store: Arc<dyn PersistentStore>,
    key: String,
    template: Template,
    data: Record,
    dirty: BTreeSet<String>,
    loaded: bool,
    ended: bool,
    has_changes_since_last_save: bool,
    retry: RetryPolicy,
    end_session_cooldown: Duration,
    compressor: Arc<dyn Compressor>,
    locks: Option<KeyLocks>,
    events: EventChannel,
}

impl Profile {
    /// Create an unloaded profile for `key` with default settings.
    pub fn new(store: Arc<dyn PersistentStore>, key: impl Into<String>, template: Template) -> Self {
        let config = ProfileConfig::default();
        Self {
            store,
            key: key.into(),
            template,
            data: Record::new(),
            dirty: BTreeSet::new(),
            loaded: false,
            ended: false,
            has_changes_since_last_save: false,
            retry: config.retry_policy(),
            end_session_cooldown: config.end_session_cooldown(),
            compressor: Arc::new(IdentityCodec),
            locks: Some(KeyLocks::new()),
            events: EventChannel::new(),
        }
    }

    /// Apply retry, cooldown and locking settings.
    pub fn with_config(mut self, config: &ProfileConfig) -> Self {
        self.retry = config.retry_policy();
        self.end_session_cooldown = config.end_session_cooldown();
        if !config.single_flight {
            self.locks = None;
        } else if self.locks.is_none() {
            self.locks = Some(KeyLocks::new());
        }
        self
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the codec used for stored field values.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// Share a lock registry with other profiles.
    pub fn with_key_locks(mut self, locks: KeyLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Use an existing subscriber list.
    pub fn with_events(mut self, events: EventChannel) -> Self {
        self.events = events;
        self
    }

    /// The logical key of the stored record.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The in-memory record.
    pub fn data(&self) -> &Record {
        &self.data
    }

    /// Get a field's in-memory value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// The template used to fill missing fields.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Replace the template. Call [`reconcile`](Self::reconcile) to apply it.
    pub fn set_template(&mut self, template: Template) {
        self.template = template;
    }

    /// Whether [`load`](Self::load) has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the session has ended.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Fields changed since they were last saved.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Whether `field` has unsaved changes.
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    /// Whether anything changed since the last full save.
    pub fn has_changes_since_last_save(&self) -> bool {
        self.has_changes_since_last_save
    }

    /// Subscribers of this profile's events.
    pub fn events_mut(&mut self) -> &mut EventChannel {
        &mut self.events
    }

    /// Receive every event of this profile.
    pub fn subscribe(&mut self, observer: Arc<dyn ProfileObserver>) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    /// Read the stored record into memory.
    ///
    /// A failed read is reported through a `LoadFailed` event and the profile
    /// continues from an empty record. Fields that fail to decode keep their
    /// stored value. Missing template fields are filled in; the result counts
    /// as clean.
    pub async fn load(&mut self) -> Result<&Record, ProfileError> {
        if self.ended {
            return Err(ProfileError::SessionEnded);
        }

        let remote = match self.store.read(&self.key).await {
            Ok(remote) => remote.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to read profile, starting from defaults");
                self.emit_error(FailureKind::LoadFailed, err.to_string());
                Record::new()
            }
        };

        let mut data: Record = remote
            .iter()
            .map(|(field, raw)| (field.clone(), decode_or_raw(&*self.compressor, field, raw)))
            .collect();
        let filled = self.template.fill_missing(&mut data);

        self.data = data;
        self.dirty.clear();
        self.has_changes_since_last_save = false;
        self.loaded = true;

        tracing::debug!(key = %self.key, fields = self.data.len(), filled = filled.len(), "profile loaded");
        self.emit(EventKind::Loaded, || ProfileEvent::Loaded(self.data.clone()));
        Ok(&self.data)
    }

    /// Set a field in memory and mark it dirty. No-op once ended.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if self.ended {
            tracing::debug!(key = %self.key, field = %field, "ignoring set on ended profile");
            return;
        }

        let old = self.data.insert(field.clone(), value).unwrap_or(Value::Null);
        self.dirty.insert(field.clone());
        self.has_changes_since_last_save = true;

        self.emit(EventKind::Updated, || ProfileEvent::Updated {
            new: self.data.get(&field).cloned().unwrap_or(Value::Null),
            field: field.clone(),
            old,
        });
    }

    /// Remove a field in memory and mark it dirty, so the next save deletes
    /// it from the stored record. No-op once ended or if the field is absent.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        if self.ended {
            return None;
        }

        let old = self.data.remove(field)?;
        self.dirty.insert(field.to_string());
        self.has_changes_since_last_save = true;

        self.emit(EventKind::Updated, || ProfileEvent::Updated {
            field: field.to_string(),
            old: old.clone(),
            new: Value::Null,
        });
        Some(old)
    }

    /// Fill every template field missing from the record, marking it dirty.
    ///
    /// Returns the filled field names; empty once the record has every field.
    pub fn reconcile(&mut self) -> Vec<String> {
        if self.ended {
            return Vec::new();
        }

        let filled = self.template.fill_missing(&mut self.data);
        if !filled.is_empty() {
            self.dirty.extend(filled.iter().cloned());
            self.has_changes_since_last_save = true;
        }
        filled
    }

    /// Save every dirty field. Succeeds without I/O once ended or when clean.
    pub async fn save(&mut self) -> Result<(), ProfileError> {
        if self.ended {
            return Ok(());
        }
        self.save_delta(None).await
    }

    /// Save only the listed fields, dirty or not.
    ///
    /// Listed fields missing from the record are deleted from the stored one.
    pub async fn save_fields<I, S>(&mut self, fields: I) -> Result<(), ProfileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.ended {
            return Ok(());
        }
        let fields = fields.into_iter().map(Into::into).collect();
        self.save_delta(Some(fields)).await
    }

    async fn save_delta(&mut self, explicit: Option<BTreeSet<String>>) -> Result<(), ProfileError> {
        self.emit(EventKind::Saving, || ProfileEvent::Saving(self.data.clone()));

        let (fields, covers_all_dirty) = match explicit {
            Some(fields) => {
                let covers = self.dirty.is_subset(&fields);
                (fields, covers)
            }
            None => (self.dirty.clone(), true),
        };
        if fields.is_empty() {
            return Ok(());
        }

        // None deletes the field from the stored record.
        let delta: Vec<(String, Option<Value>)> = fields
            .iter()
            .map(|field| {
                let encoded = self
                    .data
                    .get(field)
                    .map(|value| encode_or_raw(&*self.compressor, field, value));
                (field.clone(), encoded)
            })
            .collect();

        let merge = |mut remote: Record| {
            for (field, encoded) in &delta {
                match encoded {
                    Some(value) => {
                        remote.insert(field.clone(), value.clone());
                    }
                    None => {
                        remote.remove(field);
                    }
                }
            }
            remote
        };

        tracing::debug!(key = %self.key, fields = ?fields, "saving profile");
        let result = {
            let _guard = self.lock_key().await;
            atomic_update_with_retry(&*self.store, &self.key, &self.retry, &merge).await
        };

        match result {
            Ok(_) => {
                for field in &fields {
                    self.dirty.remove(field);
                }
                if covers_all_dirty {
                    self.has_changes_since_last_save = false;
                }
                Ok(())
            }
            Err(err) => {
                self.emit_error(FailureKind::SaveFailed, err.last.to_string());
                Err(ProfileError::SaveFailed {
                    key: self.key.clone(),
                    attempts: err.attempts,
                    source: err.last,
                })
            }
        }
    }

    /// Atomically transform the stored value of `field`.
    ///
    /// `transform` receives the value currently stored (`Null` if absent), not
    /// the cached one, and its result is written in the same atomic step. On
    /// success the cache takes the new value and the field is no longer dirty,
    /// so an unsaved [`set`](Self::set) of the same field is discarded.
    /// `transform` may run more than once and must depend only on its input.
    pub async fn update<F>(&mut self, field: &str, transform: F) -> Result<Value, ProfileError>
    where
        F: Fn(&Value) -> Value + Send + Sync,
    {
        if self.ended {
            return Err(ProfileError::SessionEnded);
        }

        let codec = Arc::clone(&self.compressor);
        let outcome: Mutex<Option<(Value, Value)>> = Mutex::new(None);
        let apply = |mut remote: Record| {
            let current = remote
                .get(field)
                .map(|raw| decode_or_raw(&*codec, field, raw))
                .unwrap_or(Value::Null);
            let next = transform(&current);
            remote.insert(field.to_string(), encode_or_raw(&*codec, field, &next));
            *outcome.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((current, next));
            remote
        };

        let result = {
            let _guard = self.lock_key().await;
            atomic_update_with_retry(&*self.store, &self.key, &self.retry, &apply).await
        };

        let written = match result {
            Ok(written) => written,
            Err(err) => {
                self.emit_error(FailureKind::UpdateFailed, err.last.to_string());
                return Err(ProfileError::UpdateFailed {
                    key: self.key.clone(),
                    field: field.to_string(),
                    attempts: err.attempts,
                    source: err.last,
                });
            }
        };

        let captured = outcome
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (old, new) = match captured {
            Some(pair) => pair,
            // The backend reported success without running the transform.
            None => {
                let stored = written
                    .get(field)
                    .map(|raw| decode_or_raw(&*self.compressor, field, raw))
                    .unwrap_or(Value::Null);
                (Value::Null, stored)
            }
        };

        self.data.insert(field.to_string(), new.clone());
        self.dirty.remove(field);
        self.has_changes_since_last_save = !self.dirty.is_empty();

        self.emit(EventKind::Updated, || ProfileEvent::Updated {
            field: field.to_string(),
            old,
            new: new.clone(),
        });
        Ok(new)
    }

    /// End the session.
    ///
    /// Saves pending changes; if that fails, waits the configured cooldown and
    /// tries exactly once more. The in-memory record is released either way.
    /// Calling it again does nothing.
    pub async fn end_session(&mut self) -> Result<(), ProfileError> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;

        let result = if self.has_changes_since_last_save {
            match self.save_delta(None).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::warn!(
                        key = %self.key,
                        error = %err,
                        cooldown_ms = self.end_session_cooldown.as_millis() as u64,
                        "final save failed, retrying once"
                    );
                    tokio::time::sleep(self.end_session_cooldown).await;
                    self.save_delta(None).await
                }
            }
        } else {
            Ok(())
        };

        if let Err(err) = &result {
            tracing::error!(key = %self.key, error = %err, "profile ended with unsaved changes");
        }
        tracing::debug!(key = %self.key, "profile session ended");

        self.data.clear();
        self.dirty.clear();
        self.has_changes_since_last_save = false;
        result
    }

    async fn lock_key(&self) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.lock(&self.key).await),
            None => None,
        }
    }

    fn emit(&self, kind: EventKind, make: impl FnOnce() -> ProfileEvent) {
        self.events.emit_with(&self.key, kind, make);
    }

    fn emit_error(&self, kind: FailureKind, detail: String) {
        self.emit(EventKind::Error, || ProfileEvent::Error { kind, detail });
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("dirty", &self.dirty)
            .field("loaded", &self.loaded)
            .field("ended", &self.ended)
            .field("has_changes_since_last_save", &self.has_changes_since_last_save)
            .field("retry", &self.retry)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
