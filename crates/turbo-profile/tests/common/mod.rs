//! Shared stores and observers for profile integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use turbo_profile::{
    CodecError, Compressor, MemoryStore, PersistentStore, ProfileEvent, ProfileObserver, Record,
    StoreError, Transform,
};

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// One atomic update as seen by the backend.
#[derive(Debug, Clone)]
pub struct Write {
    pub before: Record,
    pub after: Record,
}

impl Write {
    /// Field names whose stored value changed or disappeared.
    pub fn touched_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .after
            .iter()
            .filter(|(field, value)| self.before.get(*field) != Some(*value))
            .map(|(field, _)| field.clone())
            .chain(
                self.before
                    .keys()
                    .filter(|field| !self.after.contains_key(*field))
                    .cloned(),
            )
            .collect();
        fields.sort();
        fields
    }
}

/// Backend that can fail on demand and remembers every write.
#[derive(Debug, Default)]
pub struct TestStore {
    pub inner: MemoryStore,
    writes: Mutex<Vec<Write>>,
    read_attempts: AtomicU32,
    update_attempts: AtomicU32,
    fail_reads: Mutex<bool>,
    failing_updates: AtomicU32,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_record(key: &str, value: Value) -> Arc<Self> {
        let store = Self::default();
        store.inner.set(key, record(value));
        Arc::new(store)
    }

    /// Fail every read from now on.
    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    /// Fail the next `n` atomic updates.
    pub fn fail_next_updates(&self, n: u32) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    /// Fail every atomic update from now on.
    pub fn fail_all_updates(&self) {
        self.fail_next_updates(u32::MAX);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn update_attempts(&self) -> u32 {
        self.update_attempts.load(Ordering::SeqCst)
    }

    pub fn read_attempts(&self) -> u32 {
        self.read_attempts.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &str) -> Option<Record> {
        self.inner.get(key)
    }
}

#[async_trait]
impl PersistentStore for TestStore {
    async fn read(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.read_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_reads.lock().unwrap() {
            return Err(StoreError::Unavailable("read refused".into()));
        }
        self.inner.read(key).await
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &Transform<'_>,
    ) -> Result<Record, StoreError> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failing_updates.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failing_updates.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(StoreError::Throttled("too many requests".into()));
        }

        let before = self.inner.get(key).unwrap_or_default();
        let after = self.inner.atomic_update(key, transform).await?;
        self.writes.lock().unwrap().push(Write {
            before,
            after: after.clone(),
        });
        Ok(after)
    }
}

/// Backend whose "atomic" update reads, yields, then writes.
///
/// Two concurrent updates to one key lose one of the writes unless the caller
/// serializes them.
#[derive(Debug, Default)]
pub struct RacyStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl PersistentStore for RacyStore {
    async fn read(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.inner.read(key).await
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &Transform<'_>,
    ) -> Result<Record, StoreError> {
        let current = self.inner.get(key).unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let next = transform(current);
        self.inner.set(key, next.clone());
        Ok(next)
    }
}

/// Codec that rejects every value in both directions.
#[derive(Debug, Default)]
pub struct BrokenCodec;

impl Compressor for BrokenCodec {
    fn encode(&self, _value: &Value) -> Result<Value, CodecError> {
        Err(CodecError::Encode("codec offline".into()))
    }

    fn decode(&self, _encoded: &Value) -> Result<Value, CodecError> {
        Err(CodecError::Decode("codec offline".into()))
    }
}

/// Observer collecting every event it sees.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<ProfileEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ProfileEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl ProfileObserver for Recorder {
    fn on_event(&self, _key: &str, event: &ProfileEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
