//! Profile event notifications.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use turbo_cache::Record;

/// Which backend-facing operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Reading the record failed; the profile continued from defaults.
    LoadFailed,
    /// Saving dirty fields failed after retries.
    SaveFailed,
    /// An atomic field update failed after retries.
    UpdateFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailed => write!(f, "LoadFailed"),
            Self::SaveFailed => write!(f, "SaveFailed"),
            Self::UpdateFailed => write!(f, "UpdateFailed"),
        }
    }
}

/// Something that happened to a profile.
///
/// Payloads are copies; changing them never affects the profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEvent {
    /// The record finished loading.
    Loaded(Record),
    /// A save is about to start.
    Saving(Record),
    /// A field changed in memory.
    Updated {
        field: String,
        old: Value,
        new: Value,
    },
    /// A backend operation failed.
    Error { kind: FailureKind, detail: String },
}

impl ProfileEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Loaded(_) => EventKind::Loaded,
            Self::Saving(_) => EventKind::Saving,
            Self::Updated { .. } => EventKind::Updated,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

/// The four signals a profile emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Matches [`ProfileEvent::Loaded`].
    Loaded,
    /// Matches [`ProfileEvent::Saving`].
    Saving,
    /// Matches [`ProfileEvent::Updated`].
    Updated,
    /// Matches [`ProfileEvent::Error`].
    Error,
}

/// Observer for profile events.
///
/// Called synchronously from the emitting operation, in subscription order.
pub trait ProfileObserver: Send + Sync {
    /// Called when the profile under `key` emits `event`.
    fn on_event(&self, key: &str, event: &ProfileEvent);
}

impl<F> ProfileObserver for F
where
    F: Fn(&str, &ProfileEvent) + Send + Sync,
{
    fn on_event(&self, key: &str, event: &ProfileEvent) {
        self(key, event)
    }
}

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    observer: Arc<dyn ProfileObserver>,
}

/// Subscriber list for one profile.
#[derive(Clone, Default)]
pub struct EventChannel {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventChannel {
    /// Create a channel with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe(&mut self, observer: Arc<dyn ProfileObserver>) -> SubscriptionId {
        self.add(None, observer)
    }

    /// Receive only events of `kind`.
    pub fn subscribe_to(
        &mut self,
        kind: EventKind,
        observer: Arc<dyn ProfileObserver>,
    ) -> SubscriptionId {
        self.add(Some(kind), observer)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Whether any subscriber wants events of `kind`.
    pub fn wants(&self, kind: EventKind) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.kind.map_or(true, |k| k == kind))
    }

    /// Deliver an event built by `make`, building it only if someone listens.
    pub(crate) fn emit_with(&self, key: &str, kind: EventKind, make: impl FnOnce() -> ProfileEvent) {
        if !self.wants(kind) {
            return;
        }
        let event = make();
        for sub in &self.subscriptions {
            if sub.kind.map_or(true, |k| k == kind) {
                sub.observer.on_event(key, &event);
            }
        }
    }

    fn add(&mut self, kind: Option<EventKind>, observer: Arc<dyn ProfileObserver>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription { id, kind, observer });
        id
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
