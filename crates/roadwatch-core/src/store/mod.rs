//! The issue store contract and its change-notification channel.
//!
//! Two implementations sit behind [`IssueStore`]:
//!
//! - [`local::LocalIssueStore`]: one named record in a [`kv::KvStore`],
//!   rewritten in full on every write. Subscriptions are emulated by
//!   notifying listeners right after each write returns from storage.
//! - [`remote::RemoteIssueStore`]: a client of a shared multi-writer
//!   [`remote::RemoteHub`]. Writes can fail transiently and every change,
//!   including the client's own, arrives back through the subscription.
//!
//! Every subscription starts with a replay of the current collection as
//! synthetic [`ChangeKind::Added`] events, then receives live changes.

pub mod kv;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::StoreError;
use crate::model::{IssueDraft, IssueId, IssueRecord, IssueStatus};

pub use local::LocalIssueStore;
pub use remote::{RemoteHub, RemoteIssueStore};

/// Kind of delta carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        })
    }
}

/// One record's delta. `record` is present for added/modified changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: IssueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<IssueRecord>,
}

impl ChangeEvent {
    #[must_use]
    pub fn added(record: IssueRecord) -> Self {
        Self {
            kind: ChangeKind::Added,
            id: record.id.clone(),
            record: Some(record),
        }
    }

    #[must_use]
    pub fn modified(record: IssueRecord) -> Self {
        Self {
            kind: ChangeKind::Modified,
            id: record.id.clone(),
            record: Some(record),
        }
    }

    #[must_use]
    pub const fn removed(id: IssueId) -> Self {
        Self {
            kind: ChangeKind::Removed,
            id,
            record: None,
        }
    }
}

/// Persistence contract shared by the local and remote stores.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Current snapshot in insertion order.
    async fn list(&self) -> Result<Vec<IssueRecord>, StoreError>;

    /// Validate, assign id/status/timestamp, persist, and notify.
    async fn create(&self, draft: IssueDraft) -> Result<IssueRecord, StoreError>;

    /// Overwrite the status of `id` and notify. No other field changes.
    async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
    ) -> Result<IssueRecord, StoreError>;

    /// Register a listener; existing records are replayed as `Added` first.
    async fn subscribe(&self) -> Result<Subscription, StoreError>;

    async fn get(&self, id: &IssueId) -> Result<Option<IssueRecord>, StoreError> {
        Ok(self.list().await?.into_iter().find(|r| &r.id == id))
    }
}

#[async_trait]
impl<S: IssueStore + ?Sized> IssueStore for Arc<S> {
    async fn list(&self) -> Result<Vec<IssueRecord>, StoreError> {
        (**self).list().await
    }

    async fn create(&self, draft: IssueDraft) -> Result<IssueRecord, StoreError> {
        (**self).create(draft).await
    }

    async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
    ) -> Result<IssueRecord, StoreError> {
        (**self).update_status(id, status).await
    }

    async fn subscribe(&self) -> Result<Subscription, StoreError> {
        (**self).subscribe().await
    }

    async fn get(&self, id: &IssueId) -> Result<Option<IssueRecord>, StoreError> {
        (**self).get(id).await
    }
}

#[derive(Debug, Default)]
struct Listeners {
    next_id: u64,
    senders: Vec<(u64, UnboundedSender<ChangeEvent>)>,
}

/// Fan-out of change events to every live [`Subscription`].
#[derive(Debug, Clone, Default)]
pub struct SubscriberSet {
    inner: Arc<Mutex<Listeners>>,
}

impl SubscriberSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener whose channel is pre-loaded with `replay`.
    ///
    /// Callers that can race with writers must take the replay snapshot and
    /// call this under the same lock they emit under.
    pub fn subscribe(&self, replay: impl IntoIterator<Item = ChangeEvent>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in replay {
            // The receiver is still in hand, so this send cannot fail.
            let _ = tx.send(event);
        }

        let mut listeners = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.senders.push((id, tx));
        tracing::debug!(listener = id, total = listeners.senders.len(), "listener registered");

        Subscription {
            id,
            rx,
            owner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live listener, dropping closed ones.
    pub fn emit(&self, event: &ChangeEvent) {
        let mut listeners = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        listeners
            .senders
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
        tracing::trace!(kind = %event.kind, id = %event.id, listeners = listeners.senders.len(), "change emitted");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving end of a store subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: UnboundedReceiver<ChangeEvent>,
    owner: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Wait for the next event. `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// All events delivered so far, in order.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Explicit form of dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            let mut listeners = owner.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.senders.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeEvent, ChangeKind, SubscriberSet};
    use crate::model::IssueId;

    fn removed(raw: &str) -> ChangeEvent {
        ChangeEvent::removed(IssueId::new_unchecked(raw))
    }

    #[test]
    fn replay_precedes_live_events() {
        let set = SubscriberSet::new();
        let mut sub = set.subscribe([removed("a")]);
        set.emit(&removed("b"));

        let ids: Vec<_> = sub.drain().into_iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let set = SubscriberSet::new();
        let first = set.subscribe([]);
        let _second = set.subscribe([]);
        assert_eq!(set.len(), 2);

        first.unsubscribe();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn every_listener_sees_each_event_once() {
        let set = SubscriberSet::new();
        let mut a = set.subscribe([]);
        let mut b = set.subscribe([]);
        set.emit(&removed("x"));

        for sub in [&mut a, &mut b] {
            let events = sub.drain();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, ChangeKind::Removed);
        }
    }
}
