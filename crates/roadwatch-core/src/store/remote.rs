//! Shared multi-writer issue store with push notifications.
//!
//! [`RemoteHub`] stands in for a realtime backend: it owns the canonical
//! collection, applies writes in arrival order (last write wins), and pushes
//! one [`ChangeEvent`] per affected record to every subscriber, including
//! the writer. Each UI session talks to it through a [`RemoteIssueStore`].
//!
//! The hub can be taken offline or told to fail upcoming writes, which
//! surfaces as [`StoreError::Transient`] on the client.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ChangeEvent, IssueStore, SubscriberSet, Subscription};
use crate::error::StoreError;
use crate::model::{IssueDraft, IssueId, IssueRecord, IssueStatus};

/// Fault injection for the simulated transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Every call fails while set.
    pub offline: bool,
    /// Number of upcoming writes to reject.
    pub fail_next_writes: u32,
    /// Delay applied before each call reaches the hub.
    pub latency: Duration,
}

#[derive(Debug, Default)]
struct HubState {
    records: Vec<IssueRecord>,
    faults: FaultPlan,
}

impl HubState {
    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.faults.offline {
            return Err(StoreError::Transient {
                reason: "remote store is offline".to_string(),
            });
        }
        Ok(())
    }

    fn admit_write(&mut self) -> Result<(), StoreError> {
        self.check_reachable()?;
        if self.faults.fail_next_writes > 0 {
            self.faults.fail_next_writes -= 1;
            return Err(StoreError::Transient {
                reason: "write rejected by remote store".to_string(),
            });
        }
        Ok(())
    }
}

/// The shared backend. Clones refer to the same collection.
#[derive(Debug, Clone, Default)]
pub struct RemoteHub {
    state: Arc<Mutex<HubState>>,
    subscribers: SubscriberSet,
}

impl RemoteHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a client session. `session` is the default reporter identity.
    pub fn connect(&self, session: impl Into<String>) -> RemoteIssueStore {
        RemoteIssueStore {
            hub: self.clone(),
            session: session.into(),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().faults.offline = offline;
        tracing::info!(offline, "remote hub reachability changed");
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.state().faults.fail_next_writes = count;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state().faults.latency = latency;
    }

    #[must_use]
    pub fn faults(&self) -> FaultPlan {
        self.state().faults
    }

    /// Canonical collection, bypassing fault injection.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IssueRecord> {
        self.state().records.clone()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delete a record from outside any client session (moderation,
    /// retention). Emits `Removed`; returns whether the id existed.
    pub fn remove(&self, id: &IssueId) -> bool {
        let mut state = self.state();
        let before = state.records.len();
        state.records.retain(|r| &r.id != id);
        let removed = state.records.len() != before;
        if removed {
            tracing::info!(%id, "issue removed externally");
            self.subscribers.emit(&ChangeEvent::removed(id.clone()));
        }
        removed
    }

    async fn transit(&self) {
        let latency = self.state().faults.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

/// One session's view of a [`RemoteHub`].
#[derive(Debug, Clone)]
pub struct RemoteIssueStore {
    hub: RemoteHub,
    session: String,
}

impl RemoteIssueStore {
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub const fn hub(&self) -> &RemoteHub {
        &self.hub
    }
}

#[async_trait]
impl IssueStore for RemoteIssueStore {
    async fn list(&self) -> Result<Vec<IssueRecord>, StoreError> {
        self.hub.transit().await;
        let state = self.hub.state();
        state.check_reachable()?;
        Ok(state.records.clone())
    }

    async fn create(&self, mut draft: IssueDraft) -> Result<IssueRecord, StoreError> {
        draft.validate()?;
        if draft.reported_by.as_deref().is_none_or(|r| r.trim().is_empty()) {
            draft.reported_by = Some(self.session.clone());
        }

        self.hub.transit().await;
        let mut state = self.hub.state();
        state.admit_write().inspect_err(|err| {
            tracing::warn!(session = %self.session, error = %err, "remote create failed");
        })?;

        let now = Utc::now();
        let mut id = IssueId::generate(now);
        while state.records.iter().any(|r| r.id == id) {
            id = IssueId::generate(now);
        }
        let record = IssueRecord::from_draft(draft, id, now)?;
        state.records.push(record.clone());

        tracing::info!(session = %self.session, id = %record.id, "remote issue created");
        self.hub.subscribers.emit(&ChangeEvent::added(record.clone()));
        Ok(record)
    }

    async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
    ) -> Result<IssueRecord, StoreError> {
        self.hub.transit().await;
        let mut state = self.hub.state();
        state.admit_write().inspect_err(|err| {
            tracing::warn!(session = %self.session, %id, error = %err, "remote status update failed");
        })?;

        let Some(record) = state.records.iter_mut().find(|r| &r.id == id) else {
            return Err(StoreError::NotFound { id: id.clone() });
        };
        record.status = status;
        let updated = record.clone();

        tracing::info!(session = %self.session, %id, %status, "remote issue status updated");
        self.hub.subscribers.emit(&ChangeEvent::modified(updated.clone()));
        Ok(updated)
    }

    async fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.hub.transit().await;
        let state = self.hub.state();
        state.check_reachable()?;
        let replay = state.records.iter().cloned().map(ChangeEvent::added);
        Ok(self.hub.subscribers.subscribe(replay))
    }
}

#[cfg(test)]
mod tests {
    use super::RemoteHub;
    use crate::error::StoreError;
    use crate::model::{IssueDraft, IssueStatus, LatLng};
    use crate::store::{ChangeKind, IssueStore};

    fn draft() -> IssueDraft {
        IssueDraft::new("Pothole", LatLng::new(19.05, 72.86).unwrap())
    }

    #[tokio::test]
    async fn session_name_fills_missing_reporter() {
        let hub = RemoteHub::new();
        let store = hub.connect("ward-7");
        let record = store.create(draft()).await.unwrap();
        assert_eq!(record.reported_by, "ward-7");

        let named = store.create(draft().reported_by("asha")).await.unwrap();
        assert_eq!(named.reported_by, "asha");
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_leave_no_trace() {
        let hub = RemoteHub::new();
        let store = hub.connect("a");
        let mut sub = store.subscribe().await.unwrap();
        hub.fail_next_writes(1);

        let err = store.create(draft()).await.unwrap_err();
        assert!(matches!(err, StoreError::Transient { .. }));
        assert!(hub.snapshot().is_empty());
        assert!(sub.drain().is_empty());

        store.create(draft()).await.unwrap();
        assert_eq!(hub.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn invalid_draft_fails_validation_while_offline() {
        let hub = RemoteHub::new();
        let store = hub.connect("a");
        hub.set_offline(true);
        let err = store
            .create(IssueDraft::new("   ", LatLng::new(19.05, 72.86).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn invalid_draft_does_not_consume_injected_failure() {
        let hub = RemoteHub::new();
        let store = hub.connect("a");
        hub.fail_next_writes(1);

        let err = store
            .create(IssueDraft::new("  ", LatLng::new(19.05, 72.86).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "got {err:?}");

        let err = store.create(draft()).await.unwrap_err();
        assert!(matches!(err, StoreError::Transient { .. }));
        store.create(draft()).await.unwrap();
        assert_eq!(hub.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn offline_hub_rejects_reads_and_subscriptions() {
        let hub = RemoteHub::new();
        let store = hub.connect("a");
        hub.set_offline(true);
        assert!(matches!(store.list().await, Err(StoreError::Transient { .. })));
        assert!(matches!(store.subscribe().await, Err(StoreError::Transient { .. })));
        hub.set_offline(false);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn external_removal_is_pushed() {
        let hub = RemoteHub::new();
        let store = hub.connect("a");
        let record = store.create(draft()).await.unwrap();
        let mut sub = store.subscribe().await.unwrap();
        assert_eq!(sub.drain().len(), 1);

        assert!(hub.remove(&record.id));
        assert!(!hub.remove(&record.id));
        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Removed);
        assert_eq!(events[0].id, record.id);
    }

    #[tokio::test]
    async fn last_status_write_wins() {
        let hub = RemoteHub::new();
        let alice = hub.connect("alice");
        let bob = hub.connect("bob");
        let record = alice.create(draft()).await.unwrap();

        bob.update_status(&record.id, IssueStatus::Resolved).await.unwrap();
        alice.update_status(&record.id, IssueStatus::InProgress).await.unwrap();

        assert_eq!(hub.snapshot()[0].status, IssueStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_calls() {
        let hub = RemoteHub::new();
        hub.set_latency(std::time::Duration::from_millis(250));
        let store = hub.connect("a");
        let started = tokio::time::Instant::now();
        store.create(draft()).await.unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(250));
    }
}
