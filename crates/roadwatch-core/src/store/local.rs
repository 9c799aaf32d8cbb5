//! Single-process issue store over a named key/value record.
//!
//! The whole collection lives under one key as a JSON array. Each write
//! loads it, applies one change, and serializes the full array back inside a
//! single [`KvStore::update`], so writers sharing the key (other handles or
//! other processes) never lose each other's changes.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::kv::KvStore;
use super::{ChangeEvent, IssueStore, SubscriberSet, Subscription};
use crate::error::StoreError;
use crate::model::{IssueDraft, IssueId, IssueRecord, IssueStatus};

/// Key the collection is stored under unless configured otherwise.
pub const DEFAULT_KEY: &str = "citizen_reports_v1";

pub struct LocalIssueStore<K: KvStore> {
    kv: K,
    key: String,
    subscribers: SubscriberSet,
    writer: Mutex<()>,
}

impl<K: KvStore> LocalIssueStore<K> {
    pub fn new(kv: K) -> Self {
        Self::with_key(kv, DEFAULT_KEY)
    }

    pub fn with_key(kv: K, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            subscribers: SubscriberSet::new(),
            writer: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode(&self, raw: Option<&str>) -> Result<Vec<IssueRecord>, StoreError> {
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
            key: self.key.clone(),
            source,
        })
    }

    fn encode(&self, records: &[IssueRecord]) -> Result<String, StoreError> {
        serde_json::to_string(records).map_err(|source| StoreError::Corrupt {
            key: self.key.clone(),
            source,
        })
    }

    fn load(&self) -> Result<Vec<IssueRecord>, StoreError> {
        self.decode(self.kv.get(&self.key)?.as_deref())
    }

    /// Load, change and save the collection while the key is held
    /// exclusively. An error from `change` leaves storage untouched.
    fn modify<T>(
        &self,
        change: impl FnOnce(&mut Vec<IssueRecord>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut change = Some(change);
        let mut outcome = None;
        self.kv.update(&self.key, &mut |raw: Option<String>| {
            let change = change.take()?;
            let result = self.decode(raw.as_deref()).and_then(|mut records| {
                let value = change(&mut records)?;
                Ok((value, self.encode(&records)?))
            });
            match result {
                Ok((value, raw)) => {
                    outcome = Some(Ok(value));
                    Some(raw)
                }
                Err(err) => {
                    outcome = Some(Err(err));
                    None
                }
            }
        })?;
        outcome.unwrap_or_else(|| {
            Err(StoreError::Transient {
                reason: format!("update of '{}' was not applied", self.key),
            })
        })
    }

    /// Current collection, read straight from storage.
    pub fn records(&self) -> Result<Vec<IssueRecord>, StoreError> {
        let _guard = self.lock_writer();
        self.load()
    }

    /// Synchronous create; see [`IssueStore::create`].
    pub fn create_record(&self, draft: IssueDraft) -> Result<IssueRecord, StoreError> {
        draft.validate()?;
        let _guard = self.lock_writer();
        let record = self.modify(|records| {
            let now = Utc::now();
            let mut id = IssueId::generate(now);
            while records.iter().any(|r| r.id == id) {
                id = IssueId::generate(now);
            }
            let record = IssueRecord::from_draft(draft, id, now)?;
            records.push(record.clone());
            Ok(record)
        })?;

        tracing::info!(id = %record.id, issue_type = %record.issue_type, "issue created");
        self.subscribers.emit(&ChangeEvent::added(record.clone()));
        Ok(record)
    }

    /// Synchronous status overwrite; see [`IssueStore::update_status`].
    pub fn set_status(&self, id: &IssueId, status: IssueStatus) -> Result<IssueRecord, StoreError> {
        let _guard = self.lock_writer();
        let (previous, updated) = self.modify(|records| {
            let Some(record) = records.iter_mut().find(|r| &r.id == id) else {
                tracing::warn!(%id, "status update for unknown issue");
                return Err(StoreError::NotFound { id: id.clone() });
            };
            let previous = record.status;
            record.status = status;
            Ok((previous, record.clone()))
        })?;

        tracing::info!(%id, from = %previous, to = %status, "issue status updated");
        self.subscribers.emit(&ChangeEvent::modified(updated.clone()));
        Ok(updated)
    }

    /// Synchronous subscribe; see [`IssueStore::subscribe`].
    pub fn subscribe_now(&self) -> Result<Subscription, StoreError> {
        let _guard = self.lock_writer();
        let replay = self.load()?.into_iter().map(ChangeEvent::added);
        Ok(self.subscribers.subscribe(replay))
    }
}

#[async_trait]
impl<K: KvStore> IssueStore for LocalIssueStore<K> {
    async fn list(&self) -> Result<Vec<IssueRecord>, StoreError> {
        self.records()
    }

    async fn create(&self, draft: IssueDraft) -> Result<IssueRecord, StoreError> {
        self.create_record(draft)
    }

    async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
    ) -> Result<IssueRecord, StoreError> {
        self.set_status(id, status)
    }

    async fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.subscribe_now()
    }
}
