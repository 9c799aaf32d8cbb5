//! Named-record persistence used by the local issue store.
//!
//! A key holds one complete serialized value. Writers replace the whole
//! value; readers never observe a half-written one. Absence of a key reads
//! as `None`. [`KvStore::update`] holds the key exclusively from read to
//! write, so concurrent read-modify-write cycles serialize.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::ErrorCode;
use crate::lock::{LockError, StoreReadLock, StoreWriteLock};

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("invalid key '{0}': use letters, digits, '_' or '-'")]
    InvalidKey(String),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl KvError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidKey(_) => ErrorCode::InternalUnexpected,
            Self::Io { .. } => ErrorCode::StoreWriteFailed,
            Self::Lock(err) => err.code(),
        }
    }
}

/// Durable string-valued key/value storage.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Read-modify-write under one exclusive hold of `key`. `apply` receives
    /// the current value and returns the replacement, or `None` to leave
    /// the stored value as it is.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), KvError>;
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> KvError {
    let path = path.to_path_buf();
    move |source| KvError::Io { path, source }
}

fn check_key(key: &str) -> Result<(), KvError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(KvError::InvalidKey(key.to_string()))
    }
}

/// Directory-backed store: each key is `<dir>/<key>.json`.
///
/// Writes go to a sibling temp file that is fsynced and renamed over the
/// target while an exclusive advisory lock is held.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.lock"))
    }

    // Callers hold the key's lock.
    fn read_locked(&self, key: &str) -> Result<Option<String>, KvError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(KvError::Io { path, source }),
        }
    }

    // Callers hold the key's write lock.
    fn write_locked(&self, key: &str, value: &str) -> Result<(), KvError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));

        let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(value.as_bytes()).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        tracing::debug!(key, path = %path.display(), bytes = value.len(), "collection written");
        Ok(())
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        check_key(key)?;
        let _lock = StoreReadLock::acquire(&self.lock_path(key), self.lock_timeout)?;
        self.read_locked(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        check_key(key)?;
        let _lock = StoreWriteLock::acquire(&self.lock_path(key), self.lock_timeout)?;
        self.write_locked(key, value)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), KvError> {
        check_key(key)?;
        let _lock = StoreWriteLock::acquire(&self.lock_path(key), self.lock_timeout)?;
        let current = self.read_locked(key)?;
        match apply(current) {
            Some(value) => self.write_locked(key, &value),
            None => Ok(()),
        }
    }
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        check_key(key)?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        check_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), KvError> {
        check_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = apply(entries.get(key).cloned()) {
            entries.insert(key.to_string(), value);
        }
        Ok(())
    }
}

impl<K: KvStore + ?Sized> KvStore for Arc<K> {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        (**self).set(key, value)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), KvError> {
        (**self).update(key, apply)
    }
}
