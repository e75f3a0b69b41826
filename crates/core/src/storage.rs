//! Storage gateway
//!
//! The engine never talks to a backend directly. It snapshots a holder
//! into a [`StoredHolder`] and hands it to a [`StorageGateway`] on a
//! background thread; see `PermissionEngine::save` for the async wrapper.
//!
//! Gateway methods are blocking calls made from worker threads. Retry
//! policy, if any, belongs to the implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ctxperms_sdk::{HolderId, StoredHolder};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Persistence backend
pub trait StorageGateway: Send + Sync {
    /// Durably write a holder's enduring state
    fn save(&self, holder: &StoredHolder) -> StorageResult<()>;

    /// Read a holder, `None` if it has never been saved
    fn load(&self, id: &HolderId) -> StorageResult<Option<StoredHolder>>;

    /// Look up the UUID last seen with a username
    fn resolve_uuid(&self, username: &str) -> Option<Uuid>;
}

/// In-process [`StorageGateway`]
///
/// Holders are kept JSON-encoded so every save and load goes through the
/// same serialization a real backend would use.
#[derive(Default)]
pub struct MemoryStorage {
    records: DashMap<HolderId, String>,
    usernames: DashMap<String, Uuid>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent load fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Check if a record exists for a holder
    pub fn contains(&self, id: &HolderId) -> bool {
        self.records.contains_key(id)
    }

    /// Raw JSON record for a holder
    pub fn raw(&self, id: &HolderId) -> Option<String> {
        self.records.get(id).map(|r| r.value().clone())
    }
}

impl StorageGateway for MemoryStorage {
    fn save(&self, holder: &StoredHolder) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "write to {} rejected",
                holder.holder
            )));
        }

        let json = serde_json::to_string(holder)?;
        self.records.insert(holder.holder.clone(), json);

        if let (HolderId::User(uuid), Some(name)) = (&holder.holder, &holder.name) {
            self.usernames.insert(name.to_lowercase(), *uuid);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, id: &HolderId) -> StorageResult<Option<StoredHolder>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("read of {} rejected", id)));
        }
        let Some(json) = self.records.get(id).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        let stored: StoredHolder = serde_json::from_str(&json)?;
        if stored.holder != *id {
            return Err(StorageError::Corrupt {
                id: id.to_string(),
                reason: format!("record belongs to {}", stored.holder),
            });
        }
        Ok(Some(stored))
    }

    fn resolve_uuid(&self, username: &str) -> Option<Uuid> {
        self.usernames.get(&username.to_lowercase()).map(|u| *u)
    }
}
