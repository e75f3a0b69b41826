//! Loaded holder registries
//!
//! Holders live here from load until unload. Lookups hand out
//! `Arc<PermissionHolder>` clones, so a caller resolving a parent group
//! never needs the child's lock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use ctxperms_sdk::HolderId;
use dashmap::DashMap;
use uuid::Uuid;

use crate::buffer::UpdateBuffer;
use crate::events::RefreshListeners;
use crate::holder::PermissionHolder;
use crate::scheduler::SchedulerGateway;

/// Group lookup used when resolving inheritance
///
/// A missing group is not an error; the parent reference is dropped.
pub trait GroupRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<PermissionHolder>>;
}

/// Loaded groups keyed by lower-case name
#[derive(Default)]
pub struct GroupManager {
    groups: DashMap<String, Arc<PermissionHolder>>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a loaded group or create an empty one
    pub fn get_or_make(&self, name: &str) -> Arc<PermissionHolder> {
        let id = HolderId::group(name);
        let key = id.identifier();
        self.groups
            .entry(key)
            .or_insert_with(|| Arc::new(PermissionHolder::new(id)))
            .clone()
    }

    /// Get a loaded group
    pub fn get(&self, name: &str) -> Option<Arc<PermissionHolder>> {
        self.groups
            .get(&name.trim().to_lowercase())
            .map(|g| g.value().clone())
    }

    /// Check if a group is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.groups.contains_key(&name.trim().to_lowercase())
    }

    /// Unload a group, returning whether it was loaded
    pub fn unload(&self, name: &str) -> bool {
        self.groups.remove(&name.trim().to_lowercase()).is_some()
    }

    /// Snapshot of all loaded groups
    pub fn all(&self) -> Vec<Arc<PermissionHolder>> {
        self.groups.iter().map(|g| g.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl GroupRegistry for GroupManager {
    fn lookup(&self, name: &str) -> Option<Arc<PermissionHolder>> {
        self.get(name)
    }
}

/// Loaded users keyed by UUID
///
/// Each user gets its own refresh buffer; executing it bumps the user's
/// version and fires the refresh listeners.
pub struct UserManager {
    users: DashMap<Uuid, Arc<PermissionHolder>>,
    scheduler: Arc<dyn SchedulerGateway>,
    listeners: Arc<RefreshListeners>,
    debounce: Duration,
}

impl UserManager {
    pub fn new(
        scheduler: Arc<dyn SchedulerGateway>,
        listeners: Arc<RefreshListeners>,
        debounce: Duration,
    ) -> Self {
        Self {
            users: DashMap::new(),
            scheduler,
            listeners,
            debounce,
        }
    }

    /// Get a loaded user or create an empty one
    pub fn get_or_make(&self, uuid: Uuid) -> Arc<PermissionHolder> {
        self.users
            .entry(uuid)
            .or_insert_with(|| self.make_user(uuid))
            .clone()
    }

    fn make_user(&self, uuid: Uuid) -> Arc<PermissionHolder> {
        let scheduler = self.scheduler.clone();
        let listeners = self.listeners.clone();
        let debounce = self.debounce;

        Arc::new_cyclic(|weak: &Weak<PermissionHolder>| {
            let weak = weak.clone();
            let buffer = UpdateBuffer::new(scheduler, debounce, move || {
                if let Some(user) = weak.upgrade() {
                    user.refresh();
                    listeners.fire(user.id());
                }
            });
            PermissionHolder::new(HolderId::user(uuid)).with_refresh_buffer(buffer)
        })
    }

    /// Get a loaded user
    pub fn get(&self, uuid: &Uuid) -> Option<Arc<PermissionHolder>> {
        self.users.get(uuid).map(|u| u.value().clone())
    }

    /// Check if a user is loaded
    pub fn is_loaded(&self, uuid: &Uuid) -> bool {
        self.users.contains_key(uuid)
    }

    /// Unload a user, returning whether it was loaded
    pub fn unload(&self, uuid: &Uuid) -> bool {
        self.users.remove(uuid).is_some()
    }

    /// Snapshot of all loaded users
    pub fn all(&self) -> Vec<Arc<PermissionHolder>> {
        self.users.iter().map(|u| u.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
