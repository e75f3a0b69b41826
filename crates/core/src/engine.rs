//! Permission engine
//!
//! Owns the loaded holders and wires mutations to persistence:
//!
//! ```text
//! mutate holder (in memory, sync)
//!        │
//!        ▼
//! save(holder) ── executor ──► StorageGateway::save
//!                                  │ ok                │ err
//!                                  ▼                   ▼
//!                  user: refresh buffer          warn!, no retry,
//!                  group: engine update buffer   memory stays as is
//! ```
//!
//! Reads ([`PermissionEngine::check_permission`],
//! [`PermissionEngine::accumulate_meta`]) work on in-memory state only and
//! never wait on storage.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use ctxperms_sdk::HolderId;
use uuid::Uuid;

use crate::buffer::UpdateBuffer;
use crate::config::CoreConfig;
use crate::context::ContextSet;
use crate::error::StorageResult;
use crate::events::RefreshListeners;
use crate::holder::{NodeScope, PermissionHolder, ScopeSet};
use crate::meta::MetaAccumulator;
use crate::registry::{GroupManager, GroupRegistry, UserManager};
use crate::scheduler::{Scheduler, SchedulerGateway};
use crate::storage::StorageGateway;
use crate::subject::SubjectData;
use crate::tristate::Tristate;

/// Entry point tying holders, storage and scheduling together
pub struct PermissionEngine {
    config: CoreConfig,
    scheduler: Arc<dyn SchedulerGateway>,
    storage: Arc<dyn StorageGateway>,
    groups: Arc<GroupManager>,
    users: Arc<UserManager>,
    listeners: Arc<RefreshListeners>,
    update_buffer: UpdateBuffer,
}

impl PermissionEngine {
    /// Create an engine on top of the given collaborators
    pub fn new(
        config: CoreConfig,
        storage: Arc<dyn StorageGateway>,
        scheduler: Arc<dyn SchedulerGateway>,
    ) -> Self {
        let listeners = Arc::new(RefreshListeners::new());
        let groups = Arc::new(GroupManager::new());
        let users = Arc::new(UserManager::new(
            scheduler.clone(),
            listeners.clone(),
            config.debounce(),
        ));

        let update_buffer = {
            let groups = groups.clone();
            let users = users.clone();
            let listeners = listeners.clone();
            UpdateBuffer::new(scheduler.clone(), config.debounce(), move || {
                let groups = groups.all();
                let users = users.all();
                tracing::debug!(
                    "Running update task for {} groups and {} users",
                    groups.len(),
                    users.len()
                );
                for holder in groups.iter().chain(users.iter()) {
                    holder.refresh();
                    listeners.fire(holder.id());
                }
            })
        };

        tracing::info!(
            "Permission engine ready (default group '{}', debounce {:?})",
            config.default_group,
            config.debounce()
        );

        Self {
            config,
            scheduler,
            storage,
            groups,
            users,
            listeners,
            update_buffer,
        }
    }

    /// Create an engine with its own thread-backed scheduler
    pub fn with_storage(
        config: CoreConfig,
        storage: Arc<dyn StorageGateway>,
    ) -> std::io::Result<Self> {
        let scheduler = Arc::new(Scheduler::new(config.worker_threads)?);
        Ok(Self::new(config, storage, scheduler))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn listeners(&self) -> &RefreshListeners {
        &self.listeners
    }

    /// Engine-wide buffer that refreshes every loaded holder
    pub fn update_buffer(&self) -> &UpdateBuffer {
        &self.update_buffer
    }

    /// Look up any loaded holder
    pub fn holder(&self, id: &HolderId) -> Option<Arc<PermissionHolder>> {
        match id {
            HolderId::User(uuid) => self.users.get(uuid),
            HolderId::Group(name) => self.groups.get(name),
        }
    }

    /// Façade over one scope of a holder
    pub fn subject_data(&self, holder: Arc<PermissionHolder>, scope: NodeScope) -> SubjectData<'_> {
        SubjectData::new(self, holder, scope)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load (or create) a user and apply the default-group rule
    ///
    /// Nothing is registered if storage fails, so a half-loaded user can
    /// never be saved over its record.
    pub fn load_user(&self, uuid: Uuid) -> StorageResult<Arc<PermissionHolder>> {
        let stored = self.storage.load(&HolderId::user(uuid))?;
        let user = self.users.get_or_make(uuid);
        if let Some(stored) = stored {
            user.load_stored(&stored);
        }
        if user.give_default_if_needed(&self.config.default_group) {
            self.save(&user);
        }
        tracing::debug!("Loaded {}", user.id());
        Ok(user)
    }

    /// Load (or create) a group
    pub fn load_group(&self, name: &str) -> StorageResult<Arc<PermissionHolder>> {
        let stored = self.storage.load(&HolderId::group(name))?;
        let group = self.groups.get_or_make(name);
        if let Some(stored) = stored {
            group.load_stored(&stored);
        }
        tracing::debug!("Loaded {}", group.id());
        Ok(group)
    }

    /// Look up a user's UUID through storage
    pub fn resolve_uuid(&self, username: &str) -> Option<Uuid> {
        self.storage.resolve_uuid(username)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist a holder asynchronously
    ///
    /// The enduring state is snapshotted now; the write runs on the
    /// executor. Only after it succeeds is a refresh requested (the user's
    /// own buffer, or the engine buffer for groups). Failures are logged
    /// and not retried. The returned receiver yields the outcome once.
    ///
    /// Writes of one holder never overlap, and a snapshot older than one
    /// already written is dropped (reported as `Ok`, without a refresh).
    pub fn save(&self, holder: &Arc<PermissionHolder>) -> Receiver<StorageResult<()>> {
        let (tx, rx) = bounded(1);
        let (seq, snapshot) = holder.save_snapshot();
        let storage = self.storage.clone();
        let holder = holder.clone();
        let update_buffer = self.update_buffer.clone();

        self.scheduler.execute(Box::new(move || {
            let result = {
                let mut written = holder.lock_saves();
                if *written > seq {
                    tracing::debug!("{}: dropping stale snapshot {} (written {})", holder.id(), seq, *written);
                    let _ = tx.send(Ok(()));
                    return;
                }
                let result = storage.save(&snapshot);
                if result.is_ok() {
                    *written = seq;
                }
                result
            };
            match &result {
                Ok(()) => {
                    if holder.is_user() {
                        holder.request_refresh();
                    } else {
                        update_buffer.request();
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to save {}: {}", holder.id(), e);
                }
            }
            let _ = tx.send(result);
        }));

        rx
    }

    /// Follow-up after a mutation in `scope`
    ///
    /// Enduring changes are saved; transient changes skip storage and go
    /// straight to a refresh.
    pub(crate) fn commit(&self, holder: &Arc<PermissionHolder>, scope: NodeScope) {
        match scope {
            NodeScope::Enduring => {
                self.save(holder);
            }
            NodeScope::Transient => {
                if holder.is_user() {
                    holder.request_refresh();
                } else {
                    self.update_buffer.request();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// The holder followed by every group it inherits in `query`
    ///
    /// Breadth-first, nearest first, each group once. Parents are looked
    /// up independently after the child's lock has been released. Groups
    /// that are not loaded are skipped.
    pub fn inheritance<C>(&self, holder: &Arc<PermissionHolder>, query: &C) -> Vec<Arc<PermissionHolder>>
    where
        C: ContextSet + ?Sized,
    {
        let mut order = vec![holder.clone()];
        let mut visited: HashSet<HolderId> = HashSet::from([holder.id().clone()]);
        let mut queue = VecDeque::from([holder.clone()]);

        while let Some(current) = queue.pop_front() {
            for name in current.parent_groups(ScopeSet::all(), query) {
                if !visited.insert(HolderId::group(&name)) {
                    continue;
                }
                match self.groups.lookup(&name) {
                    Some(group) => {
                        order.push(group.clone());
                        queue.push_back(group);
                    }
                    None => tracing::debug!("{}: parent group '{}' not loaded", current.id(), name),
                }
            }
        }

        order
    }

    /// Resolve a permission for a holder across inheritance
    ///
    /// The first holder in inheritance order with a deciding node wins.
    pub fn check_permission<C>(
        &self,
        holder: &Arc<PermissionHolder>,
        query: &C,
        permission: &str,
    ) -> Tristate
    where
        C: ContextSet + ?Sized,
    {
        self.inheritance(holder, query)
            .iter()
            .map(|h| h.check(query, permission, ScopeSet::all()))
            .find(|result| !result.is_undefined())
            .unwrap_or_default()
    }

    /// Effective meta for a holder in `query`, across inheritance
    pub fn accumulate_meta<C>(&self, holder: &Arc<PermissionHolder>, query: &C) -> MetaAccumulator
    where
        C: ContextSet + ?Sized,
    {
        let mut accumulator = MetaAccumulator::new();
        for h in self.inheritance(holder, query) {
            for node in h.applicable_nodes(ScopeSet::all(), query) {
                accumulator.accumulate(&node);
            }
        }
        accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::context::ImmutableContextSet;
    use crate::error::StorageError;
    use crate::node::{ChatMetaType, Node, NodeBuilder};
    use crate::storage::MemoryStorage;

    fn engine() -> (PermissionEngine, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let config = CoreConfig {
            update_debounce_ms: 20,
            ..CoreConfig::default()
        };
        let engine = PermissionEngine::with_storage(config, storage.clone()).unwrap();
        (engine, storage)
    }

    fn inherit(holder: &PermissionHolder, group: &str) {
        holder.set_permission(
            NodeScope::Enduring,
            NodeBuilder::inheritance(group).build().unwrap(),
        );
    }

    #[test]
    fn test_load_user_gives_default_group() {
        let (engine, storage) = engine();
        let uuid = Uuid::new_v4();

        let user = engine.load_user(uuid).unwrap();
        assert_eq!(user.primary_group().as_deref(), Some("default"));
        assert_eq!(user.parent_groups(ScopeSet::all(), &ImmutableContextSet::empty()), vec!["default"]);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !storage.contains(user.id()) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(storage.contains(user.id()));
    }

    #[test]
    fn test_save_then_refresh() {
        let (engine, storage) = engine();
        let user = engine.users().get_or_make(Uuid::new_v4());
        user.set_name(Some("Steve".to_string()));

        let (tx, rx) = bounded(4);
        engine.listeners().on_refresh(move |id| {
            let _ = tx.send(id.clone());
        });

        let done = engine.save(&user);
        assert!(done.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(user.id().clone()));
        assert_eq!(engine.resolve_uuid("steve").map(HolderId::User), Some(user.id().clone()));
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn test_failed_save_keeps_memory_and_skips_refresh() {
        let (engine, storage) = engine();
        storage.set_fail_writes(true);
        let user = engine.users().get_or_make(Uuid::new_v4());
        user.set_permission(NodeScope::Enduring, Node::builder("a").build().unwrap());

        let done = engine.save(&user);
        assert!(matches!(
            done.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(user.node_count(NodeScope::Enduring), 1);

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(user.version(), 0);
    }

    #[test]
    fn test_group_save_runs_engine_update() {
        let (engine, _) = engine();
        let group = engine.groups().get_or_make("admin");
        let user = engine.users().get_or_make(Uuid::new_v4());

        let done = engine.save(&group);
        assert!(done.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while (group.version() == 0 || user.version() == 0) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(engine.update_buffer().executions(), 1);
        assert_eq!(group.version(), 1);
        assert_eq!(user.version(), 1);
    }

    /// Memory storage whose first write stalls
    struct SlowFirstWrite {
        inner: MemoryStorage,
        stalled: std::sync::atomic::AtomicBool,
    }

    impl StorageGateway for SlowFirstWrite {
        fn save(&self, holder: &ctxperms_sdk::StoredHolder) -> StorageResult<()> {
            if !self.stalled.swap(true, std::sync::atomic::Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.inner.save(holder)
        }

        fn load(&self, id: &HolderId) -> StorageResult<Option<ctxperms_sdk::StoredHolder>> {
            self.inner.load(id)
        }

        fn resolve_uuid(&self, username: &str) -> Option<Uuid> {
            self.inner.resolve_uuid(username)
        }
    }

    #[test]
    fn test_slow_older_save_never_overwrites_newer() {
        let storage = Arc::new(SlowFirstWrite {
            inner: MemoryStorage::new(),
            stalled: std::sync::atomic::AtomicBool::new(false),
        });
        let config = CoreConfig {
            update_debounce_ms: 20,
            worker_threads: 4,
            ..CoreConfig::default()
        };
        let engine = PermissionEngine::with_storage(config, storage.clone()).unwrap();
        let user = engine.users().get_or_make(Uuid::new_v4());

        user.set_permission(NodeScope::Enduring, Node::builder("a").build().unwrap());
        let first = engine.save(&user);
        user.set_permission(NodeScope::Enduring, Node::builder("b").build().unwrap());
        let second = engine.save(&user);

        assert!(first.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        assert!(second.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());

        let stored = storage.inner.load(user.id()).unwrap().unwrap();
        assert_eq!(stored.permissions.len(), 2);
    }

    #[test]
    fn test_failed_load_registers_nothing() {
        let (engine, storage) = engine();
        let uuid = Uuid::new_v4();
        let mut record = ctxperms_sdk::StoredHolder::new(HolderId::user(uuid));
        for permission in ["group.admin", "x.one", "x.two"] {
            record
                .permissions
                .push(Node::builder(permission).build().unwrap().to_stored());
        }
        storage.save(&record).unwrap();
        storage.save(&ctxperms_sdk::StoredHolder::new(HolderId::group("admin"))).unwrap();

        storage.set_fail_reads(true);
        assert!(matches!(engine.load_user(uuid), Err(StorageError::Unavailable(_))));
        assert!(matches!(engine.load_group("admin"), Err(StorageError::Unavailable(_))));
        assert!(!engine.users().is_loaded(&uuid));
        assert!(!engine.groups().is_loaded("admin"));

        storage.set_fail_reads(false);
        let user = engine.load_user(uuid).unwrap();
        assert_eq!(user.node_count(NodeScope::Enduring), 3);
        assert_eq!(storage.load(user.id()).unwrap().unwrap().permissions.len(), 3);
    }

    #[test]
    fn test_load_round_trip() {
        let (engine, _) = engine();
        let group = engine.groups().get_or_make("vip");
        group.set_permission(NodeScope::Enduring, Node::builder("fly").build().unwrap());
        engine
            .save(&group)
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();

        engine.groups().unload("vip");
        let reloaded = engine.load_group("vip").unwrap();
        assert_eq!(reloaded.node_count(NodeScope::Enduring), 1);
        assert!(!Arc::ptr_eq(&group, &reloaded));
    }

    #[test]
    fn test_check_walks_inheritance() {
        let (engine, _) = engine();
        let user = engine.users().get_or_make(Uuid::new_v4());
        let admin = engine.groups().get_or_make("admin");
        let default = engine.groups().get_or_make("default");

        inherit(&user, "admin");
        inherit(&admin, "default");
        default.set_permission(NodeScope::Enduring, Node::builder("chat").build().unwrap());
        admin.set_permission(
            NodeScope::Enduring,
            Node::builder("chat").value(false).build().unwrap(),
        );
        default.set_permission(NodeScope::Enduring, Node::builder("build").build().unwrap());

        let global = ImmutableContextSet::empty();
        assert_eq!(engine.check_permission(&user, &global, "chat"), Tristate::False);
        assert_eq!(engine.check_permission(&user, &global, "build"), Tristate::True);
        assert_eq!(engine.check_permission(&user, &global, "fly"), Tristate::Undefined);
    }

    #[test]
    fn test_inheritance_handles_cycles_and_missing_groups() {
        let (engine, _) = engine();
        let a = engine.groups().get_or_make("a");
        let b = engine.groups().get_or_make("b");
        inherit(&a, "b");
        inherit(&b, "a");
        inherit(&b, "ghost");

        let order: Vec<_> = engine
            .inheritance(&a, &ImmutableContextSet::empty())
            .iter()
            .map(|h| h.id().identifier())
            .collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_inheritance_respects_context() {
        let (engine, _) = engine();
        let user = engine.users().get_or_make(Uuid::new_v4());
        engine.groups().get_or_make("builder");
        user.set_permission(
            NodeScope::Enduring,
            NodeBuilder::inheritance("builder")
                .with_context("world", "creative")
                .build()
                .unwrap(),
        );

        assert_eq!(engine.inheritance(&user, &ImmutableContextSet::empty()).len(), 1);
        let creative = ImmutableContextSet::singleton("world", "creative").unwrap();
        assert_eq!(engine.inheritance(&user, &creative).len(), 2);
    }

    #[test]
    fn test_accumulate_meta_nearest_first() {
        let (engine, _) = engine();
        let user = engine.users().get_or_make(Uuid::new_v4());
        let vip = engine.groups().get_or_make("vip");
        inherit(&user, "vip");

        user.set_permission(NodeScope::Enduring, NodeBuilder::meta("rank", "own").build().unwrap());
        vip.set_permission(NodeScope::Enduring, NodeBuilder::meta("rank", "vip").build().unwrap());
        vip.set_permission(NodeScope::Enduring, NodeBuilder::meta("color", "gold").build().unwrap());
        vip.set_permission(
            NodeScope::Enduring,
            NodeBuilder::chat_meta(ChatMetaType::Prefix, 50, "[VIP]").build().unwrap(),
        );
        user.set_permission(
            NodeScope::Enduring,
            NodeBuilder::chat_meta(ChatMetaType::Prefix, 10, "[Own]").build().unwrap(),
        );

        let meta = engine.accumulate_meta(&user, &ImmutableContextSet::empty());
        assert_eq!(meta.meta_value("rank"), Some("own"));
        assert_eq!(meta.meta_value("color"), Some("gold"));
        assert_eq!(meta.prefix(), Some("[VIP]"));
        assert_eq!(meta.max_priority(ChatMetaType::Prefix), Some(50));
    }

    #[test]
    fn test_holder_lookup_by_id() {
        let (engine, _) = engine();
        let uuid = Uuid::new_v4();
        engine.users().get_or_make(uuid);
        engine.groups().get_or_make("admin");

        assert!(engine.holder(&HolderId::user(uuid)).is_some());
        assert!(engine.holder(&HolderId::group("admin")).is_some());
        assert!(engine.holder(&HolderId::group("nobody")).is_none());
    }
}
