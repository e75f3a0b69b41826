//! Permission holders
//!
//! A [`PermissionHolder`] is a user or a group. It owns two independent
//! node collections, enduring (persisted) and transient (session-only),
//! guarded together by one lock per holder.
//!
//! # Concurrency
//!
//! ```text
//! ┌──────────────────────── PermissionHolder ────────────────────────┐
//! │  RwLock<HolderData>                                               │
//! │    enduring:  NodeMap (slot index + insertion order)             │
//! │    transient: NodeMap                                             │
//! │    name / primary group                                           │
//! └───────────────────────────────────────────────────────────────────┘
//!        ▲ write (short, in-memory)          │ read → cloned snapshot
//!   commands / API / reload             permission checks, options
//! ```
//!
//! Readers never iterate live state: every query clones what it needs
//! under the read lock and releases it. Parent groups are returned by name
//! and looked up afterwards, so no caller ever holds two holder locks.

mod node_map;
mod scope;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ctxperms_sdk::{HolderId, StoredHolder};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::buffer::UpdateBuffer;
use crate::context::{ContextSet, ImmutableContextSet};
use crate::meta::{self, OptionMap};
use crate::node::{Node, NodeBuilder, NodeSlot};
use crate::tristate::Tristate;

pub use node_map::MutateResult;
pub use scope::{NodeScope, ScopeSet};

use node_map::NodeMap;

/// Permissions keyed by the exact context set they were assigned in
pub type PermissionMap = HashMap<ImmutableContextSet, HashMap<String, bool>>;

#[derive(Debug, Default)]
struct HolderData {
    enduring: NodeMap,
    transient: NodeMap,
    name: Option<String>,
    primary_group: Option<String>,
}

impl HolderData {
    fn nodes(&self, scope: NodeScope) -> &NodeMap {
        match scope {
            NodeScope::Enduring => &self.enduring,
            NodeScope::Transient => &self.transient,
        }
    }

    fn nodes_mut(&mut self, scope: NodeScope) -> &mut NodeMap {
        match scope {
            NodeScope::Enduring => &mut self.enduring,
            NodeScope::Transient => &mut self.transient,
        }
    }
}

/// A user or group and its node collections
pub struct PermissionHolder {
    id: HolderId,
    data: RwLock<HolderData>,
    version: AtomicU64,
    refresh_buffer: Option<UpdateBuffer>,
    save_seq: AtomicU64,
    /// Sequence number of the last snapshot written to storage
    saved: Mutex<u64>,
}

impl PermissionHolder {
    /// Create an empty holder
    pub fn new(id: HolderId) -> Self {
        Self {
            id,
            data: RwLock::new(HolderData::default()),
            version: AtomicU64::new(0),
            refresh_buffer: None,
            save_seq: AtomicU64::new(0),
            saved: Mutex::new(0),
        }
    }

    /// Attach the buffer used to coalesce refresh requests for this holder
    pub fn with_refresh_buffer(mut self, buffer: UpdateBuffer) -> Self {
        self.refresh_buffer = Some(buffer);
        self
    }

    pub fn id(&self) -> &HolderId {
        &self.id
    }

    pub fn is_user(&self) -> bool {
        self.id.is_user()
    }

    // ------------------------------------------------------------------
    // Identity data
    // ------------------------------------------------------------------

    /// Last known username (users) or display name
    pub fn name(&self) -> Option<String> {
        self.data.read().name.clone()
    }

    pub fn set_name(&self, name: Option<String>) {
        self.data.write().name = name;
    }

    /// Primary group (users only)
    pub fn primary_group(&self) -> Option<String> {
        self.data.read().primary_group.clone()
    }

    pub fn set_primary_group(&self, group: Option<String>) {
        self.data.write().primary_group = group.map(|g| g.to_lowercase());
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Set a node, replacing whatever occupies its slot
    ///
    /// After this call exactly one node exists for the slot, carrying the
    /// new value. Setting an identical node is a no-op (`AlreadyHas`).
    pub fn set_permission(&self, scope: NodeScope, node: Node) -> MutateResult {
        let result = self.data.write().nodes_mut(scope).set(node);
        if result.was_success() {
            tracing::debug!("{}: set node in {:?}", self.id, scope);
        }
        result
    }

    /// Remove the node occupying the same slot, whatever its value
    pub fn unset_permission(&self, scope: NodeScope, node: &Node) -> MutateResult {
        self.unset_slot(scope, &node.slot())
    }

    /// Remove the node occupying a slot
    pub fn unset_slot(&self, scope: NodeScope, slot: &NodeSlot) -> MutateResult {
        match self.data.write().nodes_mut(scope).unset(slot) {
            Some(_) => {
                tracing::debug!("{}: unset {} in {:?}", self.id, slot.permission, scope);
                MutateResult::Success
            }
            None => MutateResult::LacksNode,
        }
    }

    /// Remove every node matching `remove`, then set `node`, atomically
    pub fn replace_matching<F>(&self, scope: NodeScope, remove: F, node: Node) -> MutateResult
    where
        F: FnMut(&Node) -> bool,
    {
        let mut data = self.data.write();
        let nodes = data.nodes_mut(scope);
        let removed = nodes.remove_if(remove);
        let result = nodes.set(node);
        if removed.is_empty() {
            result
        } else {
            MutateResult::Success
        }
    }

    /// Remove every node in a scope
    ///
    /// Returns whether anything was removed.
    pub fn clear_nodes(&self, scope: NodeScope) -> bool {
        self.data.write().nodes_mut(scope).clear()
    }

    /// Remove every node matching a predicate
    ///
    /// Returns whether anything was removed.
    pub fn clear_nodes_matching<F>(&self, scope: NodeScope, predicate: F) -> bool
    where
        F: FnMut(&Node) -> bool,
    {
        !self
            .data
            .write()
            .nodes_mut(scope)
            .remove_if(predicate)
            .is_empty()
    }

    /// Remove every node whose context set equals `contexts` exactly
    pub fn clear_nodes_in(&self, scope: NodeScope, contexts: &ImmutableContextSet) -> bool {
        self.clear_nodes_matching(scope, |n| n.contexts() == contexts)
    }

    /// Replace a whole collection, keeping the given order
    pub fn replace_nodes(&self, scope: NodeScope, nodes: Vec<Node>) {
        *self.data.write().nodes_mut(scope) = nodes.into_iter().collect();
    }

    /// Ensure a user inherits from at least one group
    ///
    /// If the enduring collection has no group node, inherit
    /// `default_group` globally and make it the primary group. Returns
    /// whether anything changed. Groups are left alone.
    pub fn give_default_if_needed(&self, default_group: &str) -> bool {
        if !self.is_user() {
            return false;
        }

        let mut data = self.data.write();
        if data.enduring.iter().any(Node::is_group_node) {
            return false;
        }

        let node = match NodeBuilder::inheritance(default_group).build() {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!("Invalid default group '{}': {}", default_group, e);
                return false;
            }
        };
        let group = node.group_name().map(str::to_string);
        data.enduring.set(node);
        data.primary_group = group;
        tracing::debug!("{}: reinstated default group '{}'", self.id, default_group);
        true
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// Snapshot of one collection in insertion order
    pub fn nodes(&self, scope: NodeScope) -> Vec<Node> {
        self.data.read().nodes(scope).to_vec()
    }

    /// Number of nodes in one collection
    pub fn node_count(&self, scope: NodeScope) -> usize {
        self.data.read().nodes(scope).len()
    }

    /// Value stored for a node's slot, if any
    pub fn has_node(&self, scope: NodeScope, node: &Node) -> Tristate {
        self.data
            .read()
            .nodes(scope)
            .get(&node.slot())
            .map_or(Tristate::Undefined, |n| Tristate::from_bool(n.value()))
    }

    /// Nodes from the given scopes that apply in `query`
    ///
    /// Transient nodes come first, each scope in insertion order.
    pub fn applicable_nodes<C>(&self, scopes: ScopeSet, query: &C) -> Vec<Node>
    where
        C: ContextSet + ?Sized,
    {
        let data = self.data.read();
        scopes
            .ordered()
            .flat_map(|scope| data.nodes(scope).iter())
            .filter(|n| n.applies_in(query))
            .cloned()
            .collect()
    }

    /// Names of groups inherited in `query`, nearest first
    pub fn parent_groups<C>(&self, scopes: ScopeSet, query: &C) -> Vec<String>
    where
        C: ContextSet + ?Sized,
    {
        let data = self.data.read();
        let mut names: Vec<String> = Vec::new();
        for node in scopes.ordered().flat_map(|scope| data.nodes(scope).iter()) {
            if !node.value() || !node.applies_in(query) {
                continue;
            }
            if let Some(group) = node.group_name() {
                if !names.iter().any(|n| n == group) {
                    names.push(group.to_string());
                }
            }
        }
        names
    }

    /// Group names per exact context set, granted inheritance nodes only
    pub fn parents(&self, scope: NodeScope) -> HashMap<ImmutableContextSet, Vec<String>> {
        let data = self.data.read();
        let mut parents: HashMap<ImmutableContextSet, Vec<String>> = HashMap::new();
        for node in data.nodes(scope).iter().filter(|n| n.value()) {
            if let Some(group) = node.group_name() {
                parents
                    .entry(node.contexts().clone())
                    .or_default()
                    .push(group.to_string());
            }
        }
        parents
    }

    /// Every node's value per exact context set
    pub fn permissions(&self, scope: NodeScope) -> PermissionMap {
        let data = self.data.read();
        let mut perms: PermissionMap = HashMap::new();
        for node in data.nodes(scope).iter() {
            perms
                .entry(node.contexts().clone())
                .or_default()
                .insert(node.permission().to_string(), node.value());
        }
        perms
    }

    /// Options per exact context set
    pub fn options(&self, scope: NodeScope) -> OptionMap {
        meta::options_by_context(self.data.read().nodes(scope).iter())
    }

    /// Resolve a permission against this holder's own nodes
    ///
    /// Only nodes applying in `query` count. An exact match beats a
    /// wildcard and a longer wildcard beats a shorter one; then more
    /// specific contexts win; then transient beats enduring; then the
    /// earlier node wins.
    pub fn check<C>(&self, query: &C, permission: &str, scopes: ScopeSet) -> Tristate
    where
        C: ContextSet + ?Sized,
    {
        let permission = permission.trim().to_lowercase();
        let data = self.data.read();

        let mut best: Option<((usize, usize, u8), bool)> = None;
        for scope in scopes.ordered() {
            let scope_rank = u8::from(scope == NodeScope::Transient);
            for node in data.nodes(scope).iter() {
                if !node.applies_in(query) {
                    continue;
                }
                let Some(strength) = node.match_strength(&permission) else {
                    continue;
                };
                let rank = (strength, node.contexts().len(), scope_rank);
                if best.map_or(true, |(current, _)| rank > current) {
                    best = Some((rank, node.value()));
                }
            }
        }

        best.map_or(Tristate::Undefined, |(_, value)| Tristate::from_bool(value))
    }

    // ------------------------------------------------------------------
    // Persistence and refresh
    // ------------------------------------------------------------------

    /// Snapshot the enduring state into its stored form
    pub fn to_stored(&self) -> StoredHolder {
        self.stored_from(&self.data.read())
    }

    fn stored_from(&self, data: &HolderData) -> StoredHolder {
        StoredHolder {
            holder: self.id.clone(),
            name: data.name.clone(),
            primary_group: data.primary_group.clone(),
            permissions: data.enduring.iter().map(Node::to_stored).collect(),
        }
    }

    /// Snapshot the enduring state for a save, numbered in mutation order
    pub(crate) fn save_snapshot(&self) -> (u64, StoredHolder) {
        let data = self.data.read();
        let seq = self.save_seq.fetch_add(1, Ordering::AcqRel) + 1;
        (seq, self.stored_from(&data))
    }

    /// Serialize writes of this holder's snapshots
    ///
    /// The guarded value is the sequence number last written; a snapshot
    /// older than it must be dropped rather than written.
    pub(crate) fn lock_saves(&self) -> MutexGuard<'_, u64> {
        self.saved.lock()
    }

    /// Load enduring state from its stored form
    ///
    /// Nodes that fail validation are skipped with a warning; returns how
    /// many were skipped. Transient nodes are untouched.
    pub fn load_stored(&self, stored: &StoredHolder) -> usize {
        let mut skipped = 0;
        let nodes: Vec<Node> = stored
            .permissions
            .iter()
            .filter_map(|s| match Node::from_stored(s) {
                Ok(node) => Some(node),
                Err(e) => {
                    tracing::warn!("{}: skipping stored node '{}': {}", self.id, s.permission, e);
                    skipped += 1;
                    None
                }
            })
            .collect();

        let mut data = self.data.write();
        data.enduring = nodes.into_iter().collect();
        data.name = stored.name.clone();
        data.primary_group = stored.primary_group.as_deref().map(str::to_lowercase);
        skipped
    }

    /// Number of completed refreshes
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Mark derived data as recomputed
    pub fn refresh(&self) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!("{}: refreshed (version {})", self.id, version);
        version
    }

    /// Ask for a debounced refresh
    ///
    /// Returns `false` if this holder has no refresh buffer (groups).
    pub fn request_refresh(&self) -> bool {
        match &self.refresh_buffer {
            Some(buffer) => {
                buffer.request();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for PermissionHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read();
        f.debug_struct("PermissionHolder")
            .field("id", &self.id)
            .field("enduring", &data.enduring.len())
            .field("transient", &data.transient.len())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ChatMetaType, NodeBuilder};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn user() -> PermissionHolder {
        PermissionHolder::new(HolderId::user(Uuid::new_v4()))
    }

    fn node(permission: &str, value: bool) -> Node {
        Node::builder(permission).value(value).build().unwrap()
    }

    fn ctx(pairs: &[(&str, &str)]) -> ImmutableContextSet {
        ImmutableContextSet::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_end_to_end_flip() {
        let holder = user();
        holder.set_permission(NodeScope::Enduring, node("example.perm", true));

        let perms = holder.permissions(NodeScope::Enduring);
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[&ImmutableContextSet::empty()]["example.perm"], true);

        holder.set_permission(NodeScope::Enduring, node("example.perm", false));

        let perms = holder.permissions(NodeScope::Enduring);
        assert_eq!(perms[&ImmutableContextSet::empty()].len(), 1);
        assert_eq!(perms[&ImmutableContextSet::empty()]["example.perm"], false);
        assert_eq!(holder.node_count(NodeScope::Enduring), 1);
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let holder = user();
        assert_eq!(
            holder.set_permission(NodeScope::Enduring, node("a", true)),
            MutateResult::Success
        );
        assert_eq!(
            holder.set_permission(NodeScope::Enduring, node("a", true)),
            MutateResult::AlreadyHas
        );
    }

    #[test]
    fn test_unset_by_slot() {
        let holder = user();
        holder.set_permission(NodeScope::Enduring, node("a", false));

        assert_eq!(
            holder.unset_permission(NodeScope::Enduring, &node("a", true)),
            MutateResult::Success
        );
        assert_eq!(holder.has_node(NodeScope::Enduring, &node("a", true)), Tristate::Undefined);
        assert_eq!(
            holder.unset_permission(NodeScope::Enduring, &node("a", true)),
            MutateResult::LacksNode
        );
    }

    #[test]
    fn test_scopes_are_independent() {
        let holder = user();
        holder.set_permission(NodeScope::Transient, node("a", true));

        assert!(holder.nodes(NodeScope::Enduring).is_empty());
        assert_eq!(holder.nodes(NodeScope::Transient).len(), 1);
        assert!(!holder.clear_nodes(NodeScope::Enduring));
        assert!(holder.clear_nodes(NodeScope::Transient));
    }

    #[test]
    fn test_clear_in_exact_context_only() {
        let holder = user();
        let nether = ctx(&[("world", "nether")]);
        let nether_lobby = ctx(&[("world", "nether"), ("server", "lobby")]);

        holder.set_permission(NodeScope::Enduring, node("global", true));
        holder.set_permission(
            NodeScope::Enduring,
            Node::builder("a").with_contexts(&nether).build().unwrap(),
        );
        holder.set_permission(
            NodeScope::Enduring,
            Node::builder("b").with_contexts(&nether_lobby).build().unwrap(),
        );

        assert!(holder.clear_nodes_in(NodeScope::Enduring, &nether));
        assert!(!holder.clear_nodes_in(NodeScope::Enduring, &nether));

        let remaining: Vec<_> = holder
            .nodes(NodeScope::Enduring)
            .iter()
            .map(|n| n.permission().to_string())
            .collect();
        assert_eq!(remaining, vec!["global", "b"]);
    }

    #[test]
    fn test_check_specificity() {
        let holder = user();
        let nether = ctx(&[("world", "nether")]);

        holder.set_permission(NodeScope::Enduring, node("essentials.*", true));
        holder.set_permission(NodeScope::Enduring, node("essentials.fly", false));
        holder.set_permission(
            NodeScope::Enduring,
            Node::builder("essentials.fly")
                .with_contexts(&nether)
                .build()
                .unwrap(),
        );

        let global = ImmutableContextSet::empty();
        assert_eq!(holder.check(&global, "essentials.fly", ScopeSet::all()), Tristate::False);
        assert_eq!(holder.check(&global, "essentials.home", ScopeSet::all()), Tristate::True);
        assert_eq!(holder.check(&nether, "essentials.fly", ScopeSet::all()), Tristate::True);
        assert_eq!(holder.check(&global, "other", ScopeSet::all()), Tristate::Undefined);
    }

    #[test]
    fn test_check_transient_beats_enduring() {
        let holder = user();
        holder.set_permission(NodeScope::Enduring, node("fly", false));
        holder.set_permission(NodeScope::Transient, node("fly", true));

        let global = ImmutableContextSet::empty();
        assert_eq!(holder.check(&global, "fly", ScopeSet::all()), Tristate::True);
        assert_eq!(holder.check(&global, "fly", ScopeSet::ENDURING), Tristate::False);
    }

    #[test]
    fn test_parents_grouped_by_context() {
        let holder = user();
        let nether = ctx(&[("world", "nether")]);
        holder.set_permission(
            NodeScope::Enduring,
            NodeBuilder::inheritance("admin").build().unwrap(),
        );
        holder.set_permission(
            NodeScope::Enduring,
            NodeBuilder::inheritance("builder")
                .with_contexts(&nether)
                .build()
                .unwrap(),
        );
        holder.set_permission(
            NodeScope::Enduring,
            NodeBuilder::inheritance("banned").value(false).build().unwrap(),
        );

        let parents = holder.parents(NodeScope::Enduring);
        assert_eq!(parents[&ImmutableContextSet::empty()], vec!["admin"]);
        assert_eq!(parents[&nether], vec!["builder"]);

        assert_eq!(
            holder.parent_groups(ScopeSet::all(), &nether),
            vec!["admin", "builder"]
        );
        assert_eq!(
            holder.parent_groups(ScopeSet::all(), &ImmutableContextSet::empty()),
            vec!["admin"]
        );
    }

    #[test]
    fn test_options_follow_insertion_order() {
        let holder = user();
        for (priority, value) in [(10, "A"), (10, "B")] {
            holder.set_permission(
                NodeScope::Enduring,
                NodeBuilder::chat_meta(ChatMetaType::Prefix, priority, value)
                    .build()
                    .unwrap(),
            );
        }
        let options = holder.options(NodeScope::Enduring);
        assert_eq!(options[&ImmutableContextSet::empty()]["prefix"], "A");
    }

    #[test]
    fn test_replace_matching_is_single_step() {
        let holder = user();
        holder.set_permission(NodeScope::Enduring, NodeBuilder::meta("x", "1").build().unwrap());
        holder.set_permission(NodeScope::Enduring, NodeBuilder::meta("x", "2").build().unwrap());

        let result = holder.replace_matching(
            NodeScope::Enduring,
            |n| n.meta().map(|(k, _)| k) == Some("x"),
            NodeBuilder::meta("x", "3").build().unwrap(),
        );
        assert_eq!(result, MutateResult::Success);

        let nodes = holder.nodes(NodeScope::Enduring);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].meta(), Some(("x", "3")));
    }

    #[test]
    fn test_give_default_if_needed() {
        let holder = user();
        holder.set_permission(NodeScope::Enduring, node("a", true));
        assert!(holder.give_default_if_needed("default"));
        assert_eq!(holder.primary_group().as_deref(), Some("default"));
        assert!(!holder.give_default_if_needed("default"));

        let group = PermissionHolder::new(HolderId::group("admin"));
        assert!(!group.give_default_if_needed("default"));
        assert_eq!(group.node_count(NodeScope::Enduring), 0);
    }

    #[test]
    fn test_stored_round_trip() {
        let holder = user();
        holder.set_name(Some("Steve".to_string()));
        holder.set_permission(NodeScope::Enduring, node("a", true));
        holder.set_permission(
            NodeScope::Enduring,
            Node::builder("b")
                .value(false)
                .with_context("world", "nether")
                .build()
                .unwrap(),
        );
        holder.set_permission(NodeScope::Transient, node("temp", true));

        let stored = holder.to_stored();
        assert_eq!(stored.permissions.len(), 2);

        let loaded = PermissionHolder::new(holder.id().clone());
        assert_eq!(loaded.load_stored(&stored), 0);
        assert_eq!(loaded.nodes(NodeScope::Enduring), holder.nodes(NodeScope::Enduring));
        assert_eq!(loaded.name().as_deref(), Some("Steve"));
        assert!(loaded.nodes(NodeScope::Transient).is_empty());
    }

    #[test]
    fn test_load_skips_invalid_nodes() {
        let holder = user();
        let mut stored = holder.to_stored();
        stored.permissions.push(node("ok", true).to_stored());
        stored.permissions.push(ctxperms_sdk::StoredNode {
            permission: "bad..node".to_string(),
            value: true,
            context: Vec::new(),
        });

        assert_eq!(holder.load_stored(&stored), 1);
        assert_eq!(holder.node_count(NodeScope::Enduring), 1);
    }

    #[test]
    fn test_load_normalizes_primary_group() {
        let holder = user();
        let mut stored = holder.to_stored();
        stored.primary_group = Some("Admin".to_string());

        holder.load_stored(&stored);
        assert_eq!(holder.primary_group().as_deref(), Some("admin"));
    }

    #[test]
    fn test_save_snapshots_are_numbered_in_order() {
        let holder = user();
        holder.set_permission(NodeScope::Enduring, node("a", true));
        let (first, snapshot) = holder.save_snapshot();
        holder.set_permission(NodeScope::Enduring, node("b", true));
        let (second, _) = holder.save_snapshot();

        assert!(second > first);
        assert_eq!(snapshot.permissions.len(), 1);
        assert_eq!(*holder.lock_saves(), 0);
    }

    #[test]
    fn test_refresh_without_buffer() {
        let holder = PermissionHolder::new(HolderId::group("admin"));
        assert!(!holder.request_refresh());
        assert_eq!(holder.refresh(), 1);
        assert_eq!(holder.version(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(usize, usize, bool),
        Unset(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..3usize, any::<bool>()).prop_map(|(p, c, v)| Op::Set(p, c, v)),
            (0..3usize, 0..3usize).prop_map(|(p, c)| Op::Unset(p, c)),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_node_per_slot(ops in prop::collection::vec(op(), 0..40)) {
            let permissions = ["a.b", "a.c", "group.admin"];
            let contexts = [
                ImmutableContextSet::empty(),
                ctx(&[("world", "nether")]),
                ctx(&[("world", "nether"), ("server", "lobby")]),
            ];
            let holder = user();
            let mut expected: HashMap<(usize, usize), bool> = HashMap::new();

            for op in ops {
                match op {
                    Op::Set(p, c, v) => {
                        let node = Node::builder(permissions[p])
                            .value(v)
                            .with_contexts(&contexts[c])
                            .build()
                            .unwrap();
                        holder.set_permission(NodeScope::Enduring, node);
                        expected.insert((p, c), v);
                    }
                    Op::Unset(p, c) => {
                        let node = Node::builder(permissions[p])
                            .with_contexts(&contexts[c])
                            .build()
                            .unwrap();
                        holder.unset_permission(NodeScope::Enduring, &node);
                        expected.remove(&(p, c));
                    }
                }
            }

            let nodes = holder.nodes(NodeScope::Enduring);
            prop_assert_eq!(nodes.len(), expected.len());
            for ((p, c), v) in expected {
                let matching: Vec<_> = nodes
                    .iter()
                    .filter(|n| n.permission() == permissions[p] && n.contexts() == &contexts[c])
                    .collect();
                prop_assert_eq!(matching.len(), 1);
                prop_assert_eq!(matching[0].value(), v);
            }
        }
    }
}
