//! Subject data façade
//!
//! The CRUD surface a host adapter drives: permissions, parents and options
//! of one holder scope, addressed by exact context set. Every mutation runs
//! in memory under the holder lock, then hands off to the engine for
//! persistence (enduring) or a refresh (transient).
//!
//! Setters return `Ok(true)` when something changed and `Ok(false)` for a
//! no-op. Malformed input is rejected with a [`NodeError`] before any
//! mutation.
//!
//! [`NodeError`]: crate::error::NodeError

use std::collections::HashMap;
use std::sync::Arc;

use ctxperms_sdk::SubjectReference;

use crate::context::ImmutableContextSet;
use crate::engine::PermissionEngine;
use crate::error::NodeResult;
use crate::holder::{NodeScope, PermissionHolder, PermissionMap};
use crate::meta::OptionMap;
use crate::node::{ChatMetaType, Node, NodeBuilder};
use crate::registry::GroupRegistry;
use crate::tristate::Tristate;

/// One scope of a holder, as seen by a host adapter
pub struct SubjectData<'a> {
    engine: &'a PermissionEngine,
    holder: Arc<PermissionHolder>,
    scope: NodeScope,
}

impl<'a> SubjectData<'a> {
    pub(crate) fn new(engine: &'a PermissionEngine, holder: Arc<PermissionHolder>, scope: NodeScope) -> Self {
        Self {
            engine,
            holder,
            scope,
        }
    }

    pub fn holder(&self) -> &Arc<PermissionHolder> {
        &self.holder
    }

    pub fn scope(&self) -> NodeScope {
        self.scope
    }

    // ------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------

    /// Every node's value per exact context set
    pub fn permissions(&self) -> PermissionMap {
        self.holder.permissions(self.scope)
    }

    /// Set, flip or unset a permission in `contexts`
    ///
    /// `Undefined` removes the slot whatever its value.
    pub fn set_permission(
        &self,
        contexts: &ImmutableContextSet,
        permission: &str,
        value: Tristate,
    ) -> NodeResult<bool> {
        let node = Node::builder(permission)
            .value(value.as_bool())
            .with_contexts(contexts)
            .build()?;

        let result = match value {
            Tristate::Undefined => self.holder.unset_permission(self.scope, &node),
            Tristate::True | Tristate::False => self.holder.set_permission(self.scope, node),
        };
        Ok(self.changed(result.was_success()))
    }

    /// Remove every node in this scope
    pub fn clear_permissions(&self) -> bool {
        let removed = self.holder.clear_nodes(self.scope);
        self.cleared(removed)
    }

    /// Remove every node assigned in exactly `contexts`
    pub fn clear_permissions_in(&self, contexts: &ImmutableContextSet) -> bool {
        let removed = self.holder.clear_nodes_in(self.scope, contexts);
        self.cleared(removed)
    }

    // ------------------------------------------------------------------
    // Parents
    // ------------------------------------------------------------------

    /// Parent groups per exact context set
    ///
    /// Groups that are not loaded are left out.
    pub fn parents(&self) -> HashMap<ImmutableContextSet, Vec<SubjectReference>> {
        self.holder
            .parents(self.scope)
            .into_iter()
            .filter_map(|(contexts, names)| {
                let refs: Vec<SubjectReference> = names
                    .iter()
                    .filter(|name| self.engine.groups().lookup(name).is_some())
                    .map(|name| SubjectReference::group(name))
                    .collect();
                (!refs.is_empty()).then_some((contexts, refs))
            })
            .collect()
    }

    /// Inherit from a group in `contexts`
    ///
    /// Returns `Ok(false)` without mutating when `parent` is outside the
    /// group collection or names a group that is not loaded.
    pub fn add_parent(&self, contexts: &ImmutableContextSet, parent: &SubjectReference) -> NodeResult<bool> {
        let Some(node) = self.parent_node(contexts, parent)? else {
            return Ok(false);
        };
        let result = self.holder.set_permission(self.scope, node);
        Ok(self.changed(result.was_success()))
    }

    /// Stop inheriting from a group in `contexts`
    pub fn remove_parent(&self, contexts: &ImmutableContextSet, parent: &SubjectReference) -> NodeResult<bool> {
        let Some(node) = self.parent_node(contexts, parent)? else {
            return Ok(false);
        };
        let result = self.holder.unset_permission(self.scope, &node);
        Ok(self.changed(result.was_success()))
    }

    fn parent_node(
        &self,
        contexts: &ImmutableContextSet,
        parent: &SubjectReference,
    ) -> NodeResult<Option<Node>> {
        if !parent.is_group() {
            tracing::debug!(
                "{}: rejecting parent from collection '{}'",
                self.holder.id(),
                parent.collection
            );
            return Ok(None);
        }
        if self.engine.groups().lookup(&parent.identifier).is_none() {
            tracing::debug!("{}: parent group '{}' not loaded", self.holder.id(), parent.identifier);
            return Ok(None);
        }
        NodeBuilder::inheritance(&parent.identifier)
            .with_contexts(contexts)
            .build()
            .map(Some)
    }

    /// Remove every inheritance node
    pub fn clear_parents(&self) -> bool {
        let removed = self.holder.clear_nodes_matching(self.scope, Node::is_group_node);
        self.cleared(removed)
    }

    /// Remove inheritance nodes assigned in exactly `contexts`
    pub fn clear_parents_in(&self, contexts: &ImmutableContextSet) -> bool {
        let removed = self
            .holder
            .clear_nodes_matching(self.scope, |n| n.is_group_node() && n.contexts() == contexts);
        self.cleared(removed)
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    /// Options per exact context set, `prefix`/`suffix` included
    pub fn options(&self) -> OptionMap {
        self.holder.options(self.scope)
    }

    /// Set an option in `contexts`
    ///
    /// `prefix`/`suffix` replace every prefix/suffix in that exact context
    /// with one at a priority above the highest currently in effect. Other
    /// keys replace existing meta with the same key in that context.
    pub fn set_option(&self, contexts: &ImmutableContextSet, key: &str, value: &str) -> NodeResult<bool> {
        let result = match ChatMetaType::from_key(key) {
            Some(kind) => {
                let step = self.engine.config().chat_meta_priority_step;
                let priority = self
                    .engine
                    .accumulate_meta(&self.holder, contexts)
                    .max_priority(kind)
                    .map_or(step, |max| max.saturating_add(step));

                let node = NodeBuilder::chat_meta(kind, priority, value)
                    .with_contexts(contexts)
                    .build()?;
                self.holder.replace_matching(
                    self.scope,
                    |n| n.contexts() == contexts && n.chat_meta(kind).is_some(),
                    node,
                )
            }
            None => {
                let node = NodeBuilder::meta(key, value).with_contexts(contexts).build()?;
                let meta_key = node.meta().map(|(k, _)| k.to_string());
                self.holder.replace_matching(
                    self.scope,
                    |n| n.contexts() == contexts && n.meta().map(|(k, _)| k) == meta_key.as_deref(),
                    node,
                )
            }
        };
        Ok(self.changed(result.was_success()))
    }

    /// Remove an option in exactly `contexts`
    pub fn unset_option(&self, contexts: &ImmutableContextSet, key: &str) -> bool {
        let removed = match ChatMetaType::from_key(key) {
            Some(kind) => self.holder.clear_nodes_matching(self.scope, |n| {
                n.contexts() == contexts && n.chat_meta(kind).is_some()
            }),
            None => {
                let key = key.trim().to_lowercase();
                self.holder.clear_nodes_matching(self.scope, |n| {
                    n.contexts() == contexts && n.meta().is_some_and(|(k, _)| k == key)
                })
            }
        };
        self.changed(removed)
    }

    /// Remove every meta, prefix and suffix node
    pub fn clear_options(&self) -> bool {
        let removed = self.holder.clear_nodes_matching(self.scope, Node::is_option);
        self.cleared(removed)
    }

    /// Remove option nodes assigned in exactly `contexts`
    pub fn clear_options_in(&self, contexts: &ImmutableContextSet) -> bool {
        let removed = self
            .holder
            .clear_nodes_matching(self.scope, |n| n.is_option() && n.contexts() == contexts);
        self.cleared(removed)
    }

    // ------------------------------------------------------------------
    // Follow-up
    // ------------------------------------------------------------------

    fn changed(&self, changed: bool) -> bool {
        if changed {
            self.engine.commit(&self.holder, self.scope);
        }
        changed
    }

    /// A user must keep a group after a bulk removal
    fn cleared(&self, removed: bool) -> bool {
        if removed && self.scope == NodeScope::Enduring {
            self.holder
                .give_default_if_needed(&self.engine.config().default_group);
        }
        self.changed(removed)
    }
}
