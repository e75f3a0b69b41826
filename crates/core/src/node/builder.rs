//! Node builder

use super::{codec, ChatMetaType, Node};
use crate::context::{ContextSet, MutableContextSet};
use crate::error::{NodeError, NodeResult};

/// Builder for [`Node`]
///
/// Context errors are held until [`NodeBuilder::build`] so calls can be
/// chained.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    permission: String,
    value: bool,
    contexts: MutableContextSet,
    error: Option<NodeError>,
}

impl NodeBuilder {
    /// Start from a raw permission string (value defaults to `true`)
    pub fn new(permission: &str) -> Self {
        Self {
            permission: permission.to_string(),
            value: true,
            contexts: MutableContextSet::new(),
            error: None,
        }
    }

    /// Group-inheritance node (`group.<name>`)
    pub fn inheritance(group: &str) -> Self {
        Self::new(&codec::encode_inheritance(&group.trim().to_lowercase()))
    }

    /// Meta node (`meta.<key>.<value>`)
    pub fn meta(key: &str, value: &str) -> Self {
        Self::new(&codec::encode_meta(&key.trim().to_lowercase(), value))
    }

    /// Prefix or suffix node
    pub fn chat_meta(kind: ChatMetaType, priority: i32, value: &str) -> Self {
        Self::new(&codec::encode_chat_meta(
            kind == ChatMetaType::Prefix,
            priority,
            value,
        ))
    }

    /// Set the value
    pub fn value(mut self, value: bool) -> Self {
        self.value = value;
        self
    }

    /// Add one context pair
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        if let Err(e) = self.contexts.add(key, value) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Add every pair from a context set
    pub fn with_contexts<C: ContextSet + ?Sized>(mut self, contexts: &C) -> Self {
        self.contexts.add_all(contexts);
        self
    }

    /// Validate and build
    pub fn build(self) -> NodeResult<Node> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Node::parse(&self.permission, self.value, self.contexts.into())
    }
}
