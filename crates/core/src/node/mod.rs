//! Nodes - single permission or meta assignments
//!
//! A node is a canonical permission string, a boolean value and a context
//! set. The structured kinds (group inheritance, meta, prefix, suffix) are
//! classified once at construction and carried as a [`NodeKind`] next to
//! the string, so storage only ever sees `string + bool + contexts`.
//!
//! # Slots
//!
//! Two nodes with the same permission and contexts occupy the same
//! [`NodeSlot`], whatever their values. A holder keeps at most one node per
//! slot, which is what lets a grant replace a deny and vice versa.

mod builder;
pub mod codec;

use std::fmt;

use ctxperms_sdk::StoredNode;

use crate::context::{ContextSet, ImmutableContextSet};
use crate::error::NodeResult;

pub use builder::NodeBuilder;

/// Chat meta flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatMetaType {
    Prefix,
    Suffix,
}

impl ChatMetaType {
    /// Option key used for this type (`prefix` / `suffix`)
    pub fn key(self) -> &'static str {
        match self {
            Self::Prefix => codec::PREFIX_PREFIX,
            Self::Suffix => codec::SUFFIX_PREFIX,
        }
    }

    /// Match an option key case-insensitively
    pub fn from_key(key: &str) -> Option<Self> {
        if key.eq_ignore_ascii_case(codec::PREFIX_PREFIX) {
            Some(Self::Prefix)
        } else if key.eq_ignore_ascii_case(codec::SUFFIX_PREFIX) {
            Some(Self::Suffix)
        } else {
            None
        }
    }
}

/// Structured payload of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Plain permission
    Permission,
    /// Inherit everything from a group
    Inheritance { group: String },
    /// Key/value option
    Meta { key: String, value: String },
    /// Chat prefix with priority
    Prefix { priority: i32, value: String },
    /// Chat suffix with priority
    Suffix { priority: i32, value: String },
}

/// Identity of a node ignoring its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeSlot {
    pub permission: String,
    pub contexts: ImmutableContextSet,
}

/// An immutable permission assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    permission: String,
    value: bool,
    contexts: ImmutableContextSet,
    kind: NodeKind,
}

impl Node {
    /// Start building a node from a permission string
    pub fn builder(permission: &str) -> NodeBuilder {
        NodeBuilder::new(permission)
    }

    /// Parse a node directly
    pub fn parse(permission: &str, value: bool, contexts: ImmutableContextSet) -> NodeResult<Self> {
        let (permission, kind) = codec::parse(permission)?;
        Ok(Self {
            permission,
            value,
            contexts,
            kind,
        })
    }

    /// Rebuild a node from its stored form
    pub fn from_stored(stored: &StoredNode) -> NodeResult<Self> {
        let contexts = ImmutableContextSet::from_stored(&stored.context)?;
        Self::parse(&stored.permission, stored.value, contexts)
    }

    /// Convert to the stored form
    pub fn to_stored(&self) -> StoredNode {
        StoredNode {
            permission: self.permission.clone(),
            value: self.value,
            context: self.contexts.to_stored(),
        }
    }

    /// Canonical permission string
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Grant (`true`) or deny (`false`)
    pub fn value(&self) -> bool {
        self.value
    }

    /// Contexts this node applies in
    pub fn contexts(&self) -> &ImmutableContextSet {
        &self.contexts
    }

    /// Structured payload
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Slot identity (permission + contexts)
    pub fn slot(&self) -> NodeSlot {
        NodeSlot {
            permission: self.permission.clone(),
            contexts: self.contexts.clone(),
        }
    }

    /// Check if two nodes occupy the same slot
    pub fn same_slot(&self, other: &Node) -> bool {
        self.permission == other.permission && self.contexts == other.contexts
    }

    /// Copy with a different value
    pub fn with_value(&self, value: bool) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    /// Check if this node is active for the given query contexts
    pub fn applies_in<C: ContextSet + ?Sized>(&self, query: &C) -> bool {
        self.contexts.satisfies(query)
    }

    pub fn is_group_node(&self) -> bool {
        matches!(self.kind, NodeKind::Inheritance { .. })
    }

    /// Inherited group name for inheritance nodes
    pub fn group_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Inheritance { group } => Some(group),
            _ => None,
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.kind, NodeKind::Meta { .. })
    }

    /// `(key, value)` for meta nodes
    pub fn meta(&self) -> Option<(&str, &str)> {
        match &self.kind {
            NodeKind::Meta { key, value } => Some((key, value)),
            _ => None,
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self.kind, NodeKind::Prefix { .. })
    }

    /// `(priority, value)` for prefix nodes
    pub fn prefix(&self) -> Option<(i32, &str)> {
        match &self.kind {
            NodeKind::Prefix { priority, value } => Some((*priority, value)),
            _ => None,
        }
    }

    pub fn is_suffix(&self) -> bool {
        matches!(self.kind, NodeKind::Suffix { .. })
    }

    /// `(priority, value)` for suffix nodes
    pub fn suffix(&self) -> Option<(i32, &str)> {
        match &self.kind {
            NodeKind::Suffix { priority, value } => Some((*priority, value)),
            _ => None,
        }
    }

    /// `(priority, value)` for the given chat meta type
    pub fn chat_meta(&self, kind: ChatMetaType) -> Option<(i32, &str)> {
        match kind {
            ChatMetaType::Prefix => self.prefix(),
            ChatMetaType::Suffix => self.suffix(),
        }
    }

    /// Meta, prefix or suffix
    pub fn is_option(&self) -> bool {
        self.is_meta() || self.is_prefix() || self.is_suffix()
    }

    /// Check if this is a plain wildcard (`*` or `a.b.*`)
    pub fn is_wildcard(&self) -> bool {
        self.kind == NodeKind::Permission
            && (self.permission == "*" || self.permission.ends_with(".*"))
    }

    /// How closely this node matches a queried permission
    ///
    /// `None` if it does not match. Exact matches score highest; wildcards
    /// score by the length of the prefix they cover.
    pub fn match_strength(&self, permission: &str) -> Option<usize> {
        if self.permission == permission {
            return Some(usize::MAX);
        }
        if self.kind != NodeKind::Permission {
            return None;
        }
        if self.permission == "*" {
            return Some(0);
        }
        let root = self.permission.strip_suffix(".*")?;
        let rest = permission.strip_prefix(root)?;
        rest.starts_with('.').then_some(root.len())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} in {}", self.permission, self.value, self.contexts)
    }
}
