//! Holder identifiers
//!
//! Users are keyed by UUID, groups by their lower-case name.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::collections;

/// Identity of a permission holder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identifier", rename_all = "lowercase")]
pub enum HolderId {
    /// A player, keyed by UUID
    User(Uuid),
    /// A named group (always lower-case)
    Group(String),
}

impl HolderId {
    /// Create a group id, normalizing the name to lower-case
    pub fn group(name: &str) -> Self {
        Self::Group(name.trim().to_lowercase())
    }

    /// Create a user id
    pub fn user(uuid: Uuid) -> Self {
        Self::User(uuid)
    }

    /// Check if this id refers to a user
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Check if this id refers to a group
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Get the group name, if this is a group id
    pub fn group_name(&self) -> Option<&str> {
        match self {
            Self::Group(name) => Some(name),
            Self::User(_) => None,
        }
    }

    /// The string identifier used at the storage boundary
    ///
    /// `User(uuid)` -> hyphenated uuid, `Group(name)` -> name
    pub fn identifier(&self) -> String {
        match self {
            Self::User(uuid) => uuid.hyphenated().to_string(),
            Self::Group(name) => name.clone(),
        }
    }

    /// The subject collection this holder belongs to
    pub fn collection(&self) -> &'static str {
        match self {
            Self::User(_) => collections::USER,
            Self::Group(_) => collections::GROUP,
        }
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection(), self.identifier())
    }
}
