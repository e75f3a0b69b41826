//! Subject references used by host adapters
//!
//! A host platform names holders as `(collection, identifier)` pairs.
//! Only the [`collections::GROUP`] collection may be used as a parent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::HolderId;

/// Well-known subject collection names
pub mod collections {
    /// Collection holding users
    pub const USER: &str = "user";
    /// Collection holding groups
    pub const GROUP: &str = "group";
}

/// Reference to a subject in some collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectReference {
    /// Collection name (e.g. "group")
    pub collection: String,
    /// Identifier within the collection
    pub identifier: String,
}

impl SubjectReference {
    /// Create a reference from raw parts
    pub fn new(collection: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            identifier: identifier.into(),
        }
    }

    /// Reference to a group by name
    pub fn group(name: &str) -> Self {
        Self::new(collections::GROUP, name.trim().to_lowercase())
    }

    /// Check if this reference points into the group collection
    pub fn is_group(&self) -> bool {
        self.collection.eq_ignore_ascii_case(collections::GROUP)
    }

    /// Convert to a holder id
    ///
    /// Returns `None` for unknown collections or malformed user UUIDs.
    pub fn to_holder_id(&self) -> Option<HolderId> {
        if self.is_group() {
            return Some(HolderId::group(&self.identifier));
        }
        if self.collection.eq_ignore_ascii_case(collections::USER) {
            return Uuid::parse_str(&self.identifier).ok().map(HolderId::User);
        }
        None
    }
}

impl From<&HolderId> for SubjectReference {
    fn from(id: &HolderId) -> Self {
        Self::new(id.collection(), id.identifier())
    }
}
