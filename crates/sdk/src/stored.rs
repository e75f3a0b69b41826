//! Persisted-state layout
//!
//! One [`StoredHolder`] per holder. Nodes are flattened to
//! `permission + value + context pairs`; the structured node kinds are
//! recovered from the permission string when loading.

use serde::{Deserialize, Serialize};

use crate::HolderId;

/// A single `key=value` context pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoredContext {
    pub key: String,
    pub value: String,
}

/// A serialized node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    /// Canonical permission string (e.g. `group.admin`, `prefix.10.[VIP]`)
    pub permission: String,
    /// Grant (`true`) or explicit deny (`false`)
    #[serde(default = "default_value")]
    pub value: bool,
    /// Context pairs, empty for global nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<StoredContext>,
}

fn default_value() -> bool {
    true
}

/// A serialized holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredHolder {
    /// Which holder this is
    pub holder: HolderId,
    /// Last known username (users only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Primary group (users only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_group: Option<String>,
    /// Enduring nodes in insertion order
    #[serde(default)]
    pub permissions: Vec<StoredNode>,
}

impl StoredHolder {
    /// Create an empty record for a holder
    pub fn new(holder: HolderId) -> Self {
        Self {
            holder,
            name: None,
            primary_group: None,
            permissions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut stored = StoredHolder::new(HolderId::group("admin"));
        stored.permissions.push(StoredNode {
            permission: "example.perm".to_string(),
            value: false,
            context: vec![StoredContext {
                key: "world".to_string(),
                value: "nether".to_string(),
            }],
        });

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["holder"]["identifier"], "admin");
        assert!(json.get("primaryGroup").is_none());
        assert_eq!(json["permissions"][0]["permission"], "example.perm");
        assert_eq!(json["permissions"][0]["value"], false);
        assert_eq!(json["permissions"][0]["context"][0]["key"], "world");
    }

    #[test]
    fn test_value_defaults_to_true() {
        let node: StoredNode = serde_json::from_str(r#"{"permission":"a.b"}"#).unwrap();
        assert!(node.value);
        assert!(node.context.is_empty());
    }
}
