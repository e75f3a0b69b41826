//! Error types for node construction and persistence

/// Validation failures raised before any mutation takes place
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Permission string was empty or whitespace
    #[error("Permission must not be empty")]
    EmptyPermission,

    /// Permission string contained `..` or a leading/trailing separator
    #[error("Illegal separator sequence in permission: {0}")]
    IllegalSeparator(String),

    /// Meta node with an empty key
    #[error("Meta key must not be empty")]
    EmptyMetaKey,

    /// Group-inheritance node with an empty group name
    #[error("Group name must not be empty")]
    EmptyGroupName,

    /// Prefix/suffix node whose priority is not an integer
    #[error("Invalid chat meta priority: {0}")]
    InvalidPriority(String),

    /// Context pair with an empty key
    #[error("Context key must not be empty")]
    EmptyContextKey,
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;

/// Persistence failures
///
/// These are logged and surfaced asynchronously; in-memory state is never
/// rolled back because of them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend refused or could not complete the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Holder could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stored data could not be turned back into nodes
    #[error("Corrupt record for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
