//! Context sets
//!
//! A context set is an unordered collection of `key=value` pairs describing
//! when a node applies (world, server, gamemode, ...). A key may carry
//! several values.
//!
//! Two flavours exist:
//! - [`MutableContextSet`] - built up incrementally by callers
//! - [`ImmutableContextSet`] - cheap to clone, hashable, used as a map key
//!
//! The empty set is the global scope: it satisfies every query.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ctxperms_sdk::StoredContext;

use crate::error::{NodeError, NodeResult};

type Pairs = BTreeSet<(String, String)>;

/// Read access shared by both context set flavours
pub trait ContextSet {
    /// All pairs, ordered by key then value
    fn pairs(&self) -> &BTreeSet<(String, String)>;

    /// Check if this is the global (empty) set
    fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }

    /// Number of pairs
    fn len(&self) -> usize {
        self.pairs().len()
    }

    /// Check if an exact pair is present
    fn contains(&self, key: &str, value: &str) -> bool {
        let key = normalize_key(key);
        self.pairs()
            .iter()
            .any(|(k, v)| *k == key && v == value.trim())
    }

    /// Check if any value is present for a key
    fn contains_key(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.pairs().iter().any(|(k, _)| *k == key)
    }

    /// All values for a key
    fn values(&self, key: &str) -> Vec<&str> {
        let key = normalize_key(key);
        self.pairs()
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Check if this (required) set is satisfied by `query` (actual) set
    ///
    /// Every pair in `self` must also appear in `query`. A query carrying
    /// several values for one key satisfies a node requiring any of them.
    /// Not symmetric.
    fn satisfies<C: ContextSet + ?Sized>(&self, query: &C) -> bool
    where
        Self: Sized,
    {
        satisfied_by(self.pairs(), query.pairs())
    }

    /// Snapshot into an immutable set
    fn make_immutable(&self) -> ImmutableContextSet {
        ImmutableContextSet {
            pairs: Arc::new(self.pairs().clone()),
        }
    }

    /// Convert to the storage representation
    fn to_stored(&self) -> Vec<StoredContext> {
        self.pairs()
            .iter()
            .map(|(key, value)| StoredContext {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

fn satisfied_by(required: &Pairs, actual: &Pairs) -> bool {
    required.is_subset(actual)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn normalize_pair(key: &str, value: &str) -> NodeResult<(String, String)> {
    let key = normalize_key(key);
    if key.is_empty() {
        return Err(NodeError::EmptyContextKey);
    }
    Ok((key, value.trim().to_string()))
}

/// Context set that can be modified in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutableContextSet {
    pairs: Pairs,
}

impl MutableContextSet {
    /// Create an empty (global) set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair
    ///
    /// Keys are trimmed and lower-cased; values are trimmed.
    pub fn add(&mut self, key: &str, value: &str) -> NodeResult<()> {
        self.pairs.insert(normalize_pair(key, value)?);
        Ok(())
    }

    /// Add every pair from another set
    pub fn add_all<C: ContextSet + ?Sized>(&mut self, other: &C) {
        self.pairs.extend(other.pairs().iter().cloned());
    }

    /// Remove an exact pair, returning whether it was present
    pub fn remove(&mut self, key: &str, value: &str) -> bool {
        self.pairs
            .remove(&(normalize_key(key), value.trim().to_string()))
    }

    /// Remove every value for a key
    pub fn remove_all(&mut self, key: &str) {
        let key = normalize_key(key);
        self.pairs.retain(|(k, _)| *k != key);
    }

    /// Remove all pairs
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

impl ContextSet for MutableContextSet {
    fn pairs(&self) -> &BTreeSet<(String, String)> {
        &self.pairs
    }
}

/// Context set frozen for use as a map key
///
/// Equality and hashing are order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImmutableContextSet {
    pairs: Arc<Pairs>,
}

impl ImmutableContextSet {
    /// The global (empty) set
    pub fn empty() -> Self {
        Self::default()
    }

    /// A set holding a single pair
    pub fn singleton(key: &str, value: &str) -> NodeResult<Self> {
        Self::from_pairs([(key, value)])
    }

    /// Build from `(key, value)` pairs
    pub fn from_pairs<'a, I>(pairs: I) -> NodeResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| normalize_pair(k, v))
            .collect::<NodeResult<Pairs>>()?;
        Ok(Self {
            pairs: Arc::new(pairs),
        })
    }

    /// Build from the storage representation
    pub fn from_stored(stored: &[StoredContext]) -> NodeResult<Self> {
        Self::from_pairs(stored.iter().map(|c| (c.key.as_str(), c.value.as_str())))
    }

    /// Copy into a mutable set
    pub fn mutable_copy(&self) -> MutableContextSet {
        MutableContextSet {
            pairs: (*self.pairs).clone(),
        }
    }
}

impl ContextSet for ImmutableContextSet {
    fn pairs(&self) -> &BTreeSet<(String, String)> {
        &self.pairs
    }

    fn make_immutable(&self) -> ImmutableContextSet {
        self.clone()
    }
}

impl From<MutableContextSet> for ImmutableContextSet {
    fn from(set: MutableContextSet) -> Self {
        Self {
            pairs: Arc::new(set.pairs),
        }
    }
}

impl fmt::Display for ImmutableContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pairs.is_empty() {
            return f.write_str("global");
        }
        f.write_str("{")?;
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        f.write_str("}")
    }
}
