//! Meta accumulation
//!
//! Two read-side views are built from raw nodes:
//!
//! - [`options_by_context`] buckets one collection by exact context set and
//!   resolves each bucket to `key -> value` (the `getOptions` view).
//! - [`MetaAccumulator`] folds nodes applicable to one query context,
//!   walked nearest-holder-first across inheritance, into effective meta and
//!   ordered prefix/suffix maps.
//!
//! Only granted (`value = true`) meta, prefix and suffix nodes contribute.
//! Results are plain owned values computed per call; nothing is cached here.

use std::collections::{BTreeMap, HashMap};

use crate::context::ImmutableContextSet;
use crate::node::{ChatMetaType, Node, NodeKind};

/// Options keyed by the exact context set they were assigned in
pub type OptionMap = HashMap<ImmutableContextSet, HashMap<String, String>>;

#[derive(Default)]
struct Bucket {
    options: HashMap<String, String>,
    prefix_priority: Option<i32>,
    suffix_priority: Option<i32>,
}

impl Bucket {
    fn offer_chat_meta(&mut self, kind: ChatMetaType, priority: i32, value: &str) {
        let tracked = match kind {
            ChatMetaType::Prefix => &mut self.prefix_priority,
            ChatMetaType::Suffix => &mut self.suffix_priority,
        };
        // Equal priority keeps the earlier node
        if tracked.map_or(true, |current| priority > current) {
            *tracked = Some(priority);
            self.options.insert(kind.key().to_string(), value.to_string());
        }
    }
}

/// Bucket a collection's option nodes by context, in iteration order
///
/// Per bucket, a prefix/suffix replaces the current one only when its
/// priority is strictly greater; plain meta is last-write-wins per key.
pub fn options_by_context<'a, I>(nodes: I) -> OptionMap
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut buckets: HashMap<ImmutableContextSet, Bucket> = HashMap::new();

    for node in nodes {
        if !node.value() || !node.is_option() {
            continue;
        }

        let bucket = buckets.entry(node.contexts().clone()).or_default();
        match node.kind() {
            NodeKind::Prefix { priority, value } => {
                bucket.offer_chat_meta(ChatMetaType::Prefix, *priority, value)
            }
            NodeKind::Suffix { priority, value } => {
                bucket.offer_chat_meta(ChatMetaType::Suffix, *priority, value)
            }
            NodeKind::Meta { key, value } => {
                bucket.options.insert(key.clone(), value.clone());
            }
            NodeKind::Permission | NodeKind::Inheritance { .. } => {}
        }
    }

    buckets
        .into_iter()
        .map(|(contexts, bucket)| (contexts, bucket.options))
        .collect()
}

/// Effective meta for one query context
///
/// Feed nodes nearest-first: the first value seen for a meta key wins, and
/// the first value seen at a given prefix/suffix priority wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaAccumulator {
    meta: HashMap<String, String>,
    prefixes: BTreeMap<i32, String>,
    suffixes: BTreeMap<i32, String>,
}

impl MetaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one node in
    ///
    /// The caller is responsible for context filtering.
    pub fn accumulate(&mut self, node: &Node) {
        if !node.value() {
            return;
        }
        match node.kind() {
            NodeKind::Meta { key, value } => {
                self.meta
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
            NodeKind::Prefix { priority, value } => {
                self.prefixes
                    .entry(*priority)
                    .or_insert_with(|| value.clone());
            }
            NodeKind::Suffix { priority, value } => {
                self.suffixes
                    .entry(*priority)
                    .or_insert_with(|| value.clone());
            }
            NodeKind::Permission | NodeKind::Inheritance { .. } => {}
        }
    }

    /// Effective meta key/value pairs
    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    /// Effective value for a meta key
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.get(&key.to_lowercase()).map(String::as_str)
    }

    /// All prefixes by priority
    pub fn prefixes(&self) -> &BTreeMap<i32, String> {
        &self.prefixes
    }

    /// All suffixes by priority
    pub fn suffixes(&self) -> &BTreeMap<i32, String> {
        &self.suffixes
    }

    /// Prefixes or suffixes by priority
    pub fn chat_meta(&self, kind: ChatMetaType) -> &BTreeMap<i32, String> {
        match kind {
            ChatMetaType::Prefix => &self.prefixes,
            ChatMetaType::Suffix => &self.suffixes,
        }
    }

    /// Highest-priority prefix
    pub fn prefix(&self) -> Option<&str> {
        self.prefixes.values().next_back().map(String::as_str)
    }

    /// Highest-priority suffix
    pub fn suffix(&self) -> Option<&str> {
        self.suffixes.values().next_back().map(String::as_str)
    }

    /// Highest priority in use for a chat meta type
    pub fn max_priority(&self, kind: ChatMetaType) -> Option<i32> {
        self.chat_meta(kind).keys().next_back().copied()
    }

    /// Flatten to an options map, including `prefix`/`suffix` keys
    pub fn to_options(&self) -> HashMap<String, String> {
        let mut options = self.meta.clone();
        if let Some(prefix) = self.prefix() {
            options.insert(ChatMetaType::Prefix.key().to_string(), prefix.to_string());
        }
        if let Some(suffix) = self.suffix() {
            options.insert(ChatMetaType::Suffix.key().to_string(), suffix.to_string());
        }
        options
    }
}
