//! Slot-indexed, insertion-ordered node collection

use std::collections::{BTreeMap, HashMap};

use crate::node::{Node, NodeSlot};

/// Outcome of a single-node mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateResult {
    /// The collection changed
    Success,
    /// An identical node (same slot and value) was already present
    AlreadyHas,
    /// No node occupied the slot
    LacksNode,
}

impl MutateResult {
    /// Check if the collection changed
    pub fn was_success(self) -> bool {
        self == Self::Success
    }
}

/// Nodes keyed by slot, iterated in insertion order
///
/// Every node gets a sequence number on insertion; the slot index points at
/// it. Replacing a slot gives the new node a fresh sequence number, so it
/// moves to the end exactly as an unset followed by a set would.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeMap {
    entries: BTreeMap<u64, Node>,
    slots: HashMap<NodeSlot, u64>,
    next_seq: u64,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the node's slot
    pub fn set(&mut self, node: Node) -> MutateResult {
        let slot = node.slot();
        if let Some(seq) = self.slots.get(&slot).copied() {
            if self.entries.get(&seq).map(Node::value) == Some(node.value()) {
                return MutateResult::AlreadyHas;
            }
            self.entries.remove(&seq);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(seq, node);
        self.slots.insert(slot, seq);
        MutateResult::Success
    }

    /// Remove whatever node occupies a slot
    pub fn unset(&mut self, slot: &NodeSlot) -> Option<Node> {
        let seq = self.slots.remove(slot)?;
        self.entries.remove(&seq)
    }

    /// Node currently occupying a slot
    pub fn get(&self, slot: &NodeSlot) -> Option<&Node> {
        self.slots.get(slot).and_then(|seq| self.entries.get(seq))
    }

    /// Remove every node matching a predicate, returning the removed nodes
    pub fn remove_if<F>(&mut self, mut predicate: F) -> Vec<Node>
    where
        F: FnMut(&Node) -> bool,
    {
        let doomed: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, node)| predicate(*node))
            .map(|(seq, _)| *seq)
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for seq in doomed {
            if let Some(node) = self.entries.remove(&seq) {
                self.slots.remove(&node.slot());
                removed.push(node);
            }
        }
        removed
    }

    /// Remove everything, returning whether anything was present
    pub fn clear(&mut self) -> bool {
        let had_nodes = !self.entries.is_empty();
        self.entries.clear();
        self.slots.clear();
        had_nodes
    }

    /// Nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.entries.values()
    }

    /// Cloned snapshot in insertion order
    pub fn to_vec(&self) -> Vec<Node> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Node> for NodeMap {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut map = Self::new();
        for node in iter {
            map.set(node);
        }
        map
    }
}
