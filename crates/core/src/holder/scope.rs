//! Node collection scopes

use bitflags::bitflags;

/// Which of a holder's two collections an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeScope {
    /// Persisted nodes
    Enduring,
    /// Session-scoped nodes, never persisted
    Transient,
}

impl NodeScope {
    /// The matching single-scope flag
    pub fn flag(self) -> ScopeSet {
        match self {
            Self::Enduring => ScopeSet::ENDURING,
            Self::Transient => ScopeSet::TRANSIENT,
        }
    }
}

bitflags! {
    /// Scopes merged by a read for the duration of one call
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScopeSet: u8 {
        /// Include enduring nodes
        const ENDURING = 0x01;
        /// Include transient nodes
        const TRANSIENT = 0x02;
    }
}

impl ScopeSet {
    /// Scopes in resolution order (transient before enduring)
    pub fn ordered(self) -> impl Iterator<Item = NodeScope> {
        [
            (ScopeSet::TRANSIENT, NodeScope::Transient),
            (ScopeSet::ENDURING, NodeScope::Enduring),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, scope)| scope)
    }
}

impl From<NodeScope> for ScopeSet {
    fn from(scope: NodeScope) -> Self {
        scope.flag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_transient_first() {
        let scopes: Vec<_> = ScopeSet::all().ordered().collect();
        assert_eq!(scopes, vec![NodeScope::Transient, NodeScope::Enduring]);

        let scopes: Vec<_> = ScopeSet::from(NodeScope::Enduring).ordered().collect();
        assert_eq!(scopes, vec![NodeScope::Enduring]);
    }
}
