//! Three-valued permission result

/// Result of a permission lookup, or a requested permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tristate {
    /// Explicitly granted
    True,
    /// Explicitly denied
    False,
    /// No node decides the question
    #[default]
    Undefined,
}

impl Tristate {
    /// Map a node value onto a tristate
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }

    /// Collapse to a boolean, treating `Undefined` as a deny
    pub fn as_bool(self) -> bool {
        matches!(self, Self::True)
    }

    /// `None` for `Undefined`
    pub fn to_option(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Undefined => None,
        }
    }

    /// Check if this is `Undefined`
    pub fn is_undefined(self) -> bool {
        self == Self::Undefined
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Undefined, Self::from_bool)
    }
}
