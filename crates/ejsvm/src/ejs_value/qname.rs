use smol_str::SmolStr;
use std::fmt;

/// Qualified property name: a namespace plus a local name.
///
/// The same local name may be defined once per namespace on a single object.
/// An empty local name marks an unnamed slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct QName {
    pub space: SmolStr,
    pub name: SmolStr,
}

impl QName {
    pub fn new(space: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            space: space.into(),
            name: name.into(),
        }
    }

    /// Name in the public (empty) namespace
    pub fn public(name: impl Into<SmolStr>) -> Self {
        Self {
            space: SmolStr::default(),
            name: name.into(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.space.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}::{}", self.space, self.name)
        }
    }
}
