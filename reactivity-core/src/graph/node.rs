//! Graph Nodes
//!
//! Identifiers for the two sides of the dependency graph: computations
//! (effects) and the `(target, key)` pairs they read.

use std::fmt;

use slotmap::new_key_type;

use crate::value::{Key, TargetId};

new_key_type! {
    /// Arena handle of a computation.
    ///
    /// Dependency sets hold these instead of references to the effect, so the
    /// graph never owns a computation and removal on stop is by index.
    pub struct EffectId;
}

/// What was read on a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A single property.
    Prop(Key),
    /// The key set itself: enumeration, length.
    Iterate,
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(key) => fmt::Display::fmt(key, f),
            DepKey::Iterate => f.write_str("<iterate>"),
        }
    }
}

impl From<Key> for DepKey {
    fn from(key: Key) -> Self {
        DepKey::Prop(key)
    }
}

/// One dependency-graph entry: a key on a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dep {
    pub target: TargetId,
    pub key: DepKey,
}

impl Dep {
    pub fn new(target: TargetId, key: impl Into<DepKey>) -> Self {
        Self {
            target,
            key: key.into(),
        }
    }
}

impl fmt::Display for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.key)
    }
}
