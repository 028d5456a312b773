//! Error types for the reactive layer.
//!
//! Very little in this crate is fallible from the caller's point of view:
//! wrapping a primitive passes it through and writes through a read-only
//! wrapper are rejected with a warning. The errors below surface from the
//! fail-fast `try_*` constructors and from raw structure writes.

use thiserror::Error;

use crate::value::Key;

/// Errors produced by the reactive layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// Only records and lists can be wrapped.
    #[error("cannot wrap a {kind} value: only records and lists can be made reactive")]
    NotStructured { kind: &'static str },

    /// The key does not address anything on this kind of structure.
    #[error("key {key} is not valid for a {kind}")]
    InvalidKey { key: Key, kind: &'static str },

    /// Introspection markers are answered by wrappers and cannot be stored.
    #[error("introspection marker {key} cannot be written")]
    FlagWrite { key: Key },
}

pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
