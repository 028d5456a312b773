//! Dependency Graph
//!
//! This module records which computation read which property of which
//! structured value, and answers the reverse question on every write.
//!
//! # Overview
//!
//! The graph is a two-level map: target → property key → ordered set of
//! subscribed effects. Granularity is per key, so writing one property never
//! disturbs computations that only read its siblings.
//!
//! # Design Decisions
//!
//! 1. Effects are referenced by [`EffectId`] (an arena handle), never owned.
//!    The graph holds no reference cycles and removal is by index.
//!
//! 2. We maintain both forward (target/key → effects) and reverse
//!    (effect → target/key) edges so an effect can be unsubscribed in time
//!    proportional to what it read.
//!
//! 3. Triggering works on a snapshot of the subscriber set, so effects that
//!    resubscribe while re-running cannot corrupt the iteration.

mod deps;
mod node;

pub use deps::{DependencyGraph, Subscribers};
pub use node::{Dep, DepKey, EffectId};
