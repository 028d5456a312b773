//! Reactive Primitives
//!
//! This module implements the reactive object layer: wrappers that intercept
//! property access on structured values, and effects that re-run when the
//! properties they read are written.
//!
//! # Concepts
//!
//! ## Wrappers
//!
//! [`reactive`] returns a [`Proxy`] around a record or list. Reading a
//! property through it inside a running effect subscribes that effect to the
//! `(target, key)` pair; writing a property re-runs every subscriber.
//! [`readonly`] and [`shallow_readonly`] return wrappers that never track and
//! reject writes with a warning.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that runs once on creation and again
//! whenever a property it read is written. Each run replaces the previous
//! run's dependencies, so reads in branches not taken stop counting.
//!
//! # Implementation Notes
//!
//! A thread-local context stack tells the read hook which effect is running.
//! Nested effects push their own frame and the outer frame is restored when
//! the inner run finishes, including when it unwinds.
//!
//! Wrappers are cached per `(target, mode)` so wrapping is idempotent; the
//! cache holds weak references and never extends a target's lifetime.

mod api;
mod cache;
mod context;
mod effect;
mod proxy;
mod runtime;

pub use api::{
    effect, is_proxy, is_reactive, is_readonly, reactive, readonly, shallow_readonly, to_raw,
    try_reactive, try_readonly, try_shallow_readonly, untrack,
};
pub use context::ReactiveContext;
pub use effect::{Effect, EffectOptions, Job, Scheduler};
pub use proxy::{Mode, Proxy};
pub use runtime::Runtime;
