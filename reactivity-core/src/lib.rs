//! Reactivity Core
//!
//! This crate provides the reactive object layer of a declarative UI
//! runtime. It implements:
//!
//! - Transparent wrappers over records and lists that record which
//!   properties an effect reads
//! - Effects that re-run when those properties are written
//! - Read-only and shallow read-only views
//! - An identity cache so each structure has one wrapper per mode
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: dynamic values, structured targets and property keys
//! - `reactive`: wrappers, effects, the tracking context and the runtime
//! - `graph`: the `(target, key) → effects` dependency index
//! - `error`: error type for fallible operations
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use reactivity_core::{effect, reactive, Target};
//!
//! let state = reactive(Target::from_entries([("count", 0)]));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! let reader = state.clone();
//! let _watcher = effect(move || {
//!     log.borrow_mut().push(reader.get("count").as_f64());
//! });
//!
//! state.set("count", 5);
//! assert_eq!(*seen.borrow(), vec![Some(0.0), Some(5.0)]);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod value;

pub use error::{ReactiveError, Result};
pub use reactive::{
    effect, is_proxy, is_reactive, is_readonly, reactive, readonly, shallow_readonly, to_raw,
    try_reactive, try_readonly, try_shallow_readonly, untrack, Effect, EffectOptions, Job, Mode,
    Proxy, Runtime,
};
pub use value::{Flag, Key, Target, TargetId, TargetKind, Value};
