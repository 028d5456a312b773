//! Interception Layer
//!
//! A [`Proxy`] is the wrapper handed out by `reactive`, `readonly` and
//! `shallow_readonly`. It carries no state beyond its target and mode; every
//! property access goes through the read hook ([`Proxy::get`]) or the write
//! hook ([`Proxy::set`]) and everything else lives on the target.
//!
//! # Read Hook
//!
//! 1. Introspection markers (`__v_isReactive`, `__v_isReadonly`, `__v_raw`)
//!    are answered first and never tracked.
//! 2. The property is read from the target.
//! 3. Mutable wrappers record the read against the running effect.
//!    Read-only wrappers can never be written through, so they never track.
//! 4. Shallow wrappers return nested structures as-is; the others wrap them
//!    on the way out in their own flavour (mutable or read-only).
//!
//! # Write Hook
//!
//! Mutable wrappers store the raw form of the value and trigger the key,
//! whether or not the value changed. Adding a key also triggers the
//! iteration key in the same batch. Read-only wrappers reject the write,
//! emit a warning naming the key and target, and report success.

use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::{smallvec, SmallVec};
use tracing::{debug, warn};

use super::cache;
use super::runtime::Runtime;
use crate::graph::DepKey;
use crate::value::{Flag, Key, Target, TargetKind, Value};

/// Wrapping mode of a [`Proxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Tracks reads, triggers on writes, wraps nested structures.
    Mutable,
    /// Rejects writes, never tracks, wraps nested structures read-only.
    Readonly,
    /// Rejects writes, never tracks, returns nested structures raw.
    ShallowReadonly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        !matches!(self, Mode::Mutable)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::ShallowReadonly)
    }

    fn tracks(self) -> bool {
        matches!(self, Mode::Mutable)
    }
}

pub(crate) struct ProxyInner {
    target: Target,
    mode: Mode,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        cache::evict(self.mode, self.target.id());
    }
}

/// Interception wrapper around a [`Target`].
///
/// Cloning a proxy clones the handle; the identity cache guarantees one
/// live proxy per `(target, mode)`, so [`Proxy::ptr_eq`] is the identity test.
#[derive(Clone)]
pub struct Proxy(Rc<ProxyInner>);

impl Proxy {
    pub(crate) fn new(target: Target, mode: Mode) -> Self {
        Self(Rc::new(ProxyInner { target, mode }))
    }

    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ProxyInner> {
        Rc::downgrade(&self.0)
    }

    /// The wrapped target.
    pub fn raw(&self) -> &Target {
        &self.0.target
    }

    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_reactive(&self) -> bool {
        self.get(Flag::IsReactive) == Value::Bool(true)
    }

    pub fn is_readonly(&self) -> bool {
        self.get(Flag::IsReadonly) == Value::Bool(true)
    }

    /// Read hook.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if let Key::Flag(flag) = key {
            return self.flag(flag);
        }

        let target = self.raw();
        let key = target.normalize(key);
        let value = target.get(&key);

        let mode = self.mode();
        if mode.tracks() {
            Runtime::track(target.id(), DepKey::Prop(key));
        }
        if mode.is_shallow() {
            return value;
        }

        let nested = if mode.is_readonly() {
            Mode::Readonly
        } else {
            Mode::Mutable
        };
        match value {
            Value::Object(inner) => Value::Proxy(cache::wrap(&inner, nested)),
            Value::Proxy(inner) if nested.is_readonly() && !inner.mode().is_readonly() => {
                Value::Proxy(cache::wrap(inner.raw(), nested))
            }
            other => other,
        }
    }

    /// Write hook. Returns whether the write was accepted.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.mode().is_readonly() {
            self.reject("set", &key);
            return true;
        }

        let target = self.raw();
        let key = target.normalize(key);
        let value = super::to_raw(&value.into());
        let had_key = target.contains(&key);

        if let Err(err) = target.set(key.clone(), value) {
            debug!(%err, target_id = %target.id(), "write rejected by target");
            return false;
        }

        let mut keys: SmallVec<[DepKey; 2]> = smallvec![DepKey::Prop(key)];
        if !had_key {
            keys.push(DepKey::Iterate);
        }
        Runtime::trigger(target.id(), &keys);
        true
    }

    /// Remove a property. Returns whether the removal was accepted.
    ///
    /// Records lose the key; lists keep their length and the slot reads as
    /// `Null` afterwards.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.mode().is_readonly() {
            self.reject("delete", &key);
            return true;
        }

        let target = self.raw();
        let key = target.normalize(key);
        let had_key = target.contains(&key);
        let shrinks = had_key && target.kind() == TargetKind::Record;

        match target.remove(&key) {
            Ok(_) => {
                if had_key {
                    let mut keys: SmallVec<[DepKey; 2]> = smallvec![DepKey::Prop(key)];
                    if shrinks {
                        keys.push(DepKey::Iterate);
                    }
                    Runtime::trigger(target.id(), &keys);
                }
                true
            }
            Err(err) => {
                debug!(%err, target_id = %target.id(), "delete rejected by target");
                false
            }
        }
    }

    /// Membership test. Tracked like a read of `key`.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if let Key::Flag(flag) = key {
            return match self.flag(flag) {
                Value::Bool(set) => set,
                other => !other.is_null(),
            };
        }
        let target = self.raw();
        let key = target.normalize(key);
        let present = target.contains(&key);
        if self.mode().tracks() {
            Runtime::track(target.id(), DepKey::Prop(key));
        }
        present
    }

    /// Keys in storage order. Tracks the key set.
    pub fn keys(&self) -> Vec<Key> {
        self.track_iteration();
        self.raw().keys()
    }

    /// Number of entries. Tracks the key set.
    pub fn len(&self) -> usize {
        self.track_iteration();
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn track_iteration(&self) {
        if self.mode().tracks() {
            Runtime::track(self.raw().id(), DepKey::Iterate);
        }
    }

    fn flag(&self, flag: Flag) -> Value {
        match flag {
            Flag::IsReactive => Value::Bool(!self.mode().is_readonly()),
            Flag::IsReadonly => Value::Bool(self.mode().is_readonly()),
            Flag::Raw => Value::Object(self.raw().clone()),
        }
    }

    fn reject(&self, operation: &str, key: &Key) {
        let target_id = self.raw().id();
        warn!(
            key = %key,
            target_id = %target_id,
            "{} operation on key \"{}\" failed: target {} is readonly",
            operation,
            key,
            target_id
        );
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("mode", &self.mode())
            .field("target", self.raw())
            .finish()
    }
}
