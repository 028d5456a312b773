//! Wrapping Facade
//!
//! Entry points used by rendering and component layers. They compose the
//! identity cache, the interception layer and the effect runtime.
//!
//! Wrapping something that is not a record or list returns it unchanged
//! (the `try_*` variants fail instead). Wrapping a wrapper in `reactive`
//! returns it as-is; `readonly` and `shallow_readonly` of a wrapper wrap its
//! raw target.

use tracing::debug;

use super::cache;
use super::context::ReactiveContext;
use super::effect::Effect;
use super::proxy::{Mode, Proxy};
use crate::error::{ReactiveError, Result};
use crate::value::{Flag, Value};

fn wrap_value(value: Value, mode: Mode) -> std::result::Result<Proxy, Value> {
    match value {
        Value::Object(target) => Ok(cache::wrap(&target, mode)),
        Value::Proxy(proxy) if mode == Mode::Mutable => Ok(proxy),
        Value::Proxy(proxy) => Ok(cache::wrap(proxy.raw(), mode)),
        other => Err(other),
    }
}

fn wrap_or_pass(value: Value, mode: Mode) -> Value {
    match wrap_value(value, mode) {
        Ok(proxy) => Value::Proxy(proxy),
        Err(value) => {
            debug!(kind = value.kind_name(), ?mode, "not a structured value, returned unwrapped");
            value
        }
    }
}

fn wrap_strict(value: Value, mode: Mode) -> Result<Proxy> {
    wrap_value(value, mode).map_err(|value| ReactiveError::NotStructured {
        kind: value.kind_name(),
    })
}

/// Wrap a structured value so reads are tracked and writes trigger.
pub fn reactive(value: impl Into<Value>) -> Value {
    wrap_or_pass(value.into(), Mode::Mutable)
}

/// Wrap a structured value so it cannot be written through.
pub fn readonly(value: impl Into<Value>) -> Value {
    wrap_or_pass(value.into(), Mode::Readonly)
}

/// Like [`readonly`], but nested structures are returned unwrapped.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    wrap_or_pass(value.into(), Mode::ShallowReadonly)
}

/// [`reactive`], failing on values that cannot be wrapped.
pub fn try_reactive(value: impl Into<Value>) -> Result<Proxy> {
    wrap_strict(value.into(), Mode::Mutable)
}

/// [`readonly`], failing on values that cannot be wrapped.
pub fn try_readonly(value: impl Into<Value>) -> Result<Proxy> {
    wrap_strict(value.into(), Mode::Readonly)
}

/// [`shallow_readonly`], failing on values that cannot be wrapped.
pub fn try_shallow_readonly(value: impl Into<Value>) -> Result<Proxy> {
    wrap_strict(value.into(), Mode::ShallowReadonly)
}

pub fn is_reactive(value: &Value) -> bool {
    value.get(Flag::IsReactive) == Value::Bool(true)
}

pub fn is_readonly(value: &Value) -> bool {
    value.get(Flag::IsReadonly) == Value::Bool(true)
}

pub fn is_proxy(value: &Value) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// The original value behind a wrapper; anything else is returned as-is.
pub fn to_raw(value: &Value) -> Value {
    match value.get(Flag::Raw) {
        raw @ Value::Object(_) => raw,
        _ => value.clone(),
    }
}

/// Create and run an effect.
pub fn effect<T, F>(body: F) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Effect::new(body)
}

/// Run `f` without attributing its reads to the running effect.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}
