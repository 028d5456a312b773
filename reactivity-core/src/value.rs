//! Structured Values
//!
//! The reactive layer operates on plain, dynamically shaped data: records
//! (ordered string-keyed maps) and lists, nested arbitrarily and mixed with
//! scalars. A [`Target`] is a shared handle to one such structure; cloning the
//! handle never copies the data, so every wrapper created for a target sees
//! and mutates the same instance.
//!
//! # Identity
//!
//! Each target carries a [`TargetId`] assigned from a process-wide counter.
//! Ids are never reused, which lets the identity cache and the dependency
//! graph key their side tables by id without keeping the target alive. When
//! the last handle to a target is dropped its dependency entries are
//! released.
//!
//! # Values
//!
//! [`Value`] is the dynamic value type flowing through the hooks. A
//! `Value::Proxy` routes `get`/`set` through its wrapper; a `Value::Object`
//! acts on the raw structure. Both compare by reference identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::{ReactiveError, Result};
use crate::reactive::{Proxy, Runtime};

/// Introspection markers answered by wrappers instead of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    IsReactive,
    IsReadonly,
    Raw,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::IsReactive => "__v_isReactive",
            Flag::IsReadonly => "__v_isReadonly",
            Flag::Raw => "__v_raw",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "__v_isReactive" => Some(Flag::IsReactive),
            "__v_isReadonly" => Some(Flag::IsReadonly),
            "__v_raw" => Some(Flag::Raw),
            _ => None,
        }
    }
}

/// A property key on a structured value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field of a record.
    Field(String),
    /// A position in a list.
    Index(usize),
    /// An introspection marker.
    Flag(Flag),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{}", index),
            Key::Flag(flag) => f.write_str(flag.as_str()),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match Flag::parse(name) {
            Some(flag) => Key::Flag(flag),
            None => Key::Field(name.to_string()),
        }
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        match Flag::parse(&name) {
            Some(flag) => Key::Flag(flag),
            None => Key::Field(name),
        }
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::from(name.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<Flag> for Key {
    fn from(flag: Flag) -> Self {
        Key::Flag(flag)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// Process-unique identifier of a target. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The shape of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Record,
    List,
}

impl TargetKind {
    fn name(&self) -> &'static str {
        match self {
            TargetKind::Record => "record",
            TargetKind::List => "list",
        }
    }
}

enum Structure {
    Record(IndexMap<String, Value>),
    List(Vec<Value>),
}

struct TargetCell {
    id: TargetId,
    data: RefCell<Structure>,
}

impl Drop for TargetCell {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
    }
}

/// Shared handle to a structured value.
#[derive(Clone)]
pub struct Target(Rc<TargetCell>);

/// Parse a list index spelled as a canonical decimal: digits only and no
/// leading zero, so `"01"` and `"+1"` stay field names.
fn canonical_index(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    let canonical = match bytes {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        _ => bytes.iter().all(u8::is_ascii_digit),
    };
    if canonical {
        name.parse().ok()
    } else {
        None
    }
}

impl Target {
    fn from_structure(structure: Structure) -> Self {
        Self(Rc::new(TargetCell {
            id: TargetId::next(),
            data: RefCell::new(structure),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::from_structure(Structure::Record(IndexMap::new()))
    }

    /// Create an empty list.
    pub fn list() -> Self {
        Self::from_structure(Structure::List(Vec::new()))
    }

    /// Create a record from `(field, value)` pairs, keeping their order.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_structure(Structure::Record(map))
    }

    /// Create a list from values.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_structure(Structure::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        match &*self.0.data.borrow() {
            Structure::Record(_) => TargetKind::Record,
            Structure::List(_) => TargetKind::List,
        }
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Map a key onto the form this structure stores it under.
    ///
    /// Numeric fields on a list become indices and indices on a record become
    /// decimal field names, so both spellings share one dependency entry.
    pub fn normalize(&self, key: Key) -> Key {
        match (self.kind(), key) {
            (TargetKind::List, Key::Field(name)) => match canonical_index(&name) {
                Some(index) => Key::Index(index),
                None => Key::Field(name),
            },
            (TargetKind::Record, Key::Index(index)) => Key::Field(index.to_string()),
            (_, key) => key,
        }
    }

    /// Raw read. Missing keys and markers read as `Null`.
    pub fn get(&self, key: &Key) -> Value {
        let key = self.normalize(key.clone());
        match (&*self.0.data.borrow(), &key) {
            (Structure::Record(map), Key::Field(name)) => {
                map.get(name).cloned().unwrap_or_default()
            }
            (Structure::List(items), Key::Index(index)) => {
                items.get(*index).cloned().unwrap_or_default()
            }
            _ => Value::Null,
        }
    }

    /// Raw write. Returns the previous value, if any.
    ///
    /// A list accepts writes to existing slots and to `len` (append); any
    /// index further out is an invalid key.
    pub fn set(&self, key: Key, value: Value) -> Result<Option<Value>> {
        let key = self.normalize(key);
        let kind = self.kind();
        match (&mut *self.0.data.borrow_mut(), key) {
            (_, key @ Key::Flag(_)) => Err(ReactiveError::FlagWrite { key }),
            (Structure::Record(map), Key::Field(name)) => Ok(map.insert(name, value)),
            (Structure::List(items), Key::Index(index)) => {
                if let Some(slot) = items.get_mut(index) {
                    Ok(Some(std::mem::replace(slot, value)))
                } else if index == items.len() {
                    items.push(value);
                    Ok(None)
                } else {
                    Err(ReactiveError::InvalidKey {
                        key: Key::Index(index),
                        kind: kind.name(),
                    })
                }
            }
            (_, key) => Err(ReactiveError::InvalidKey { key, kind: kind.name() }),
        }
    }

    /// Raw removal. Lists keep their length; the slot is reset to `Null`.
    pub fn remove(&self, key: &Key) -> Result<Option<Value>> {
        let key = self.normalize(key.clone());
        let kind = self.kind();
        match (&mut *self.0.data.borrow_mut(), key) {
            (_, key @ Key::Flag(_)) => Err(ReactiveError::FlagWrite { key }),
            (Structure::Record(map), Key::Field(name)) => Ok(map.shift_remove(&name)),
            (Structure::List(items), Key::Index(index)) => {
                Ok(items.get_mut(index).map(std::mem::take))
            }
            (_, key) => Err(ReactiveError::InvalidKey { key, kind: kind.name() }),
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        let key = self.normalize(key.clone());
        match (&*self.0.data.borrow(), &key) {
            (Structure::Record(map), Key::Field(name)) => map.contains_key(name),
            (Structure::List(items), Key::Index(index)) => *index < items.len(),
            _ => false,
        }
    }

    /// Keys in storage order.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0.data.borrow() {
            Structure::Record(map) => map.keys().cloned().map(Key::Field).collect(),
            Structure::List(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            Structure::Record(map) => map.len(),
            Structure::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: targets may be cyclic.
        let mut out = f.debug_struct("Target");
        out.field("id", &self.0.id);
        if let Ok(data) = self.0.data.try_borrow() {
            let (kind, len) = match &*data {
                Structure::Record(map) => (TargetKind::Record, map.len()),
                Structure::List(items) => (TargetKind::List, items.len()),
            };
            out.field("kind", &kind).field("len", &len);
        }
        out.finish()
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &*self.0.data.borrow() {
            Structure::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Structure::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// A dynamic value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A plain (unwrapped) structured value.
    Object(Target),
    /// A wrapper around a structured value.
    Proxy(Proxy),
}

impl Value {
    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Proxy(_) => "proxy",
        }
    }

    /// Records, lists and wrappers around them.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Read a property. Scalars have no properties and read as `Null`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Proxy(proxy) => proxy.get(key),
            Value::Object(target) => target.get(&key.into()),
            _ => Value::Null,
        }
    }

    /// Write a property. Returns whether the write was accepted.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self {
            Value::Proxy(proxy) => proxy.set(key, value),
            Value::Object(target) => target.set(key.into(), value.into()).is_ok(),
            _ => false,
        }
    }

    /// Remove a property. Returns whether the removal was accepted.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        match self {
            Value::Proxy(proxy) => proxy.delete(key),
            Value::Object(target) => target.remove(&key.into()).is_ok(),
            _ => false,
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        match self {
            Value::Proxy(proxy) => proxy.has(key),
            Value::Object(target) => target.contains(&key.into()),
            _ => false,
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        match self {
            Value::Proxy(proxy) => proxy.keys(),
            Value::Object(target) => target.keys(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Proxy(proxy) => proxy.len(),
            Value::Object(target) => target.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                // Whole numbers within the exactly representable range go out as integers.
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(target) => target.serialize(serializer),
            Value::Proxy(proxy) => proxy.raw().serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Builds fresh targets for every JSON object and array.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Object(Target::from_values(items)),
            serde_json::Value::Object(fields) => Value::Object(Target::from_entries(fields)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_ids_are_unique() {
        let a = Target::record();
        let b = Target::record();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn record_get_set_remove() {
        let target = Target::from_entries([("a", 1), ("b", 2)]);
        assert_eq!(target.get(&"a".into()), Value::Number(1.0));
        assert_eq!(target.get(&"missing".into()), Value::Null);

        let previous = target.set("a".into(), 10.into()).unwrap();
        assert_eq!(previous, Some(Value::Number(1.0)));
        assert_eq!(target.set("c".into(), 3.into()).unwrap(), None);
        assert_eq!(target.keys(), vec![Key::from("a"), Key::from("b"), Key::from("c")]);

        assert_eq!(target.remove(&"b".into()).unwrap(), Some(Value::Number(2.0)));
        assert!(!target.contains(&"b".into()));
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn list_writes_append_and_removals_keep_length() {
        let list = Target::from_values([1, 2]);
        assert_eq!(list.set(Key::Index(2), "x".into()).unwrap(), None);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(&Key::Index(2)), Value::from("x"));

        assert_eq!(list.remove(&Key::Index(0)).unwrap(), Some(Value::Number(1.0)));
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(&Key::Index(0)), Value::Null);
    }

    #[test]
    fn list_writes_past_the_end_are_rejected() {
        let list = Target::from_values([1, 2]);
        assert_eq!(
            list.set(Key::Index(4), 3.into()),
            Err(ReactiveError::InvalidKey { key: Key::Index(4), kind: "list" })
        );
        assert!(list.set(Key::Index(usize::MAX), 3.into()).is_err());
        assert!(list.set("18446744073709551615".into(), 3.into()).is_err());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn only_canonical_numbers_are_list_indices() {
        let list = Target::from_values(["a", "b"]);
        assert_eq!(list.normalize("0".into()), Key::Index(0));
        assert_eq!(list.normalize("10".into()), Key::Index(10));
        assert_eq!(list.normalize("01".into()), Key::Field("01".to_string()));
        assert_eq!(list.normalize("+1".into()), Key::Field("+1".to_string()));
        assert_eq!(list.normalize("".into()), Key::Field(String::new()));
        assert_eq!(list.get(&"01".into()), Value::Null);
    }

    #[test]
    fn keys_are_normalized_per_structure() {
        let list = Target::from_values(["a", "b"]);
        assert_eq!(list.normalize("1".into()), Key::Index(1));
        assert_eq!(list.get(&"1".into()), Value::from("b"));

        let record = Target::record();
        assert_eq!(record.normalize(Key::Index(7)), Key::Field("7".to_string()));
    }

    #[test]
    fn invalid_writes_are_errors() {
        let list = Target::list();
        assert_eq!(
            list.set("name".into(), 1.into()),
            Err(ReactiveError::InvalidKey { key: Key::from("name"), kind: "list" })
        );
        let record = Target::record();
        assert_eq!(
            record.set(Key::Flag(Flag::Raw), 1.into()),
            Err(ReactiveError::FlagWrite { key: Key::Flag(Flag::Raw) })
        );
    }

    #[test]
    fn marker_names_parse_as_flags() {
        assert_eq!(Key::from("__v_isReactive"), Key::Flag(Flag::IsReactive));
        assert_eq!(Key::from("__v_raw").to_string(), "__v_raw");
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Target::record();
        let b = Target::record();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
        assert_eq!(Value::from(1), Value::Number(1.0));
    }

    #[test]
    fn json_round_trip_preserves_shape() {
        let source = json!({"name": "demo", "items": [1, 2.5, null], "nested": {"on": true}});
        let value = Value::from(source.clone());
        assert_eq!(serde_json::to_value(&value).unwrap(), source);
    }
}
