//! Identity Cache
//!
//! One side table per wrapping mode, mapping a target's id to its live
//! wrapper. Wrapping the same target twice in the same mode returns the same
//! [`Proxy`] for as long as that proxy is alive.
//!
//! Entries hold weak references only: the cache never keeps a wrapper (and
//! through it, a target) alive. A wrapper's destructor evicts its entry.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Weak;

use tracing::trace;

use super::proxy::{Mode, Proxy, ProxyInner};
use crate::value::{Target, TargetId};

thread_local! {
    static CACHES: RefCell<IdentityCaches> = RefCell::new(IdentityCaches::default());
}

#[derive(Default)]
struct IdentityCache {
    entries: HashMap<TargetId, Weak<ProxyInner>>,
}

impl IdentityCache {
    fn get(&self, target: TargetId) -> Option<Proxy> {
        self.entries
            .get(&target)
            .and_then(Weak::upgrade)
            .map(Proxy::from_inner)
    }

    fn insert(&mut self, target: TargetId, proxy: &Proxy) {
        self.entries.insert(target, proxy.downgrade());
    }

    /// Remove the entry for `target` unless its wrapper is still alive.
    fn evict(&mut self, target: TargetId) {
        if let Entry::Occupied(entry) = self.entries.entry(target) {
            if entry.get().strong_count() == 0 {
                entry.remove();
            }
        }
    }
}

#[derive(Default)]
struct IdentityCaches {
    mutable: IdentityCache,
    readonly: IdentityCache,
    shallow_readonly: IdentityCache,
}

impl IdentityCaches {
    fn for_mode(&mut self, mode: Mode) -> &mut IdentityCache {
        match mode {
            Mode::Mutable => &mut self.mutable,
            Mode::Readonly => &mut self.readonly,
            Mode::ShallowReadonly => &mut self.shallow_readonly,
        }
    }
}

/// The wrapper for `(target, mode)`, created on first request.
pub(crate) fn wrap(target: &Target, mode: Mode) -> Proxy {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        let cache = caches.for_mode(mode);
        if let Some(existing) = cache.get(target.id()) {
            return existing;
        }
        let proxy = Proxy::new(target.clone(), mode);
        cache.insert(target.id(), &proxy);
        trace!(target_id = %target.id(), ?mode, "created wrapper");
        proxy
    })
}

pub(crate) fn evict(mode: Mode, target: TargetId) {
    let _ = CACHES.try_with(|caches| {
        if let Ok(mut caches) = caches.try_borrow_mut() {
            caches.for_mode(mode).evict(target);
        }
    });
}

/// Number of entries held for `mode`.
#[cfg(test)]
pub(crate) fn len(mode: Mode) -> usize {
    CACHES.with(|caches| caches.borrow_mut().for_mode(mode).entries.len())
}
