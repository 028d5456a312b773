//! Dependency Sets
//!
//! Two indexes over the same edges:
//!
//! - forward: target → key → ordered set of subscribed effects, consulted on
//!   every write;
//! - reverse: effect → set of `(target, key)` entries it belongs to, used to
//!   unsubscribe an effect before it re-runs and when it stops.
//!
//! Every mutation goes through [`DependencyGraph::track`],
//! [`DependencyGraph::clear`], [`DependencyGraph::remove`] and
//! [`DependencyGraph::release_target`], which keep both indexes in step: an
//! effect is in the forward entry for `(t, k)` iff `(t, k)` is in its reverse
//! set. Empty forward entries are pruned as soon as they empty out.

use std::collections::HashMap;

use indexmap::IndexSet;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use super::node::{Dep, DepKey, EffectId};
use crate::value::TargetId;

/// Effects collected for one trigger, in registration order.
pub type Subscribers = SmallVec<[EffectId; 8]>;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    targets: HashMap<TargetId, HashMap<DepKey, IndexSet<EffectId>>>,
    subscriptions: SecondaryMap<EffectId, IndexSet<Dep>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `effect` read `dep`.
    ///
    /// Returns `true` if the edge is new. Re-recording an existing edge is a
    /// no-op.
    pub fn track(&mut self, effect: EffectId, dep: Dep) -> bool {
        let Some(entry) = self.subscriptions.entry(effect) else {
            return false;
        };
        if !entry.or_default().insert(dep.clone()) {
            return false;
        }
        self.targets
            .entry(dep.target)
            .or_default()
            .entry(dep.key)
            .or_default()
            .insert(effect);
        true
    }

    /// Snapshot of the effects subscribed to any of `keys` on `target`.
    ///
    /// Each effect appears once even when it read several of the keys.
    pub fn subscribers(&self, target: TargetId, keys: &[DepKey]) -> Subscribers {
        let Some(entries) = self.targets.get(&target) else {
            return Subscribers::new();
        };
        let mut seen: IndexSet<EffectId> = IndexSet::new();
        for key in keys {
            if let Some(set) = entries.get(key) {
                seen.extend(set.iter().copied());
            }
        }
        seen.into_iter().collect()
    }

    /// Unsubscribe `effect` from everything it read. Returns how many
    /// entries it left.
    pub fn clear(&mut self, effect: EffectId) -> usize {
        let Some(deps) = self.subscriptions.get_mut(effect) else {
            return 0;
        };
        let deps = std::mem::take(deps);
        for dep in &deps {
            self.unlink(effect, dep);
        }
        deps.len()
    }

    /// Unsubscribe `effect` and forget it.
    pub fn remove(&mut self, effect: EffectId) -> usize {
        let removed = self.clear(effect);
        self.subscriptions.remove(effect);
        removed
    }

    /// Drop every entry for a target that no longer exists.
    pub fn release_target(&mut self, target: TargetId) {
        let Some(entries) = self.targets.remove(&target) else {
            return;
        };
        for (key, effects) in entries {
            let dep = Dep { target, key };
            for effect in effects {
                if let Some(deps) = self.subscriptions.get_mut(effect) {
                    deps.shift_remove(&dep);
                }
            }
        }
    }

    fn unlink(&mut self, effect: EffectId, dep: &Dep) {
        let Some(entries) = self.targets.get_mut(&dep.target) else {
            return;
        };
        if let Some(effects) = entries.get_mut(&dep.key) {
            effects.shift_remove(&effect);
            if effects.is_empty() {
                entries.remove(&dep.key);
            }
        }
        if entries.is_empty() {
            self.targets.remove(&dep.target);
        }
    }

    /// Entries `effect` currently belongs to.
    pub fn dependencies(&self, effect: EffectId) -> Vec<Dep> {
        self.subscriptions
            .get(effect)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dependency_count(&self, effect: EffectId) -> usize {
        self.subscriptions.get(effect).map_or(0, IndexSet::len)
    }

    pub fn subscriber_count(&self, dep: &Dep) -> usize {
        self.targets
            .get(&dep.target)
            .and_then(|entries| entries.get(&dep.key))
            .map_or(0, IndexSet::len)
    }

    /// Number of targets with at least one subscribed key.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}
