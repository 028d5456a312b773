//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects wrapped values and
//! effects. It owns the effect arena and the dependency graph and schedules
//! re-runs when wrapped properties are written.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime and receives
//!    an [`EffectId`].
//!
//! 2. When a running effect reads a wrapped property, the runtime records the
//!    `(target, key)` dependency for it.
//!
//! 3. When a wrapped property is written, the runtime:
//!    a. Snapshots the effects subscribed to the written keys
//!    b. Skips effects stopped or already running
//!    c. Hands each remaining effect to its scheduler, or re-runs it
//!
//! # Thread Safety
//!
//! The runtime is thread-local. Each thread has an independent engine and
//! none of the handles are `Send`. The runtime borrow is released before any
//! user code (effect bodies, schedulers) is invoked.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::Job;
use crate::graph::{Dep, DepKey, DependencyGraph, EffectId};
use crate::value::{Key, Target, TargetId};

/// A registered computation the runtime can re-run.
pub(crate) trait Runner {
    /// Label used in logs.
    fn name(&self) -> Option<&str>;

    /// Scheduler to hand invalidations to instead of re-running.
    fn scheduler(&self) -> Option<Rc<dyn Fn(Job)>>;

    /// Re-run the body, discarding its result.
    fn rerun(&self);
}

struct EffectRecord {
    runner: Rc<dyn Runner>,
}

#[derive(Default)]
struct RuntimeState {
    effects: SlotMap<EffectId, EffectRecord>,
    graph: DependencyGraph,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

fn with_state<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|runtime| f(&mut runtime.borrow_mut()))
}

/// The thread's reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a computation. It stays registered until unregistered.
    pub(crate) fn register(runner: Rc<dyn Runner>) -> EffectId {
        with_state(|state| state.effects.insert(EffectRecord { runner }))
    }

    /// Unregister a computation and remove it from every dependency set.
    ///
    /// The runner is handed back so the caller drops it outside the runtime
    /// borrow.
    pub(crate) fn unregister(effect: EffectId) -> Option<Rc<dyn Runner>> {
        with_state(|state| {
            state.graph.remove(effect);
            state.effects.remove(effect).map(|record| record.runner)
        })
    }

    pub(crate) fn is_registered(effect: EffectId) -> bool {
        with_state(|state| state.effects.contains_key(effect))
    }

    /// Remove all dependencies for an effect.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub(crate) fn clear_dependencies(effect: EffectId) -> usize {
        with_state(|state| state.graph.clear(effect))
    }

    /// Record that the running effect, if any, read `key` on `target`.
    pub(crate) fn track(target: TargetId, key: DepKey) {
        let Some(effect) = ReactiveContext::current_effect() else {
            return;
        };
        with_state(|state| {
            if !state.effects.contains_key(effect) {
                return;
            }
            let dep = Dep::new(target, key);
            if state.graph.track(effect, dep.clone()) {
                trace!(effect = ?effect, dep = %dep, "tracked");
            }
        });
    }

    /// Re-run (or schedule) every effect subscribed to any of `keys` on
    /// `target`. Each effect runs at most once per call.
    pub(crate) fn trigger(target: TargetId, keys: &[DepKey]) {
        let queued: SmallVec<[(EffectId, Rc<dyn Runner>); 8]> = with_state(|state| {
            state
                .graph
                .subscribers(target, keys)
                .into_iter()
                .filter_map(|id| {
                    state
                        .effects
                        .get(id)
                        .map(|record| (id, Rc::clone(&record.runner)))
                })
                .collect()
        });

        if queued.is_empty() {
            return;
        }
        trace!(target_id = %target, keys = ?keys, subscribers = queued.len(), "trigger");

        for (id, runner) in queued {
            // An earlier effect in this batch may have stopped this one.
            if !Self::is_registered(id) || ReactiveContext::is_running(id) {
                continue;
            }
            match runner.scheduler() {
                Some(scheduler) => scheduler(Job::new(id, Rc::downgrade(&runner))),
                None => {
                    trace!(effect = ?id, name = ?runner.name(), "re-running effect");
                    runner.rerun();
                }
            }
        }
    }

    /// Forget every dependency entry of a dropped target.
    ///
    /// Runs from the target's destructor, which may fire while the runtime is
    /// already borrowed or torn down; the entries are left in place then.
    pub(crate) fn release_target(target: TargetId) {
        let _ = RUNTIME.try_with(|runtime| {
            if let Ok(mut state) = runtime.try_borrow_mut() {
                state.graph.release_target(target);
            }
        });
    }

    /// Get the effect reads are currently attributed to, if any.
    pub fn current_effect() -> Option<EffectId> {
        ReactiveContext::current_effect()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of live (not stopped) effects on this thread.
    pub fn effect_count() -> usize {
        with_state(|state| state.effects.len())
    }

    /// Number of `(target, key)` entries an effect is subscribed to.
    pub fn dependency_count(effect: EffectId) -> usize {
        with_state(|state| state.graph.dependency_count(effect))
    }

    /// The `(target, key)` entries an effect is subscribed to.
    pub fn dependencies(effect: EffectId) -> Vec<Dep> {
        with_state(|state| state.graph.dependencies(effect))
    }

    /// Number of effects subscribed to `key` on `target`.
    pub fn subscriber_count(target: &Target, key: impl Into<Key>) -> usize {
        let dep = Dep::new(target.id(), target.normalize(key.into()));
        with_state(|state| state.graph.subscriber_count(&dep))
    }

    /// Number of targets with at least one subscribed key.
    pub fn tracked_target_count() -> usize {
        with_state(|state| state.graph.target_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MockRunner {
        runs: Cell<usize>,
        scheduled: Option<Rc<dyn Fn(Job)>>,
    }

    impl MockRunner {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                runs: Cell::new(0),
                scheduled: None,
            })
        }
    }

    impl Runner for MockRunner {
        fn name(&self) -> Option<&str> {
            Some("mock")
        }

        fn scheduler(&self) -> Option<Rc<dyn Fn(Job)>> {
            self.scheduled.clone()
        }

        fn rerun(&self) {
            self.runs.set(self.runs.get() + 1);
        }
    }

    fn track_as(effect: EffectId, target: &Target, key: &str) {
        let _ctx = ReactiveContext::enter(effect);
        Runtime::track(target.id(), DepKey::Prop(Key::from(key)));
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let runner = MockRunner::new();
        let id = Runtime::register(runner.clone());
        assert!(Runtime::is_registered(id));
        assert_eq!(Runtime::effect_count(), 1);

        assert!(Runtime::unregister(id).is_some());
        assert!(!Runtime::is_registered(id));
        assert!(Runtime::unregister(id).is_none());
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let target = Target::record();
        Runtime::track(target.id(), DepKey::Prop(Key::from("a")));
        assert_eq!(Runtime::tracked_target_count(), 0);
    }

    #[test]
    fn runtime_triggers_subscribers() {
        let target = Target::record();
        let a = MockRunner::new();
        let b = MockRunner::new();
        let a_id = Runtime::register(a.clone());
        let b_id = Runtime::register(b.clone());

        track_as(a_id, &target, "x");
        track_as(b_id, &target, "y");

        Runtime::trigger(target.id(), &[DepKey::Prop(Key::from("x"))]);
        assert_eq!(a.runs.get(), 1);
        assert_eq!(b.runs.get(), 0);
    }

    #[test]
    fn trigger_runs_each_effect_once_per_batch() {
        let target = Target::record();
        let runner = MockRunner::new();
        let id = Runtime::register(runner.clone());

        track_as(id, &target, "x");
        track_as(id, &target, "y");

        let keys = [DepKey::Prop(Key::from("x")), DepKey::Prop(Key::from("y"))];
        Runtime::trigger(target.id(), &keys);
        assert_eq!(runner.runs.get(), 1);
    }

    #[test]
    fn trigger_skips_running_effect() {
        let target = Target::record();
        let runner = MockRunner::new();
        let id = Runtime::register(runner.clone());
        track_as(id, &target, "x");

        let _ctx = ReactiveContext::enter(id);
        Runtime::trigger(target.id(), &[DepKey::Prop(Key::from("x"))]);
        assert_eq!(runner.runs.get(), 0);
    }

    #[test]
    fn unregistered_effect_is_not_tracked_or_triggered() {
        let target = Target::record();
        let runner = MockRunner::new();
        let id = Runtime::register(runner.clone());
        track_as(id, &target, "x");

        Runtime::unregister(id);
        assert_eq!(Runtime::subscriber_count(&target, "x"), 0);

        track_as(id, &target, "x");
        Runtime::trigger(target.id(), &[DepKey::Prop(Key::from("x"))]);
        assert_eq!(runner.runs.get(), 0);
        assert_eq!(Runtime::dependency_count(id), 0);
    }

    #[test]
    fn dropping_a_target_releases_its_entries() {
        let runner = MockRunner::new();
        let id = Runtime::register(runner);
        {
            let target = Target::record();
            track_as(id, &target, "x");
            assert_eq!(Runtime::tracked_target_count(), 1);
        }
        assert_eq!(Runtime::tracked_target_count(), 0);
        assert_eq!(Runtime::dependency_count(id), 0);
    }
}
