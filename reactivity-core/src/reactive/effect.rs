//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever wrapped properties it
//! read are written.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless created lazy).
//!
//! 2. When any dependency is written, the effect re-runs, or is handed to
//!    its scheduler as a [`Job`] when one is configured.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution, so a conditional read only counts while the
//!    branch containing it is taken.
//!
//! # Lifecycle
//!
//! `created → running → idle → running → … → stopped`. Stopping removes the
//! effect from every dependency set; a stopped effect is never triggered
//! again. Calling [`Effect::run`] on a stopped effect still executes the body
//! once, untracked, and returns its result.
//!
//! Effects are owned by the runtime until stopped: dropping every handle does
//! not stop an effect.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::runtime::{Runner, Runtime};
use crate::graph::EffectId;

/// Callback receiving invalidated effects instead of re-running them.
pub type Scheduler = Rc<dyn Fn(Job)>;

/// Construction options for an [`Effect`].
///
/// # Example
///
/// ```rust,ignore
/// let queue = Rc::new(RefCell::new(Vec::new()));
/// let pending = queue.clone();
/// let render = Effect::with_options(
///     move || draw(&state),
///     EffectOptions::new()
///         .name("render")
///         .scheduler(move |job| pending.borrow_mut().push(job)),
/// );
/// ```
#[derive(Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
    on_stop: Option<Box<dyn FnOnce()>>,
    name: Option<String>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run the body on creation.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Hand invalidations to `scheduler` instead of re-running immediately.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(Job) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Called once when the effect is stopped.
    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(on_stop));
        self
    }

    /// Label used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("name", &self.name)
            .finish()
    }
}

struct EffectInner<T> {
    /// Assigned by the runtime right after construction.
    id: Cell<EffectId>,
    body: Box<dyn Fn() -> T>,
    scheduler: Option<Scheduler>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    name: Option<String>,
    stopped: Cell<bool>,
    run_count: Cell<usize>,
}

impl<T> EffectInner<T> {
    fn run(&self) -> T {
        self.run_count.set(self.run_count.get() + 1);

        if self.stopped.get() {
            let _ctx = ReactiveContext::untracked();
            return (self.body)();
        }

        let id = self.id.get();
        let _ctx = ReactiveContext::enter(id);
        let cleared = Runtime::clear_dependencies(id);
        trace!(effect = ?id, name = ?self.name, cleared, "running effect");
        (self.body)()
    }
}

impl<T> Runner for EffectInner<T> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.clone()
    }

    fn rerun(&self) {
        if !self.stopped.get() {
            let _ = self.run();
        }
    }
}

/// A computation that re-runs when the wrapped state it read changes.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Target::from_entries([("count", 0)]));
///
/// let reader = state.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {:?}", reader.get("count"));
/// });
///
/// state.set("count", 5);  // Prints: "Count is: Number(5.0)"
/// ```
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create a new effect with the given body.
    ///
    /// The body runs immediately to establish initial dependencies.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(body, EffectOptions::new())
    }

    /// Create a new effect without running it.
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(body, EffectOptions::new().lazy(true))
    }

    /// Create a new effect with explicit options.
    pub fn with_options<F>(body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let EffectOptions {
            lazy,
            scheduler,
            on_stop,
            name,
        } = options;

        let inner = Rc::new(EffectInner {
            id: Cell::new(EffectId::default()),
            body: Box::new(body),
            scheduler,
            on_stop: RefCell::new(on_stop),
            name,
            stopped: Cell::new(false),
            run_count: Cell::new(0),
        });
        let id = Runtime::register(inner.clone());
        inner.id.set(id);
        debug!(effect = ?id, name = ?inner.name, lazy, "effect created");

        let effect = Self { inner };
        if !lazy {
            let _ = effect.run();
        }
        effect
    }

    pub fn id(&self) -> EffectId {
        self.inner.id.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Run the body and return its result.
    ///
    /// Reads performed by the body become the effect's dependencies,
    /// replacing those of the previous run. A panicking body unwinds through
    /// this call with the context stack restored.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Stop the effect.
    ///
    /// After stopping, writes never re-run the effect. Idempotent.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        let id = self.id();
        let runner = Runtime::unregister(id);
        debug!(effect = ?id, name = ?self.inner.name, "effect stopped");

        let on_stop = self.inner.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
        drop(runner);
    }

    /// Check whether the effect is still live.
    pub fn is_active(&self) -> bool {
        !self.inner.stopped.get()
    }

    /// Number of times the body has executed.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of `(target, key)` entries the effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.id())
    }

    /// A type-erased handle that re-runs this effect.
    pub fn job(&self) -> Job {
        let runner: Rc<dyn Runner> = self.inner.clone();
        Job::new(self.id(), Rc::downgrade(&runner))
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("name", &self.inner.name)
            .field("run_count", &self.run_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// An invalidated effect, as handed to a scheduler.
///
/// Holding a job does not keep the effect alive, and running a job of a
/// stopped effect does nothing.
#[derive(Clone)]
pub struct Job {
    id: EffectId,
    runner: Weak<dyn Runner>,
}

impl Job {
    pub(crate) fn new(id: EffectId, runner: Weak<dyn Runner>) -> Self {
        Self { id, runner }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Check whether the effect behind this job is still live.
    pub fn is_active(&self) -> bool {
        self.runner.strong_count() > 0 && Runtime::is_registered(self.id)
    }

    /// Re-run the effect if it is still live.
    pub fn run(&self) {
        if !self.is_active() {
            return;
        }
        if let Some(runner) = self.runner.upgrade() {
            runner.rerun();
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
