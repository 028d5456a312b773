//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a wrapped property is
//! read, the read is attributed to the computation on top of the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes its id and the
//! returned guard pops it when dropped, so the stack stays balanced when the
//! body returns early or panics. Nested effects push on top of their parent
//! and reads inside them are attributed to the inner effect only.
//!
//! An untracked frame pushes no effect: reads under it record nothing even
//! when an effect is running further down the stack.

use std::cell::RefCell;

use crate::graph::EffectId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    /// The running effect, or `None` for an untracked frame.
    effect: Option<EffectId>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    effect: Option<EffectId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While this context is active, reads of wrapped properties register
    /// the effect as a dependent.
    pub fn enter(effect: EffectId) -> Self {
        Self::push(Some(effect))
    }

    /// Enter a frame in which nothing is tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(effect: Option<EffectId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { effect });
        });
        Self { effect }
    }

    /// Check if reads are currently attributed to an effect.
    pub fn is_active() -> bool {
        Self::current_effect().is_some()
    }

    /// Get the effect reads are currently attributed to, if any.
    pub fn current_effect() -> Option<EffectId> {
        CONTEXT_STACK
            .try_with(|stack| stack.borrow().last().and_then(|entry| entry.effect))
            .ok()
            .flatten()
    }

    /// Check whether `effect` is running anywhere on the stack.
    pub fn is_running(effect: EffectId) -> bool {
        CONTEXT_STACK
            .try_with(|stack| {
                stack
                    .borrow()
                    .iter()
                    .any(|entry| entry.effect == Some(effect))
            })
            .unwrap_or(false)
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK
            .try_with(|stack| stack.borrow().len())
            .unwrap_or(0)
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.effect, self.effect,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.effect, entry.effect
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids() -> (EffectId, EffectId) {
        let mut arena: SlotMap<EffectId, ()> = SlotMap::with_key();
        (arena.insert(()), arena.insert(()))
    }

    #[test]
    fn context_tracks_effect() {
        let (id, _) = ids();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_effect(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let (id1, id2) = ids();

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_effect(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_effect(), Some(id2));
                assert!(ReactiveContext::is_running(id1));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_effect(), Some(id1));
            assert!(!ReactiveContext::is_running(id2));
        }

        assert!(ReactiveContext::current_effect().is_none());
    }

    #[test]
    fn untracked_frame_hides_running_effect() {
        let (id, _) = ids();
        let _ctx = ReactiveContext::enter(id);
        {
            let _untracked = ReactiveContext::untracked();
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::is_running(id));
        }
        assert_eq!(ReactiveContext::current_effect(), Some(id));
    }

    #[test]
    fn guard_pops_on_panic() {
        let (id, _) = ids();
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(id);
            panic!("body failed");
        });
        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
