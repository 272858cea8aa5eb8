//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a signal is read, the signal
//! subscribes the effect on top of the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes a frame for it and
//! the guard pops the frame when dropped, so nested effects (an effect whose
//! body writes a signal that synchronously re-runs another effect) each see
//! their own frame. [`untracked`] pushes an empty frame: reads inside it
//! subscribe nothing.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::effect::EffectInner;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// `None` marks an untracked frame.
    observer: Option<(SubscriberId, Weak<EffectInner>)>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if an effect body panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking frame for the given effect.
    pub(crate) fn enter(subscriber_id: SubscriberId, effect: Weak<EffectInner>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer: Some((subscriber_id, effect)),
            });
        });

        Self {
            subscriber_id: Some(subscriber_id),
        }
    }

    /// Enter a frame in which signal reads are not tracked.
    pub fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { observer: None });
        });

        Self {
            subscriber_id: None,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.as_ref().map(|(id, _)| *id))
        })
    }

    /// The effect that should be subscribed by a read right now.
    pub(crate) fn current_observer() -> Option<Arc<EffectInner>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.as_ref())
                .and_then(|(_, weak)| weak.upgrade())
        })
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.observer.map(|(id, _)| id),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without subscribing the current effect to anything it reads.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}
