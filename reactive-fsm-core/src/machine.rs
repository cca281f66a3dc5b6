use std::fmt;
use std::sync::Arc;

use crate::Transition;

type TransitionFn<S, E> = dyn Fn(&S, E) -> Transition<S, E> + Send + Sync;

/// An immutable description of a state machine: an initial state and a total
/// transition function.
///
/// The descriptor holds no runtime state. Cloning it is cheap and every clone
/// can back its own running machine.
///
/// The transition function must be total. Pairs the machine does not care
/// about resolve to [`Transition::stay`]; a match over `(state, event)` with a
/// `_ => Transition::stay()` arm is the usual shape. Any nondeterminism belongs
/// in the returned side effect, never in the decision itself.
pub struct StateMachine<S, E> {
    initial: S,
    transition: Arc<TransitionFn<S, E>>,
}

impl<S, E> StateMachine<S, E> {
    /// Creates a descriptor from an initial state and a transition function.
    pub fn new<F>(initial: S, transition: F) -> Self
    where
        F: Fn(&S, E) -> Transition<S, E> + Send + Sync + 'static,
    {
        Self {
            initial,
            transition: Arc::new(transition),
        }
    }

    /// The state every machine built from this descriptor starts in.
    pub fn initial(&self) -> &S {
        &self.initial
    }

    /// Evaluates the transition function for one (state, event) pair.
    pub fn transition(&self, state: &S, event: E) -> Transition<S, E> {
        (self.transition)(state, event)
    }
}

impl<S: Clone, E> Clone for StateMachine<S, E> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            transition: Arc::clone(&self.transition),
        }
    }
}

impl<S: fmt::Debug, E> fmt::Debug for StateMachine<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}
