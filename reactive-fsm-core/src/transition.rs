use crate::SideEffect;

/// The outcome of feeding one event to a state machine.
///
/// Either nothing observable happens ([`Transition::SameState`]) or a new
/// state is produced ([`Transition::NewState`]). Both variants may carry a
/// single side effect to run.
///
/// # Example
///
/// ```rust
/// use reactive_fsm_core::{SideEffect, Transition};
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum State {
///     Idle,
///     Loading,
/// }
///
/// #[derive(Debug)]
/// enum Event {
///     Load,
///     Loaded,
/// }
///
/// fn transition(state: &State, event: Event) -> Transition<State, Event> {
///     match (state, event) {
///         (State::Idle, Event::Load) => {
///             Transition::to(State::Loading).with_effect(SideEffect::emit(async { Event::Loaded }))
///         }
///         (State::Loading, Event::Loaded) => Transition::to(State::Idle),
///         _ => Transition::stay(),
///     }
/// }
/// # let _ = transition(&State::Idle, Event::Load);
/// ```
#[derive(Debug)]
pub enum Transition<S, E> {
    /// No new state to deliver; the side effect, if any, still runs.
    SameState {
        side_effect: Option<SideEffect<E>>,
    },
    /// A new state to deliver to the consumer.
    NewState {
        state: S,
        side_effect: Option<SideEffect<E>>,
    },
}

impl<S, E> Transition<S, E> {
    /// Stays in the current state without any side effect.
    ///
    /// This is the answer for every (state, event) pair a machine does not
    /// handle.
    #[must_use]
    pub fn stay() -> Self {
        Self::SameState { side_effect: None }
    }

    /// Moves to `state` without any side effect.
    #[must_use]
    pub fn to(state: S) -> Self {
        Self::NewState {
            state,
            side_effect: None,
        }
    }

    /// Attaches a side effect, replacing any effect already present.
    #[must_use]
    pub fn with_effect(self, effect: SideEffect<E>) -> Self {
        match self {
            Self::SameState { .. } => Self::SameState {
                side_effect: Some(effect),
            },
            Self::NewState { state, .. } => Self::NewState {
                state,
                side_effect: Some(effect),
            },
        }
    }

    /// Returns `true` if this transition delivers a new state.
    pub fn is_new_state(&self) -> bool {
        matches!(self, Self::NewState { .. })
    }

    /// The new state, if any.
    pub fn state(&self) -> Option<&S> {
        match self {
            Self::SameState { .. } => None,
            Self::NewState { state, .. } => Some(state),
        }
    }

    /// The attached side effect, if any.
    pub fn side_effect(&self) -> Option<&SideEffect<E>> {
        match self {
            Self::SameState { side_effect } | Self::NewState { side_effect, .. } => {
                side_effect.as_ref()
            }
        }
    }

    /// Splits the transition into its new state and side effect.
    #[must_use]
    pub fn into_parts(self) -> (Option<S>, Option<SideEffect<E>>) {
        match self {
            Self::SameState { side_effect } => (None, side_effect),
            Self::NewState { state, side_effect } => (Some(state), side_effect),
        }
    }
}

impl<S, E> Default for Transition<S, E> {
    fn default() -> Self {
        Self::stay()
    }
}
