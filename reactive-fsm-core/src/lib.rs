//! Core data model for reactive-fsm.

mod effect;
mod machine;
mod transition;

pub use crate::effect::SideEffect;
pub use crate::machine::StateMachine;
pub use crate::transition::Transition;

/// What happens to a side effect that is still running when its machine is
/// cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InFlightPolicy {
    /// The effect runs to completion and its state is committed, but once
    /// cancellation has been requested that state is not delivered.
    #[default]
    RunToCompletion,
    /// The effect task is aborted as soon as cancellation is requested, and
    /// its event is never fed back.
    Abort,
}

/// Lifecycle of one state sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No state has been pulled yet.
    NotStarted,
    /// The initial state has been delivered and events are being consumed.
    Running,
    /// The consumer cancelled observation.
    Cancelled,
    /// The event queue was closed and fully drained.
    Exhausted,
    /// A side effect broke its contract and the loop stopped.
    Failed,
}

impl Lifecycle {
    /// Returns `true` once no more states will be delivered.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Exhausted | Self::Failed)
    }
}

/// A side effect broke its contract.
///
/// Domain failures never travel through this type; they are ordinary events.
/// Seeing one of these means a side effect was written incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    /// The side effect panicked instead of mapping its failure to an event.
    #[error("side effect panicked: {message}")]
    SideEffectPanicked { message: String },
    /// The side effect task was cancelled from outside the machine, usually
    /// because the runtime is shutting down.
    #[error("side effect task was cancelled before completing")]
    SideEffectCancelled,
}

/// Error type returned by a spawned machine task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The machine stopped on a side effect contract violation.
    #[error("state machine error: {0}")]
    Machine(#[from] MachineError),
    /// The background task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
