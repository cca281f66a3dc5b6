//! Runs side effects and feeds their outcome back into the machine.

use std::any::Any;

use reactive_fsm_core::{InFlightPolicy, MachineError, SideEffect};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::queue::FeedbackSink;

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The effect finished; its event, if any, was fed back.
    Completed,
    /// Cancellation aborted the effect before it finished.
    Interrupted,
}

/// A side effect that has been started on its own task.
///
/// Dropping it detaches the task under [`InFlightPolicy::RunToCompletion`]
/// and aborts it under [`InFlightPolicy::Abort`].
#[derive(Debug)]
pub struct RunningEffect<E> {
    handle: JoinHandle<Option<E>>,
    abort_on_drop: bool,
}

impl<E> Drop for RunningEffect<E> {
    fn drop(&mut self) {
        if self.abort_on_drop {
            self.handle.abort();
        }
    }
}

/// Executes one side effect at a time on behalf of a machine.
///
/// Each effect runs on its own tokio task so that a panic inside it is caught
/// and reported instead of unwinding through the consumption loop. Calling
/// [`SideEffectExecutor::start`] therefore requires a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideEffectExecutor {
    policy: InFlightPolicy,
}

impl SideEffectExecutor {
    pub fn new(policy: InFlightPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> InFlightPolicy {
        self.policy
    }

    /// Runs `effect` to completion and pushes its event into `sink`.
    pub async fn execute<E, K>(
        &self,
        effect: SideEffect<E>,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<Execution, MachineError>
    where
        E: Send + 'static,
        K: FeedbackSink<E> + ?Sized,
    {
        let mut running = self.start(effect);
        self.finish(&mut running, sink, cancel).await
    }

    /// Spawns `effect` without waiting for it.
    pub fn start<E>(&self, effect: SideEffect<E>) -> RunningEffect<E>
    where
        E: Send + 'static,
    {
        RunningEffect {
            handle: tokio::spawn(effect.run()),
            abort_on_drop: self.policy == InFlightPolicy::Abort,
        }
    }

    /// Waits for a started effect and pushes its event into `sink`.
    ///
    /// This method is cancel safe. Dropping the future leaves `running`
    /// untouched, and a later call picks the same effect up again.
    ///
    /// With [`InFlightPolicy::Abort`] the effect is raced against `cancel`;
    /// with [`InFlightPolicy::RunToCompletion`] the token is ignored here.
    pub async fn finish<E, K>(
        &self,
        running: &mut RunningEffect<E>,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<Execution, MachineError>
    where
        E: Send + 'static,
        K: FeedbackSink<E> + ?Sized,
    {
        let joined = match self.policy {
            InFlightPolicy::RunToCompletion => (&mut running.handle).await,
            InFlightPolicy::Abort => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("cancelled while a side effect was running, aborting it");
                        running.handle.abort();
                        return Ok(Execution::Interrupted);
                    }
                    joined = &mut running.handle => joined,
                }
            }
        };

        match joined {
            Ok(Some(event)) => {
                sink.feed(event);
                Ok(Execution::Completed)
            }
            Ok(None) => Ok(Execution::Completed),
            Err(err) => Err(contract_violation(err)),
        }
    }
}

fn contract_violation(err: JoinError) -> MachineError {
    if err.is_panic() {
        let message = panic_message(err.into_panic());
        #[cfg(feature = "tracing")]
        tracing::error!(%message, "side effect panicked instead of yielding a failure event");
        MachineError::SideEffectPanicked { message }
    } else {
        #[cfg(feature = "tracing")]
        tracing::error!("side effect task was cancelled from outside the machine");
        MachineError::SideEffectCancelled
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
