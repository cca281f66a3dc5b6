//! The asynchronous state machine runtime.

use std::fmt::Debug;

use futures::Stream;
use reactive_fsm_core::{Lifecycle, MachineError, StateMachine};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::executor::{Execution, RunningEffect, SideEffectExecutor};
use crate::queue::{Dequeued, EventQueue, EventSender};

/// A running instance of a [`StateMachine`].
///
/// Events go in through [`AsyncStateMachine::send`] (or any
/// [`EventSender`] clone) and states come out of the sequence returned by
/// [`AsyncStateMachine::states`]. Transitions are evaluated strictly one at a
/// time, in the order events were queued, and each side effect is awaited
/// before the next event is taken. A slow side effect therefore delays every
/// event queued behind it.
///
/// # Example
///
/// ```rust
/// use reactive_fsm::{AsyncStateMachine, StateMachine, Transition};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let counter = StateMachine::new(0u32, |count, delta: u32| {
///     if delta == 0 {
///         Transition::stay()
///     } else {
///         Transition::to(count + delta)
///     }
/// });
///
/// let mut machine = AsyncStateMachine::new(counter);
/// machine.send(2);
/// machine.send(0);
/// machine.send(3);
/// machine.close();
///
/// let mut states = machine.states();
/// let mut seen = Vec::new();
/// while let Some(state) = states.next().await {
///     seen.push(state.unwrap());
/// }
/// assert_eq!(seen, vec![0, 2, 5]);
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncStateMachine<S, E> {
    descriptor: StateMachine<S, E>,
    queue: EventQueue<E>,
    cancel: CancellationToken,
    executor: SideEffectExecutor,
    config: Config,
}

impl<S, E> AsyncStateMachine<S, E>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + Send + 'static,
{
    pub fn new(descriptor: StateMachine<S, E>) -> Self {
        Self::with_config(descriptor, Config::default())
    }

    pub fn with_config(descriptor: StateMachine<S, E>, config: Config) -> Self {
        Self {
            descriptor,
            queue: EventQueue::new(),
            cancel: CancellationToken::new(),
            executor: SideEffectExecutor::new(config.in_flight_policy()),
            config,
        }
    }

    /// Enqueues an event without waiting for it to be processed.
    pub fn send(&self, event: E) {
        self.sender().send(event);
    }

    /// A cloneable handle for sending events from other tasks or threads.
    pub fn sender(&self) -> EventSender<E> {
        self.queue.sender(self.cancel.clone())
    }

    /// Token that stops observation when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops observation. Pending and future pulls return `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stops accepting events. Events already queued are still processed,
    /// after which the state sequence ends.
    pub fn close(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(machine = %self.config.name(), "closing event queue");
        self.queue.close();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a new pass over the machine's states, beginning with the
    /// initial state.
    ///
    /// The sequence borrows the machine mutably, so only one consumer can
    /// observe it at a time. Starting another pass later restarts from the
    /// initial state while continuing to drain the same queue.
    pub fn states(&mut self) -> States<'_, S, E> {
        States {
            current: self.descriptor.initial().clone(),
            machine: self,
            lifecycle: Lifecycle::NotStarted,
            in_flight: None,
        }
    }
}

/// Pull-based sequence of states produced by an [`AsyncStateMachine`].
///
/// The first pull yields the initial state without consuming an event. Every
/// later pull consumes events until one produces a new state, suspending while
/// the queue is empty. Events that leave the state unchanged are processed
/// but never delivered.
#[derive(Debug)]
pub struct States<'a, S, E> {
    machine: &'a mut AsyncStateMachine<S, E>,
    current: S,
    lifecycle: Lifecycle,
    in_flight: Option<InFlight<S, E>>,
}

/// A transition whose side effect is still running.
#[derive(Debug)]
struct InFlight<S, E> {
    next: Option<S>,
    effect: RunningEffect<E>,
}

impl<'a, S, E> States<'a, S, E>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + Send + 'static,
{
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The last committed state. It may be ahead of the last delivered one
    /// when cancellation arrived while a side effect was running.
    pub fn current(&self) -> &S {
        &self.current
    }

    /// Pulls the next state.
    ///
    /// Returns `None` once the sequence is cancelled or exhausted. A side
    /// effect that breaks its contract yields one `Err` and ends the sequence;
    /// the state it would have committed is discarded.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. If the future is dropped while a side
    /// effect is running, the effect keeps its pending state and the next
    /// call resumes waiting for it before taking another event.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub async fn next(&mut self) -> Option<Result<S, MachineError>> {
        if self.lifecycle.is_terminal() {
            return None;
        }
        let Self {
            machine,
            current,
            lifecycle,
            in_flight,
        } = self;
        let AsyncStateMachine {
            descriptor,
            queue,
            cancel,
            executor,
            config,
        } = &mut **machine;
        let name = config.name();

        loop {
            if let Some(pending) = in_flight.as_mut() {
                let outcome = executor.finish(&mut pending.effect, queue, cancel).await;
                let next = in_flight.take().and_then(|pending| pending.next);
                match outcome {
                    Ok(Execution::Completed) => {}
                    Ok(Execution::Interrupted) => {
                        *lifecycle = Lifecycle::Cancelled;
                        return None;
                    }
                    Err(err) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!(machine = %name, error = %err, "stopping state machine");
                        *lifecycle = Lifecycle::Failed;
                        return Some(Err(err));
                    }
                }
                match next {
                    Some(state) if !cancel.is_cancelled() => {
                        *current = state;
                        #[cfg(feature = "tracing")]
                        tracing::debug!(machine = %name, state = ?current, "delivering new state");
                        return Some(Ok(current.clone()));
                    }
                    // Committed, but cancellation stops it from being delivered.
                    Some(state) => *current = state,
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(machine = %name, "state unchanged");
                    }
                }
            }

            if cancel.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::debug!(machine = %name, "observation cancelled");
                *lifecycle = Lifecycle::Cancelled;
                return None;
            }

            if *lifecycle == Lifecycle::NotStarted {
                *lifecycle = Lifecycle::Running;
                #[cfg(feature = "tracing")]
                tracing::debug!(machine = %name, state = ?current, "delivering initial state");
                return Some(Ok(current.clone()));
            }

            let event = match queue.dequeue(cancel).await {
                Dequeued::Event(event) => event,
                Dequeued::Closed => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(machine = %name, "event queue exhausted");
                    *lifecycle = Lifecycle::Exhausted;
                    return None;
                }
                Dequeued::Cancelled => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(machine = %name, "observation cancelled while waiting");
                    *lifecycle = Lifecycle::Cancelled;
                    return None;
                }
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(machine = %name, ?event, "processing event");
            match descriptor.transition(current, event).into_parts() {
                (next, Some(effect)) => {
                    *in_flight = Some(InFlight {
                        next,
                        effect: executor.start(effect),
                    });
                }
                (Some(state), None) => {
                    *current = state;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(machine = %name, state = ?current, "delivering new state");
                    return Some(Ok(current.clone()));
                }
                (None, None) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(machine = %name, "state unchanged");
                }
            }
        }
    }

    /// Adapts the sequence into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<S, MachineError>> + 'a {
        futures::stream::unfold(self, |mut states| async move {
            let item = states.next().await?;
            Some((item, states))
        })
    }
}
