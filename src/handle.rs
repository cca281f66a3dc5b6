//! Background driver that publishes states on a watch channel.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use reactive_fsm_core::{StateMachine, TaskError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::machine::AsyncStateMachine;
use crate::queue::EventSender;

/// Spawns a machine on the tokio runtime and publishes every state it
/// delivers.
///
/// The returned [`StateHandle`] is for producers and observers. The
/// [`MachineTask`] resolves once the sequence ends.
pub fn spawn<S, E>(descriptor: StateMachine<S, E>) -> (StateHandle<S, E>, MachineTask)
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + Send + 'static,
{
    spawn_with_config(descriptor, Config::default())
}

pub fn spawn_with_config<S, E>(
    descriptor: StateMachine<S, E>,
    config: Config,
) -> (StateHandle<S, E>, MachineTask)
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + Send + 'static,
{
    let (state_tx, state_rx) = watch::channel(descriptor.initial().clone());
    let machine = AsyncStateMachine::with_config(descriptor, config);

    let handle = StateHandle {
        events: machine.sender(),
        cancel: machine.cancellation_token(),
        state_rx,
    };
    let task = MachineTask {
        handle: tokio::spawn(publish(machine, state_tx)),
    };
    (handle, task)
}

async fn publish<S, E>(
    mut machine: AsyncStateMachine<S, E>,
    state_tx: watch::Sender<S>,
) -> Result<(), TaskError>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + Send + 'static,
{
    let mut states = machine.states();
    // The initial state is already in the channel.
    if states.next().await.is_none() {
        return Ok(());
    }
    while let Some(state) = states.next().await {
        state_tx.send_replace(state?);
    }
    Ok(())
}

/// Producer and observer side of a spawned machine.
#[derive(Debug)]
pub struct StateHandle<S, E> {
    events: EventSender<E>,
    cancel: CancellationToken,
    state_rx: watch::Receiver<S>,
}

impl<S, E> Clone for StateHandle<S, E> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            state_rx: self.state_rx.clone(),
        }
    }
}

impl<S, E> StateHandle<S, E>
where
    S: Clone,
    E: Debug,
{
    /// Sends an event to the machine.
    pub fn send(&self, event: E) {
        self.events.send(event);
    }

    pub fn sender(&self) -> EventSender<E> {
        self.events.clone()
    }

    /// Returns the last published state.
    pub fn current_state(&self) -> S {
        self.state_rx.borrow().clone()
    }

    /// A receiver notified on every published state.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state_rx.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> Result<S, watch::error::RecvError>
    where
        F: FnMut(&S) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx.wait_for(|state| predicate(state)).await?;
        Ok(state.clone())
    }

    /// Stops the machine without processing queued events.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stops accepting events; the machine ends after draining its queue.
    pub fn close(&self) {
        self.events.close();
    }
}

/// The background task driving a spawned machine.
#[must_use = "machine task must be awaited or its outcome is lost"]
#[derive(Debug)]
pub struct MachineTask {
    handle: JoinHandle<Result<(), TaskError>>,
}

impl MachineTask {
    /// Aborts the background task immediately.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Future for MachineTask {
    type Output = Result<(), TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            Poll::Ready(Err(e)) => Poll::Ready(Err(TaskError::Join(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}
