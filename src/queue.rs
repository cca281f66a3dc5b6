//! The event queue shared by producers and the consumption loop.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Destination for events produced by side effects.
pub trait FeedbackSink<E> {
    /// Hands a follow-up event back to the machine.
    fn feed(&mut self, event: E);
}

impl<E> FeedbackSink<E> for VecDeque<E> {
    fn feed(&mut self, event: E) {
        self.push_back(event);
    }
}

/// Cloneable, thread-safe handle for submitting events to a machine.
///
/// Sending never blocks. Once the machine's queue is closed or its observation
/// cancelled, submitted events are dropped.
#[derive(Debug)]
pub struct EventSender<E> {
    tx: mpsc::UnboundedSender<E>,
    closing: CancellationToken,
    cancel: CancellationToken,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closing: self.closing.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E: std::fmt::Debug> EventSender<E> {
    /// Enqueues an event. Fire-and-forget.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn send(&self, event: E) {
        if self.cancel.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::trace!(?event, "observation cancelled, dropping event");
            return;
        }
        if self.closing.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!(?event, "event queue closed, dropping event");
            return;
        }
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            #[cfg(feature = "tracing")]
            tracing::debug!(?event, "event queue closed, dropping event");
        }
    }

    /// Closes the queue this sender feeds.
    pub(crate) fn close(&self) {
        self.closing.cancel();
    }

    /// Returns `true` if events sent now would be dropped.
    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled() || self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

impl<E: std::fmt::Debug> FeedbackSink<E> for EventSender<E> {
    fn feed(&mut self, event: E) {
        self.send(event);
    }
}

/// Outcome of waiting for the next event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dequeued<E> {
    Event(E),
    Closed,
    Cancelled,
}

/// FIFO event buffer with two lanes.
///
/// Externally sent events arrive over an unbounded channel. Feedback events
/// from side effects go to a separate lane that is always drained first, so a
/// side effect's outcome is handled before anything that was already waiting.
#[derive(Debug)]
pub(crate) struct EventQueue<E> {
    tx: mpsc::UnboundedSender<E>,
    rx: mpsc::UnboundedReceiver<E>,
    feedback: VecDeque<E>,
    closing: CancellationToken,
    rx_closed: bool,
}

impl<E> EventQueue<E> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            feedback: VecDeque::new(),
            closing: CancellationToken::new(),
            rx_closed: false,
        }
    }

    pub(crate) fn sender(&self, cancel: CancellationToken) -> EventSender<E> {
        EventSender {
            tx: self.tx.clone(),
            closing: self.closing.clone(),
            cancel,
        }
    }

    /// Stops accepting external events. Buffered events still drain.
    pub(crate) fn close(&self) {
        self.closing.cancel();
    }

    /// Waits for the next event, feedback lane first.
    pub(crate) async fn dequeue(&mut self, cancel: &CancellationToken) -> Dequeued<E> {
        if let Some(event) = self.feedback.pop_front() {
            return Dequeued::Event(event);
        }
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Dequeued::Cancelled,
                _ = self.closing.cancelled(), if !self.rx_closed => {
                    self.rx.close();
                    self.rx_closed = true;
                }
                event = self.rx.recv() => return match event {
                    Some(event) => Dequeued::Event(event),
                    None => Dequeued::Closed,
                },
            }
        }
    }
}

impl<E> FeedbackSink<E> for EventQueue<E> {
    fn feed(&mut self, event: E) {
        self.feedback.push_back(event);
    }
}
