use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

/// A deferred unit of asynchronous work that yields at most one follow-up
/// event.
///
/// Side effects are the only place where a machine touches the outside world.
/// Whatever dependency the work needs (a client, a timer, a database handle)
/// is captured when the effect is constructed, and nothing runs until the
/// executor calls [`SideEffect::run`].
///
/// A side effect must not fail. Domain failures are reported by yielding a
/// failure event; [`SideEffect::fallible`] helps with that mapping. A panic
/// inside the future is treated by the executor as a broken effect and ends
/// the machine with an error.
///
/// # Example
///
/// ```rust
/// use reactive_fsm_core::SideEffect;
///
/// #[derive(Debug)]
/// enum Event {
///     Loaded(u32),
/// }
///
/// let effect = SideEffect::emit(async { Event::Loaded(42) });
/// # let _ = effect;
/// ```
#[must_use = "side effects do nothing unless executed"]
pub struct SideEffect<E> {
    operation: BoxFuture<'static, Option<E>>,
}

impl<E: 'static> SideEffect<E> {
    /// Creates a side effect from a future that may or may not produce an
    /// event.
    pub fn new<F>(operation: F) -> Self
    where
        F: Future<Output = Option<E>> + Send + 'static,
    {
        Self {
            operation: operation.boxed(),
        }
    }

    /// Creates a side effect that always produces exactly one event.
    pub fn emit<F>(operation: F) -> Self
    where
        F: Future<Output = E> + Send + 'static,
    {
        Self::new(operation.map(Some))
    }

    /// Creates a side effect whose only purpose is the work itself; it never
    /// feeds an event back into the machine.
    pub fn detached<F>(operation: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::new(operation.map(|()| None))
    }

    /// Creates a side effect around fallible work, mapping any error to a
    /// domain event with `on_error`.
    ///
    /// ```rust
    /// use reactive_fsm_core::SideEffect;
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum Event {
    ///     Paid,
    ///     PaymentFailed,
    /// }
    ///
    /// async fn charge() -> Result<bool, std::io::Error> {
    ///     Ok(true)
    /// }
    ///
    /// let effect = SideEffect::fallible(
    ///     async { charge().await.map(|ok| Some(if ok { Event::Paid } else { Event::PaymentFailed })) },
    ///     |_err| Event::PaymentFailed,
    /// );
    /// # let _ = effect;
    /// ```
    pub fn fallible<F, Err, M>(operation: F, on_error: M) -> Self
    where
        F: Future<Output = Result<Option<E>, Err>> + Send + 'static,
        M: FnOnce(Err) -> E + Send + 'static,
    {
        Self::new(operation.map(|result| match result {
            Ok(event) => event,
            Err(err) => Some(on_error(err)),
        }))
    }

    /// Runs the effect to completion, returning the follow-up event if any.
    pub fn run(self) -> impl Future<Output = Option<E>> + Send {
        self.operation
    }
}

impl<E> fmt::Debug for SideEffect<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SideEffect(..)")
    }
}
