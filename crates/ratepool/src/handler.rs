use core::{fmt, future::Future};

/// The unit of work executed by pool workers.
///
/// A handler receives the id of the worker running it and the job payload,
/// and returns either a value or a domain error. It must not panic: internal
/// problems (network failures, malformed responses, missing data) belong in
/// `Self::Error`. A panic is still contained by the pool and reported as
/// [`JobError::Panicked`](crate::JobError::Panicked), but the work is lost.
///
/// The pool never retries a failed job; retry policy, if any, belongs here or
/// in the caller.
pub trait Handler<P>: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;
    type Error: Clone + Send + Sync + 'static;

    fn handle(
        &self,
        worker_id: usize,
        payload: P,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

/// Adapts an async closure into a [`Handler`]. See [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Creates a [`Handler`] from a closure `(worker_id, payload) -> Future`.
///
/// ```
/// use ratepool::{handler_fn, Handler};
///
/// let double = handler_fn(|_worker_id: usize, n: u64| async move {
///     Ok::<_, String>(n * 2)
/// });
/// # let _ = double;
/// ```
pub const fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn")
            .field("f", &core::any::type_name::<F>())
            .finish()
    }
}

impl<P, F, Fut, T, E> Handler<P> for HandlerFn<F>
where
    F: Fn(usize, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn handle(&self, worker_id: usize, payload: P) -> impl Future<Output = Result<T, E>> + Send {
        (self.f)(worker_id, payload)
    }
}
