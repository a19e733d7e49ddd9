/// Receives solver events and decides how the iteration should proceed.
///
/// NLP backends report progress (one event per iteration, failed subproblems,
/// penalty updates) through an observer instead of printing or logging
/// directly. Callers plug in whatever they need: a logger, a convergence
/// history recorder, or a policy that stops the solve early.
///
/// `observe` returns `Some(action)` to request a solver-specific action, or
/// `None` to let the solver continue unchanged.
///
/// Closures implement `Observer` and `()` is a no-op observer. Wrapping
/// `&mut O` in [`Borrowed`] forwards to `O`, so an observer can be lent to a
/// solver and inspected afterwards.
pub trait Observer<E, A> {
    /// Observes a solver event and optionally returns a control action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

/// Lends an observer without giving up ownership.
///
/// This impl is not covered by the closure impl because `&mut O` is only
/// `FnMut` when `O` itself is a closure.
pub struct Borrowed<'a, O>(pub &'a mut O);

impl<E, A, O> Observer<E, A> for Borrowed<'_, O>
where
    O: Observer<E, A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self.0.observe(event)
    }
}
