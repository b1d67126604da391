//! Single-assignment result container with ordered callback chaining.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

#[cfg(test)]
mod tests;

/// Error returned when settling a [`Deferred`] a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deferred already settled")]
pub struct AlreadySettled;

/// Observable settlement state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
	/// No outcome yet.
	Pending,
	/// Settled with a value.
	Resolved,
	/// Settled with an error.
	Failed,
}

/// What a chained callback hands back to its chain.
///
/// Returning [`Step::Chain`] defers the chain's settlement until the nested
/// deferred settles.
pub enum Step<T, E> {
	/// The callback produced its outcome directly.
	Ready(Result<T, E>),
	/// The callback produced another deferred to wait on.
	Chain(Deferred<T, E>),
}

impl<T, E> From<Result<T, E>> for Step<T, E> {
	fn from(outcome: Result<T, E>) -> Self {
		Self::Ready(outcome)
	}
}

impl<T, E> From<Deferred<T, E>> for Step<T, E> {
	fn from(deferred: Deferred<T, E>) -> Self {
		Self::Chain(deferred)
	}
}

type Callback<T, E> = Box<dyn FnOnce(Result<T, E>)>;

struct Inner<T, E> {
	outcome: Option<Result<T, E>>,
	callbacks: VecDeque<Callback<T, E>>,
	firing: bool,
}

/// A single-assignment future with FIFO callback chaining.
///
/// A deferred settles exactly once, either resolved with a `T` or failed with
/// an `E`. Settling runs every registered callback synchronously, in
/// registration order, on the settling call stack. Callbacks registered after
/// settlement run immediately, unless the deferred is still working through
/// its callback queue, in which case they are queued behind the callbacks
/// already waiting.
///
/// Cloning a deferred yields another handle to the same slot.
pub struct Deferred<T, E> {
	inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T, E> Default for Deferred<T, E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T, E> fmt::Debug for Deferred<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Deferred")
			.field("state", &self.state())
			.field("callbacks", &self.callback_count())
			.finish()
	}
}

impl<T, E> Deferred<T, E> {
	/// Creates a pending deferred.
	pub fn new() -> Self {
		Self {
			inner: Rc::new(RefCell::new(Inner {
				outcome: None,
				callbacks: VecDeque::new(),
				firing: false,
			})),
		}
	}

	/// Creates a deferred already resolved with `value`.
	pub fn resolved(value: T) -> Self {
		let deferred = Self::new();
		deferred.inner.borrow_mut().outcome = Some(Ok(value));
		deferred
	}

	/// Creates a deferred already failed with `error`.
	pub fn failed(error: E) -> Self {
		let deferred = Self::new();
		deferred.inner.borrow_mut().outcome = Some(Err(error));
		deferred
	}

	/// Returns the current settlement state.
	pub fn state(&self) -> DeferredState {
		match &self.inner.borrow().outcome {
			None => DeferredState::Pending,
			Some(Ok(_)) => DeferredState::Resolved,
			Some(Err(_)) => DeferredState::Failed,
		}
	}

	/// Returns true while no outcome has been set.
	pub fn is_pending(&self) -> bool {
		self.inner.borrow().outcome.is_none()
	}

	/// Returns the number of callbacks waiting to run.
	pub fn callback_count(&self) -> usize {
		self.inner.borrow().callbacks.len()
	}

	/// Returns true if both handles point at the same slot.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<T, E> Deferred<T, E>
where
	T: Clone + 'static,
	E: Clone + 'static,
{
	/// Resolves with `value`, running pending callbacks in order.
	pub fn resolve(&self, value: T) -> Result<(), AlreadySettled> {
		self.settle(Ok(value))
	}

	/// Fails with `error`, running pending callbacks in order.
	pub fn fail(&self, error: E) -> Result<(), AlreadySettled> {
		self.settle(Err(error))
	}

	/// Settles with `outcome`.
	///
	/// # Errors
	///
	/// Returns [`AlreadySettled`] if an outcome was already set; the stored
	/// outcome is left untouched.
	pub fn settle(&self, outcome: Result<T, E>) -> Result<(), AlreadySettled> {
		{
			let mut inner = self.inner.borrow_mut();
			if inner.outcome.is_some() {
				return Err(AlreadySettled);
			}
			inner.outcome = Some(outcome);
		}
		self.fire();
		Ok(())
	}

	/// Returns a snapshot of the outcome, if settled.
	pub fn outcome(&self) -> Option<Result<T, E>> {
		self.inner.borrow().outcome.clone()
	}

	/// Returns the resolved value, if resolved.
	pub fn value(&self) -> Option<T> {
		match &self.inner.borrow().outcome {
			Some(Ok(value)) => Some(value.clone()),
			_ => None,
		}
	}

	/// Returns the failure, if failed.
	pub fn error(&self) -> Option<E> {
		match &self.inner.borrow().outcome {
			Some(Err(error)) => Some(error.clone()),
			_ => None,
		}
	}

	/// Registers a raw listener for the outcome.
	///
	/// Unlike the chaining methods this produces no new deferred.
	pub fn when_settled(&self, listener: impl FnOnce(Result<T, E>) + 'static) {
		let ready = {
			let mut inner = self.inner.borrow_mut();
			inner.callbacks.push_back(Box::new(listener));
			inner.outcome.is_some() && !inner.firing
		};
		if ready {
			self.fire();
		}
	}

	/// Chains a handler that sees the full outcome.
	pub fn add_both<U, S, F>(&self, f: F) -> Deferred<U, E>
	where
		U: Clone + 'static,
		S: Into<Step<U, E>>,
		F: FnOnce(Result<T, E>) -> S + 'static,
	{
		let next = Deferred::new();
		let target = next.clone();
		self.when_settled(move |outcome| target.follow(f(outcome).into()));
		next
	}

	/// Chains a value handler; failures skip `f` and propagate.
	pub fn add_callback<U, S, F>(&self, f: F) -> Deferred<U, E>
	where
		U: Clone + 'static,
		S: Into<Step<U, E>>,
		F: FnOnce(T) -> S + 'static,
	{
		self.add_both(move |outcome| -> Step<U, E> {
			match outcome {
				Ok(value) => f(value).into(),
				Err(error) => Step::Ready(Err(error)),
			}
		})
	}

	/// Chains an error handler; values skip `f` and propagate.
	///
	/// The handler may recover by returning `Ok`.
	pub fn add_errback<S, F>(&self, f: F) -> Deferred<T, E>
	where
		S: Into<Step<T, E>>,
		F: FnOnce(E) -> S + 'static,
	{
		self.add_both(move |outcome| -> Step<T, E> {
			match outcome {
				Ok(value) => Step::Ready(Ok(value)),
				Err(error) => f(error).into(),
			}
		})
	}

	/// Chains an infallible value transform.
	pub fn map<U, F>(&self, f: F) -> Deferred<U, E>
	where
		U: Clone + 'static,
		F: FnOnce(T) -> U + 'static,
	{
		self.add_callback(move |value| Ok::<U, E>(f(value)))
	}

	/// Converts the failure type.
	pub fn map_err<E2, F>(&self, f: F) -> Deferred<T, E2>
	where
		E2: Clone + 'static,
		F: FnOnce(E) -> E2 + 'static,
	{
		let next = Deferred::new();
		let target = next.clone();
		self.when_settled(move |outcome| target.settle_chained(outcome.map_err(f)));
		next
	}

	fn follow(&self, step: Step<T, E>) {
		match step {
			Step::Ready(outcome) => self.settle_chained(outcome),
			Step::Chain(nested) => {
				let target = self.clone();
				nested.when_settled(move |outcome| target.settle_chained(outcome));
			}
		}
	}

	fn settle_chained(&self, outcome: Result<T, E>) {
		if self.settle(outcome).is_err() {
			tracing::error!("deferred.chain settled twice");
		}
	}

	fn fire(&self) {
		{
			let mut inner = self.inner.borrow_mut();
			if inner.firing || inner.outcome.is_none() {
				return;
			}
			inner.firing = true;
		}
		loop {
			let next = {
				let mut inner = self.inner.borrow_mut();
				match (inner.callbacks.pop_front(), inner.outcome.clone()) {
					(Some(callback), Some(outcome)) => Some((callback, outcome)),
					_ => {
						inner.firing = false;
						None
					}
				}
			};
			let Some((callback, outcome)) = next else {
				return;
			};
			callback(outcome);
		}
	}
}

/// Resolves with every value in input order once all inputs resolve.
///
/// Fails with the first failure observed; later outcomes are ignored.
pub fn gather<T, E, I>(deferreds: I) -> Deferred<Vec<T>, E>
where
	T: Clone + 'static,
	E: Clone + 'static,
	I: IntoIterator<Item = Deferred<T, E>>,
{
	let deferreds: Vec<_> = deferreds.into_iter().collect();
	if deferreds.is_empty() {
		return Deferred::resolved(Vec::new());
	}

	let out = Deferred::new();
	let remaining = deferreds.len();
	let slots: Rc<RefCell<(Vec<Option<T>>, usize)>> = Rc::new(RefCell::new((vec![None; remaining], remaining)));

	for (index, deferred) in deferreds.into_iter().enumerate() {
		let slots = Rc::clone(&slots);
		let out = out.clone();
		deferred.when_settled(move |outcome| match outcome {
			Err(error) => {
				if out.is_pending() {
					let _ = out.fail(error);
				}
			}
			Ok(value) => {
				let done = {
					let mut slots = slots.borrow_mut();
					slots.0[index] = Some(value);
					slots.1 -= 1;
					(slots.1 == 0).then(|| slots.0.drain(..).flatten().collect::<Vec<T>>())
				};
				if let Some(values) = done
					&& out.is_pending()
				{
					let _ = out.resolve(values);
				}
			}
		});
	}
	out
}
