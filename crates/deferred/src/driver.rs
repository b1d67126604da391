//! Cooperative driver for suspendable procedures.
//!
//! A [`Procedure`] is an explicit state machine: each call to
//! [`Procedure::resume`] runs one step and reports how it suspended. The
//! driver feeds plain values straight back, parks on yielded deferreds, and
//! settles the outer deferred when the procedure returns, stops or fails.
//!
//! Steps never overlap. A procedure is only resumed after the deferred it
//! last yielded has settled, and resumption happens synchronously inside
//! whichever call settled it. Already-settled deferreds are consumed in a
//! loop rather than by recursion, so long runs of ready steps do not grow
//! the stack.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::Deferred;

#[cfg(test)]
mod tests;

/// Input handed to a procedure when it is advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume<T, E> {
	/// First advance.
	Start,
	/// The previously yielded value or deferred produced this value.
	Value(T),
	/// The previously yielded deferred failed.
	Failed(E),
}

/// How a procedure suspended after one step.
#[derive(Debug)]
pub enum Suspend<T, R, E> {
	/// A plain value; fed back immediately as [`Resume::Value`].
	Yield(T),
	/// Park until this deferred settles.
	Await(Deferred<T, E>),
	/// The procedure finished with its final value.
	Return(R),
	/// The procedure asked to stop early with this value.
	Stop(R),
}

/// A suspendable procedure driven by [`drive`].
pub trait Procedure: 'static {
	/// Values flowing between steps.
	type Item: Clone + 'static;
	/// Final value.
	type Output: Clone + 'static;
	/// Failure type shared by steps and the outer deferred.
	type Error: Clone + 'static;

	/// Runs one step.
	///
	/// Returning `Err` fails the outer deferred. A [`Resume::Failed`] input
	/// may be recovered from by returning any `Ok` suspension.
	fn resume(
		&mut self,
		input: Resume<Self::Item, Self::Error>,
	) -> Result<Suspend<Self::Item, Self::Output, Self::Error>, Self::Error>;
}

struct Driver<P: Procedure> {
	procedure: Option<P>,
	input: Option<Resume<P::Item, P::Error>>,
	running: bool,
	finished: bool,
}

type Shared<P> = Rc<RefCell<Driver<P>>>;

/// Wraps `procedure` into a deferred for its overall outcome and starts it.
///
/// The first step runs before this function returns.
pub fn drive<P: Procedure>(procedure: P) -> Deferred<P::Output, P::Error> {
	let outer = Deferred::new();
	let state: Shared<P> = Rc::new(RefCell::new(Driver {
		procedure: Some(procedure),
		input: None,
		running: false,
		finished: false,
	}));
	pump(&state, &outer, Resume::Start);
	outer
}

fn pump<P: Procedure>(state: &Shared<P>, outer: &Deferred<P::Output, P::Error>, input: Resume<P::Item, P::Error>) {
	{
		let mut driver = state.borrow_mut();
		if driver.finished {
			return;
		}
		driver.input = Some(input);
		if driver.running {
			return;
		}
		driver.running = true;
	}

	loop {
		let next = {
			let mut driver = state.borrow_mut();
			match (driver.input.take(), driver.procedure.take()) {
				(Some(input), Some(procedure)) => Some((input, procedure)),
				(input, procedure) => {
					driver.input = input;
					driver.procedure = procedure;
					driver.running = false;
					None
				}
			}
		};
		let Some((input, mut procedure)) = next else {
			return;
		};

		let step = procedure.resume(input);
		state.borrow_mut().procedure = Some(procedure);

		match step {
			Ok(Suspend::Yield(value)) => {
				state.borrow_mut().input = Some(Resume::Value(value));
			}
			Ok(Suspend::Await(deferred)) => {
				let resume_state = Rc::clone(state);
				let resume_outer = outer.clone();
				deferred.when_settled(move |outcome| {
					let input = match outcome {
						Ok(value) => Resume::Value(value),
						Err(error) => Resume::Failed(error),
					};
					pump(&resume_state, &resume_outer, input);
				});
			}
			Ok(Suspend::Return(value)) => return finish(state, outer, Ok(value)),
			Ok(Suspend::Stop(value)) => {
				tracing::debug!("driver.stop");
				return finish(state, outer, Ok(value));
			}
			Err(error) => return finish(state, outer, Err(error)),
		}
	}
}

fn finish<P: Procedure>(state: &Shared<P>, outer: &Deferred<P::Output, P::Error>, outcome: Result<P::Output, P::Error>) {
	let procedure = {
		let mut driver = state.borrow_mut();
		driver.finished = true;
		driver.running = false;
		driver.input = None;
		driver.procedure.take()
	};
	drop(procedure);
	if outer.settle(outcome).is_err() {
		tracing::error!("driver.finish outer deferred already settled");
	}
}

/// Procedure built from a closure; see [`from_fn`].
pub struct FnProcedure<F, T, R, E> {
	f: F,
	_marker: PhantomData<fn() -> (T, R, E)>,
}

/// Builds a procedure from a step closure.
pub fn from_fn<T, R, E, F>(f: F) -> FnProcedure<F, T, R, E>
where
	F: FnMut(Resume<T, E>) -> Result<Suspend<T, R, E>, E> + 'static,
{
	FnProcedure { f, _marker: PhantomData }
}

impl<F, T, R, E> Procedure for FnProcedure<F, T, R, E>
where
	T: Clone + 'static,
	R: Clone + 'static,
	E: Clone + 'static,
	F: FnMut(Resume<T, E>) -> Result<Suspend<T, R, E>, E> + 'static,
{
	type Item = T;
	type Output = R;
	type Error = E;

	fn resume(&mut self, input: Resume<T, E>) -> Result<Suspend<T, R, E>, E> {
		(self.f)(input)
	}
}

/// One step of a [`Sequence`]: receives the previous step's value.
pub type SequenceStep<T, E> = Box<dyn FnOnce(Option<T>) -> Deferred<T, E>>;

/// Runs deferred-producing steps strictly in order.
///
/// Each step starts only after the previous step's deferred resolved and
/// receives that value. A failure fails the whole sequence. When a stop
/// predicate is set it is checked before every step; once true, the sequence
/// stops with the last value seen.
pub struct Sequence<T, E> {
	steps: VecDeque<SequenceStep<T, E>>,
	last: Option<T>,
	stop: Option<Box<dyn Fn() -> bool>>,
}

impl<T, E> Default for Sequence<T, E> {
	fn default() -> Self {
		Self {
			steps: VecDeque::new(),
			last: None,
			stop: None,
		}
	}
}

impl<T, E> Sequence<T, E>
where
	T: Clone + 'static,
	E: Clone + 'static,
{
	/// Creates an empty sequence.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a step.
	pub fn step(mut self, step: impl FnOnce(Option<T>) -> Deferred<T, E> + 'static) -> Self {
		self.steps.push_back(Box::new(step));
		self
	}

	/// Sets the stop predicate checked before each step.
	pub fn stop_when(mut self, stop: impl Fn() -> bool + 'static) -> Self {
		self.stop = Some(Box::new(stop));
		self
	}

	/// Returns the number of steps not yet started.
	pub fn remaining(&self) -> usize {
		self.steps.len()
	}

	/// Starts the sequence under [`drive`].
	pub fn run(self) -> Deferred<Option<T>, E> {
		drive(self)
	}
}

impl<T, E> Procedure for Sequence<T, E>
where
	T: Clone + 'static,
	E: Clone + 'static,
{
	type Item = T;
	type Output = Option<T>;
	type Error = E;

	fn resume(&mut self, input: Resume<T, E>) -> Result<Suspend<T, Option<T>, E>, E> {
		match input {
			Resume::Start => {}
			Resume::Value(value) => self.last = Some(value),
			Resume::Failed(error) => return Err(error),
		}
		if self.stop.as_ref().is_some_and(|stop| stop()) {
			return Ok(Suspend::Stop(self.last.take()));
		}
		match self.steps.pop_front() {
			Some(step) => Ok(Suspend::Await(step(self.last.clone()))),
			None => Ok(Suspend::Return(self.last.take())),
		}
	}
}
