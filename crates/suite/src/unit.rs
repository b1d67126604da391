//! Cases, fixtures and units.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use courier_deferred::Deferred;

use crate::failure::Failure;

/// Eventual outcome of one case or fixture step.
pub type Outcome = Deferred<(), Failure>;

/// One named test.
pub struct Case {
	name: String,
	body: Box<dyn FnOnce() -> Outcome>,
}

impl Case {
	/// A case whose body completes through a deferred.
	pub fn new(name: impl Into<String>, body: impl FnOnce() -> Outcome + 'static) -> Self {
		Self {
			name: name.into(),
			body: Box::new(body),
		}
	}

	/// A case whose body completes before returning.
	pub fn sync(name: impl Into<String>, body: impl FnOnce() -> Result<(), Failure> + 'static) -> Self {
		Self::new(name, move || match body() {
			Ok(()) => Outcome::resolved(()),
			Err(failure) => Outcome::failed(failure),
		})
	}

	/// Case name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Starts the body. A panic fails the outcome instead of unwinding.
	pub(crate) fn start(self) -> Outcome {
		guarded(self.body)
	}
}

impl fmt::Debug for Case {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Case").field("name", &self.name).finish_non_exhaustive()
	}
}

/// Setup and teardown shared by the cases of one unit.
pub trait Fixture {
	/// Runs before the unit's first case.
	fn initialize(&mut self) -> Outcome {
		Outcome::resolved(())
	}

	/// Runs after the unit's last case, if `initialize` succeeded.
	fn finalize(&mut self) -> Outcome {
		Outcome::resolved(())
	}
}

/// Whether a unit carries lifecycle hooks, decided when the unit is built.
pub enum Lifecycle {
	/// No hooks.
	Plain,
	/// Hooks run around the unit's cases.
	Hooked(Box<dyn Fixture>),
}

impl fmt::Debug for Lifecycle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Plain => f.write_str("Plain"),
			Self::Hooked(_) => f.write_str("Hooked"),
		}
	}
}

/// A named group of cases.
#[derive(Debug)]
pub struct Unit {
	pub(crate) name: String,
	pub(crate) lifecycle: Lifecycle,
	pub(crate) cases: Vec<Case>,
}

impl Unit {
	/// A unit without hooks.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			lifecycle: Lifecycle::Plain,
			cases: Vec::new(),
		}
	}

	/// A unit whose cases run between `fixture`'s hooks.
	pub fn with_fixture(name: impl Into<String>, fixture: impl Fixture + 'static) -> Self {
		Self {
			lifecycle: Lifecycle::Hooked(Box::new(fixture)),
			..Self::new(name)
		}
	}

	/// Appends a case.
	pub fn case(mut self, case: Case) -> Self {
		self.cases.push(case);
		self
	}

	/// Unit name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The unit's hook capability.
	pub fn lifecycle(&self) -> &Lifecycle {
		&self.lifecycle
	}

	/// Number of cases.
	pub fn len(&self) -> usize {
		self.cases.len()
	}

	/// Returns true if the unit has no cases.
	pub fn is_empty(&self) -> bool {
		self.cases.is_empty()
	}
}

/// Runs `step`, turning a panic into a failed outcome.
pub(crate) fn guarded(step: impl FnOnce() -> Outcome) -> Outcome {
	panic::catch_unwind(AssertUnwindSafe(step)).unwrap_or_else(|payload| Outcome::failed(panicked(payload.as_ref())))
}

pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Failure {
	let message = payload
		.downcast_ref::<&str>()
		.map(|message| (*message).to_owned())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "non-string panic payload".to_owned());
	Failure::Panicked(message)
}
