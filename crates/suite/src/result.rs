//! Run results and the should-stop flag.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use courier_rpc::Value;
use serde::{Deserialize, Serialize};

/// Shared should-stop flag, checked before every unit and case.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Rc<Cell<bool>>);

impl StopFlag {
	/// A lowered flag.
	pub fn new() -> Self {
		Self::default()
	}

	/// Raises the flag. There is no way to lower it again.
	pub fn raise(&self) {
		self.0.set(true);
	}

	/// Returns true once raised.
	pub fn is_raised(&self) -> bool {
		self.0.get()
	}
}

/// A failed or errored step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reported {
	/// `unit::case`, or `unit::initialize` / `unit::finalize` for hooks.
	pub test: String,
	/// Failure description.
	pub message: String,
}

/// Aggregate outcome of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteResult {
	/// Cases started.
	pub tests_run: usize,
	/// Cases that succeeded.
	pub successes: usize,
	/// Cases whose assertions failed.
	pub failures: Vec<Reported>,
	/// Cases and hooks that failed otherwise.
	pub errors: Vec<Reported>,
	/// The run ended early because the stop flag was raised.
	pub should_stop: bool,
}

impl SuiteResult {
	/// True when nothing failed or errored.
	pub fn was_successful(&self) -> bool {
		self.failures.is_empty() && self.errors.is_empty()
	}

	/// The result as a call payload.
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).map_or(Value::Null, Value::from)
	}
}

impl fmt::Display for SuiteResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let plural = if self.tests_run == 1 { "" } else { "s" };
		write!(f, "Ran {} test{plural}: ", self.tests_run)?;
		if self.was_successful() {
			f.write_str("OK")?;
		} else {
			f.write_str("FAILED (")?;
			let mut parts = Vec::new();
			if !self.failures.is_empty() {
				parts.push(format!("failures={}", self.failures.len()));
			}
			if !self.errors.is_empty() {
				parts.push(format!("errors={}", self.errors.len()));
			}
			write!(f, "{})", parts.join(", "))?;
		}
		if self.should_stop {
			f.write_str(" [stopped]")?;
		}
		Ok(())
	}
}
