//! Suite execution as a driven procedure.

use std::collections::VecDeque;
use std::mem;

use courier_deferred::{Deferred, Procedure, Resume, Suspend, drive};

use crate::failure::Failure;
use crate::result::{Reported, StopFlag, SuiteResult};
use crate::unit::{Case, Fixture, Lifecycle, Outcome, Unit, guarded};

#[cfg(test)]
mod tests;

/// An ordered list of units.
#[derive(Debug, Default)]
pub struct Suite {
	units: Vec<Unit>,
}

impl Suite {
	/// An empty suite.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a unit.
	pub fn unit(mut self, unit: Unit) -> Self {
		self.units.push(unit);
		self
	}

	/// Number of units.
	pub fn len(&self) -> usize {
		self.units.len()
	}

	/// Returns true if the suite has no units.
	pub fn is_empty(&self) -> bool {
		self.units.is_empty()
	}

	/// Total number of cases across all units.
	pub fn case_count(&self) -> usize {
		self.units.iter().map(Unit::len).sum()
	}

	/// Runs every unit in order and resolves with the aggregate result.
	///
	/// Each step starts only after the previous step's outcome settled. The
	/// flag is checked before every unit and every case; once raised, no
	/// further case starts, a unit that was initialized is still finalized,
	/// and the result is marked `should_stop`. Step failures are recorded in
	/// the result rather than failing the returned deferred.
	pub fn run(self, stop: &StopFlag) -> Deferred<SuiteResult, Failure> {
		tracing::info!(units = self.units.len(), "suite.run");
		drive(SuiteRun {
			units: self.units.into(),
			stop: stop.clone(),
			result: SuiteResult::default(),
			phase: Phase::Idle,
			active: None,
		})
	}
}

#[derive(Debug)]
enum Phase {
	Idle,
	Initializing,
	Running(String),
	Finalizing,
}

struct Active {
	name: String,
	fixture: Option<Box<dyn Fixture>>,
	cases: VecDeque<Case>,
	needs_finalize: bool,
}

struct SuiteRun {
	units: VecDeque<Unit>,
	stop: StopFlag,
	result: SuiteResult,
	phase: Phase,
	active: Option<Active>,
}

impl SuiteRun {
	fn record(&mut self, input: Resume<(), Failure>) {
		let outcome = match input {
			Resume::Start => return,
			Resume::Value(()) => Ok(()),
			Resume::Failed(failure) => Err(failure),
		};
		match mem::replace(&mut self.phase, Phase::Idle) {
			Phase::Idle => {}
			Phase::Initializing => {
				let Some(active) = self.active.as_mut() else {
					return;
				};
				match outcome {
					Ok(()) => active.needs_finalize = true,
					Err(failure) => {
						tracing::warn!(unit = %active.name, %failure, "suite.initialize_failed");
						active.cases.clear();
						let test = format!("{}::initialize", active.name);
						self.result.errors.push(Reported {
							test,
							message: failure.to_string(),
						});
					}
				}
			}
			Phase::Running(test) => match outcome {
				Ok(()) => self.result.successes += 1,
				Err(failure) => {
					tracing::debug!(%test, %failure, "suite.case_failed");
					let reported = Reported {
						test,
						message: failure.to_string(),
					};
					if failure.is_assertion() {
						self.result.failures.push(reported);
					} else {
						self.result.errors.push(reported);
					}
				}
			},
			Phase::Finalizing => {
				if let Some(active) = self.active.take()
					&& let Err(failure) = outcome
				{
					tracing::warn!(unit = %active.name, %failure, "suite.finalize_failed");
					self.result.errors.push(Reported {
						test: format!("{}::finalize", active.name),
						message: failure.to_string(),
					});
				}
			}
		}
	}

	fn next_step(&mut self) -> Suspend<(), SuiteResult, Failure> {
		loop {
			if let Some(active) = self.active.as_mut() {
				if self.stop.is_raised() && !active.cases.is_empty() {
					active.cases.clear();
					self.result.should_stop = true;
				}
				if let Some(case) = active.cases.pop_front() {
					let test = format!("{}::{}", active.name, case.name());
					tracing::debug!(%test, "suite.case");
					self.result.tests_run += 1;
					self.phase = Phase::Running(test);
					return Suspend::Await(case.start());
				}
				if active.needs_finalize {
					active.needs_finalize = false;
					if let Some(fixture) = active.fixture.as_mut() {
						self.phase = Phase::Finalizing;
						return Suspend::Await(guarded(|| fixture.finalize()));
					}
				}
				self.active = None;
				continue;
			}

			if self.stop.is_raised() {
				self.result.should_stop = true;
				tracing::info!(result = %self.result, "suite.stopped");
				return Suspend::Stop(mem::take(&mut self.result));
			}
			let Some(unit) = self.units.pop_front() else {
				tracing::info!(result = %self.result, "suite.finished");
				return Suspend::Return(mem::take(&mut self.result));
			};

			tracing::debug!(unit = %unit.name, cases = unit.cases.len(), "suite.unit");
			let mut active = Active {
				name: unit.name,
				fixture: None,
				cases: unit.cases.into(),
				needs_finalize: false,
			};
			match unit.lifecycle {
				Lifecycle::Plain => self.active = Some(active),
				Lifecycle::Hooked(mut fixture) => {
					let initialized: Outcome = guarded(|| fixture.initialize());
					active.fixture = Some(fixture);
					self.active = Some(active);
					self.phase = Phase::Initializing;
					return Suspend::Await(initialized);
				}
			}
		}
	}
}

impl Procedure for SuiteRun {
	type Item = ();
	type Output = SuiteResult;
	type Error = Failure;

	fn resume(&mut self, input: Resume<(), Failure>) -> Result<Suspend<(), SuiteResult, Failure>, Failure> {
		self.record(input);
		Ok(self.next_step())
	}
}
