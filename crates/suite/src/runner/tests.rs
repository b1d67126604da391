use std::cell::RefCell;
use std::rc::Rc;

use courier_deferred::DeferredState;
use pretty_assertions::assert_eq;

use super::*;

type Log = Rc<RefCell<Vec<String>>>;

fn logged(log: &Log, name: &str) -> Case {
	let log = Rc::clone(log);
	let entry = name.to_owned();
	Case::sync(name, move || {
		log.borrow_mut().push(entry);
		Ok(())
	})
}

fn gated(log: &Log, name: &str, gate: &Outcome) -> Case {
	let log = Rc::clone(log);
	let gate = gate.clone();
	let entry = name.to_owned();
	Case::new(name, move || {
		log.borrow_mut().push(entry);
		gate
	})
}

struct Hooks {
	log: Log,
	init: Outcome,
}

impl Fixture for Hooks {
	fn initialize(&mut self) -> Outcome {
		self.log.borrow_mut().push("initialize".into());
		self.init.clone()
	}

	fn finalize(&mut self) -> Outcome {
		self.log.borrow_mut().push("finalize".into());
		Outcome::resolved(())
	}
}

fn hooks(log: &Log) -> Hooks {
	Hooks {
		log: Rc::clone(log),
		init: Outcome::resolved(()),
	}
}

#[test]
fn steps_wait_for_the_previous_outcome() {
	let log = Log::default();
	let first = Outcome::new();
	let init = Outcome::new();
	let suite = Suite::new().unit(
		Unit::with_fixture(
			"unit",
			Hooks {
				log: Rc::clone(&log),
				init: init.clone(),
			},
		)
		.case(gated(&log, "first", &first))
		.case(logged(&log, "second")),
	);

	let done = suite.run(&StopFlag::new());
	assert_eq!(*log.borrow(), ["initialize"]);

	init.resolve(()).unwrap();
	assert_eq!(*log.borrow(), ["initialize", "first"]);
	assert!(done.is_pending());

	first.resolve(()).unwrap();
	assert_eq!(*log.borrow(), ["initialize", "first", "second", "finalize"]);

	let result = done.value().unwrap();
	assert_eq!(result.tests_run, 2);
	assert_eq!(result.successes, 2);
	assert!(result.was_successful());
	assert!(!result.should_stop);
}

#[test]
fn failures_and_errors_are_counted_separately() {
	let suite = Suite::new().unit(
		Unit::new("math")
			.case(Case::sync("ok", || Ok(())))
			.case(Case::sync("wrong", || Err(Failure::assertion("1 != 2"))))
			.case(Case::new("remote", || Outcome::failed(courier_rpc::Error::EndpointClosed.into()))),
	);

	let result = suite.run(&StopFlag::new()).value().unwrap();
	assert_eq!(result.tests_run, 3);
	assert_eq!(result.successes, 1);
	assert_eq!(
		result.failures,
		[Reported {
			test: "math::wrong".into(),
			message: "assertion failed: 1 != 2".into(),
		}]
	);
	assert_eq!(result.errors.len(), 1);
	assert_eq!(result.errors[0].test, "math::remote");
	assert_eq!(result.to_string(), "Ran 3 tests: FAILED (failures=1, errors=1)");
}

#[test]
fn panicking_case_is_an_error() {
	let suite = Suite::new().unit(
		Unit::new("unit")
			.case(Case::sync("boom", || panic!("kaboom")))
			.case(Case::sync("after", || Ok(()))),
	);

	let result = suite.run(&StopFlag::new()).value().unwrap();
	assert_eq!(result.tests_run, 2);
	assert_eq!(result.successes, 1);
	assert_eq!(result.errors[0].message, "panicked: kaboom");
}

#[test]
fn stop_between_units_skips_the_rest() {
	let log = Log::default();
	let stop = StopFlag::new();
	let flag = stop.clone();
	let suite = Suite::new()
		.unit(Unit::new("first").case(Case::sync("raise", move || {
			flag.raise();
			Ok(())
		})))
		.unit(Unit::new("second").case(logged(&log, "never")));

	let result = suite.run(&stop).value().unwrap();
	assert!(log.borrow().is_empty());
	assert_eq!(result.tests_run, 1);
	assert!(result.should_stop);
	assert_eq!(result.to_string(), "Ran 1 test: OK [stopped]");
}

#[test]
fn stop_mid_unit_still_finalizes() {
	let log = Log::default();
	let gate = Outcome::new();
	let stop = StopFlag::new();
	let suite = Suite::new().unit(
		Unit::with_fixture("unit", hooks(&log))
			.case(gated(&log, "running", &gate))
			.case(logged(&log, "skipped")),
	);

	let done = suite.run(&stop);
	stop.raise();
	gate.resolve(()).unwrap();

	assert_eq!(*log.borrow(), ["initialize", "running", "finalize"]);
	let result = done.value().unwrap();
	assert_eq!(result.tests_run, 1);
	assert!(result.should_stop);
}

#[test]
fn raised_before_start_runs_nothing() {
	let log = Log::default();
	let stop = StopFlag::new();
	stop.raise();
	let suite = Suite::new().unit(Unit::with_fixture("unit", hooks(&log)).case(logged(&log, "case")));

	let result = suite.run(&stop).value().unwrap();
	assert!(log.borrow().is_empty());
	assert_eq!(result.tests_run, 0);
	assert!(result.should_stop);
}

#[test]
fn failed_initialize_skips_cases_and_finalize() {
	let log = Log::default();
	let suite = Suite::new()
		.unit(
			Unit::with_fixture(
				"broken",
				Hooks {
					log: Rc::clone(&log),
					init: Outcome::failed(Failure::assertion("no database")),
				},
			)
			.case(logged(&log, "skipped")),
		)
		.unit(Unit::new("next").case(logged(&log, "runs")));

	let result = suite.run(&StopFlag::new()).value().unwrap();
	assert_eq!(*log.borrow(), ["initialize", "runs"]);
	assert_eq!(result.tests_run, 1);
	assert_eq!(result.errors[0].test, "broken::initialize");
	assert!(result.failures.is_empty());
}

#[test]
fn empty_suite_resolves_immediately() {
	let done = Suite::new().run(&StopFlag::new());
	assert_eq!(done.state(), DeferredState::Resolved);
	assert_eq!(done.value().unwrap().to_string(), "Ran 0 tests: OK");
}

#[test]
fn result_converts_to_a_map_value() {
	let result = SuiteResult {
		tests_run: 2,
		successes: 2,
		..SuiteResult::default()
	};
	let value = result.to_value();
	assert_eq!(value.get("tests_run").and_then(|v| v.as_int()), Some(2));
	assert_eq!(value.get("should_stop").and_then(|v| v.as_bool()), Some(false));
}
