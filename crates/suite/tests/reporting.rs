use std::rc::Rc;

use courier_deferred::DeferredState;
use courier_rpc::{Endpoint, EndpointConfig, Error, MemoryChannel, Value};
use courier_suite::{Case, Coordinator, Failure, Outcome, StopFlag, Suite, SuiteControl, Unit, run_reporting};
use pretty_assertions::assert_eq;

fn endpoints() -> (Rc<Endpoint>, Endpoint) {
	let (a, b) = MemoryChannel::pair();
	(
		Rc::new(Endpoint::new(a, EndpointConfig::named("suite"))),
		Endpoint::new(b, EndpointConfig::named("coordinator")),
	)
}

fn two_cases() -> Suite {
	Suite::new().unit(
		Unit::new("unit")
			.case(Case::sync("passes", || Ok(())))
			.case(Case::sync("fails", || Err(Failure::assertion("expected")))),
	)
}

#[test]
fn summary_reaches_the_coordinator() {
	let (e, f) = endpoints();
	let coordinator = f.register(Coordinator::new());
	let proxy = coordinator.get_proxy(&e);

	let done = run_reporting(two_cases(), &StopFlag::new(), Rc::clone(&e), proxy, "nightly");
	assert!(done.is_pending());

	let served = f.drain().unwrap();
	assert_eq!(served.calls, 2);
	assert_eq!(coordinator.borrow().started(), ["nightly"]);
	let summary = coordinator.borrow().summary().cloned().unwrap();
	assert_eq!(summary.get("tests_run").and_then(Value::as_int), Some(2));
	assert_eq!(summary.get("successes").and_then(Value::as_int), Some(1));

	assert_eq!(done.state(), DeferredState::Pending);
	e.drain().unwrap();
	let result = done.value().unwrap();
	assert_eq!(result.tests_run, 2);
	assert_eq!(result.failures.len(), 1);
	assert!(!result.was_successful());
}

#[test]
fn unreachable_coordinator_fails_the_run() {
	let (e, f) = endpoints();
	let coordinator = f.register(Coordinator::new());
	let proxy = coordinator.get_proxy(&e);
	let id = coordinator.id();
	f.deregister(id).unwrap();

	let done = run_reporting(two_cases(), &StopFlag::new(), Rc::clone(&e), proxy, "nightly");
	f.drain().unwrap();
	e.drain().unwrap();

	assert_eq!(done.error(), Some(Failure::Rpc(Error::StaleReference(id))));
}

#[test]
fn closed_endpoint_fails_before_running() {
	let (e, f) = endpoints();
	let coordinator = f.register(Coordinator::new());
	let proxy = coordinator.get_proxy(&e);
	e.close();

	let ran = Rc::new(std::cell::Cell::new(false));
	let flag = Rc::clone(&ran);
	let suite = Suite::new().unit(Unit::new("unit").case(Case::sync("case", move || {
		flag.set(true);
		Ok(())
	})));

	let done = run_reporting(suite, &StopFlag::new(), e, proxy, "nightly");
	assert_eq!(done.error(), Some(Failure::Rpc(Error::EndpointClosed)));
	assert!(!ran.get());
}

#[test]
fn remote_stop_ends_the_run_early() {
	let (e, f) = endpoints();
	let coordinator = f.register(Coordinator::new());
	let coordinator_proxy = coordinator.get_proxy(&e);

	let stop = StopFlag::new();
	let control = e.register(SuiteControl::new(stop.clone()));
	let control_proxy = control.get_proxy(&f);

	let gate = Outcome::new();
	let first = gate.clone();
	let suite = Suite::new()
		.unit(Unit::new("slow").case(Case::new("waits", move || first)))
		.unit(Unit::new("later").case(Case::sync("skipped", || Ok(()))));

	let done = run_reporting(suite, &stop, Rc::clone(&e), coordinator_proxy, "stoppable");
	control_proxy.notify(&f, "stop", courier_rpc::args![]).unwrap();
	e.drain().unwrap();
	assert!(stop.is_raised());

	gate.resolve(()).unwrap();
	f.drain().unwrap();
	e.drain().unwrap();

	let result = done.value().unwrap();
	assert_eq!(result.tests_run, 1);
	assert!(result.should_stop);
	assert_eq!(
		coordinator.borrow().summary().and_then(|s| s.get("should_stop")).and_then(Value::as_bool),
		Some(true)
	);
}
