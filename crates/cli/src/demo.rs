//! The suite `courier` runs: remote round trips against a hosted endpoint.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use courier_deferred::Deferred;
use courier_rpc::{Endpoint, EndpointConfig, MemoryChannel, ProxyId, Remote, RemoteProxy, Value, args};
use courier_suite::{Case, Coordinator, Failure, Fixture, Outcome, StopFlag, Suite, SuiteResult, Unit, run_reporting};
use courier_worker::HostedEndpoint;

use crate::config::{Config, RunConfig};

/// Starts a host, runs the configured suite against it and stops it again.
pub fn run(config: &Config) -> anyhow::Result<SuiteResult> {
	let (near, far) = MemoryChannel::pair();
	let coordinator_id = ProxyId::new();
	let mut host = HostedEndpoint::new(far, config.host.clone()).with_setup(move |endpoint| {
		if let Err(error) = endpoint.register_with_id(coordinator_id, Coordinator::new()) {
			tracing::error!(%error, "courier.coordinator_unavailable");
		}
	});

	let caller = Rc::new(Endpoint::new(near, EndpointConfig::named("driver")));
	let host_proxy = host.get_proxy(&caller);
	let coordinator = RemoteProxy::new(coordinator_id, caller.token(), Coordinator::methods().surface().clone());
	host.start()?;
	tracing::info!(host = %host.token(), units = config.run.units, operations = config.run.operations, "courier.started");

	let stop = StopFlag::new();
	let suite = build_suite(&config.run, &caller, &host_proxy, &stop);
	let done = run_reporting(suite, &stop, Rc::clone(&caller), coordinator, &config.host.name);
	let outcome = settle(&caller, &done, config.run.timeout(), config.host.drain_interval());

	if let Err(error) = host_proxy.notify(&caller, "stop", args![]) {
		tracing::warn!(%error, "courier.remote_stop_failed");
		host.stop();
	}
	let loops = host.join(config.host.grace_period())?;
	tracing::info!(loops, "courier.host_stopped");
	outcome
}

/// One unit per `run.units`, each with `run.operations` alternating
/// `ping` and `loops` round trips.
pub fn build_suite(run: &RunConfig, caller: &Rc<Endpoint>, host: &RemoteProxy, stop: &StopFlag) -> Suite {
	let finished = Rc::new(Cell::new(0usize));
	let mut suite = Suite::new();
	for unit_index in 0..run.units {
		let reachable = Reachable {
			caller: Rc::clone(caller),
			host: host.clone(),
		};
		let mut unit = Unit::with_fixture(format!("unit{unit_index}"), reachable);
		for op in 0..run.operations {
			let caller = Rc::clone(caller);
			let host = host.clone();
			let counted = Counted {
				finished: Rc::clone(&finished),
				stop_after: run.stop_after,
				stop: stop.clone(),
			};
			let case = if op % 2 == 0 {
				Case::new(format!("ping{op}"), move || counted.track(ping(&caller, &host)))
			} else {
				Case::new(format!("loops{op}"), move || counted.track(loops(&caller, &host)))
			};
			unit = unit.case(case);
		}
		suite = suite.unit(unit);
	}
	suite
}

struct Reachable {
	caller: Rc<Endpoint>,
	host: RemoteProxy,
}

impl Fixture for Reachable {
	fn initialize(&mut self) -> Outcome {
		ping(&self.caller, &self.host)
	}
}

struct Counted {
	finished: Rc<Cell<usize>>,
	stop_after: Option<usize>,
	stop: StopFlag,
}

impl Counted {
	fn track(self, outcome: Outcome) -> Outcome {
		outcome.add_both(move |result| {
			let finished = self.finished.get() + 1;
			self.finished.set(finished);
			if self.stop_after.is_some_and(|limit| finished >= limit) {
				self.stop.raise();
			}
			result
		})
	}
}

fn ping(caller: &Endpoint, host: &RemoteProxy) -> Outcome {
	match host.call(caller, "ping", args![]) {
		Ok(reply) => reply.map_err(Failure::from).add_callback(|value: Value| match value.as_str() {
			Some("pong") => Ok(()),
			_ => Err(Failure::assertion(format!("expected \"pong\", got {value:?}"))),
		}),
		Err(error) => Outcome::failed(error.into()),
	}
}

fn loops(caller: &Endpoint, host: &RemoteProxy) -> Outcome {
	match host.call(caller, "loops", args![]) {
		Ok(reply) => reply.map_err(Failure::from).add_callback(|value: Value| match value.as_int() {
			Some(count) if count >= 0 => Ok(()),
			_ => Err(Failure::assertion(format!("expected a loop count, got {value:?}"))),
		}),
		Err(error) => Outcome::failed(error.into()),
	}
}

/// Drains `endpoint` every `poll` until `done` settles.
pub fn settle<T: Clone + 'static>(
	endpoint: &Endpoint,
	done: &Deferred<T, Failure>,
	timeout: Duration,
	poll: Duration,
) -> anyhow::Result<T> {
	let deadline = Instant::now() + timeout;
	while done.is_pending() {
		let report = endpoint.drain()?;
		if let Some(fault) = report.fault {
			bail!("channel to the host failed: {fault}");
		}
		if report.disconnected && done.is_pending() {
			bail!("host went away before the suite finished");
		}
		if Instant::now() >= deadline {
			bail!("suite did not finish within {timeout:?}");
		}
		std::thread::sleep(poll);
	}
	let outcome = done.outcome().context("suite deferred settled without an outcome")?;
	Ok(outcome?)
}
