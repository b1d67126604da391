//! Reporting suite progress to a remote coordinator.

use std::rc::Rc;
use std::sync::LazyLock;

use courier_deferred::Deferred;
use courier_rpc::{Endpoint, MethodTable, Remote, RemoteProxy, Value, args};

use crate::failure::Failure;
use crate::result::{StopFlag, SuiteResult};
use crate::runner::Suite;

/// Receives progress from a suite running elsewhere.
///
/// Surface: `started(name)` (fire-and-forget) and `finished(summary)`
/// (acknowledged, returns `null`).
#[derive(Debug, Default)]
pub struct Coordinator {
	started: Vec<String>,
	summary: Option<Value>,
}

impl Coordinator {
	/// A coordinator that has heard nothing yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Names of the suites that announced themselves, in arrival order.
	pub fn started(&self) -> &[String] {
		&self.started
	}

	/// Last summary received through `finished`.
	pub fn summary(&self) -> Option<&Value> {
		self.summary.as_ref()
	}
}

impl Remote for Coordinator {
	fn methods() -> &'static MethodTable<Self> {
		static TABLE: LazyLock<MethodTable<Coordinator>> = LazyLock::new(|| {
			MethodTable::<Coordinator>::builder()
				.fire_and_forget("started", |coordinator, mut args, _| {
					let name = args.take(0)?;
					coordinator.started.push(name.as_str().unwrap_or_default().to_owned());
					Ok(Value::Null)
				})
				.acknowledged("finished", |coordinator, mut args, _| {
					coordinator.summary = Some(args.take(0)?);
					Ok(Value::Null)
				})
				.build()
		});
		&TABLE
	}
}

/// Remote handle on a running suite's [`StopFlag`].
///
/// Surface: `stop` (fire-and-forget).
#[derive(Debug)]
pub struct SuiteControl {
	stop: StopFlag,
}

impl SuiteControl {
	/// Control object raising `stop`.
	pub fn new(stop: StopFlag) -> Self {
		Self { stop }
	}
}

impl Remote for SuiteControl {
	fn methods() -> &'static MethodTable<Self> {
		static TABLE: LazyLock<MethodTable<SuiteControl>> = LazyLock::new(|| {
			MethodTable::<SuiteControl>::builder()
				.fire_and_forget("stop", |control, _, ctx| {
					tracing::info!(proxy_id = %ctx.target(), "suite.stop_requested");
					control.stop.raise();
					Ok(Value::Null)
				})
				.build()
		});
		&TABLE
	}
}

/// Runs `suite` and reports to `coordinator` through `endpoint`.
///
/// Sends `started(name)` before the first step, then once the run resolves
/// calls `finished(summary)` and resolves with the result after the
/// coordinator acknowledged it. Responses only arrive while the caller keeps
/// draining `endpoint`.
///
/// # Errors
///
/// The returned deferred fails with [`Failure::Rpc`] when either report
/// cannot be delivered or the coordinator answers `finished` with an error.
pub fn run_reporting(
	suite: Suite,
	stop: &StopFlag,
	endpoint: Rc<Endpoint>,
	coordinator: RemoteProxy,
	name: &str,
) -> Deferred<SuiteResult, Failure> {
	if let Err(error) = coordinator.notify(&endpoint, "started", args![name]) {
		return Deferred::failed(error.into());
	}
	suite.run(stop).add_callback(move |result: SuiteResult| -> Deferred<SuiteResult, Failure> {
		match coordinator.call(&endpoint, "finished", args![result.to_value()]) {
			Ok(reply) => reply.map_err(Failure::from).map(move |_| result),
			Err(error) => Deferred::failed(error.into()),
		}
	})
}
