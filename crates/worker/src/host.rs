//! An endpoint driven by its own thread.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use courier_rpc::{
	Channel, Endpoint, EndpointConfig, EndpointToken, MethodTable, ProxyId, Remote, RemoteProxy, Surface, Value,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::HostConfig;
use crate::error::HostError;
use crate::spawn::spawn_named_thread;


const JOIN_POLL: Duration = Duration::from_millis(5);

/// Runs on the host thread once the endpoint exists, before the first drain.
pub type Setup = Box<dyn FnOnce(&Endpoint) + Send>;

#[derive(Debug, Default)]
struct HostState {
	loops: AtomicU64,
	stop: CancellationToken,
}

/// The hosted endpoint's own remote object.
///
/// Surface: `loops` (acknowledged, iteration count), `stop`
/// (fire-and-forget), `ping` (acknowledged, returns `"pong"`).
#[derive(Debug)]
pub struct HostObject {
	state: Arc<HostState>,
}

impl Remote for HostObject {
	fn methods() -> &'static MethodTable<Self> {
		static TABLE: LazyLock<MethodTable<HostObject>> = LazyLock::new(|| {
			MethodTable::<HostObject>::builder()
				.acknowledged("loops", |host, _, _| Ok(Value::from(host.state.loops.load(Ordering::Acquire))))
				.fire_and_forget("stop", |host, _, ctx| {
					tracing::info!(proxy_id = %ctx.target(), "worker.host.stop_requested");
					host.state.stop.cancel();
					Ok(Value::Null)
				})
				.acknowledged("ping", |_, _, _| Ok(Value::from("pong")))
				.build()
		});
		&TABLE
	}
}

struct Launch {
	channel: Box<dyn Channel>,
	setup: Option<Setup>,
}

/// A channel endpoint scheduled on a dedicated named thread.
///
/// The host thread builds a current-thread tokio runtime, registers a
/// [`HostObject`] under [`HostedEndpoint::proxy_id`] and drains the endpoint
/// every [`HostConfig::drain_interval`] until stopped or its channel ends.
/// A channel failure other than a disconnect ends the host with
/// [`HostError::Endpoint`].
///
/// The identity is minted up front, so proxies can be handed out and calls
/// queued before [`HostedEndpoint::start`].
pub struct HostedEndpoint {
	config: HostConfig,
	proxy_id: ProxyId,
	token: EndpointToken,
	state: Arc<HostState>,
	launch: Option<Launch>,
	thread: Option<JoinHandle<Result<u64, HostError>>>,
}

impl HostedEndpoint {
	/// Prepares a host for `channel` without starting it.
	pub fn new(channel: impl Channel + 'static, config: HostConfig) -> Self {
		let token = channel.token();
		Self {
			config,
			proxy_id: ProxyId::new(),
			token,
			state: Arc::new(HostState::default()),
			launch: Some(Launch {
				channel: Box::new(channel),
				setup: None,
			}),
			thread: None,
		}
	}

	/// Adds a closure run on the host thread before the first drain.
	///
	/// Ignored once the host has started.
	pub fn with_setup(mut self, setup: impl FnOnce(&Endpoint) + Send + 'static) -> Self {
		if let Some(launch) = self.launch.as_mut() {
			launch.setup = Some(Box::new(setup));
		}
		self
	}

	/// Identity of the host object.
	pub fn proxy_id(&self) -> ProxyId {
		self.proxy_id
	}

	/// Routing token of the hosted endpoint.
	pub fn token(&self) -> EndpointToken {
		self.token
	}

	/// Callable surface of the host object.
	pub fn surface(&self) -> &Surface {
		HostObject::methods().surface()
	}

	/// Proxy for calling the host object from `caller`, the endpoint at the
	/// other end of the hosted channel.
	pub fn get_proxy(&self, caller: &Endpoint) -> RemoteProxy {
		if caller.peer_token() != self.token {
			tracing::warn!(caller = %caller.token(), host = %self.token, "worker.host.proxy_for_unconnected_endpoint");
		}
		RemoteProxy::new(self.proxy_id, caller.token(), self.surface().clone())
	}

	/// Number of drain iterations so far.
	pub fn loops(&self) -> u64 {
		self.state.loops.load(Ordering::Acquire)
	}

	/// Returns true between a successful start and thread exit.
	pub fn is_alive(&self) -> bool {
		self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
	}

	/// Spawns the host thread.
	///
	/// # Errors
	///
	/// [`HostError::AlreadyStarted`] on a second call, [`HostError::Spawn`]
	/// if the thread cannot be created.
	pub fn start(&mut self) -> Result<(), HostError> {
		let launch = self.launch.take().ok_or(HostError::AlreadyStarted)?;
		let config = self.config.clone();
		let state = Arc::clone(&self.state);
		let id = self.proxy_id;
		let thread = spawn_named_thread(self.config.name.clone(), move || run(launch, config, id, state))
			.map_err(HostError::Spawn)?;
		self.thread = Some(thread);
		Ok(())
	}

	/// Asks the host loop to stop after its current iteration.
	pub fn stop(&self) {
		self.state.stop.cancel();
	}

	/// Waits up to `grace` for the host thread to finish.
	///
	/// Returns the number of drain iterations performed. On
	/// [`HostError::GraceExpired`] the host is left running and may be joined
	/// again.
	pub fn join(&mut self, grace: Duration) -> Result<u64, HostError> {
		let thread = self.thread.take().ok_or(HostError::NotStarted)?;
		let deadline = Instant::now() + grace;
		while !thread.is_finished() {
			if Instant::now() >= deadline {
				self.thread = Some(thread);
				return Err(HostError::GraceExpired(grace));
			}
			std::thread::sleep(JOIN_POLL);
		}
		match thread.join() {
			Ok(outcome) => outcome,
			Err(payload) => Err(HostError::Panicked(panic_message(payload))),
		}
	}

	/// Stops the host and waits for it within the configured grace period.
	pub fn shutdown(&mut self) -> Result<u64, HostError> {
		self.stop();
		self.join(self.config.grace_period())
	}
}

impl Drop for HostedEndpoint {
	fn drop(&mut self) {
		if self.thread.is_some() {
			self.state.stop.cancel();
		}
	}
}

impl std::fmt::Debug for HostedEndpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HostedEndpoint")
			.field("name", &self.config.name)
			.field("proxy_id", &self.proxy_id)
			.field("token", &self.token)
			.field("alive", &self.is_alive())
			.field("loops", &self.loops())
			.finish()
	}
}

fn run(launch: Launch, config: HostConfig, id: ProxyId, state: Arc<HostState>) -> Result<u64, HostError> {
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_time()
		.build()
		.map_err(HostError::Runtime)?;

	let Launch { channel, setup } = launch;
	let endpoint = Endpoint::from_boxed(channel, EndpointConfig::named(config.name.clone()));
	endpoint.register_with_id(
		id,
		HostObject {
			state: Arc::clone(&state),
		},
	)?;
	if let Some(setup) = setup {
		setup(&endpoint);
	}

	tracing::debug!(name = %config.name, proxy_id = %id, "worker.host.started");
	let outcome = runtime.block_on(async {
		let mut ticks = tokio::time::interval(config.drain_interval());
		ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				biased;
				() = state.stop.cancelled() => break Ok(()),
				_ = ticks.tick() => {}
			}
			state.loops.fetch_add(1, Ordering::AcqRel);
			match endpoint.drain() {
				Ok(report) => {
					if let Some(fault) = report.fault {
						break Err(courier_rpc::Error::from(fault));
					}
					if report.disconnected {
						break Ok(());
					}
				}
				Err(error) => break Err(error),
			}
		}
	});
	endpoint.close();

	let loops = state.loops.load(Ordering::Acquire);
	tracing::debug!(name = %config.name, loops, "worker.host.finished");
	outcome?;
	Ok(loops)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		return (*message).to_owned();
	}
	match payload.downcast::<String>() {
		Ok(message) => *message,
		Err(_) => "non-string panic payload".to_owned(),
	}
}
