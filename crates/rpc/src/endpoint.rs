//! One end of a duplex channel: local registry, outbound calls and drain.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use courier_deferred::Deferred;

use crate::channel::{Channel, ChannelError};
use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::id::{CallToken, EndpointToken, ProxyId, TokenGen};
use crate::message::{CallMessage, Frame, ResponseMessage};
use crate::registry::{Registered, Registry};
use crate::surface::Remote;
use crate::value::{Args, ObjectRef, Value};


/// Pending result of an acknowledged call.
pub type Reply = Deferred<Value, Error>;

/// What one [`Endpoint::drain`] observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
	/// Inbound calls dispatched.
	pub calls: usize,
	/// Inbound responses matched against pending calls.
	pub responses: usize,
	/// Calls that failed and responses that matched nothing.
	pub errors: usize,
	/// The peer went away; the endpoint is now closed.
	pub disconnected: bool,
	/// The channel failed for another reason; the endpoint is now closed.
	pub fault: Option<ChannelError>,
}

impl DrainReport {
	/// Returns true if this drain closed the endpoint.
	pub fn closed(&self) -> bool {
		self.disconnected || self.fault.is_some()
	}
}

/// What a handler knows about the call it is serving.
pub struct CallContext<'a> {
	endpoint: &'a Endpoint,
	target: ProxyId,
	method: &'a str,
}

impl<'a> CallContext<'a> {
	/// The endpoint dispatching the call.
	pub fn endpoint(&self) -> &'a Endpoint {
		self.endpoint
	}

	/// Identity of the object being called.
	pub fn target(&self) -> ProxyId {
		self.target
	}

	/// Method name being called.
	pub fn method(&self) -> &str {
		self.method
	}
}

/// Owner of one channel end and of the objects reachable through it.
///
/// Sends go out immediately. Nothing inbound is observed until
/// [`Endpoint::drain`] runs, so the owner decides when dispatch side effects
/// and reply settlement happen. An endpoint is confined to the thread that
/// drives it.
pub struct Endpoint {
	token: EndpointToken,
	peer: EndpointToken,
	span: tracing::Span,
	channel: RefCell<Option<Box<dyn Channel>>>,
	registry: RefCell<Registry>,
	pending: RefCell<BTreeMap<CallToken, Reply>>,
	tokens: Cell<TokenGen>,
}

impl Endpoint {
	/// Binds an endpoint to `channel`.
	pub fn new(channel: impl Channel + 'static, config: EndpointConfig) -> Self {
		Self::from_boxed(Box::new(channel), config)
	}

	/// Binds an endpoint to an already boxed channel.
	pub fn from_boxed(channel: Box<dyn Channel>, config: EndpointConfig) -> Self {
		let token = channel.token();
		let peer = channel.peer_token();
		let span = config.span(token);
		span.in_scope(|| tracing::debug!(%peer, "rpc.endpoint.bound"));
		Self {
			token,
			peer,
			span,
			channel: RefCell::new(Some(channel)),
			registry: RefCell::new(Registry::default()),
			pending: RefCell::new(BTreeMap::new()),
			tokens: Cell::new(TokenGen::new()),
		}
	}

	/// This endpoint's routing token.
	pub fn token(&self) -> EndpointToken {
		self.token
	}

	/// The routing token of the endpoint at the other end.
	pub fn peer_token(&self) -> EndpointToken {
		self.peer
	}

	/// Returns true once the channel was closed or lost.
	pub fn is_closed(&self) -> bool {
		self.channel.borrow().is_none()
	}

	/// Number of acknowledged calls still waiting for a response.
	pub fn pending_calls(&self) -> usize {
		self.pending.borrow().len()
	}

	/// Number of registered objects.
	pub fn registered_count(&self) -> usize {
		self.registry.borrow().len()
	}

	/// Registers `object` under a fresh identity.
	pub fn register<T: Remote>(&self, object: T) -> Registered<T> {
		let id = ProxyId::new();
		let object = Rc::new(RefCell::new(object));
		self.registry.borrow_mut().put(id, Rc::clone(&object));
		self.span.in_scope(|| tracing::debug!(proxy_id = %id, "rpc.register"));
		Registered::new(id, self.token, object)
	}

	/// Registers `object` under an identity chosen by the caller.
	///
	/// # Errors
	///
	/// Returns [`Error::IdentityInUse`] if `id` is registered here or was
	/// registered before; identities are never reused.
	pub fn register_with_id<T: Remote>(&self, id: ProxyId, object: T) -> Result<Registered<T>> {
		let mut registry = self.registry.borrow_mut();
		if registry.is_known(id) {
			return Err(Error::IdentityInUse(id));
		}
		let object = Rc::new(RefCell::new(object));
		registry.put(id, Rc::clone(&object));
		self.span.in_scope(|| tracing::debug!(proxy_id = %id, "rpc.register"));
		Ok(Registered::new(id, self.token, object))
	}

	/// Removes an object; later calls to it fail with [`Error::StaleReference`].
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownIdentity`] if `id` is not registered.
	pub fn deregister(&self, id: ProxyId) -> Result<()> {
		self.registry.borrow_mut().remove(id)?;
		self.span.in_scope(|| tracing::debug!(proxy_id = %id, "rpc.deregister"));
		Ok(())
	}

	/// Returns true if `id` is currently registered.
	pub fn is_registered(&self, id: ProxyId) -> bool {
		self.registry.borrow().contains(id)
	}

	/// Resolves a registered object of type `T` by identity.
	pub fn object<T: Remote>(&self, id: ProxyId) -> Option<Registered<T>> {
		let object = self.registry.borrow().downcast::<T>(id)?;
		Some(Registered::new(id, self.token, object))
	}

	/// Resolves a local object reference received as an argument.
	pub fn resolve<T: Remote>(&self, object: &ObjectRef) -> Option<Registered<T>> {
		if object.owner() != self.token {
			return None;
		}
		self.object(object.id())
	}

	/// Transmits a call to `target` through this endpoint's channel.
	///
	/// `route` is the routing token carried by the proxy being invoked and
	/// must be this endpoint's own. Object references inside `args` are
	/// rewritten for the peer before sending. Acknowledged calls return a
	/// pending [`Reply`] that settles during a later [`Endpoint::drain`].
	///
	/// # Errors
	///
	/// [`Error::EndpointClosed`] after close, [`Error::WrongRoute`] for a
	/// foreign proxy, [`Error::InvalidArgument`] when `args` hold a reference
	/// the peer could not use, [`Error::Channel`] when the frame cannot be
	/// sent. Nothing is sent on error.
	pub fn send_call(
		&self,
		route: EndpointToken,
		target: ProxyId,
		method: &str,
		args: Args,
		acknowledged: bool,
	) -> Result<Option<Reply>> {
		let _span = self.span.enter();
		if self.is_closed() {
			return Err(Error::EndpointClosed);
		}
		if route != self.token {
			return Err(Error::WrongRoute {
				route,
				endpoint: self.token,
			});
		}

		let Args { positional, keywords } = args;
		let args = positional
			.into_iter()
			.map(|value| self.export(value))
			.collect::<Result<_>>()?;
		let kwargs = keywords
			.into_iter()
			.map(|(name, value)| Ok((name, self.export(value)?)))
			.collect::<Result<_>>()?;
		let token = acknowledged.then(|| self.next_token());
		let reply = token.map(|token| {
			let reply = Reply::new();
			self.pending.borrow_mut().insert(token, reply.clone());
			reply
		});

		tracing::debug!(proxy_id = %target, method, ?token, "rpc.send_call");
		let frame = Frame::Call(CallMessage {
			target,
			method: method.to_owned(),
			args,
			kwargs,
			token,
		});
		if let Err(error) = self.transmit(frame) {
			if let Some(token) = token {
				self.pending.borrow_mut().remove(&token);
			}
			return Err(error);
		}
		Ok(reply)
	}

	/// Receives and handles everything already buffered on the channel.
	///
	/// Calls are dispatched against the registry; acknowledged ones are
	/// answered immediately. Responses settle their pending replies. Never
	/// waits for more input.
	///
	/// A disconnected peer closes the endpoint and is reported in
	/// [`DrainReport::disconnected`]. Any other channel failure is fatal as
	/// well: the endpoint closes and the failure lands in
	/// [`DrainReport::fault`]. Either way pending replies fail with
	/// [`Error::EndpointClosed`].
	///
	/// # Panics
	///
	/// A reply callback that panics is re-raised once the rest of the batch
	/// has been handled.
	///
	/// # Errors
	///
	/// [`Error::EndpointClosed`] if the endpoint was already closed.
	pub fn drain(&self) -> Result<DrainReport> {
		let _span = self.span.enter();
		let received = {
			let mut channel = self.channel.borrow_mut();
			let Some(channel) = channel.as_mut() else {
				return Err(Error::EndpointClosed);
			};
			channel.receive_all_pending()
		};

		let mut report = DrainReport::default();
		let frames = match received {
			Ok(frames) => frames,
			Err(ChannelError::Disconnected) => {
				tracing::info!("rpc.drain.disconnected");
				report.disconnected = true;
				self.close();
				return Ok(report);
			}
			Err(error) => {
				tracing::error!(%error, "rpc.drain.channel_failed");
				report.fault = Some(error);
				self.close();
				return Ok(report);
			}
		};

		let mut callback_panic = None;
		for frame in frames {
			match frame {
				Frame::Call(call) => {
					report.calls += 1;
					if !self.dispatch(call) {
						report.errors += 1;
					}
				}
				Frame::Response(response) => {
					report.responses += 1;
					match panic::catch_unwind(AssertUnwindSafe(|| self.complete(response))) {
						Ok(Ok(())) => {}
						Ok(Err(error)) => {
							tracing::warn!(%error, "rpc.drain.response_dropped");
							report.errors += 1;
						}
						Err(payload) => {
							tracing::error!("rpc.drain.reply_callback_panicked");
							callback_panic.get_or_insert(payload);
						}
					}
				}
			}
		}
		if report.calls + report.responses > 0 {
			tracing::trace!(calls = report.calls, responses = report.responses, errors = report.errors, "rpc.drain");
		}
		if let Some(payload) = callback_panic {
			panic::resume_unwind(payload);
		}
		Ok(report)
	}

	/// Tears down the channel and fails every pending reply with
	/// [`Error::EndpointClosed`]. Registered objects stay registered.
	///
	/// Closing twice is a no-op. A reply callback that panics is re-raised
	/// after every other pending reply has failed.
	pub fn close(&self) {
		let Some(channel) = self.channel.borrow_mut().take() else {
			return;
		};
		drop(channel);
		let pending = std::mem::take(&mut *self.pending.borrow_mut());
		self.span
			.in_scope(|| tracing::debug!(pending = pending.len(), "rpc.close"));
		let mut callback_panic = None;
		for reply in pending.into_values() {
			match panic::catch_unwind(AssertUnwindSafe(|| reply.fail(Error::EndpointClosed))) {
				Ok(Ok(())) => {}
				Ok(Err(_)) => tracing::error!("rpc.close reply already settled"),
				Err(payload) => {
					callback_panic.get_or_insert(payload);
				}
			}
		}
		if let Some(payload) = callback_panic {
			panic::resume_unwind(payload);
		}
	}

	fn next_token(&self) -> CallToken {
		let mut tokens = self.tokens.get();
		let token = tokens.mint();
		self.tokens.set(tokens);
		token
	}

	fn transmit(&self, frame: Frame) -> Result<()> {
		let mut channel = self.channel.borrow_mut();
		let channel = channel.as_mut().ok_or(Error::EndpointClosed)?;
		channel.send(frame)?;
		Ok(())
	}

	/// Returns false when the call failed.
	fn dispatch(&self, call: CallMessage) -> bool {
		let CallMessage {
			target,
			method,
			args,
			kwargs,
			token,
		} = call;
		let args = Args {
			positional: args.into_iter().map(|value| self.import(value)).collect(),
			keywords: kwargs.into_iter().map(|(name, value)| (name, self.import(value))).collect(),
		};

		let outcome = self.invoke(target, &method, args);
		match (&outcome, token) {
			(Ok(_), _) => tracing::trace!(proxy_id = %target, %method, "rpc.dispatch"),
			(Err(error), Some(token)) => {
				tracing::debug!(proxy_id = %target, %method, %token, %error, "rpc.dispatch.failed")
			}
			(Err(error), None) => tracing::warn!(proxy_id = %target, %method, %error, "rpc.dispatch.failed"),
		}

		let Some(token) = token else {
			return outcome.is_ok();
		};
		let outcome = outcome.and_then(|value| {
			self.export(value)
				.inspect_err(|error| tracing::warn!(proxy_id = %target, %method, %error, "rpc.respond.unexportable"))
		});
		let ok = outcome.is_ok();
		if let Err(error) = self.transmit(Frame::Response(ResponseMessage { token, outcome })) {
			tracing::warn!(%token, %error, "rpc.respond.failed");
		}
		ok
	}

	fn invoke(&self, target: ProxyId, method: &str, args: Args) -> Result<Value> {
		let object = self.registry.borrow().lookup(target)?;
		let ctx = CallContext {
			endpoint: self,
			target,
			method,
		};
		panic::catch_unwind(AssertUnwindSafe(|| object.dispatch(target, method, args, &ctx)))
			.unwrap_or_else(|payload| Err(Error::Remote(panic_message(payload.as_ref()))))
	}

	fn complete(&self, response: ResponseMessage) -> Result<()> {
		let ResponseMessage { token, outcome } = response;
		let Some(reply) = self.pending.borrow_mut().remove(&token) else {
			return Err(Error::UnknownCallToken(token));
		};
		let outcome = outcome.map(|value| self.import(value));
		if reply.settle(outcome).is_err() {
			tracing::error!(%token, "rpc.reply already settled");
		}
		Ok(())
	}

	/// Rewrites references for the peer before they leave this endpoint.
	///
	/// Objects owned by another endpoint and proxies routed through another
	/// endpoint cannot be rewritten and are rejected; they never cross by value.
	fn export(&self, value: Value) -> Result<Value> {
		Ok(match value {
			Value::Object(object) if object.owner() == self.token => Value::Proxy(object.into_proxy(self.peer)),
			Value::Object(object) => {
				return Err(Error::InvalidArgument(format!(
					"object {} is owned by endpoint {}, not {}",
					object.id(),
					object.owner(),
					self.token
				)));
			}
			Value::Proxy(proxy) if proxy.route() == self.token => Value::Proxy(proxy.rerouted(self.peer)),
			Value::Proxy(proxy) => {
				return Err(Error::InvalidArgument(format!(
					"proxy for {} is routed through endpoint {}, not {}",
					proxy.id(),
					proxy.route(),
					self.token
				)));
			}
			Value::List(items) => Value::List(
				items
					.into_iter()
					.map(|value| self.export(value))
					.collect::<Result<_>>()?,
			),
			Value::Map(entries) => Value::Map(
				entries
					.into_iter()
					.map(|(key, value)| Ok((key, self.export(value)?)))
					.collect::<Result<_>>()?,
			),
			other => other,
		})
	}

	/// Turns proxies naming objects registered here back into local references.
	fn import(&self, value: Value) -> Value {
		match value {
			Value::Proxy(proxy) if proxy.route() == self.token => {
				let surface = self.registry.borrow().surface_of(proxy.id());
				match surface {
					Some(surface) => Value::Object(ObjectRef::new(proxy.id(), self.token, surface)),
					None => Value::Proxy(proxy),
				}
			}
			Value::List(items) => Value::List(items.into_iter().map(|value| self.import(value)).collect()),
			Value::Map(entries) => {
				Value::Map(entries.into_iter().map(|(key, value)| (key, self.import(value))).collect())
			}
			other => other,
		}
	}
}

impl Drop for Endpoint {
	fn drop(&mut self) {
		self.close();
	}
}

impl fmt::Debug for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Endpoint")
			.field("token", &self.token)
			.field("peer", &self.peer)
			.field("closed", &self.is_closed())
			.field("pending", &self.pending_calls())
			.field("registered", &self.registered_count())
			.finish()
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		return format!("remote method panicked: {message}");
	}
	if let Some(message) = payload.downcast_ref::<String>() {
		return format!("remote method panicked: {message}");
	}
	"remote method panicked".to_owned()
}
