//! Client-side references to remote objects.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, Reply};
use crate::error::{Error, Result};
use crate::id::{EndpointToken, ProxyId};
use crate::surface::{MethodSpec, Surface};
use crate::value::Args;

/// Immutable reference to an object owned by another endpoint.
///
/// A proxy does not keep its target alive. It is usable only from the
/// endpoint whose token it carries as its route, and only while the target
/// stays registered at the peer of that endpoint. Two proxies are equal when
/// identity and route match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProxy {
	id: ProxyId,
	route: EndpointToken,
	surface: Surface,
}

impl RemoteProxy {
	/// Builds a proxy from its parts.
	pub fn new(id: ProxyId, route: EndpointToken, surface: Surface) -> Self {
		Self { id, route, surface }
	}

	/// Identity of the target object.
	pub fn id(&self) -> ProxyId {
		self.id
	}

	/// Token of the endpoint this proxy must be used from.
	pub fn route(&self) -> EndpointToken {
		self.route
	}

	/// The target's callable surface.
	pub fn surface(&self) -> &Surface {
		&self.surface
	}

	/// Binds a method by name.
	///
	/// # Errors
	///
	/// Returns [`Error::NoSuchRemoteMethod`] when `name` is not in the surface.
	pub fn method(&self, name: &str) -> Result<RemoteMethod<'_>> {
		let spec = self.surface.get(name).ok_or_else(|| Error::NoSuchRemoteMethod {
			id: self.id,
			method: name.to_owned(),
		})?;
		Ok(RemoteMethod {
			proxy: self,
			name: name.to_owned(),
			spec,
		})
	}

	/// Calls an acknowledged method; see [`RemoteMethod::call`].
	pub fn call(&self, endpoint: &Endpoint, name: &str, args: Args) -> Result<Reply> {
		self.method(name)?.call(endpoint, args)
	}

	/// Sends a call without waiting for a result; see [`RemoteMethod::notify`].
	pub fn notify(&self, endpoint: &Endpoint, name: &str, args: Args) -> Result<()> {
		self.method(name)?.notify(endpoint, args)
	}

	pub(crate) fn rerouted(mut self, route: EndpointToken) -> Self {
		self.route = route;
		self
	}
}

impl PartialEq for RemoteProxy {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.route == other.route
	}
}

impl Eq for RemoteProxy {}

impl Hash for RemoteProxy {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
		self.route.hash(state);
	}
}

/// A method bound to a proxy.
#[derive(Debug, Clone)]
pub struct RemoteMethod<'a> {
	proxy: &'a RemoteProxy,
	name: String,
	spec: MethodSpec,
}

impl RemoteMethod<'_> {
	/// Method name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Whether the method produces a response.
	pub fn is_acknowledged(&self) -> bool {
		self.spec.acknowledged
	}

	/// Transmits the call in the mode the surface declares.
	///
	/// Returns the pending reply for acknowledged methods and `None` for
	/// fire-and-forget ones.
	pub fn invoke(&self, endpoint: &Endpoint, args: Args) -> Result<Option<Reply>> {
		endpoint.send_call(self.proxy.route, self.proxy.id, &self.name, args, self.spec.acknowledged)
	}

	/// Transmits an acknowledged call and returns its pending reply.
	///
	/// # Errors
	///
	/// Returns [`Error::AckMismatch`] for fire-and-forget methods, which
	/// never produce a reply. Nothing is sent in that case.
	pub fn call(&self, endpoint: &Endpoint, args: Args) -> Result<Reply> {
		if !self.spec.acknowledged {
			return Err(Error::AckMismatch {
				method: self.name.clone(),
				acknowledged: false,
			});
		}
		self.invoke(endpoint, args)?.ok_or(Error::EndpointClosed)
	}

	/// Transmits the call and discards any result.
	///
	/// On an acknowledged method the reply is still tracked; if it fails the
	/// failure is logged rather than dropped silently.
	pub fn notify(&self, endpoint: &Endpoint, args: Args) -> Result<()> {
		let Some(reply) = self.invoke(endpoint, args)? else {
			return Ok(());
		};
		let method = self.name.clone();
		let id = self.proxy.id;
		reply.when_settled(move |outcome| {
			if let Err(error) = outcome {
				tracing::warn!(proxy_id = %id, %method, %error, "rpc.notify.discarded_failure");
			}
		});
		Ok(())
	}
}
