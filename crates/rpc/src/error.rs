//! Error taxonomy for registration, calls and delivery.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelError;
use crate::id::{CallToken, EndpointToken, ProxyId};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
///
/// Errors are plain data so a failed dispatch can travel back to the caller
/// inside a response and fail its [`crate::Reply`] with the same variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Error {
	/// No object with this identity is registered.
	#[error("unknown remote object {0}")]
	UnknownIdentity(ProxyId),
	/// The object this reference names was deregistered.
	#[error("remote object {0} was deregistered")]
	StaleReference(ProxyId),
	/// The name is not part of the object's callable surface.
	#[error("remote object {id} has no remote method `{method}`")]
	NoSuchRemoteMethod {
		/// Target identity.
		id: ProxyId,
		/// Requested method name.
		method: String,
	},
	/// A response arrived for a call token with no pending call.
	#[error("response for unknown call token {0}")]
	UnknownCallToken(CallToken),
	/// The endpoint was closed or its channel torn down.
	#[error("endpoint closed")]
	EndpointClosed,
	/// A call was used against its acknowledgement mode.
	#[error("remote method `{method}` is {}", ack_mode(.acknowledged))]
	AckMismatch {
		/// Method name.
		method: String,
		/// Whether the method is acknowledged.
		acknowledged: bool,
	},
	/// A proxy was invoked from an endpoint other than its routing endpoint.
	#[error("proxy routed through {route} used from endpoint {endpoint}")]
	WrongRoute {
		/// The proxy's routing token.
		route: EndpointToken,
		/// The endpoint it was invoked from.
		endpoint: EndpointToken,
	},
	/// The target object is already executing a call.
	#[error("remote object {0} is busy")]
	Busy(ProxyId),
	/// An explicit identity is already taken.
	#[error("identity {0} is already in use")]
	IdentityInUse(ProxyId),
	/// A handler rejected its arguments.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	/// A remote method failed.
	#[error("{0}")]
	Remote(String),
	/// The underlying channel failed.
	#[error(transparent)]
	Channel(#[from] ChannelError),
}

fn ack_mode(acknowledged: &bool) -> &'static str {
	if *acknowledged { "acknowledged" } else { "fire-and-forget" }
}

impl Error {
	/// Builds a [`Error::Remote`] from any displayable failure.
	pub fn remote(message: impl std::fmt::Display) -> Self {
		Self::Remote(message.to_string())
	}
}
