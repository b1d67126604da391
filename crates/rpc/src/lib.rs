//! Remote object proxies over a point-to-point duplex channel.
//!
//! Objects registered with one [`Endpoint`] can be called from the endpoint at
//! the other end of the channel through a [`RemoteProxy`]:
//! * [`Endpoint`]: owns one channel end, a registry of local objects and the
//!   table of calls awaiting a response
//! * [`Remote`] / [`MethodTable`]: the per-type callable surface and handlers
//! * [`RemoteProxy`]: a plain, serializable reference usable from one endpoint
//! * [`Channel`]: the transport seam, with in-memory and socket implementations
//!
//! Sending is immediate. Receiving is not: inbound traffic is only observed
//! when the owner calls [`Endpoint::drain`], which dispatches calls and
//! settles the [`Reply`] deferreds of answered calls.

#![warn(missing_docs)]

pub mod channel;
mod config;
mod endpoint;
mod error;
mod id;
mod message;
mod proxy;
mod registry;
mod surface;
mod value;

pub use channel::{Channel, ChannelError, EncodedChannel, MemoryChannel};
#[cfg(unix)]
pub use channel::SocketChannel;
pub use config::EndpointConfig;
pub use endpoint::{CallContext, DrainReport, Endpoint, Reply};
pub use error::{Error, Result};
pub use id::{CallToken, EndpointToken, ProxyId, TokenGen};
pub use message::{CallMessage, Frame, ResponseMessage};
pub use proxy::{RemoteMethod, RemoteProxy};
pub use registry::Registered;
pub use surface::{Handler, MethodSpec, MethodTable, MethodTableBuilder, Remote, Surface};
pub use value::{Args, ObjectRef, Value};

/// Builds [`Args`] from positional values.
///
/// ```
/// let args = courier_rpc::args!["x", 3];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
	() => {
		$crate::Args::new()
	};
	($($value:expr),+ $(,)?) => {
		$crate::Args::from(vec![$($crate::Value::from($value)),+])
	};
}
