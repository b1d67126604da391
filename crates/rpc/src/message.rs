//! Wire messages and their postcard encoding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelError;
use crate::error::Error;
use crate::id::{CallToken, ProxyId};
use crate::value::Value;

/// A call addressed to a remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMessage {
	/// Target identity.
	pub target: ProxyId,
	/// Method name.
	pub method: String,
	/// Positional arguments, already rewritten for the receiver.
	pub args: Vec<Value>,
	/// Keyword arguments, already rewritten for the receiver.
	pub kwargs: IndexMap<String, Value>,
	/// Present iff the call is acknowledged.
	pub token: Option<CallToken>,
}

/// The answer to an acknowledged call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
	/// Token of the call being answered.
	pub token: CallToken,
	/// Result value or failure.
	pub outcome: Result<Value, Error>,
}

/// One message on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
	/// Call a remote object.
	Call(CallMessage),
	/// Answer an acknowledged call.
	Response(ResponseMessage),
}

impl Frame {
	/// Encodes the frame as postcard bytes.
	pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
		postcard::to_allocvec(self).map_err(|e| ChannelError::Codec(e.to_string()))
	}

	/// Decodes a frame from postcard bytes.
	pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
		postcard::from_bytes(bytes).map_err(|e| ChannelError::Codec(e.to_string()))
	}
}
