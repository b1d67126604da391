//! The duplex transport seam between two endpoints.
//!
//! A channel end sends frames without blocking and hands back every frame
//! that has already arrived without waiting for more. Delivery is FIFO and
//! reliable for as long as both ends are alive.

use std::io;

use serde::{Deserialize, Serialize};

use crate::id::EndpointToken;
use crate::message::Frame;

mod memory;
#[cfg(unix)]
mod socket;


pub use memory::{EncodedChannel, MemoryChannel};
#[cfg(unix)]
pub use socket::SocketChannel;

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ChannelError {
	/// The other end is gone.
	#[error("channel disconnected")]
	Disconnected,
	/// A frame could not be encoded or decoded.
	#[error("frame codec error: {0}")]
	Codec(String),
	/// A length prefix exceeded the frame size limit.
	#[error("frame of {0} bytes exceeds the size limit")]
	FrameTooLarge(usize),
	/// Any other I/O failure.
	#[error("channel I/O error: {0}")]
	Io(String),
}

impl From<io::Error> for ChannelError {
	fn from(error: io::Error) -> Self {
		match error.kind() {
			io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof => {
				Self::Disconnected
			}
			_ => Self::Io(error.to_string()),
		}
	}
}

/// One end of a duplex, message-oriented, FIFO channel.
///
/// Both ends of a pair know both routing tokens, so each side can name its
/// peer without a handshake.
pub trait Channel: Send {
	/// Routing token of this end.
	fn token(&self) -> EndpointToken;

	/// Routing token of the other end.
	fn peer_token(&self) -> EndpointToken;

	/// Queues `frame` for the peer without blocking.
	fn send(&mut self, frame: Frame) -> Result<(), ChannelError>;

	/// Returns every frame that has already arrived, in order.
	///
	/// Returns [`ChannelError::Disconnected`] only once the peer is gone and
	/// nothing is left to read.
	fn receive_all_pending(&mut self) -> Result<Vec<Frame>, ChannelError>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
	fn token(&self) -> EndpointToken {
		(**self).token()
	}

	fn peer_token(&self) -> EndpointToken {
		(**self).peer_token()
	}

	fn send(&mut self, frame: Frame) -> Result<(), ChannelError> {
		(**self).send(frame)
	}

	fn receive_all_pending(&mut self) -> Result<Vec<Frame>, ChannelError> {
		(**self).receive_all_pending()
	}
}
