use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{Channel, ChannelError};
use crate::id::EndpointToken;
use crate::message::Frame;

struct Duplex<M> {
	token: EndpointToken,
	peer: EndpointToken,
	tx: UnboundedSender<M>,
	rx: UnboundedReceiver<M>,
}

impl<M> Duplex<M> {
	fn pair() -> (Self, Self) {
		let (a_tx, b_rx) = unbounded_channel();
		let (b_tx, a_rx) = unbounded_channel();
		let a = EndpointToken::new();
		let b = EndpointToken::new();
		(
			Self {
				token: a,
				peer: b,
				tx: a_tx,
				rx: a_rx,
			},
			Self {
				token: b,
				peer: a,
				tx: b_tx,
				rx: b_rx,
			},
		)
	}

	fn send(&self, message: M) -> Result<(), ChannelError> {
		self.tx.send(message).map_err(|_| ChannelError::Disconnected)
	}

	fn drain(&mut self) -> Result<Vec<M>, ChannelError> {
		let mut out = Vec::new();
		loop {
			match self.rx.try_recv() {
				Ok(message) => out.push(message),
				Err(TryRecvError::Empty) => return Ok(out),
				Err(TryRecvError::Disconnected) if out.is_empty() => return Err(ChannelError::Disconnected),
				Err(TryRecvError::Disconnected) => return Ok(out),
			}
		}
	}
}

/// In-memory channel end carrying frames by value.
pub struct MemoryChannel {
	inner: Duplex<Frame>,
}

impl MemoryChannel {
	/// Creates both ends of a channel.
	pub fn pair() -> (Self, Self) {
		let (a, b) = Duplex::pair();
		(Self { inner: a }, Self { inner: b })
	}
}

impl Channel for MemoryChannel {
	fn token(&self) -> EndpointToken {
		self.inner.token
	}

	fn peer_token(&self) -> EndpointToken {
		self.inner.peer
	}

	fn send(&mut self, frame: Frame) -> Result<(), ChannelError> {
		self.inner.send(frame)
	}

	fn receive_all_pending(&mut self) -> Result<Vec<Frame>, ChannelError> {
		self.inner.drain()
	}
}

/// In-memory channel end carrying postcard-encoded frames.
///
/// Every frame crosses the codec, which makes this the in-process stand-in
/// for a byte transport.
///
/// As with a byte stream, the first frame that fails to decode ends the
/// channel: frames before it are delivered, later receives report the fault.
pub struct EncodedChannel {
	inner: Duplex<Vec<u8>>,
	fault: Option<ChannelError>,
}

impl EncodedChannel {
	/// Creates both ends of a channel.
	pub fn pair() -> (Self, Self) {
		let (a, b) = Duplex::pair();
		(Self { inner: a, fault: None }, Self { inner: b, fault: None })
	}
}

impl Channel for EncodedChannel {
	fn token(&self) -> EndpointToken {
		self.inner.token
	}

	fn peer_token(&self) -> EndpointToken {
		self.inner.peer
	}

	fn send(&mut self, frame: Frame) -> Result<(), ChannelError> {
		self.inner.send(frame.encode()?)
	}

	fn receive_all_pending(&mut self) -> Result<Vec<Frame>, ChannelError> {
		if let Some(fault) = &self.fault {
			return Err(fault.clone());
		}
		let mut frames = Vec::new();
		for bytes in self.inner.drain()? {
			match Frame::decode(&bytes) {
				Ok(frame) => frames.push(frame),
				Err(error) => {
					self.fault = Some(error);
					break;
				}
			}
		}
		match &self.fault {
			Some(fault) if frames.is_empty() => Err(fault.clone()),
			_ => Ok(frames),
		}
	}
}
