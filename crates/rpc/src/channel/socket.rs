use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;

use super::{Channel, ChannelError};
use crate::id::EndpointToken;
use crate::message::Frame;

/// Upper bound on one encoded frame.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Channel end over a non-blocking Unix stream socket.
///
/// Frames are postcard-encoded and prefixed with their length as a `u32`
/// little endian. Writes that the socket cannot take immediately stay in an
/// outbox that is flushed on every later send or receive.
///
/// A frame that cannot be decoded desynchronises the stream. Frames read
/// before it are still delivered; from then on the channel only reports the
/// fault.
#[derive(Debug)]
pub struct SocketChannel {
	token: EndpointToken,
	peer: EndpointToken,
	stream: UnixStream,
	inbox: Vec<u8>,
	outbox: Vec<u8>,
	eof: bool,
	fault: Option<ChannelError>,
}

impl SocketChannel {
	/// Creates both ends over a fresh socket pair.
	pub fn pair() -> io::Result<(Self, Self)> {
		let (a, b) = UnixStream::pair()?;
		let a_token = EndpointToken::new();
		let b_token = EndpointToken::new();
		Ok((Self::from_stream(a, a_token, b_token)?, Self::from_stream(b, b_token, a_token)?))
	}

	/// Wraps an already connected stream.
	///
	/// Both sides must agree on the two tokens, e.g. by passing them to a
	/// child process next to the inherited socket.
	pub fn from_stream(stream: UnixStream, token: EndpointToken, peer: EndpointToken) -> io::Result<Self> {
		stream.set_nonblocking(true)?;
		Ok(Self {
			token,
			peer,
			stream,
			inbox: Vec::new(),
			outbox: Vec::new(),
			eof: false,
			fault: None,
		})
	}

	fn flush(&mut self) -> Result<(), ChannelError> {
		while !self.outbox.is_empty() {
			match self.stream.write(&self.outbox) {
				Ok(0) => return Err(ChannelError::Disconnected),
				Ok(n) => {
					self.outbox.drain(..n);
				}
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => return Err(e.into()),
			}
		}
		Ok(())
	}

	fn fill(&mut self) -> Result<(), ChannelError> {
		let mut chunk = [0u8; READ_CHUNK];
		loop {
			match self.stream.read(&mut chunk) {
				Ok(0) => {
					self.eof = true;
					return Ok(());
				}
				Ok(n) => self.inbox.extend_from_slice(&chunk[..n]),
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => match ChannelError::from(e) {
					ChannelError::Disconnected => {
						self.eof = true;
						return Ok(());
					}
					other => return Err(other),
				},
			}
		}
	}

	/// Splits complete frames off the inbox.
	///
	/// Stops at the first bad frame, keeping what was decoded before it and
	/// recording the fault.
	fn split_frames(&mut self) -> Vec<Frame> {
		let mut frames = Vec::new();
		let mut offset = 0;
		while self.inbox.len() - offset >= 4 {
			let mut header = [0u8; 4];
			header.copy_from_slice(&self.inbox[offset..offset + 4]);
			let len = u32::from_le_bytes(header) as usize;
			if len > MAX_FRAME_LEN {
				self.fault = Some(ChannelError::FrameTooLarge(len));
				break;
			}
			let start = offset + 4;
			if self.inbox.len() - start < len {
				break;
			}
			match Frame::decode(&self.inbox[start..start + len]) {
				Ok(frame) => frames.push(frame),
				Err(error) => {
					self.fault = Some(error);
					break;
				}
			}
			offset = start + len;
		}
		if self.fault.is_some() {
			self.inbox.clear();
		} else {
			self.inbox.drain(..offset);
		}
		frames
	}
}

impl Channel for SocketChannel {
	fn token(&self) -> EndpointToken {
		self.token
	}

	fn peer_token(&self) -> EndpointToken {
		self.peer
	}

	fn send(&mut self, frame: Frame) -> Result<(), ChannelError> {
		let bytes = frame.encode()?;
		if bytes.len() > MAX_FRAME_LEN {
			return Err(ChannelError::FrameTooLarge(bytes.len()));
		}
		self.outbox.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
		self.outbox.extend_from_slice(&bytes);
		self.flush()
	}

	fn receive_all_pending(&mut self) -> Result<Vec<Frame>, ChannelError> {
		if let Some(fault) = &self.fault {
			return Err(fault.clone());
		}
		match self.flush() {
			Ok(()) | Err(ChannelError::Disconnected) => {}
			Err(e) => return Err(e),
		}
		self.fill()?;
		let frames = self.split_frames();
		if frames.is_empty() {
			if let Some(fault) = &self.fault {
				return Err(fault.clone());
			}
			if self.eof {
				return Err(ChannelError::Disconnected);
			}
		}
		Ok(frames)
	}
}
