//! Identities, routing tokens and call tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a registered remote object.
///
/// Minted once at registration and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProxyId(Uuid);

impl ProxyId {
	/// Mints a fresh random identity.
	#[allow(clippy::new_without_default, reason = "identities are minted, not defaulted")]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	/// Returns the underlying UUID.
	pub const fn as_uuid(&self) -> Uuid {
		self.0
	}
}

impl fmt::Display for ProxyId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

/// Routing token naming one end of a duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointToken(Uuid);

impl EndpointToken {
	/// Mints a fresh random token.
	#[allow(clippy::new_without_default, reason = "tokens are minted, not defaulted")]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	/// Rebuilds a token exchanged out of band.
	pub const fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}

	/// Returns the underlying UUID.
	pub const fn as_uuid(&self) -> Uuid {
		self.0
	}
}

impl fmt::Display for EndpointToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

/// Correlates an acknowledged call with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallToken(pub u64);

impl fmt::Display for CallToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Per-endpoint source of [`CallToken`]s.
///
/// Tokens increase monotonically, so a late response can never be matched
/// against a newer call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenGen {
	issued: u64,
}

impl TokenGen {
	/// A generator whose first token is `#0`.
	#[must_use]
	pub const fn new() -> Self {
		Self { issued: 0 }
	}

	/// Issues an unused token.
	pub fn mint(&mut self) -> CallToken {
		let token = CallToken(self.issued);
		self.issued += 1;
		token
	}

	/// Number of tokens issued so far.
	pub fn issued(&self) -> u64 {
		self.issued
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minted_tokens_increase() {
		let mut tokens = TokenGen::new();
		let first = tokens.mint();
		let second = tokens.mint();
		assert!(second.0 > first.0);
		assert_eq!(tokens.issued(), 2);
	}
}
