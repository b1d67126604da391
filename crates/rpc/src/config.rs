//! Endpoint configuration.

use serde::{Deserialize, Serialize};

use crate::id::EndpointToken;

/// Collaborators injected into an [`crate::Endpoint`] at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
	/// Name recorded on the endpoint's span.
	pub name: String,
	/// Span every endpoint event is emitted in. Built from `name` when unset.
	#[serde(skip)]
	pub span: Option<tracing::Span>,
}

impl Default for EndpointConfig {
	fn default() -> Self {
		Self {
			name: "endpoint".to_owned(),
			span: None,
		}
	}
}

impl EndpointConfig {
	/// Config with the given name.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			span: None,
		}
	}

	/// Uses `span` instead of building one.
	pub fn with_span(mut self, span: tracing::Span) -> Self {
		self.span = Some(span);
		self
	}

	pub(crate) fn span(&self, token: EndpointToken) -> tracing::Span {
		match &self.span {
			Some(span) => span.clone(),
			None => tracing::info_span!("endpoint", name = %self.name, %token),
		}
	}
}
