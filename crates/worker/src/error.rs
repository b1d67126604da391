//! Error types for hosting and configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from starting, running or joining a hosted endpoint.
#[derive(Debug, Error)]
pub enum HostError {
	/// The host thread's runtime could not be built.
	#[error("failed to build host runtime: {0}")]
	Runtime(std::io::Error),

	/// The host thread could not be spawned.
	#[error("failed to spawn host thread: {0}")]
	Spawn(std::io::Error),

	/// [`crate::HostedEndpoint::start`] was called twice.
	#[error("hosted endpoint already started")]
	AlreadyStarted,

	/// The host was joined before it was started.
	#[error("hosted endpoint was never started")]
	NotStarted,

	/// The host did not finish within the grace period.
	#[error("hosted endpoint still running after {0:?}")]
	GraceExpired(Duration),

	/// The host thread panicked.
	#[error("host thread panicked: {0}")]
	Panicked(String),

	/// The hosted endpoint failed.
	#[error(transparent)]
	Endpoint(#[from] courier_rpc::Error),
}

/// Errors that can occur when loading [`crate::HostConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A field holds an unusable value.
	#[error("invalid value for `{field}`: {reason}")]
	Invalid {
		/// Field name.
		field: &'static str,
		/// What is wrong with it.
		reason: &'static str,
	},
}
