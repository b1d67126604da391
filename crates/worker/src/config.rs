//! Hosted endpoint configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;


/// Settings for one [`crate::HostedEndpoint`].
///
/// ```toml
/// name = "host"
/// drain_interval_ms = 100
/// grace_period_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
	/// Thread name and endpoint span name.
	pub name: String,
	/// Delay between self-drains.
	pub drain_interval_ms: u64,
	/// How long [`crate::HostedEndpoint::shutdown`] waits for the thread.
	pub grace_period_ms: u64,
}

impl Default for HostConfig {
	fn default() -> Self {
		Self {
			name: "courier-host".to_owned(),
			drain_interval_ms: 100,
			grace_period_ms: 1000,
		}
	}
}

impl HostConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Delay between self-drains.
	pub fn drain_interval(&self) -> Duration {
		Duration::from_millis(self.drain_interval_ms)
	}

	/// Bound on how long a stopped host may take to finish.
	pub fn grace_period(&self) -> Duration {
		Duration::from_millis(self.grace_period_ms)
	}

	/// Checks values serde cannot reject on its own.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.drain_interval_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "drain_interval_ms",
				reason: "must be positive",
			});
		}
		if self.name.is_empty() {
			return Err(ConfigError::Invalid {
				field: "name",
				reason: "must not be empty",
			});
		}
		Ok(())
	}
}
