//! Configuration file for the `courier` binary.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use courier_worker::HostConfig;
use serde::Deserialize;

use crate::cli::Cli;

/// Shape of the generated suite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
	pub units: usize,
	pub operations: usize,
	pub stop_after: Option<usize>,
	/// Upper bound on the whole run, host round trips included.
	pub timeout_ms: u64,
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			units: 2,
			operations: 3,
			stop_after: None,
			timeout_ms: 10_000,
		}
	}
}

impl RunConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}
}

/// Everything the binary reads from disk.
///
/// ```toml
/// [host]
/// drain_interval_ms = 20
///
/// [run]
/// units = 4
/// operations = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub host: HostConfig,
	pub run: RunConfig,
}

impl Config {
	pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.host.validate()?;
		Ok(config)
	}

	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let input =
			std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
		Self::from_toml_str(&input).with_context(|| format!("invalid config file {}", path.display()))
	}

	/// Loads the file named on the command line, if any, then applies flags.
	pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
		let mut config = match &cli.config {
			Some(path) => Self::load(path)?,
			None => Self::default(),
		};
		config.apply(cli);
		Ok(config)
	}

	/// Flags win over file values.
	pub fn apply(&mut self, cli: &Cli) {
		if let Some(units) = cli.units {
			self.run.units = units;
		}
		if let Some(operations) = cli.operations {
			self.run.operations = operations;
		}
		if cli.stop_after.is_some() {
			self.run.stop_after = cli.stop_after;
		}
	}
}
