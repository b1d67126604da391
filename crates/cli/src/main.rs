//! Courier command line driver.
//!
//! Hosts an endpoint on its own thread, runs a generated suite of remote
//! round trips against it, reports the summary to a coordinator object on
//! the host and prints it.

mod cli;
mod config;
mod demo;
#[cfg(test)]
mod tests;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use config::Config;

fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = Config::resolve(&cli)?;
	tracing::debug!(?config, "courier.config");

	let result = demo::run(&config)?;
	println!("{result}");
	for reported in result.failures.iter().chain(&result.errors) {
		println!("  {}: {}", reported.test, reported.message);
	}

	Ok(if result.was_successful() {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	})
}

fn setup_tracing(verbose: u8) {
	use tracing_subscriber::EnvFilter;

	let level = match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();
}
