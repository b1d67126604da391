use std::io::Write;

use clap::Parser;
use courier_worker::HostConfig;
use pretty_assertions::assert_eq;

use crate::cli::Cli;
use crate::config::{Config, RunConfig};
use crate::demo;

fn fast(run: RunConfig) -> Config {
	Config {
		host: HostConfig {
			drain_interval_ms: 2,
			..HostConfig::default()
		},
		run,
	}
}

#[test]
fn flags_parse() {
	let cli = Cli::parse_from(["courier", "-vv", "--units", "3", "--stop-after", "1"]);
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.units, Some(3));
	assert_eq!(cli.operations, None);
	assert_eq!(cli.stop_after, Some(1));
}

#[test]
fn flags_override_file_values() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	write!(file, "[host]\ndrain_interval_ms = 7\n\n[run]\nunits = 5\noperations = 4\n").unwrap();
	let path = file.path().to_str().unwrap().to_owned();

	let cli = Cli::parse_from(["courier", "--config", &path, "--operations", "1"]);
	let config = Config::resolve(&cli).unwrap();
	assert_eq!(config.host.drain_interval_ms, 7);
	assert_eq!(config.run.units, 5);
	assert_eq!(config.run.operations, 1);
	assert_eq!(config.run.stop_after, None);
}

#[test]
fn invalid_host_section_is_rejected() {
	let error = Config::from_toml_str("[host]\ndrain_interval_ms = 0\n").unwrap_err();
	assert!(error.to_string().contains("drain_interval_ms"), "{error}");
	assert!(Config::from_toml_str("[run]\nbogus = 1\n").is_err());
}

#[test]
fn missing_file_names_the_path() {
	let cli = Cli::parse_from(["courier", "--config", "/nonexistent/courier.toml"]);
	let error = Config::resolve(&cli).unwrap_err();
	assert!(error.to_string().contains("/nonexistent/courier.toml"), "{error}");
}

#[test]
fn full_run_against_hosted_endpoint() {
	let result = demo::run(&fast(RunConfig {
		units: 2,
		operations: 3,
		..RunConfig::default()
	}))
	.unwrap();
	assert_eq!(result.tests_run, 6);
	assert_eq!(result.successes, 6);
	assert!(result.was_successful());
	assert!(!result.should_stop);
}

#[test]
fn stop_after_ends_the_run_early() {
	let result = demo::run(&fast(RunConfig {
		units: 3,
		operations: 2,
		stop_after: Some(3),
		..RunConfig::default()
	}))
	.unwrap();
	assert_eq!(result.tests_run, 3);
	assert!(result.should_stop);
}
