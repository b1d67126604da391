use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Run a test suite against an endpoint hosted on its own thread")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// TOML file with `[host]` and `[run]` tables
	#[arg(short, long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Increase log verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = ArgAction::Count)]
	pub verbose: u8,

	/// Number of units in the suite
	#[arg(long, value_name = "N")]
	pub units: Option<usize>,

	/// Number of remote operations per unit
	#[arg(long, value_name = "N")]
	pub operations: Option<usize>,

	/// Raise the stop flag once this many cases have finished
	#[arg(long, value_name = "N")]
	pub stop_after: Option<usize>,
}
