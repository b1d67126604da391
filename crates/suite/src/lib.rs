//! Sequential suite runner built on deferreds.
//!
//! A [`Suite`] is a list of [`Unit`]s, each a list of [`Case`]s with an
//! optional [`Fixture`]. Running a suite drives, strictly in order,
//! `initialize`, every case, then `finalize` for each unit, waiting on each
//! step's deferred before starting the next. A [`StopFlag`] checked before
//! every unit and every case ends the run early.
//!
//! [`run_reporting`] wraps a run with progress calls to a remote
//! [`Coordinator`].

#![warn(missing_docs)]

mod failure;
mod report;
mod result;
mod runner;
mod unit;

pub use failure::Failure;
pub use report::{Coordinator, SuiteControl, run_reporting};
pub use result::{Reported, StopFlag, SuiteResult};
pub use runner::Suite;
pub use unit::{Case, Fixture, Lifecycle, Outcome, Unit};
