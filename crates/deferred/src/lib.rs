//! Deferred results and a cooperative coroutine driver.
//!
//! This crate provides the single-threaded scheduling primitives the rest of
//! the workspace builds on:
//! * [`Deferred`]: a single-assignment result with FIFO callback chaining
//! * [`drive`]: steps a [`Procedure`] that suspends on deferreds, resuming it
//!   each time the awaited deferred settles
//! * [`Sequence`]: a ready-made procedure running deferred-producing steps in order
//!
//! Everything here is `!Send` by construction. Settlement runs callbacks
//! synchronously on the settling call stack; nothing is scheduled implicitly.

#![warn(missing_docs)]

mod deferred;
mod driver;

pub use deferred::{AlreadySettled, Deferred, DeferredState, Step, gather};
pub use driver::{FnProcedure, Procedure, Resume, Sequence, SequenceStep, Suspend, drive, from_fn};
