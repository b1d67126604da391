//! Endpoints hosted on their own execution unit.
//!
//! A [`HostedEndpoint`] owns one channel end and runs it on a dedicated named
//! thread, draining it on a fixed interval until a stop is requested, either
//! locally or by a remote `stop` call against its [`HostObject`].

#![warn(missing_docs)]

mod config;
mod error;
mod host;
mod spawn;

pub use config::HostConfig;
pub use error::{ConfigError, HostError};
pub use host::{HostObject, HostedEndpoint, Setup};
pub use spawn::spawn_named_thread;
