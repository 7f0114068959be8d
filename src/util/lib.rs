//! Utility crate shared by the master and worker binaries: configuration,
//! error types, content hashing, time helpers and the background task runner.
#[macro_use]
extern crate tracing;

pub mod background;
pub mod config;
pub mod data;
pub mod error;
pub mod time;
