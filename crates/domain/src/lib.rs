//! `vl-domain`: configuration, shared errors and structured trace events
//! used by every voxlink crate.

pub mod config;
pub mod error;
pub mod trace;

pub use error::{Error, Result};
