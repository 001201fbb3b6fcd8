//! sts-wire - mount an S3-compatible volume with short-lived credentials
//!
//! This library exposes modules for use in integration tests.

pub mod broker;
pub mod cli;
pub mod error;
pub mod identity;
pub mod mount;
pub mod report;
pub mod session;
pub mod startup;
pub mod traits;
pub mod vault;

pub use error::{WireError, WireResult};
