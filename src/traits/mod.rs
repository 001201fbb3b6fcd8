//! Trait abstractions for dependency injection and testability.
//!
//! The session orchestrator is generic over these, so tests can drive it
//! with fakes instead of a real identity provider and mount process.
//!
//! # Traits
//!
//! - [`CredentialRefresher`] - Periodic token and storage credential renewal
//! - [`MountDriver`] - Launching and cleaning up the mount process

pub mod mount;
pub mod refresher;

pub use mount::MountDriver;
pub use refresher::CredentialRefresher;
