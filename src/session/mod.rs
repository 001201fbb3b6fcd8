//! Session supervision: refresh cadence, remount policy and shutdown.

mod interrupt;
mod orchestrator;

pub use interrupt::Interrupt;
pub use orchestrator::{RemountPolicy, SessionOrchestrator, LOG_ROTATE_INTERVAL};
