//! Unified error handling for sts-wire.
//!
//! - **Error Categories**: classification used for retry and abort decisions
//! - **Domain-specific Errors**: Auth, Vault, Network, Mount, System and Config
//! - **Unified Error Type**: `WireError` consolidates all error types
//! - **Error Context**: operation, instance and attempt metadata for the report
//! - **Result Type Alias**: `WireResult<T>`
//!
//! # Error Categories
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Setup | Registration, endpoint, password | No |
//! | Network | Connection, DNS, timeout, 5xx | Yes |
//! | Provider | Explicit refusal by IAM or STS | No |
//! | Mount | Mount executable or process | Via remount |
//! | Integrity | Vault decryption | No |
//! | Configuration | Flags, config file | No |
//! | System | OS/filesystem errors | No |

mod auth;
mod category;
mod config;
mod context;
mod mount;
mod network;
mod result;
mod system;
mod vault;
mod wire_error;

pub use auth::AuthError;
pub use category::ErrorCategory;
pub use config::ConfigError;
pub use context::ErrorContext;
pub use mount::MountError;
pub use network::{classify_reqwest_error, snippet, status_error, NetworkError};
pub use result::{ResultExt, WireResult};
pub use system::{classify_io_error, SystemError};
pub use vault::VaultError;
pub use wire_error::WireError;
