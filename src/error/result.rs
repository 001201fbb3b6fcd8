//! Result type alias for sts-wire operations.

use super::context::ErrorContext;
use super::wire_error::WireError;

/// Type alias for Results using WireError.
pub type WireResult<T> = Result<T, WireError>;

/// Extension trait for Result types to add context to errors.
pub trait ResultExt<T> {
    /// Add context to an error if the result is Err.
    ///
    /// ```ignore
    /// use sts_wire::error::{ErrorContext, ResultExt};
    ///
    /// broker.refresh().await
    ///     .context(ErrorContext::new("refresh").with_instance("demo"))?;
    /// ```
    fn context(self, ctx: ErrorContext) -> WireResult<T>;

    /// Add context using a closure (only called on error).
    fn with_context<F>(self, f: F) -> WireResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<WireError>,
{
    fn context(self, ctx: ErrorContext) -> WireResult<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F>(self, f: F) -> WireResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
