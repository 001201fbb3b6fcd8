//! Error context for enriched error information.

use chrono::{DateTime, Utc};

/// Context information attached to errors for debugging and the fatal report.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Human-readable description of the operation that failed.
    pub operation: String,

    /// Instance name, when the failure belongs to a named instance.
    pub instance: Option<String>,

    /// Timestamp when the error occurred.
    pub timestamp: DateTime<Utc>,

    /// Attempt number (refresh retry, remount attempt).
    pub attempt: u32,

    /// Component where the error originated.
    pub component: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            instance: None,
            timestamp: Utc::now(),
            attempt: 0,
            component: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Get a formatted context string suitable for logging.
    pub fn to_log_string(&self) -> String {
        let mut parts = vec![format!("operation={}", self.operation)];

        if let Some(ref instance) = self.instance {
            parts.push(format!("instance={}", instance));
        }

        if let Some(ref component) = self.component {
            parts.push(format!("component={}", component));
        }

        if self.attempt > 0 {
            parts.push(format!("attempt={}", self.attempt));
        }

        parts.push(format!("timestamp={}", self.timestamp.to_rfc3339()));

        parts.join(" ")
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.operation)?;

        if let Some(ref instance) = self.instance {
            write!(f, " instance={}", instance)?;
        }

        if self.attempt > 0 {
            write!(f, " attempt={}", self.attempt)?;
        }

        Ok(())
    }
}
