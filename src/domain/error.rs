//! # Operation Errors
//!
//! The failure taxonomy shared by every facade. Facades turn these into
//! failed operation records; the agent turns `Internal` into an error status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    /// Rejected before touching the OS: policy, confirmation, size, parameters.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Timeout(String),

    /// Raised by the input driver, or by the fail-safe.
    #[error("{0}")]
    Automation(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Anything the facades did not anticipate.
    #[error("{0}")]
    Internal(String),
}

impl OperationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Short category name, used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Timeout(_) => "timeout",
            Self::Automation(_) => "automation",
            Self::Io { .. } => "io",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_context() {
        let err = OperationError::io(
            "Error reading file",
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
        );
        assert_eq!(err.to_string(), "Error reading file: disk on fire");
        assert_eq!(err.category(), "io");
    }

    #[test]
    fn test_messages_pass_through() {
        let err = OperationError::not_found("File does not exist: /tmp/x");
        assert_eq!(err.to_string(), "File does not exist: /tmp/x");
        assert_eq!(err.category(), "not_found");
    }
}
