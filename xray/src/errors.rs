//! Error types for the xray tracing SDK.
//!
//! The taxonomy mirrors how failures are handled by the reasoning queue:
//! missing data is never retried, generator failures are classified by
//! their message and code, and storage failures carry enough detail to be
//! classified the same way.

use thiserror::Error;

/// Convenience alias used by fallible public operations.
pub type Result<T, E = XRayError> = std::result::Result<T, E>;

/// The main error type for xray operations.
#[derive(Debug, Error)]
pub enum XRayError {
    /// A referenced execution or step does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A step with the same name is already open on the tracker.
    #[error("Step '{step_name}' is already open in execution '{execution_id}'")]
    DuplicateStep {
        /// The execution being tracked.
        execution_id: String,
        /// The step name that is already open.
        step_name: String,
    },

    /// A storage provider operation failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// The reasoning generator failed.
    #[error("{0}")]
    Generation(#[from] GenerationError),

    /// Invalid queue configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl XRayError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error reports missing data, wherever it surfaced.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Storage(StorageError::NotFound(_))
        )
    }
}

/// Identifies the piece of data that could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    /// No execution with the given id.
    #[error("Execution not found: {execution_id}")]
    Execution {
        /// The missing execution id.
        execution_id: String,
    },

    /// The execution exists but has no step with the given name.
    #[error("Step '{step_name}' not found in execution '{execution_id}'")]
    Step {
        /// The execution that was searched.
        execution_id: String,
        /// The missing step name.
        step_name: String,
    },
}

impl NotFoundError {
    /// Creates an execution-not-found error.
    #[must_use]
    pub fn execution(execution_id: impl Into<String>) -> Self {
        Self::Execution {
            execution_id: execution_id.into(),
        }
    }

    /// Creates a step-not-found error.
    #[must_use]
    pub fn step(execution_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self::Step {
            execution_id: execution_id.into(),
            step_name: step_name.into(),
        }
    }
}

/// Errors reported by storage providers and job stores.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The referenced execution or step does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The execution was rejected before anything was written.
    #[error("Invalid execution '{execution_id}': {reason}")]
    InvalidExecution {
        /// The rejected execution id.
        execution_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backend failed (connection loss, query error, ...).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates an invalid execution error.
    #[must_use]
    pub fn invalid_execution(execution_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExecution {
            execution_id: execution_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors produced by a reasoning generator.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generator failed with a message and optional error code / HTTP status.
    #[error("{message}")]
    Failed {
        /// Human readable failure message.
        message: String,
        /// Machine readable code, e.g. `ECONNRESET` or `rate_limit_exceeded`.
        code: Option<String>,
        /// HTTP status returned by a remote generator, if any.
        status: Option<u16>,
    },

    /// The generator did not answer within the configured timeout.
    #[error("Reasoning generation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The generator answered with nothing usable.
    #[error("Generator returned an empty response")]
    EmptyResponse,

    /// Any other error raised by a custom generator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenerationError {
    /// Creates a failure from a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Attaches an error code to a `Failed` error. Other variants are returned unchanged.
    #[must_use]
    pub fn with_code(self, new_code: impl Into<String>) -> Self {
        match self {
            Self::Failed {
                message, status, ..
            } => Self::Failed {
                message,
                code: Some(new_code.into()),
                status,
            },
            other => other,
        }
    }

    /// Attaches an HTTP status to a `Failed` error. Other variants are returned unchanged.
    #[must_use]
    pub fn with_status(self, new_status: u16) -> Self {
        match self {
            Self::Failed { message, code, .. } => Self::Failed {
                message,
                code,
                status: Some(new_status),
            },
            other => other,
        }
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Failed { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns the HTTP status, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Failed { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if retrying the generator could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        crate::queue::classify_generation_error(self).is_retryable()
    }
}
