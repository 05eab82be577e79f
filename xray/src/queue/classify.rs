//! Retryable / fatal failure classification.
//!
//! A failure is retryable only if it looks like a transient network or
//! service condition. Everything else, including missing data and malformed
//! generator output, fails the job on first occurrence.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::{GenerationError, StorageError, XRayError};

/// Whether a failed job should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient failure, retry with backoff.
    Retryable,
    /// Permanent failure, do not retry.
    NonRetryable,
}

impl FailureClass {
    /// Returns true for [`FailureClass::Retryable`].
    #[must_use]
    pub fn is_retryable(self) -> bool {
        self == Self::Retryable
    }
}

/// HTTP statuses that indicate a transient upstream condition.
const RETRYABLE_STATUSES: [u16; 3] = [429, 502, 503];

// Constant pattern; compiling it is covered by the tests below.
#[allow(clippy::expect_used)]
static TRANSIENT_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        econnreset | connection[\s_-]?reset
        | etimedout | connection[\s_-]?timed?[\s_-]?out
        | enotfound | eai_again | getaddrinfo | \bdns\b
        | rate[\s_-]?limit | too[\s_]many[\s_]requests
        | service[\s_-]?unavailable
        | timeout | timed[\s_-]?out
        | \b(?:429|502|503)\b
        ",
    )
    .expect("transient signature pattern is valid")
});

/// Classifies a failure from its message and optional code.
#[must_use]
pub fn classify_message(message: &str, code: Option<&str>) -> FailureClass {
    let matches = TRANSIENT_SIGNATURE.is_match(message)
        || code.is_some_and(|c| TRANSIENT_SIGNATURE.is_match(c));
    if matches {
        FailureClass::Retryable
    } else {
        FailureClass::NonRetryable
    }
}

/// Classifies a generator failure.
#[must_use]
pub fn classify_generation_error(err: &GenerationError) -> FailureClass {
    match err {
        GenerationError::Timeout { .. } => FailureClass::Retryable,
        GenerationError::EmptyResponse => FailureClass::NonRetryable,
        GenerationError::Failed {
            message,
            code,
            status,
        } => {
            if status.is_some_and(|s| RETRYABLE_STATUSES.contains(&s)) {
                FailureClass::Retryable
            } else {
                classify_message(message, code.as_deref())
            }
        }
        GenerationError::Other(inner) => classify_message(&format!("{inner:#}"), None),
    }
}

/// Classifies any failure raised while processing a job.
#[must_use]
pub fn classify_error(err: &XRayError) -> FailureClass {
    match err {
        XRayError::Generation(inner) => classify_generation_error(inner),
        XRayError::Storage(StorageError::Backend(message)) => classify_message(message, None),
        XRayError::NotFound(_)
        | XRayError::Storage(_)
        | XRayError::DuplicateStep { .. }
        | XRayError::Config(_)
        | XRayError::Serialization(_)
        | XRayError::Internal(_) => FailureClass::NonRetryable,
    }
}
