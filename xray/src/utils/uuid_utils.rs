//! Identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new time-ordered job id (UUID v7 rendered as a string).
///
/// Time ordering keeps persisted job rows roughly sorted by creation.
#[must_use]
pub fn generate_job_id() -> String {
    Uuid::now_v7().to_string()
}
