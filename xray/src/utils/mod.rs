//! Utility functions for identifiers and timestamps.

mod timestamps;
mod uuid_utils;

pub use timestamps::{after, iso_timestamp, now_utc, Timestamp};
pub use uuid_utils::{generate_job_id, generate_uuid};
