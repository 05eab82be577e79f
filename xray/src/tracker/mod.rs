//! Step tracking for one pipeline execution.

mod xray;

pub use xray::XRay;
