//! Observability utilities: log subscriber setup and span timing.

mod logging;
mod timer;

pub use logging::{init_logging, LogFormat};
pub use timer::{JobSpanAttributes, SpanTimer};
