//! Retry delay table and jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter applied on top of the table delay to spread out retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Use the table delay as is.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random: [delay/2, delay].
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay.
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Self::None => delay,
            Self::Full if millis == 0 => delay,
            Self::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=millis)),
            Self::Equal => {
                let half = millis / 2;
                if half == 0 {
                    delay
                } else {
                    Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
                }
            }
        }
    }
}

/// Looks up the delay for a failed attempt (1-based) in an ordered table.
///
/// Attempts past the end of the table reuse the last entry. An empty table
/// yields no delay.
#[must_use]
pub fn table_delay(delays_ms: &[u64], attempt: u32) -> Duration {
    let idx = usize::try_from(attempt.saturating_sub(1)).unwrap_or(usize::MAX);
    delays_ms
        .get(idx)
        .or_else(|| delays_ms.last())
        .map_or(Duration::ZERO, |ms| Duration::from_millis(*ms))
}
