//! Deterministic reasoning derived from the shape of a step's result.

use async_trait::async_trait;
use serde_json::Value;

use super::ReasoningGenerator;
use crate::core::Step;
use crate::errors::GenerationError;

/// Output keys that carry a result count.
const COUNT_KEYS: [&str; 6] = ["count", "total", "total_count", "num_results", "length", "size"];

/// Longest string output quoted verbatim.
const MAX_QUOTED_CHARS: usize = 80;

/// Most output field names listed in a summary.
const MAX_LISTED_FIELDS: usize = 5;

/// Explains a step from its error or output without any external call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGenerator;

impl HeuristicGenerator {
    /// Creates a heuristic generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reasoning for steps whose outcome is unambiguous: failures, counts,
    /// collections and flags. Returns `None` when a richer explanation is needed.
    #[must_use]
    pub fn confident(step: &Step) -> Option<String> {
        if let Some(error) = &step.error {
            return Some(format!("Step '{}' failed: {}", step.name, error.trim()));
        }

        match step.output.as_ref()? {
            Value::Array(items) => Some(format!(
                "Step '{}' returned {} {}.",
                step.name,
                items.len(),
                plural(items.len() == 1, "item", "items")
            )),
            Value::Bool(flag) => Some(format!("Step '{}' evaluated to {flag}.", step.name)),
            Value::Object(fields) => COUNT_KEYS.iter().find_map(|key| {
                let n = fields.get(*key)?.as_u64()?;
                Some(format!(
                    "Step '{}' returned {n} {}.",
                    step.name,
                    plural(n == 1, "result", "results")
                ))
            }),
            _ => None,
        }
    }

    /// Reasoning that is always available, falling back to a generic summary.
    #[must_use]
    pub fn summarize(step: &Step) -> String {
        if let Some(reasoning) = Self::confident(step) {
            return reasoning;
        }

        match &step.output {
            Some(Value::String(text)) if text.chars().count() <= MAX_QUOTED_CHARS => {
                format!("Step '{}' produced \"{}\".", step.name, text)
            }
            Some(Value::String(text)) => format!(
                "Step '{}' produced a {}-character text.",
                step.name,
                text.chars().count()
            ),
            Some(Value::Number(n)) => format!("Step '{}' produced {n}.", step.name),
            Some(Value::Object(fields)) if !fields.is_empty() => {
                let listed: Vec<&str> = fields
                    .keys()
                    .take(MAX_LISTED_FIELDS)
                    .map(String::as_str)
                    .collect();
                let more = fields.len().saturating_sub(MAX_LISTED_FIELDS);
                let suffix = if more > 0 {
                    format!(" and {more} more")
                } else {
                    String::new()
                };
                format!(
                    "Step '{}' produced {}{suffix}.",
                    step.name,
                    listed.join(", ")
                )
            }
            _ => format!("Step '{}' completed without output.", step.name),
        }
    }
}

fn plural(is_one: bool, one: &'static str, many: &'static str) -> &'static str {
    if is_one {
        one
    } else {
        many
    }
}

#[async_trait]
impl ReasoningGenerator for HeuristicGenerator {
    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        Ok(Self::summarize(step))
    }
}
