//! Prompt-based reasoning over a text completion backend.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;

use super::ReasoningGenerator;
use crate::core::Step;
use crate::errors::GenerationError;

/// A text completion backend, e.g. an LLM client.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Completes `prompt` and returns the raw answer.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Renders a step into a completion prompt.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    max_field_chars: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            max_field_chars: 2_000,
        }
    }
}

impl PromptTemplate {
    /// Creates a template with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps each rendered JSON field at `max_field_chars` characters.
    #[must_use]
    pub fn with_max_field_chars(mut self, max_field_chars: usize) -> Self {
        self.max_field_chars = max_field_chars.max(1);
        self
    }

    /// Renders the prompt for `step`.
    #[must_use]
    pub fn render(&self, step: &Step) -> String {
        let mut prompt = String::from(
            "Explain in one or two sentences why this pipeline step produced its result.\n\n",
        );
        let _ = writeln!(prompt, "Step: {}", step.name);
        let _ = writeln!(prompt, "Input: {}", self.field(&step.input));
        match (&step.output, &step.error) {
            (_, Some(error)) => {
                let _ = writeln!(prompt, "Error: {}", self.truncate(error));
            }
            (Some(output), None) => {
                let _ = writeln!(prompt, "Output: {}", self.field(output));
            }
            (None, None) => {
                let _ = writeln!(prompt, "Output: (none)");
            }
        }
        if let Some(duration_ms) = step.duration_ms {
            let _ = writeln!(prompt, "Duration: {duration_ms}ms");
        }
        if !step.metadata.is_empty() {
            let mut keys: Vec<&String> = step.metadata.keys().collect();
            keys.sort();
            let _ = writeln!(prompt, "Metadata:");
            for key in keys {
                let _ = writeln!(prompt, "  {key}: {}", self.field(&step.metadata[key]));
            }
        }
        prompt.push_str("\nReasoning:");
        prompt
    }

    fn field(&self, value: &Value) -> String {
        self.truncate(&value.to_string())
    }

    fn truncate(&self, text: &str) -> String {
        match text.char_indices().nth(self.max_field_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

/// Generates reasoning by prompting a [`TextGenerator`].
#[derive(Debug, Clone)]
pub struct PromptGenerator<T> {
    backend: T,
    template: PromptTemplate,
}

impl<T: TextGenerator> PromptGenerator<T> {
    /// Creates a prompt generator with the default template.
    #[must_use]
    pub fn new(backend: T) -> Self {
        Self {
            backend,
            template: PromptTemplate::default(),
        }
    }

    /// Sets the template.
    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &T {
        &self.backend
    }
}

/// Strips a leading `Reasoning:` label and wrapping quotes from a completion.
fn clean_answer(raw: &str) -> &str {
    let mut answer = raw.trim();
    if let Some(prefix) = answer.get(..10) {
        if prefix.eq_ignore_ascii_case("reasoning:") {
            answer = answer[10..].trim_start();
        }
    }
    for quote in ['"', '\''] {
        if answer.len() >= 2 && answer.starts_with(quote) && answer.ends_with(quote) {
            answer = answer[1..answer.len() - 1].trim();
        }
    }
    answer
}

#[async_trait]
impl<T: TextGenerator> ReasoningGenerator for PromptGenerator<T> {
    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        let prompt = self.template.render(step);
        let raw = self.backend.complete(&prompt).await?;
        let answer = clean_answer(&raw);
        if answer.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(answer.to_string())
    }
}
