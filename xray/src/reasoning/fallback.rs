//! Cheap-first generator chain.

use async_trait::async_trait;
use tracing::debug;

use super::{HeuristicGenerator, ReasoningGenerator};
use crate::core::Step;
use crate::errors::GenerationError;

/// Tries the deterministic heuristic before an expensive generator.
///
/// Transient failures of the expensive generator are propagated so the queue
/// can retry them. Permanent failures (malformed or empty responses) fall back
/// to the heuristic summary, so a step still gets non-empty reasoning.
#[derive(Debug, Clone)]
pub struct FallbackGenerator<G> {
    expensive: G,
    heuristic_first: bool,
}

impl<G: ReasoningGenerator> FallbackGenerator<G> {
    /// Wraps `expensive` with the heuristic tried first.
    #[must_use]
    pub fn new(expensive: G) -> Self {
        Self {
            expensive,
            heuristic_first: true,
        }
    }

    /// Always call the expensive generator, keeping the heuristic only as fallback.
    #[must_use]
    pub fn expensive_first(mut self) -> Self {
        self.heuristic_first = false;
        self
    }

    /// Returns the wrapped generator.
    pub fn inner(&self) -> &G {
        &self.expensive
    }
}

#[async_trait]
impl<G: ReasoningGenerator> ReasoningGenerator for FallbackGenerator<G> {
    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        if self.heuristic_first {
            if let Some(reasoning) = HeuristicGenerator::confident(step) {
                debug!(step_name = %step.name, "Reasoning resolved by heuristic");
                return Ok(reasoning);
            }
        }

        match self.expensive.generate(step).await {
            Ok(reasoning) if !reasoning.trim().is_empty() => Ok(reasoning),
            Ok(_) => Ok(HeuristicGenerator::summarize(step)),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                debug!(step_name = %step.name, error = %err, "Falling back to heuristic summary");
                Ok(HeuristicGenerator::summarize(step))
            }
        }
    }
}
