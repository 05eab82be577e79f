//! Reasoning generators.
//!
//! A [`ReasoningGenerator`] turns a finalized [`Step`] into a short
//! natural-language explanation of its outcome. The queue treats generators
//! as shared, reentrant collaborators and calls them concurrently.

mod fallback;
mod heuristic;
mod prompt;

pub use fallback::FallbackGenerator;
pub use heuristic::HeuristicGenerator;
pub use prompt::{PromptGenerator, PromptTemplate, TextGenerator};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

use crate::core::Step;
use crate::errors::GenerationError;

/// Produces reasoning text for a step.
#[async_trait]
pub trait ReasoningGenerator: Send + Sync {
    /// Generates reasoning for `step`.
    async fn generate(&self, step: &Step) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G: ReasoningGenerator + ?Sized> ReasoningGenerator for Arc<G> {
    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        (**self).generate(step).await
    }
}

type GenerateFn =
    dyn Fn(Step) -> BoxFuture<'static, Result<String, GenerationError>> + Send + Sync;

/// Adapts an async closure into a [`ReasoningGenerator`].
///
/// ```
/// use xray::reasoning::FnGenerator;
///
/// let generator = FnGenerator::new(|step| async move {
///     Ok(format!("{} finished", step.name))
/// });
/// # let _ = generator;
/// ```
#[derive(Clone)]
pub struct FnGenerator {
    func: Arc<GenerateFn>,
}

impl FnGenerator {
    /// Wraps `func`. The closure receives an owned copy of the step.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Step) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, GenerationError>> + Send + 'static,
    {
        Self {
            func: Arc::new(move |step: Step| func(step).boxed()),
        }
    }
}

impl std::fmt::Debug for FnGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGenerator").finish_non_exhaustive()
    }
}

#[async_trait]
impl ReasoningGenerator for FnGenerator {
    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        (self.func)(step.clone()).await
    }
}
