//! Language-model provider collaborator.
//!
//! The engine treats text generation as a black-box call: build a request,
//! get text back or an error. Retry policy, streaming and model routing all
//! live behind this trait, outside the engine.

use async_trait::async_trait;

/// One text-generation call, assembled from a node's config and its input.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub input: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// External language-model API.
///
/// Errors are surfaced to the run as `ProviderError`; the engine never
/// retries on its own.
#[async_trait]
pub trait TextGenProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<String>;
}

/// Provider that always fails. Used as the default when a runner is built
/// without a real provider, so a graph with no text-generation nodes still
/// runs while one that needs a model fails with a clear message.
pub struct NoProvider;

#[async_trait]
impl TextGenProvider for NoProvider {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<String> {
        anyhow::bail!(
            "no text-generation provider configured (model '{}')",
            request.model
        )
    }
}
