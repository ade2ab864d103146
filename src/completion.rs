use crate::error::Result;
use async_trait::async_trait;

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            temperature: 0.7,
            top_p: 1.0,
            top_k: 32,
            max_output_tokens: 4096,
        }
    }
}

/// External text-generation service: one prompt in, raw text out
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate a completion for the prompt. Makes a single attempt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
