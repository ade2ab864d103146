use crate::completion::{CompletionService, GenerationParams};
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-flash-latest";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// The batch embedding endpoint accepts at most this many requests per call
const MAX_EMBEDDING_BATCH: usize = 100;

/// Configuration for Gemini API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub generation: GenerationParams,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables.
    ///
    /// A missing `GEMINI_API_KEY` is only warned about; every request made
    /// without it fails.
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set; embedding and generation requests will fail");
        }

        GeminiConfig {
            api_key,
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            generation: GenerationParams::default(),
        }
    }

    /// Configuration with default endpoints and models for the given key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation: GenerationParams::default(),
        }
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::ServiceUnavailable("GEMINI_API_KEY is not configured".into()))
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn embedding_model_name(&self) -> String {
        format!("models/{}", self.config.embedding_model)
    }

    async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<R> {
        // The key travels in a header so it never shows up in URLs or errors
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key()?)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::ServiceUnavailable(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        let url = self.endpoint(&self.config.embedding_model, "embedContent");
        let model = self.embedding_model_name();
        let request = EmbeddingRequest {
            model: &model,
            content: Content::new(text),
        };

        let response: EmbeddingResponse = self.post(&url, &request).await?;

        Ok(Embedding {
            values: response.embedding.values,
        })
    }

    /// Generate embeddings for many texts, in batches the API accepts
    pub async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let url = self.endpoint(&self.config.embedding_model, "batchEmbedContents");
        let model = self.embedding_model_name();
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_EMBEDDING_BATCH) {
            let request = BatchEmbeddingRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbeddingRequest {
                        model: &model,
                        content: Content::new(text),
                    })
                    .collect(),
            };

            let response: BatchEmbeddingResponse = self.post(&url, &request).await?;
            if response.embeddings.len() != batch.len() {
                return Err(RagError::ServiceUnavailable(format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            embeddings.extend(
                response
                    .embeddings
                    .into_iter()
                    .map(|data| Embedding { values: data.values }),
            );
        }

        Ok(embeddings)
    }

    /// Generate text using the configured Gemini model
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint(&self.config.model, "generateContent");
        let params = self.config.generation;
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                max_output_tokens: params.max_output_tokens,
            },
        };

        let response: GenerateResponse = self.post(&url, &request).await?;

        // Extract the generated text from the response
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| RagError::ServiceUnavailable("No response generated".into()))
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.get_embedding(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.get_embeddings(texts).await
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt).await
    }
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbeddingRequest<'a> {
    requests: Vec<EmbeddingRequest<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct BatchEmbeddingResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new(text: &'a str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: None,
        }
    }

    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: Some(role),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}
