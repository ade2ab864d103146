use crate::chunking::{split_into_chunks, DEFAULT_CHUNK_SIZE};
use crate::completion::CompletionService;
use crate::database::{ChunkMetadata, SemanticIndex};
use crate::document::Document;
use crate::error::{RagError, Result};
use crate::memory::{Session, HISTORY_WINDOW};
use crate::prompt::PromptAssembler;
use crate::sanitize::sanitize;
use log::{debug, info};
use std::env;
use std::sync::Arc;

/// Number of chunks retrieved per question
pub const DEFAULT_TOP_K: usize = 3;

/// Tunables of the retrieval pipeline
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RagConfig {
    /// Create a new configuration from `CHUNK_SIZE` and `RETRIEVAL_TOP_K`
    pub fn from_env() -> Result<Self> {
        Ok(RagConfig {
            chunk_size: positive_env("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            top_k: positive_env("RETRIEVAL_TOP_K", DEFAULT_TOP_K)?,
        })
    }
}

fn positive_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                RagError::Validation(format!("{} must be a positive integer, got {:?}", name, value))
            }),
        Err(_) => Ok(default),
    }
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub chunk_count: usize,
}

impl IngestReport {
    pub fn message(&self) -> String {
        format!("I have absorbed the essence of {}.", self.source)
    }
}

/// RAG (Retrieval-Augmented Generation) engine
///
/// The engine itself is stateless between requests; the conversation lives in
/// the [`Session`] each call receives. The session is only touched between
/// awaits, so calls may overlap freely.
pub struct RagEngine {
    index: Arc<dyn SemanticIndex>,
    completion: Arc<dyn CompletionService>,
    prompt: PromptAssembler,
    config: RagConfig,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(
        index: Arc<dyn SemanticIndex>,
        completion: Arc<dyn CompletionService>,
        prompt: PromptAssembler,
        config: RagConfig,
    ) -> Self {
        RagEngine {
            index,
            completion,
            prompt,
            config,
        }
    }

    pub fn index(&self) -> &Arc<dyn SemanticIndex> {
        &self.index
    }

    /// Extract, chunk and index an uploaded file.
    ///
    /// An empty document leaves both the index and the memory untouched;
    /// otherwise the conversation starts over.
    pub async fn ingest(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        session: &Session,
    ) -> Result<IngestReport> {
        let file_name = file_name.to_string();
        let document =
            tokio::task::spawn_blocking(move || Document::from_bytes(&file_name, &bytes)).await??;

        if document.is_empty() {
            return Err(RagError::EmptyDocument);
        }
        info!(
            "Extracted {} characters from {} ({})",
            document.content.chars().count(),
            document.source,
            document.mime_type
        );

        session.reset();

        // Split content into chunks
        let chunks = split_into_chunks(&document.content, &document.source, self.config.chunk_size);
        let chunk_count = chunks.len();
        info!("Split {} into {} chunks", document.source, chunk_count);

        let mut texts = Vec::with_capacity(chunk_count);
        let mut ids = Vec::with_capacity(chunk_count);
        let mut metadata = Vec::with_capacity(chunk_count);
        for chunk in chunks {
            texts.push(chunk.text);
            ids.push(chunk.id);
            metadata.push(ChunkMetadata {
                source: chunk.source,
            });
        }

        self.index.add(texts, ids, metadata).await?;

        Ok(IngestReport {
            source: document.source,
            chunk_count,
        })
    }

    /// Answer a question from the indexed document and the recent conversation
    pub async fn ask(&self, query: &str, session: &Session) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query is blank".into()));
        }

        // Retrieve relevant chunks
        let context = self.index.query(query, self.config.top_k).await?;
        info!("Retrieved {} chunks for question", context.len());

        let history = session.recent(HISTORY_WINDOW);
        let prompt = self.prompt.assemble(&context, &history, query);
        debug!("Assembled prompt of {} bytes", prompt.len());

        let raw_reply = self.completion.complete(&prompt).await?;
        let reply = sanitize(&raw_reply);

        session.append(query, reply.clone());

        Ok(reply)
    }

    /// Forget the conversation
    pub fn clear(&self, session: &Session) {
        session.reset();
        info!("Conversation memory cleared");
    }
}
