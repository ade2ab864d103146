use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::info;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_COLLECTION_NAME: &str = "rag_documents";

/// Dimension of `text-embedding-004` vectors
pub const DEFAULT_VECTOR_SIZE: u64 = 768;

/// Metadata stored alongside every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
}

/// Vector index over document chunks.
///
/// Writes are not serialised across callers; the index assumes a single
/// writer at a time.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Embed and store chunks. An existing id is overwritten.
    async fn add(
        &self,
        chunks: Vec<String>,
        ids: Vec<String>,
        metadata: Vec<ChunkMetadata>,
    ) -> Result<()>;

    /// Up to `k` stored chunk texts, most relevant first
    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>>;

    /// Number of stored chunks
    async fn len(&self) -> Result<usize>;
}

/// Reject `add` calls whose parallel vectors disagree in length
pub fn check_lengths(chunks: &[String], ids: &[String], metadata: &[ChunkMetadata]) -> Result<()> {
    if chunks.len() != ids.len() || chunks.len() != metadata.len() {
        return Err(RagError::Validation(format!(
            "chunks ({}), ids ({}) and metadata ({}) must have the same length",
            chunks.len(),
            ids.len(),
            metadata.len()
        )));
    }
    Ok(())
}

/// Configuration for Qdrant
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_name: String,
    pub vector_size: u64,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL")
            .map_err(|_| RagError::Validation("QDRANT_URL is not set".into()))?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection_name =
            env::var("COLLECTION_NAME").unwrap_or_else(|_| DEFAULT_COLLECTION_NAME.to_string());
        let vector_size = match env::var("EMBEDDING_DIMENSIONS") {
            Ok(value) => value.parse().map_err(|_| {
                RagError::Validation(format!("EMBEDDING_DIMENSIONS is not a number: {}", value))
            })?,
            Err(_) => DEFAULT_VECTOR_SIZE,
        };

        Ok(QdrantConfig {
            url,
            api_key,
            collection_name,
            vector_size,
        })
    }
}

/// Semantic index backed by a single Qdrant collection
pub struct QdrantIndex {
    client: Qdrant,
    collection_name: String,
    embedder: Arc<dyn Embedder>,
}

impl QdrantIndex {
    /// Connect to Qdrant and make sure the collection exists
    pub async fn new(config: QdrantConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder.build()?;

        let index = QdrantIndex {
            client,
            collection_name: config.collection_name,
            embedder,
        };
        index.ensure_collection(config.vector_size).await?;

        Ok(index)
    }

    /// Create the collection with cosine distance if it is missing
    async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        if self.client.collection_exists(self.collection_name.clone()).await? {
            info!("Using existing collection: {}", self.collection_name);
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine));

        self.client.create_collection(create_collection).await?;
        info!("Created collection: {}", self.collection_name);

        Ok(())
    }
}

/// Qdrant only accepts integer or UUID point ids
fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

#[async_trait]
impl SemanticIndex for QdrantIndex {
    async fn add(
        &self,
        chunks: Vec<String>,
        ids: Vec<String>,
        metadata: Vec<ChunkMetadata>,
    ) -> Result<()> {
        check_lengths(&chunks, &ids, &metadata)?;
        if chunks.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_batch(&chunks).await?;

        // Convert chunks and embeddings to points
        let mut points = Vec::with_capacity(chunks.len());
        for (((text, id), meta), embedding) in chunks
            .into_iter()
            .zip(ids)
            .zip(metadata)
            .zip(embeddings)
        {
            let payload = Payload::try_from(json!({
                "id": id,
                "text": text,
                "source": meta.source,
            }))?;
            points.push(PointStruct::new(point_id(&id), embedding.values, payload));
        }

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true))
            .await?;
        info!("Upserted {} points into {}", count, self.collection_name);

        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;

        let search_request =
            SearchPointsBuilder::new(self.collection_name.clone(), query_embedding.values, k as u64)
                .with_payload(true);

        let search_response = self.client.search_points(search_request).await?;

        // Results come back ordered by decreasing similarity
        let chunks = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                scored_point
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(|text| text.to_string())
            })
            .collect();

        Ok(chunks)
    }

    async fn len(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.clone()).exact(true))
            .await?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
