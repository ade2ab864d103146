//! On-disk semantic index: every vector is kept in memory, scanned with
//! cosine distance at query time and persisted as one JSON file.

use crate::database::{check_lengths, ChunkMetadata, SemanticIndex};
use crate::embeddings::{cosine_distance, Embedder};
use crate::error::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_INDEX_DIR: &str = "rag_index";

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    text: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
}

/// Semantic index stored under a directory on the local file system
pub struct LocalIndex {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    entries: RwLock<BTreeMap<String, StoredChunk>>,
}

impl LocalIndex {
    /// Open the index in `dir`, creating the directory if needed
    pub async fn open(dir: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(INDEX_FILE);
        let entries = if tokio::fs::try_exists(&path).await? {
            let raw = tokio::fs::read(&path).await?;
            serde_json::from_slice(&raw)?
        } else {
            BTreeMap::new()
        };

        info!(
            "Opened local index at {} ({} chunks)",
            dir.display(),
            entries.len()
        );

        Ok(LocalIndex {
            dir,
            embedder,
            entries: RwLock::new(entries),
        })
    }

    /// Text of the chunk stored under `id`
    pub async fn get(&self, id: &str) -> Option<String> {
        self.entries.read().await.get(id).map(|chunk| chunk.text.clone())
    }

    /// Ids of every stored chunk, sorted
    pub async fn ids(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Write the whole index to a temporary file and move it into place
    async fn persist(&self, entries: &BTreeMap<String, StoredChunk>) -> Result<()> {
        let path = self.dir.join(INDEX_FILE);
        let temp_path = self.dir.join(format!("{}.tmp", INDEX_FILE));

        let raw = serde_json::to_vec(entries)?;
        tokio::fs::write(&temp_path, raw).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!("Persisted {} chunks to {}", entries.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl SemanticIndex for LocalIndex {
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

        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        for (((text, id), metadata), embedding) in chunks
            .into_iter()
            .zip(ids)
            .zip(metadata)
            .zip(embeddings)
        {
            updated.insert(
                id,
                StoredChunk {
                    text,
                    metadata,
                    vector: embedding.values,
                },
            );
        }

        // Memory only reflects writes that reached the disk
        self.persist(&updated).await?;
        *entries = updated;

        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 || self.entries.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &String, &StoredChunk)> = entries
            .iter()
            .map(|(id, chunk)| {
                (
                    cosine_distance(&query_embedding.values, &chunk.vector),
                    id,
                    chunk,
                )
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(_, _, chunk)| chunk.text.clone())
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Embedding;
    use crate::error::RagError;

    /// Letter-frequency vectors: texts sharing letters are close
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            let mut values = vec![0.0; 26];
            for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
                values[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
            }
            Ok(Embedding { values })
        }
    }

    fn meta(source: &str, n: usize) -> Vec<ChunkMetadata> {
        vec![
            ChunkMetadata {
                source: source.to_string()
            };
            n
        ]
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
            .await
            .unwrap();

        index
            .add(
                strings(&["cccc", "aaaa", "bbbb"]),
                strings(&["doc_0", "doc_1", "doc_2"]),
                meta("doc", 3),
            )
            .await
            .unwrap();

        let results = index.query("aaab", 3).await.unwrap();
        assert_eq!(results, strings(&["aaaa", "bbbb", "cccc"]));

        let top = index.query("aaab", 1).await.unwrap();
        assert_eq!(top, strings(&["aaaa"]));
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
            .await
            .unwrap();

        assert!(index.query("anything", 3).await.unwrap().is_empty());
        assert_eq!(index.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_same_id_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
            .await
            .unwrap();

        index
            .add(strings(&["old"]), strings(&["doc_0"]), meta("doc", 1))
            .await
            .unwrap();
        index
            .add(strings(&["new"]), strings(&["doc_0"]), meta("doc", 1))
            .await
            .unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        assert_eq!(index.query("new", 5).await.unwrap(), strings(&["new"]));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
                .await
                .unwrap();
            index
                .add(
                    strings(&["persisted text"]),
                    strings(&["doc_0"]),
                    meta("doc", 1),
                )
                .await
                .unwrap();
        }

        let reopened = LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
            .await
            .unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        assert_eq!(
            reopened.query("text", 1).await.unwrap(),
            strings(&["persisted text"])
        );
    }

    #[tokio::test]
    async fn test_mismatched_add_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
            .await
            .unwrap();

        let err = index
            .add(strings(&["a", "b"]), strings(&["doc_0"]), meta("doc", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
        assert_eq!(index.len().await.unwrap(), 0);
    }
}
