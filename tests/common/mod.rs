#![allow(dead_code)]

use async_trait::async_trait;
use pdf_chat_rag::completion::CompletionService;
use pdf_chat_rag::embeddings::{Embedder, Embedding};
use pdf_chat_rag::error::{RagError, Result};
use pdf_chat_rag::local_index::LocalIndex;
use pdf_chat_rag::prompt::PromptAssembler;
use pdf_chat_rag::rag::{RagConfig, RagEngine};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Letter-frequency vectors: texts sharing letters are close
pub struct LetterEmbedder;

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

/// Completion service that replays scripted replies and records every prompt
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn fail(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(RagError::ServiceUnavailable(reason.to_string())));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("default answer".to_string()))
    }
}

/// Completion service that holds every call until released
pub struct GatedCompletion {
    started: AtomicUsize,
    gate: Semaphore,
}

impl GatedCompletion {
    pub fn new() -> Self {
        GatedCompletion {
            started: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        }
    }

    /// Calls that have reached generation so far
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }
}

#[async_trait]
impl CompletionService for GatedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let call = self.started.fetch_add(1, Ordering::SeqCst);
        self.gate
            .acquire()
            .await
            .map_err(|e| RagError::Internal(e.to_string()))?
            .forget();
        Ok(format!("answer {}", call))
    }
}

pub struct Harness {
    pub engine: Arc<RagEngine>,
    pub index: Arc<LocalIndex>,
    pub completion: Arc<ScriptedCompletion>,
    _dir: TempDir,
}

pub async fn harness(chunk_size: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(
        LocalIndex::open(dir.path(), Arc::new(LetterEmbedder))
            .await
            .unwrap(),
    );
    let completion = Arc::new(ScriptedCompletion::default());
    let config = RagConfig {
        chunk_size,
        ..RagConfig::default()
    };
    let engine = Arc::new(RagEngine::new(
        index.clone(),
        completion.clone(),
        PromptAssembler::default(),
        config,
    ));

    Harness {
        engine,
        index,
        completion,
        _dir: dir,
    }
}

impl Harness {
    /// An engine over the same index that generates with `completion`
    pub fn engine_with(&self, completion: Arc<dyn CompletionService>) -> Arc<RagEngine> {
        Arc::new(RagEngine::new(
            self.index.clone(),
            completion,
            PromptAssembler::default(),
            RagConfig::default(),
        ))
    }
}
