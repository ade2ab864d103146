use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use pdf_chat_rag::database::{QdrantConfig, QdrantIndex, SemanticIndex};
use pdf_chat_rag::embeddings::Embedder;
use pdf_chat_rag::gemini::{GeminiClient, GeminiConfig};
use pdf_chat_rag::local_index::{LocalIndex, DEFAULT_INDEX_DIR};
use pdf_chat_rag::prompt::PromptAssembler;
use pdf_chat_rag::rag::{RagConfig, RagEngine};
use pdf_chat_rag::server::{create_router, AppState, ServerLimits, DEFAULT_MAX_UPLOAD_BYTES};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IndexBackend {
    /// JSON index stored under --index-dir
    Local,
    /// Collection in a Qdrant server (QDRANT_URL)
    Qdrant,
}

/// Chat with an uploaded PDF using Gemini and a semantic index
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Where chunks and their embeddings are stored
    #[arg(long, env = "INDEX_BACKEND", value_enum, default_value_t = IndexBackend::Local)]
    index_backend: IndexBackend,

    /// Directory of the local index
    #[arg(long, env = "INDEX_DIR", default_value = DEFAULT_INDEX_DIR)]
    index_dir: PathBuf,

    /// Seconds before a request fails as unavailable
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    request_timeout_secs: u64,

    /// Largest accepted upload body
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // Load configuration from environment
    let gemini = Arc::new(GeminiClient::new(GeminiConfig::from_env()));
    let rag_config = RagConfig::from_env().context("Invalid pipeline configuration")?;
    let prompt = PromptAssembler::from_env();

    let embedder: Arc<dyn Embedder> = gemini.clone();
    let index: Arc<dyn SemanticIndex> = match args.index_backend {
        IndexBackend::Local => Arc::new(
            LocalIndex::open(&args.index_dir, embedder)
                .await
                .context("Failed to open local index")?,
        ),
        IndexBackend::Qdrant => {
            let qdrant_config = QdrantConfig::from_env().context("Invalid Qdrant configuration")?;
            Arc::new(
                QdrantIndex::new(qdrant_config, embedder)
                    .await
                    .context("Failed to initialize Qdrant client")?,
            )
        }
    };

    // Initialize RAG engine
    let engine = Arc::new(RagEngine::new(index, gemini, prompt, rag_config));
    let limits = ServerLimits {
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        max_upload_bytes: args.max_upload_bytes,
    };
    let app = create_router(AppState::new(engine, limits));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
