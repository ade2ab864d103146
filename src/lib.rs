pub mod chunking;
pub mod completion;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod local_index;
pub mod memory;
pub mod prompt;
pub mod rag;
pub mod sanitize;
pub mod server;
