//! # docqa-rs
//!
//! Ask questions about a document and get answers streamed from a
//! chat-completion model, grounded in the document's most relevant chunks.
//!
//! ## Pipeline
//!
//! - **Loading**: `.txt`, `.md`, `.pdf` and `.docx` to plain text
//! - **Chunking**: newline-preferring splits with overlap
//! - **Caching**: one embedding pass per distinct file content, persisted
//!   in `SQLite` and shared across sessions
//! - **Retrieval**: cosine similarity over the cached vectors
//! - **Answering**: prompt with context and conversation history, streamed
//!   token by token into conversation memory
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use docqa_rs::cache::ContentCache;
//! use docqa_rs::chunking::SeparatorChunker;
//! use docqa_rs::embedding::{Embedder, FallbackEmbedder};
//! use docqa_rs::FileIdentity;
//!
//! let embedder: Arc<dyn Embedder> = Arc::new(FallbackEmbedder::new(64));
//! let mut cache = ContentCache::new(embedder, Box::new(SeparatorChunker::default()), 16);
//!
//! let bytes = b"Refunds are accepted within thirty days.";
//! let id = FileIdentity::from_bytes("policy.txt", bytes);
//! let retriever = cache.get_or_build(&id, bytes).unwrap();
//! let hits = retriever.retrieve("refund window", 4).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod io;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod memory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retrieval;
pub mod session;
pub mod storage;
pub mod streaming;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{Chunk, FileIdentity, Role, Turn};

// Re-export the request path
pub use cache::ContentCache;
pub use memory::ConversationMemory;
pub use pipeline::RetrievalPipeline;
pub use retrieval::Retriever;
pub use session::Session;
pub use streaming::{MessageSurface, SinkState, StreamingSink};

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, EmbeddingStore, SqliteStore};

// Re-export chunking types
pub use chunking::{Chunker, SeparatorChunker, available_strategies, create_chunker};

// Re-export model types
pub use embedding::{
    DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder,
};
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use llm::{ChatModel, create_chat_model};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
