pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod traits;

pub use chunking::{reassemble_chunks, split_text, ChunkingConfig};
pub use config::AzureOpenAiConfig;
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ChatError, IngestError};
pub use extractor::{extract_text, extract_text_with, LopdfExtractor, PageText, PdfExtractor};
pub use index::KnowledgeIndex;
pub use ingest::{discover_pdf_files, load_documents, resolve_pdf_inputs};
pub use models::{
    ChatMessage, EmbeddingConfig, GenerationRequest, IngestionOptions, ProcessReport,
    RetrievedChunk, Role, SessionOptions, SourceDocument, TextChunk, Turn,
};
pub use orchestrator::ChatOrchestrator;
pub use providers::{AzureOpenAiChat, AzureOpenAiEmbedder};
pub use session::ConversationSession;
pub use traits::{EmbeddingService, GenerationService};
