use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("embedding service {backend} failed: {details}")]
    EmbeddingService { backend: String, details: String },

    #[error("generation service {backend} failed: {details}")]
    GenerationService { backend: String, details: String },

    #[error("embedding config mismatch: index built with {built}, queried with {queried}")]
    EmbeddingConfigMismatch { built: String, queried: String },

    #[error("knowledge base not ready: {0}")]
    NotReady(String),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("invalid service config: {0}")]
    Config(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl ChatError {
    pub fn embedding(backend: impl Into<String>, details: impl ToString) -> Self {
        Self::EmbeddingService {
            backend: backend.into(),
            details: details.to_string(),
        }
    }

    pub fn generation(backend: impl Into<String>, details: impl ToString) -> Self {
        Self::GenerationService {
            backend: backend.into(),
            details: details.to_string(),
        }
    }
}
