use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An uploaded PDF, held only until its text has been extracted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
    pub checksum: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self {
            name: name.into(),
            checksum: format!("{:x}", hasher.finalize()),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    pub chunk_id: String,
    pub chunk_index: u64,
    /// Offset of the first char of this chunk in the extracted text, in chars.
    pub start_char: usize,
    pub text: String,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Identifies the embedding space an index lives in. Vectors produced under
/// different configs are not comparable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
}

impl std::fmt::Display for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}d", self.model, self.dimensions)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }

    /// The user message followed by the assistant reply.
    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::new(Role::User, self.question.clone()),
            ChatMessage::new(Role::Assistant, self.answer.clone()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub context: Vec<String>,
    pub history: Vec<ChatMessage>,
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessReport {
    pub document_count: usize,
    pub text_chars: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub chunk_separator: String,
    pub embedding_batch_size: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
            chunk_separator: "\n".to_string(),
            embedding_batch_size: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub top_k: usize,
    pub condense_question: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            condense_question: false,
        }
    }
}
