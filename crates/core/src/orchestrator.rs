use crate::chunking::{split_text, ChunkingConfig};
use crate::extractor::{extract_text_with, LopdfExtractor, PdfExtractor};
use crate::index::KnowledgeIndex;
use crate::session::ConversationSession;
use crate::traits::{EmbeddingService, GenerationService};
use crate::{
    ChatError, IngestionOptions, ProcessReport, SessionOptions, SourceDocument, Turn,
};
use std::sync::Arc;
use tracing::info;

/// Entry point for a front end: process uploaded documents, ask questions,
/// read back the rendered history.
///
/// Every mutating call takes `&mut self`, so a build can never overlap a
/// question and only one question is in flight at a time.
pub struct ChatOrchestrator<E: ?Sized, G: ?Sized, X = LopdfExtractor> {
    extractor: X,
    embedder: Arc<E>,
    session: ConversationSession<E, G>,
    options: IngestionOptions,
}

impl<E, G> ChatOrchestrator<E, G, LopdfExtractor>
where
    E: EmbeddingService + ?Sized,
    G: GenerationService + ?Sized,
{
    pub fn new(embedder: Arc<E>, generator: Arc<G>) -> Self {
        Self::with_options(
            embedder,
            generator,
            IngestionOptions::default(),
            SessionOptions::default(),
        )
    }

    pub fn with_options(
        embedder: Arc<E>,
        generator: Arc<G>,
        options: IngestionOptions,
        session_options: SessionOptions,
    ) -> Self {
        Self::with_extractor(LopdfExtractor, embedder, generator, options, session_options)
    }
}

impl<E, G, X> ChatOrchestrator<E, G, X>
where
    E: EmbeddingService + ?Sized,
    G: GenerationService + ?Sized,
    X: PdfExtractor,
{
    pub fn with_extractor(
        extractor: X,
        embedder: Arc<E>,
        generator: Arc<G>,
        options: IngestionOptions,
        session_options: SessionOptions,
    ) -> Self {
        Self {
            extractor,
            embedder,
            session: ConversationSession::new(generator, session_options),
            options,
        }
    }

    /// Extracts, chunks and indexes `documents`, then swaps the new index
    /// into the session. On error the previous index and history stay as
    /// they were.
    pub async fn process_documents(
        &mut self,
        documents: &[SourceDocument],
    ) -> Result<ProcessReport, ChatError> {
        let config = ChunkingConfig::from(&self.options);
        config.validate()?;

        let text = extract_text_with(&self.extractor, documents)?;
        let chunks = split_text(&text, &config)?;

        let report = ProcessReport {
            document_count: documents.len(),
            text_chars: text.chars().count(),
            chunk_count: chunks.len(),
        };
        info!(
            documents = report.document_count,
            text_chars = report.text_chars,
            chunks = report.chunk_count,
            "documents split into chunks"
        );

        let index = KnowledgeIndex::build(
            Arc::clone(&self.embedder),
            chunks,
            self.options.embedding_batch_size,
        )
        .await?;
        self.session.install_index(index);

        Ok(report)
    }

    pub async fn ask(&mut self, question: &str) -> Result<Turn, ChatError> {
        self.session.ask(question).await
    }

    /// Turns most recent first; each turn keeps its question-then-answer order.
    pub fn history(&self) -> Vec<&Turn> {
        self.session.turns().iter().rev().collect()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn reset_history(&mut self) {
        self.session.reset_history();
    }

    pub fn session(&self) -> &ConversationSession<E, G> {
        &self.session
    }
}
