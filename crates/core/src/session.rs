use crate::index::KnowledgeIndex;
use crate::traits::{EmbeddingService, GenerationService};
use crate::{ChatError, ChatMessage, GenerationRequest, SessionOptions, Turn};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// One conversation over the current knowledge index.
///
/// The session is Empty until an index is installed and Ready afterwards.
/// Installing a new index keeps the existing turns, so later answers may be
/// given against documents the earlier turns never saw.
pub struct ConversationSession<E: ?Sized, G: ?Sized> {
    id: Uuid,
    index: Option<KnowledgeIndex<E>>,
    generator: Arc<G>,
    turns: Vec<Turn>,
    options: SessionOptions,
}

impl<E, G> ConversationSession<E, G>
where
    E: EmbeddingService + ?Sized,
    G: GenerationService + ?Sized,
{
    pub fn new(generator: Arc<G>, options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            index: None,
            generator,
            turns: Vec::new(),
            options,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<&KnowledgeIndex<E>> {
        self.index.as_ref()
    }

    /// Makes `index` the one questions are answered from and returns the
    /// index it replaced, if any.
    pub fn install_index(&mut self, index: KnowledgeIndex<E>) -> Option<KnowledgeIndex<E>> {
        info!(
            session = %self.id,
            chunks = index.len(),
            kept_turns = self.turns.len(),
            "knowledge index installed"
        );
        self.index.replace(index)
    }

    /// Answers `question` from the current index and records the turn.
    ///
    /// Nothing is recorded unless generation succeeds.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn ask(&mut self, question: &str) -> Result<Turn, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::InvalidQuestion("question is empty".to_string()));
        }

        let index = self.index.as_ref().ok_or_else(|| {
            ChatError::NotReady("process documents before asking questions".to_string())
        })?;

        let history = self.history_messages();
        let retrieval_question = if self.options.condense_question && !history.is_empty() {
            let condensed = self.generator.condense_question(&history, question).await?;
            debug!(%condensed, "condensed follow-up question");
            condensed
        } else {
            question.to_string()
        };

        let retrieved = index.query(&retrieval_question, self.options.top_k).await?;
        debug!(retrieved = retrieved.len(), "context retrieved");

        let request = GenerationRequest {
            context: retrieved.into_iter().map(|hit| hit.chunk.text).collect(),
            history,
            question: question.to_string(),
        };

        let answer = self.generator.generate(&request).await?;
        let turn = Turn::new(question, answer);
        self.turns.push(turn.clone());

        info!(turns = self.turns.len(), "question answered");
        Ok(turn)
    }

    /// Turns in conversational order, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns flattened into alternating user/assistant messages, oldest first.
    pub fn history_messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().flat_map(Turn::messages).collect()
    }

    pub fn reset_history(&mut self) {
        debug!(session = %self.id, dropped = self.turns.len(), "history cleared");
        self.turns.clear();
    }
}
