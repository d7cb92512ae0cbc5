use crate::{ChatError, ChatMessage, EmbeddingConfig, GenerationRequest};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// The model and dimensionality every vector from this service has.
    fn config(&self) -> &EmbeddingConfig;

    /// Returns one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError>;

    /// Rewrites a follow-up question so it can be understood without the
    /// conversation. Services that cannot do this return it unchanged.
    async fn condense_question(
        &self,
        _history: &[ChatMessage],
        question: &str,
    ) -> Result<String, ChatError> {
        Ok(question.to_string())
    }
}
