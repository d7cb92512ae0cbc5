//! Azure OpenAI adapters for the embedding and generation services.

use crate::config::AzureOpenAiConfig;
use crate::traits::{EmbeddingService, GenerationService};
use crate::{ChatError, ChatMessage, EmbeddingConfig, GenerationRequest, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

const EMBEDDING_BACKEND: &str = "azure-openai-embeddings";
const CHAT_BACKEND: &str = "azure-openai-chat";

const ANSWER_INSTRUCTIONS: &str = "Answer the user's question using only the context below. \
If the context does not contain the answer, say that you don't know instead of guessing.";

const CONDENSE_INSTRUCTIONS: &str = "Rewrite the follow-up question so that it can be understood \
without the conversation. Keep the language of the question. Reply with the rewritten question only.";

pub struct AzureOpenAiEmbedder {
    client: Client,
    url: Url,
    api_key: String,
    embedding: EmbeddingConfig,
}

impl AzureOpenAiEmbedder {
    pub fn new(config: AzureOpenAiConfig, dimensions: usize) -> Result<Self, ChatError> {
        Ok(Self {
            client: config.http_client()?,
            url: config.operation_url("embeddings")?,
            embedding: EmbeddingConfig {
                model: config.deployment.clone(),
                dimensions,
            },
            api_key: config.api_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

fn ordered_embeddings(mut payload: EmbeddingsResponse) -> Vec<Vec<f32>> {
    payload.data.sort_by_key(|item| item.index);
    payload.data.into_iter().map(|item| item.embedding).collect()
}

#[async_trait]
impl EmbeddingService for AzureOpenAiEmbedder {
    fn config(&self) -> &EmbeddingConfig {
        &self.embedding
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .json(&EmbeddingsRequest { input: texts })
            .send()
            .await
            .map_err(|error| ChatError::embedding(EMBEDDING_BACKEND, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::embedding(
                EMBEDDING_BACKEND,
                format!("{status}: {body}"),
            ));
        }

        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|error| ChatError::embedding(EMBEDDING_BACKEND, error))?;

        debug!(received = payload.data.len(), "embeddings received");
        Ok(ordered_embeddings(payload))
    }
}

pub struct AzureOpenAiChat {
    client: Client,
    url: Url,
    api_key: String,
    temperature: f32,
}

impl AzureOpenAiChat {
    pub fn new(config: AzureOpenAiConfig) -> Result<Self, ChatError> {
        Ok(Self {
            client: config.http_client()?,
            url: config.operation_url("chat/completions")?,
            api_key: config.api_key,
            temperature: 0.7,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .json(&ChatCompletionRequest {
                messages,
                temperature: self.temperature,
            })
            .send()
            .await
            .map_err(|error| ChatError::generation(CHAT_BACKEND, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::generation(CHAT_BACKEND, format!("{status}: {body}")));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| ChatError::generation(CHAT_BACKEND, error))?;

        first_choice_content(payload)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_content(payload: ChatCompletionResponse) -> Result<String, ChatError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ChatError::generation(CHAT_BACKEND, "response had no message content"))
}

/// System prompt with the retrieved context, then the prior conversation,
/// then the new question.
pub fn answer_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage::new(
        Role::System,
        format!(
            "{ANSWER_INSTRUCTIONS}\n----------------\n{}",
            request.context.join("\n\n")
        ),
    ));
    messages.extend(request.history.iter().cloned());
    messages.push(ChatMessage::new(Role::User, request.question.clone()));
    messages
}

pub fn condense_messages(history: &[ChatMessage], question: &str) -> Vec<ChatMessage> {
    let transcript = history
        .iter()
        .map(|message| match message.role {
            Role::User => format!("Human: {}", message.content),
            Role::Assistant => format!("Assistant: {}", message.content),
            Role::System => format!("System: {}", message.content),
        })
        .collect::<Vec<_>>()
        .join("\n");

    vec![ChatMessage::new(
        Role::User,
        format!(
            "{CONDENSE_INSTRUCTIONS}\n\nConversation:\n{transcript}\n\nFollow-up question: {question}\nStandalone question:"
        ),
    )]
}

#[async_trait]
impl GenerationService for AzureOpenAiChat {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError> {
        self.complete(answer_messages(request)).await
    }

    async fn condense_question(
        &self,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String, ChatError> {
        self.complete(condense_messages(history, question)).await
    }
}
