use crate::embeddings::cosine_similarity;
use crate::traits::EmbeddingService;
use crate::{ChatError, EmbeddingConfig, IngestError, RetrievedChunk, TextChunk};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: TextChunk,
    vector: Vec<f32>,
}

/// In-memory nearest-neighbour index over chunk embeddings.
///
/// Similarity is cosine; higher scores are nearer. The embedding config the
/// index was built with is kept, and every query vector must match its
/// dimensions.
pub struct KnowledgeIndex<E: ?Sized> {
    embedder: Arc<E>,
    config: EmbeddingConfig,
    entries: Vec<IndexedChunk>,
}

impl<E> KnowledgeIndex<E>
where
    E: EmbeddingService + ?Sized,
{
    /// An index with nothing in it. Every query fails with `NotReady`.
    pub fn empty(embedder: Arc<E>) -> Self {
        let config = embedder.config().clone();
        Self {
            embedder,
            config,
            entries: Vec::new(),
        }
    }

    /// Embeds all chunks and returns the finished index. Nothing is returned
    /// unless every batch succeeded.
    pub async fn build(
        embedder: Arc<E>,
        chunks: Vec<TextChunk>,
        batch_size: usize,
    ) -> Result<Self, ChatError> {
        if chunks.is_empty() {
            return Err(IngestError::InvalidArgument(
                "no text chunks to index; the documents had no extractable text".to_string(),
            )
            .into());
        }

        let config = embedder.config().clone();
        let backend = config.model.clone();
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(ChatError::embedding(
                    &backend,
                    format!(
                        "embedding count {} doesn't match chunk count {}",
                        vectors.len(),
                        batch.len()
                    ),
                ));
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != config.dimensions {
                    return Err(ChatError::embedding(
                        &backend,
                        format!(
                            "embedding dimension {} != {}",
                            vector.len(),
                            config.dimensions
                        ),
                    ));
                }

                entries.push(IndexedChunk {
                    chunk: chunk.clone(),
                    vector,
                });
            }

            debug!(indexed = entries.len(), total = chunks.len(), "embedded batch");
        }

        info!(chunks = entries.len(), embedding = %config, "knowledge index built");

        Ok(Self {
            embedder,
            config,
            entries,
        })
    }

    /// Returns up to `k` chunks nearest to `question`, nearest first. Equal
    /// scores keep insertion order.
    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>, ChatError> {
        if self.entries.is_empty() {
            return Err(ChatError::NotReady(
                "knowledge index has not been built".to_string(),
            ));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::embedding(&self.config.model, "no embedding returned"))?;

        if query_vector.len() != self.config.dimensions {
            return Err(ChatError::EmbeddingConfigMismatch {
                built: self.config.to_string(),
                queried: format!("{}/{}d", self.config.model, query_vector.len()),
            });
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_vector, &entry.vector), entry))
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| RetrievedChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
