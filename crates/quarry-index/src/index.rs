use std::sync::Arc;
use std::time::Duration;

use quarry_llm::{EmbedFn, LlmError};
use serde_json::json;
use uuid::Uuid;

use crate::document::Chunk;
use crate::error::IndexError;
use crate::vector_store::{Payload, VectorPoint, VectorStore, VectorStoreError};

/// A chunk returned by nearest-neighbour lookup, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub page: Option<usize>,
    pub chunk_index: usize,
    pub score: f32,
}

/// Embeds chunks and loads them into a vector store collection.
pub struct IndexBuilder {
    store: Arc<dyn VectorStore>,
    embed_fn: Arc<EmbedFn>,
    embedding_model: String,
    embed_timeout: Duration,
}

impl std::fmt::Debug for IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("embedding_model", &self.embedding_model)
            .field("embed_timeout", &self.embed_timeout)
            .finish_non_exhaustive()
    }
}

impl IndexBuilder {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embed_fn: Arc<EmbedFn>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embed_fn,
            embedding_model: embedding_model.into(),
            embed_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Embed every chunk and store them in a fresh collection.
    ///
    /// All chunks are embedded before anything is written, so a failure
    /// leaves no partial index behind. Identical chunks and model always map
    /// to the same collection, which is rebuilt from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyInput`] for an empty chunk set, or an
    /// embedding, timeout, dimension, or store error for the first chunk that fails.
    pub async fn build(&self, chunks: &[Chunk]) -> Result<VectorIndex, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyInput);
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let vector = tokio::time::timeout(self.embed_timeout, (self.embed_fn)(&chunk.content))
                .await
                .map_err(|_| IndexError::Timeout {
                    chunk_index,
                    seconds: self.embed_timeout.as_secs(),
                })?
                .map_err(|source| IndexError::Embedding {
                    chunk_index,
                    source,
                })?;

            if let Some(first) = vectors.first()
                && first.len() != vector.len()
            {
                return Err(IndexError::DimensionMismatch {
                    chunk_index,
                    expected: first.len(),
                    actual: vector.len(),
                });
            }
            vectors.push(vector);
        }

        let dimensions = vectors.first().map_or(0, Vec::len);
        let collection = collection_name(&self.embedding_model, chunks);

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| VectorPoint {
                id: Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{collection}:{i}").as_bytes())
                    .to_string(),
                vector,
                payload: chunk_payload(chunk),
            })
            .collect();

        self.store.delete_collection(&collection).await?;
        self.store
            .ensure_collection(&collection, dimensions as u64)
            .await?;
        self.store.upsert(&collection, points).await?;

        tracing::info!(
            %collection,
            chunks = chunks.len(),
            dimensions,
            "built vector index"
        );

        Ok(VectorIndex {
            store: Arc::clone(&self.store),
            embed_fn: Arc::clone(&self.embed_fn),
            collection,
            embedding_model: self.embedding_model.clone(),
            len: chunks.len(),
            dimensions,
        })
    }
}

fn chunk_payload(chunk: &Chunk) -> Payload {
    Payload::from_iter([
        ("content".to_owned(), json!(chunk.content)),
        ("source".to_owned(), json!(chunk.source)),
        ("page".to_owned(), json!(chunk.page)),
        ("document_index".to_owned(), json!(chunk.document_index)),
        ("chunk_index".to_owned(), json!(chunk.chunk_index)),
    ])
}

/// Deterministic collection name derived from the model and chunk contents.
fn collection_name(embedding_model: &str, chunks: &[Chunk]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(embedding_model.as_bytes());
    for chunk in chunks {
        hasher.update(&[0]);
        hasher.update(chunk.source.as_bytes());
        hasher.update(&[0]);
        hasher.update(chunk.content.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("quarry_{}", &hex[..16])
}

/// Handle to a built index. Queries embed through the same closure that built it.
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embed_fn: Arc<EmbedFn>,
    collection: String,
    embedding_model: String,
    len: usize,
    dimensions: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("collection", &self.collection)
            .field("embedding_model", &self.embedding_model)
            .field("len", &self.len)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Number of chunks indexed at build time.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Points currently stored for this index.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn count(&self) -> Result<u64, VectorStoreError> {
        self.store.count(&self.collection).await
    }

    /// # Errors
    ///
    /// Returns an error if the embedding call fails.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LlmError> {
        (self.embed_fn)(query).await
    }

    /// The `k` chunks closest to `query_vector`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store search fails.
    pub async fn nearest(
        &self,
        query_vector: Vec<f32>,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let points = self
            .store
            .search(&self.collection, query_vector, k)
            .await?;

        Ok(points
            .into_iter()
            .map(|p| RetrievedChunk {
                content: payload_str(&p.payload, "content"),
                source: payload_str(&p.payload, "source"),
                page: payload_usize(&p.payload, "page"),
                chunk_index: payload_usize(&p.payload, "chunk_index").unwrap_or_default(),
                score: p.score,
            })
            .collect())
    }

    /// Remove this index's collection from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails.
    pub async fn drop_collection(&self) -> Result<(), VectorStoreError> {
        self.store.delete_collection(&self.collection).await
    }
}

fn payload_str(payload: &Payload, key: &str) -> String {
    payload
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn payload_usize(payload: &Payload, key: &str) -> Option<usize> {
    payload
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}
