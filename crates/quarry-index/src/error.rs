use quarry_llm::LlmError;

use crate::vector_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no chunks to index")]
    EmptyInput,

    #[error("embedding failed for chunk {chunk_index}: {source}")]
    Embedding {
        chunk_index: usize,
        source: LlmError,
    },

    #[error("chunk {chunk_index} embedded to {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        chunk_index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("embedding chunk {chunk_index} timed out after {seconds}s")]
    Timeout { chunk_index: usize, seconds: u64 },

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("index holds no chunks")]
    EmptyIndex,

    #[error("query embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    #[error("answering failed: {0}")]
    Answer(#[source] LlmError),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },
}
