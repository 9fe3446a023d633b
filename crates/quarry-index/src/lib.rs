//! Ingestion and answering pipeline: fetch sources, extract text, split into
//! overlapping chunks, embed them into a vector index, and answer questions
//! from the nearest chunks.

pub mod answer;
pub mod cache;
pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod index;
pub mod vector_store;

pub use answer::{AnswerConfig, AnswerEngine, AnswerOutcome};
pub use cache::{CacheKey, IndexCache};
pub use document::{
    Chunk, Document, DocumentMetadata, FetchError, FetchReport, Fetcher, FetcherConfig, Source,
    SourceKind, SplitterConfig, TextSplitter,
};
pub use error::{IndexError, QueryError};
pub use in_memory_store::InMemoryVectorStore;
pub use index::{IndexBuilder, RetrievedChunk, VectorIndex};
pub use vector_store::{Payload, ScoredPoint, VectorPoint, VectorStore, VectorStoreError};
