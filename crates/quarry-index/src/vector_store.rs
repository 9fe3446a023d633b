//! Storage seam between the index builder and a nearest-neighbour backend.

use std::future::Future;
use std::pin::Pin;

/// Chunk metadata stored alongside each vector.
pub type Payload = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("collection {0} does not exist")]
    MissingCollection(String),
    #[error("point {id} has {actual} dimensions, collection {collection} expects {expected}")]
    Dimensions {
        collection: String,
        id: String,
        expected: u64,
        actual: usize,
    },
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A stored point and its similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Nearest-neighbour storage for embedded chunks, partitioned into
/// collections of fixed dimensionality. Each built index owns one collection.
pub trait VectorStore: Send + Sync {
    /// Create `collection` for `vector_size`-dimensional points unless it exists.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    /// Removing a missing collection is not an error.
    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Insert points, replacing any with the same id.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Up to `limit` points ordered by descending similarity to `vector`.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredPoint>, VectorStoreError>>;

    /// Number of points in `collection`; zero when it does not exist.
    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;
}
