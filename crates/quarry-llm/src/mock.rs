//! Test-only mock provider with deterministic embeddings.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::provider::{LlmProvider, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmbeddingMode {
    Disabled,
    Fixed,
    /// Hashed bag of lowercase alphanumeric tokens, L2-normalized.
    Hashed(usize),
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    chat_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    embedding_mode: EmbeddingMode,
    pub fail_chat: bool,
    /// Fail every embedding call after this many successful ones.
    pub fail_embed_after: Option<usize>,
    /// Milliseconds to sleep before returning a chat response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            chat_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            default_response: "mock response".into(),
            embedding: vec![0.0; 384],
            embedding_mode: EmbeddingMode::Disabled,
            fail_chat: false,
            fail_embed_after: None,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    /// Every `embed` call returns `embedding` unchanged.
    #[must_use]
    pub fn with_fixed_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self.embedding_mode = EmbeddingMode::Fixed;
        self
    }

    /// Texts sharing tokens land close together; identical texts map to identical vectors.
    #[must_use]
    pub fn with_hashed_embeddings(mut self, dimensions: usize) -> Self {
        self.embedding_mode = EmbeddingMode::Hashed(dimensions.max(1));
        self
    }

    #[must_use]
    pub fn with_embed_failure_after(mut self, successes: usize) -> Self {
        self.fail_embed_after = Some(successes);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Messages received by every `chat` call so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn recorded_prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }
}

fn hashed_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimensions];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        token.to_lowercase().hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let slot = (hasher.finish() % dimensions as u64) as usize;
        vector[slot] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        let served = self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed_after.is_some_and(|limit| served >= limit) {
            return Err(crate::LlmError::Other("mock embedding error".into()));
        }
        match self.embedding_mode {
            EmbeddingMode::Disabled => Err(crate::LlmError::EmbedUnsupported {
                provider: "mock".into(),
            }),
            EmbeddingMode::Fixed => Ok(self.embedding.clone()),
            EmbeddingMode::Hashed(dimensions) => Ok(hashed_embedding(text, dimensions)),
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_mode != EmbeddingMode::Disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_served_in_order_then_default() {
        let mock = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        assert_eq!(mock.chat(&[]).await.unwrap(), "one");
        assert_eq!(mock.chat(&[]).await.unwrap(), "two");
        assert_eq!(mock.chat(&[]).await.unwrap(), "mock response");
        assert_eq!(mock.chat_calls(), 3);
    }

    #[tokio::test]
    async fn hashed_embeddings_are_deterministic_and_normalized() {
        let mock = MockProvider::default().with_hashed_embeddings(32);
        let a = mock.embed("Quarry indexes documents").await.unwrap();
        let b = mock.embed("quarry INDEXES documents").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn disabled_embeddings_are_unsupported() {
        let mock = MockProvider::default();
        assert!(!mock.supports_embeddings());
        assert!(matches!(
            mock.embed("x").await,
            Err(crate::LlmError::EmbedUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn embed_failure_after_limit() {
        let mock = MockProvider::default()
            .with_fixed_embedding(vec![1.0, 0.0])
            .with_embed_failure_after(1);
        assert!(mock.embed("a").await.is_ok());
        assert!(mock.embed("b").await.is_err());
    }

    #[tokio::test]
    async fn clones_share_counters_and_prompts() {
        let mock = MockProvider::default();
        let clone = mock.clone();
        clone.chat(&[Message::user("hi")]).await.unwrap();
        assert_eq!(mock.chat_calls(), 1);
        assert_eq!(mock.recorded_prompts()[0][0].content, "hi");
    }

    #[test]
    fn empty_text_hashes_to_zero_vector() {
        assert!(hashed_embedding("   ", 8).iter().all(|v| *v == 0.0));
    }

    proptest::proptest! {
        #[test]
        fn hashed_embedding_is_unit_length(text in "[a-z ]{0,40}[a-z]", dims in 1usize..64) {
            let v = hashed_embedding(&text, dims);
            proptest::prop_assert_eq!(v.len(), dims);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            proptest::prop_assert!((norm - 1.0).abs() < 1e-4);
        }
    }
}
