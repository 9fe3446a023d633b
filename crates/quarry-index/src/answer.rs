use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quarry_llm::{LlmProvider, Message};

use crate::error::QueryError;
use crate::index::{RetrievedChunk, VectorIndex};

const SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub top_k: usize,
    pub llm_timeout: Duration,
    pub embed_timeout: Duration,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            llm_timeout: Duration::from_secs(120),
            embed_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    Answer {
        text: String,
        contexts: Vec<RetrievedChunk>,
        elapsed: Duration,
    },
    /// The model replied with nothing usable. Not an error.
    NoAnswer {
        contexts: Vec<RetrievedChunk>,
        elapsed: Duration,
    },
}

impl AnswerOutcome {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Answer { text, .. } => Some(text),
            Self::NoAnswer { .. } => None,
        }
    }

    #[must_use]
    pub fn contexts(&self) -> &[RetrievedChunk] {
        match self {
            Self::Answer { contexts, .. } | Self::NoAnswer { contexts, .. } => contexts,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Answer { elapsed, .. } | Self::NoAnswer { elapsed, .. } => *elapsed,
        }
    }
}

/// Retrieval-QA over a built [`VectorIndex`]: retrieve the nearest chunks and
/// stuff them into a single prompt.
pub struct AnswerEngine<P: LlmProvider> {
    provider: Arc<P>,
    config: AnswerConfig,
}

impl<P: LlmProvider> std::fmt::Debug for AnswerEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl<P: LlmProvider> AnswerEngine<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: AnswerConfig) -> Self {
        Self { provider, config }
    }

    #[must_use]
    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Answer `query` from the chunks of `index`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyQuery`] for a blank query and
    /// [`QueryError::EmptyIndex`] when the index holds nothing, both before any
    /// provider call. Embedding, retrieval, answering, and timeout failures
    /// are returned as is; the index stays usable.
    pub async fn answer(&self, index: &VectorIndex, query: &str) -> Result<AnswerOutcome, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if index.is_empty() || index.count().await? == 0 {
            return Err(QueryError::EmptyIndex);
        }

        let start = Instant::now();

        let query_vector = tokio::time::timeout(self.config.embed_timeout, index.embed_query(query))
            .await
            .map_err(|_| QueryError::Timeout {
                stage: "query embedding",
                seconds: self.config.embed_timeout.as_secs(),
            })?
            .map_err(QueryError::Embedding)?;

        let contexts = index.nearest(query_vector, self.config.top_k).await?;
        tracing::debug!(retrieved = contexts.len(), "retrieved context chunks");

        let messages = build_messages(query, &contexts);
        let response = tokio::time::timeout(self.config.llm_timeout, self.provider.chat(&messages))
            .await
            .map_err(|_| QueryError::Timeout {
                stage: "answer",
                seconds: self.config.llm_timeout.as_secs(),
            })?
            .map_err(QueryError::Answer)?;

        let elapsed = start.elapsed();
        tracing::info!(elapsed_ms = elapsed.as_millis(), "answered query");

        let text = response.trim();
        if text.is_empty() {
            Ok(AnswerOutcome::NoAnswer { contexts, elapsed })
        } else {
            Ok(AnswerOutcome::Answer {
                text: text.to_owned(),
                contexts,
                elapsed,
            })
        }
    }
}

fn build_messages(query: &str, contexts: &[RetrievedChunk]) -> Vec<Message> {
    let mut user = String::from("Context:\n");
    for (i, chunk) in contexts.iter().enumerate() {
        let _ = write!(user, "\n[{}] {}\n", i + 1, chunk.content.trim());
    }
    let _ = write!(user, "\nQuestion: {query}\nHelpful Answer:");
    vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use quarry_llm::mock::MockProvider;

    use super::*;
    use crate::document::Chunk;
    use crate::in_memory_store::InMemoryVectorStore;
    use crate::index::IndexBuilder;

    async fn index_with(mock: &MockProvider, texts: &[&str]) -> VectorIndex {
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                content: (*t).to_owned(),
                source: "https://example.com/rocks".to_owned(),
                page: None,
                document_index: 0,
                chunk_index: i,
                start_char: 0,
            })
            .collect();
        let provider = quarry_llm::AnyProvider::Mock(mock.clone());
        IndexBuilder::new(
            Arc::new(InMemoryVectorStore::new()),
            provider.embed_fn(),
            "mock",
        )
        .build(&chunks)
        .await
        .unwrap()
    }

    fn engine(mock: &MockProvider) -> AnswerEngine<MockProvider> {
        AnswerEngine::new(Arc::new(mock.clone()), AnswerConfig::default())
    }

    #[tokio::test]
    async fn whitespace_query_never_reaches_provider() {
        let mock = MockProvider::default().with_hashed_embeddings(64);
        let index = index_with(&mock, &["granite is igneous"]).await;
        let embeds_before = mock.embed_calls();

        let err = engine(&mock).answer(&index, "   \n\t").await.unwrap_err();
        assert!(matches!(err, QueryError::EmptyQuery));
        assert_eq!(mock.chat_calls(), 0);
        assert_eq!(mock.embed_calls(), embeds_before);
    }

    #[tokio::test]
    async fn answer_uses_retrieved_context() {
        let mock = MockProvider::with_responses(vec!["Granite.".into()]).with_hashed_embeddings(4096);
        let index = index_with(
            &mock,
            &[
                "slate is a metamorphic rock",
                "zircon crystals survive erosion",
                "limestone dissolves in acid",
            ],
        )
        .await;

        let outcome = engine(&mock)
            .answer(&index, "what survives erosion? zircon")
            .await
            .unwrap();
        assert_eq!(outcome.text(), Some("Granite."));
        assert_eq!(outcome.contexts()[0].content, "zircon crystals survive erosion");

        let prompts = mock.recorded_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0][1].content.contains("[1] zircon crystals survive erosion"));
        assert!(prompts[0][1].content.contains("Question: what survives erosion? zircon"));
    }

    #[tokio::test]
    async fn blank_response_is_no_answer() {
        let mock = MockProvider::with_responses(vec!["  \n".into()]).with_hashed_embeddings(32);
        let index = index_with(&mock, &["basalt"]).await;
        let outcome = engine(&mock).answer(&index, "basalt?").await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::NoAnswer { .. }));
        assert_eq!(outcome.text(), None);
        assert_eq!(outcome.contexts().len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_is_answer_error() {
        let mock = MockProvider::failing().with_hashed_embeddings(32);
        let index = index_with(&mock, &["gneiss"]).await;
        let err = engine(&mock).answer(&index, "gneiss?").await.unwrap_err();
        assert!(matches!(err, QueryError::Answer(_)));
    }

    #[tokio::test]
    async fn dropped_collection_is_empty_index() {
        let mock = MockProvider::default().with_hashed_embeddings(32);
        let index = index_with(&mock, &["marble"]).await;
        index.drop_collection().await.unwrap();
        let err = engine(&mock).answer(&index, "marble?").await.unwrap_err();
        assert!(matches!(err, QueryError::EmptyIndex));
        assert_eq!(mock.chat_calls(), 0);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let mock = MockProvider::default().with_hashed_embeddings(32).with_delay(500);
        let index = index_with(&mock, &["quartz"]).await;
        let engine = AnswerEngine::new(
            Arc::new(mock.clone()),
            AnswerConfig {
                llm_timeout: Duration::from_millis(20),
                ..AnswerConfig::default()
            },
        );
        let err = engine.answer(&index, "quartz?").await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout { stage: "answer", .. }));
    }

    #[test]
    fn top_k_defaults_to_four() {
        assert_eq!(AnswerConfig::default().top_k, 4);
    }

    #[test]
    fn prompt_numbers_contexts() {
        let contexts = vec![
            RetrievedChunk {
                content: "alpha".into(),
                source: "s".into(),
                page: None,
                chunk_index: 0,
                score: 0.9,
            },
            RetrievedChunk {
                content: "beta".into(),
                source: "s".into(),
                page: Some(2),
                chunk_index: 1,
                score: 0.5,
            },
        ];
        let messages = build_messages("why?", &contexts);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("don't know"));
        assert!(messages[1].content.contains("[1] alpha"));
        assert!(messages[1].content.contains("[2] beta"));
        assert!(messages[1].content.ends_with("Question: why?\nHelpful Answer:"));
    }
}
