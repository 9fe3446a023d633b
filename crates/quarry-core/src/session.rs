use std::sync::Arc;
use std::time::{Duration, Instant};

use quarry_index::{
    AnswerEngine, AnswerOutcome, CacheKey, FetchError, Fetcher, IndexBuilder, IndexCache,
    InMemoryVectorStore, Source, TextSplitter, VectorIndex, VectorStore,
};
use quarry_llm::{EmbedFn, LlmProvider, StatusTx};

use crate::config::Config;
use crate::error::SessionError;
use crate::url_list::parse_url_list;

/// Documents whose snippets are included in a processing summary.
const SNIPPET_DOCUMENTS: usize = 5;
const SNIPPET_CHARS: usize = 100;

/// Summary of one `process` call.
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub sources: usize,
    pub documents: usize,
    /// Leading characters of the first few documents.
    pub snippets: Vec<String>,
    pub failures: Vec<(Source, FetchError)>,
    /// Chunks in the active index.
    pub index_size: usize,
    pub build_time: Duration,
    /// The index was reused from an earlier call with the same URL list.
    pub cached: bool,
}

/// One interactive research session: process a URL list into an index, then
/// answer any number of questions against it.
pub struct ResearchSession<P: LlmProvider> {
    fetcher: Fetcher,
    splitter: TextSplitter,
    builder: IndexBuilder,
    engine: AnswerEngine<P>,
    cache: IndexCache,
    current: Option<VectorIndex>,
    status_tx: Option<StatusTx>,
}

impl<P: LlmProvider> std::fmt::Debug for ResearchSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchSession")
            .field("builder", &self.builder)
            .field("engine", &self.engine)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> ResearchSession<P> {
    /// Session backed by an in-memory vector store.
    #[must_use]
    pub fn new(
        config: &Config,
        provider: Arc<P>,
        embed_fn: Arc<EmbedFn>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self::with_store(
            config,
            provider,
            embed_fn,
            embedding_model,
            Arc::new(InMemoryVectorStore::new()),
        )
    }

    #[must_use]
    pub fn with_store(
        config: &Config,
        provider: Arc<P>,
        embed_fn: Arc<EmbedFn>,
        embedding_model: impl Into<String>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(&config.fetcher_config()),
            splitter: TextSplitter::new(config.splitter_config()),
            builder: IndexBuilder::new(store, embed_fn, embedding_model)
                .with_embed_timeout(config.timeouts.embedding()),
            engine: AnswerEngine::new(provider, config.answer_config()),
            cache: IndexCache::new(config.retrieval.cache_capacity),
            current: None,
            status_tx: None,
        }
    }

    #[must_use]
    pub fn with_status_tx(mut self, tx: StatusTx) -> Self {
        self.fetcher = self.fetcher.with_status_tx(tx.clone());
        self.status_tx = Some(tx);
        self
    }

    fn emit_status(&self, msg: impl Into<String>) {
        if let Some(ref tx) = self.status_tx {
            let _ = tx.send(msg.into());
        }
    }

    /// The index questions are currently answered from.
    #[must_use]
    pub fn index(&self) -> Option<&VectorIndex> {
        self.current.as_ref()
    }

    /// Parse a newline-separated URL list and process it.
    ///
    /// # Errors
    ///
    /// See [`Self::process_sources`].
    pub async fn process(&mut self, input: &str) -> Result<ProcessReport, SessionError> {
        self.process_sources(parse_url_list(input)).await
    }

    /// Fetch, extract, chunk, and index `sources`, replacing the active index.
    ///
    /// An input set processed before is served from the cache without any
    /// network traffic. On failure no index is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyInput`] before any request when `sources`
    /// is empty, [`SessionError::NoContent`] when no source produced text,
    /// and [`SessionError::Index`] when building the index fails.
    pub async fn process_sources(
        &mut self,
        sources: Vec<Source>,
    ) -> Result<ProcessReport, SessionError> {
        self.current = None;

        if sources.is_empty() {
            self.emit_status("Please enter at least one URL.");
            return Err(SessionError::EmptyInput);
        }

        let key = CacheKey::for_sources(&sources, self.builder.embedding_model());
        if let Some(index) = self.cache.get(&key) {
            tracing::info!(collection = index.collection(), "reusing cached index");
            self.emit_status(format!("Reusing index for {} sources.", sources.len()));
            let report = ProcessReport {
                sources: sources.len(),
                index_size: index.len(),
                cached: true,
                ..ProcessReport::default()
            };
            self.current = Some(index);
            return Ok(report);
        }

        let fetched = self.fetcher.fetch_all(&sources).await;
        if fetched.is_empty() {
            self.emit_status("No valid content retrieved.");
            return Err(SessionError::NoContent {
                failures: fetched.failures.len(),
            });
        }

        let snippets: Vec<String> = fetched
            .documents
            .iter()
            .take(SNIPPET_DOCUMENTS)
            .map(|doc| doc.content.chars().take(SNIPPET_CHARS).collect())
            .collect();
        self.emit_status(format!(
            "Total documents loaded: {}",
            fetched.documents.len()
        ));

        let chunks = self.splitter.split(&fetched.documents);
        let start = Instant::now();
        let index = match self.builder.build(&chunks).await {
            Ok(index) => index,
            Err(e) => {
                self.emit_status(format!("Error creating index: {e}"));
                return Err(e.into());
            }
        };
        let build_time = start.elapsed();
        self.emit_status(format!(
            "Index created in {:.2}s.",
            build_time.as_secs_f64()
        ));
        self.emit_status(format!("Index size: {} chunks.", index.len()));

        for stale in self.cache.insert(key, index.clone()) {
            if let Err(e) = stale.drop_collection().await {
                tracing::warn!(collection = stale.collection(), "failed to drop evicted index: {e}");
            }
        }

        let report = ProcessReport {
            sources: sources.len(),
            documents: fetched.documents.len(),
            snippets,
            failures: fetched.failures,
            index_size: index.len(),
            build_time,
            cached: false,
        };
        self.current = Some(index);
        Ok(report)
    }

    /// Answer `query` from the active index.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotProcessed`] when no index is active, or the
    /// query failure. A failed query leaves the index in place.
    pub async fn ask(&self, query: &str) -> Result<AnswerOutcome, SessionError> {
        let index = self.current.as_ref().ok_or(SessionError::NotProcessed)?;
        Ok(self.engine.answer(index, query).await?)
    }
}
