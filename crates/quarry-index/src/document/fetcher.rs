use std::pin::pin;
use std::time::Duration;

use futures::StreamExt;
use quarry_llm::StatusTx;

use super::error::FetchError;
use super::extractor::normalize;
use super::loader::{PdfLoader, RawUnit, SourceLoader, WebLoader};
use super::types::{Document, Source, SourceKind};
use super::DEFAULT_MAX_BODY_BYTES;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_body_bytes: usize,
    /// Sources fetched at once; 1 keeps fetching sequential.
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            concurrency: 1,
            user_agent: quarry_llm::http::DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// Outcome of fetching a batch of sources. One bad source never aborts the batch.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Documents of all successful sources, grouped by source in input order.
    pub documents: Vec<Document>,
    /// Document count per successful source.
    pub loaded: Vec<(Source, usize)>,
    pub failures: Vec<(Source, FetchError)>,
}

impl FetchReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub struct Fetcher {
    web: WebLoader,
    pdf: PdfLoader,
    concurrency: usize,
    status_tx: Option<StatusTx>,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("concurrency", &self.concurrency)
            .field("status_tx", &self.status_tx.is_some())
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    #[must_use]
    pub fn new(config: &FetcherConfig) -> Self {
        let client = quarry_llm::http::build_client(config.timeout, &config.user_agent);

        Self {
            web: WebLoader::new(client.clone(), config.max_body_bytes),
            pdf: PdfLoader::new(client, config.max_body_bytes),
            concurrency: config.concurrency.max(1),
            status_tx: None,
        }
    }

    #[must_use]
    pub fn with_status_tx(mut self, tx: StatusTx) -> Self {
        self.status_tx = Some(tx);
        self
    }

    fn emit_status(&self, msg: impl Into<String>) {
        if let Some(ref tx) = self.status_tx {
            let _ = tx.send(msg.into());
        }
    }

    fn loader_for(&self, kind: SourceKind) -> &dyn SourceLoader {
        match kind {
            SourceKind::Web => &self.web,
            SourceKind::Pdf => &self.pdf,
        }
    }

    /// Fetch a single source and return its raw text units.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status, oversized
    /// body, or unparseable content.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<RawUnit>, FetchError> {
        self.loader_for(source.kind()).load(source).await
    }

    /// Fetch and normalize every source, collecting per-source failures.
    pub async fn fetch_all(&self, sources: &[Source]) -> FetchReport {
        let mut results = pin!(
            futures::stream::iter(sources)
                .map(|source| async move { (source, self.fetch(source).await) })
                .buffered(self.concurrency)
        );

        let mut report = FetchReport::default();
        while let Some((source, result)) = results.next().await {
            match result {
                Ok(units) => {
                    let documents = normalize(source, units);
                    let count = documents.len();
                    tracing::info!(url = %source, documents = count, "loaded source");
                    self.emit_status(format!("Loaded {count} documents from {source}."));
                    report.documents.extend(documents);
                    report.loaded.push((source.clone(), count));
                }
                Err(e) => {
                    tracing::warn!(url = %source, "fetch failed: {e:#}");
                    if e.is_network() {
                        self.emit_status(format!("Network error when accessing {source}: {e}"));
                    } else {
                        self.emit_status(format!("Error loading content from {source}: {e}"));
                    }
                    report.failures.push((source.clone(), e));
                }
            }
        }
        report
    }
}
