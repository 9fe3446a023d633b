use super::{BoxFuture, RawUnit, SourceLoader, download};
use crate::document::error::FetchError;
use crate::document::types::Source;

/// Downloads a PDF and extracts one unit per page that has text.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl PdfLoader {
    #[must_use]
    pub fn new(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }
}

impl SourceLoader for PdfLoader {
    fn load<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, Result<Vec<RawUnit>, FetchError>> {
        Box::pin(async move {
            let body = download(&self.client, source.url(), self.max_body_bytes).await?;
            let pages = extract_pdf(body.bytes).await?;
            tracing::debug!(url = %source, pages = pages.len(), "extracted PDF pages");
            Ok(pages)
        })
    }
}

/// Page texts of a PDF body, extracted on a blocking thread.
pub(super) async fn extract_pdf(bytes: Vec<u8>) -> Result<Vec<RawUnit>, FetchError> {
    // pdf-extract may panic on malformed input; the join error turns that into `Task`.
    tokio::task::spawn_blocking(move || extract_pages(&bytes))
        .await
        .map_err(|e| FetchError::Task(e.to_string()))?
}

fn extract_pages(bytes: &[u8]) -> Result<Vec<RawUnit>, FetchError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| FetchError::Pdf(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| RawUnit {
            text,
            page: Some(i + 1),
        })
        .collect())
}
