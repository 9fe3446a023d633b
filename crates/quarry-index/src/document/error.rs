#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to download {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("response too large: {size} bytes (max: {max})")]
    BodyTooLarge { size: u64, max: usize },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTML extraction failed: {0}")]
    Html(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Whether the failure happened at the transport layer rather than while
    /// interpreting a response.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
