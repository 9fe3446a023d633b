use quarry_index::{IndexError, QueryError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no URLs provided")]
    EmptyInput,

    #[error("no valid content retrieved ({failures} sources failed)")]
    NoContent { failures: usize },

    #[error("index build failed: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("no index available, process a URL list first")]
    NotProcessed,
}

impl SessionError {
    /// Whether processing halted because there was nothing to index.
    #[must_use]
    pub fn is_empty_input(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::NoContent { .. } | Self::Index(IndexError::EmptyInput)
        )
    }
}
