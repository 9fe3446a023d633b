use std::fmt;

/// How a source is fetched and extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Web,
    Pdf,
}

impl SourceKind {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Web => "text/html",
            Self::Pdf => "application/pdf",
        }
    }
}

/// A URL to ingest, tagged by the suffix of its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    url: String,
    kind: SourceKind,
}

impl Source {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = if path_of(&url).to_ascii_lowercase().ends_with(".pdf") {
            SourceKind::Pdf
        } else {
            SourceKind::Web
        };
        Self { url, kind }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.kind == SourceKind::Pdf
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Path component of `url`, without query string or fragment.
fn path_of(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        return parsed.path().to_owned();
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_owned()
}

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub origin: Source,
    pub content_type: String,
    /// 1-based page number for paginated sources.
    pub page: Option<usize>,
}

/// Extracted text unit. `content` is never blank.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub page: Option<usize>,
    /// Position of the parent document in the split input.
    pub document_index: usize,
    /// Position within the parent document.
    pub chunk_index: usize,
    /// Character offset of the chunk within the parent document.
    pub start_char: usize,
}
