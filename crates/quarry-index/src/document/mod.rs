pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::FetchError;
pub use extractor::normalize;
pub use fetcher::{FetchReport, Fetcher, FetcherConfig};
pub use loader::{PdfLoader, RawUnit, SourceLoader, WebLoader};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{Chunk, Document, DocumentMetadata, Source, SourceKind};

/// Default maximum response body size: 50 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
