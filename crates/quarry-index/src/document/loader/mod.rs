mod pdf;
mod web;

pub use pdf::PdfLoader;
pub use web::WebLoader;

use std::future::Future;
use std::pin::Pin;

use super::error::FetchError;
use super::types::Source;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One unit of text pulled out of a fetched source, before blank filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUnit {
    pub text: String,
    /// 1-based page number for paginated sources.
    pub page: Option<usize>,
}

pub trait SourceLoader: Send + Sync {
    /// Fetch `source` and extract its text units in reading order.
    fn load<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, Result<Vec<RawUnit>, FetchError>>;
}

/// Response body together with its declared media type.
#[derive(Debug)]
pub(crate) struct Downloaded {
    pub bytes: Vec<u8>,
    /// Lowercased media type without parameters, e.g. `text/html`.
    pub content_type: Option<String>,
}

impl Downloaded {
    /// Declared as PDF, or carries the PDF magic bytes.
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref() == Some("application/pdf") || self.bytes.starts_with(b"%PDF-")
    }
}

/// GET `url` and return the body, rejecting non-success statuses and bodies
/// larger than `max_body_bytes`.
pub(crate) async fn download(
    client: &reqwest::Client,
    url: &str,
    max_body_bytes: usize,
) -> Result<Downloaded, FetchError> {
    validate_url(url)?;

    let resp = client.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::DownloadFailed {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    if let Some(len) = resp.content_length()
        && len > max_body_bytes as u64
    {
        return Err(FetchError::BodyTooLarge {
            size: len,
            max: max_body_bytes,
        });
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type);

    let bytes = resp.bytes().await?;
    if bytes.len() > max_body_bytes {
        return Err(FetchError::BodyTooLarge {
            size: bytes.len() as u64,
            max: max_body_bytes,
        });
    }

    Ok(Downloaded {
        bytes: bytes.to_vec(),
        content_type,
    })
}

fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn validate_url(raw: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::InvalidUrl(format!(
            "{raw}: scheme not allowed: {other}"
        ))),
    }
}
