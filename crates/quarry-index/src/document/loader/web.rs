use scrape_core::{Document as Dom, NodeId, NodeKind};

use super::pdf::extract_pdf;
use super::{BoxFuture, RawUnit, SourceLoader, download};
use crate::document::error::FetchError;
use crate::document::types::Source;

/// Elements whose text makes up the readable body of a page.
const CONTENT_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td, th";

const CONTENT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "pre", "blockquote", "td", "th",
];

/// Elements that break text flow; their contents never run into neighbours.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Fetches an HTML page and flattens its readable text into one unit.
///
/// A body served as `application/pdf` (or starting with the PDF magic bytes)
/// is handed to the PDF extractor instead, one unit per page.
#[derive(Debug, Clone)]
pub struct WebLoader {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl WebLoader {
    #[must_use]
    pub fn new(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }
}

impl SourceLoader for WebLoader {
    fn load<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, Result<Vec<RawUnit>, FetchError>> {
        Box::pin(async move {
            let body = download(&self.client, source.url(), self.max_body_bytes).await?;
            if body.is_pdf() {
                tracing::debug!(url = %source, "web source served a PDF");
                return extract_pdf(body.bytes).await;
            }
            if let Some(ct) = body.content_type.as_deref()
                && !is_textual(ct)
            {
                return Err(FetchError::Html(format!("unsupported content type {ct}")));
            }
            let html = String::from_utf8_lossy(&body.bytes).into_owned();
            let text = tokio::task::spawn_blocking(move || extract_readable_text(&html))
                .await
                .map_err(|e| FetchError::Task(e.to_string()))??;
            Ok(vec![RawUnit { text, page: None }])
        })
    }
}

fn is_textual(media_type: &str) -> bool {
    media_type.starts_with("text/")
        || matches!(media_type, "application/xhtml+xml" | "application/xml")
}

/// Readable text of an HTML document, one outermost content block per line.
///
/// Falls back to the whole `body` text when no content elements match, which
/// also covers plain-text responses.
pub(crate) fn extract_readable_text(html: &str) -> Result<String, FetchError> {
    let soup = scrape_core::Soup::parse(html);

    let tags = soup
        .find_all(CONTENT_SELECTOR)
        .map_err(|e| FetchError::Html(format!("invalid selector: {e}")))?;

    let mut lines: Vec<String> = Vec::new();
    for tag in tags {
        // Nested blocks are already part of their outermost content ancestor.
        if tag
            .parents()
            .any(|p| p.name().is_some_and(|n| CONTENT_TAGS.contains(&n)))
        {
            continue;
        }
        let line = flatten(tag.document(), tag.node_id());
        if !line.is_empty() {
            lines.push(line);
        }
    }

    if lines.is_empty() {
        let bodies = soup
            .find_all("body")
            .map_err(|e| FetchError::Html(format!("invalid selector: {e}")))?;
        lines.extend(
            bodies
                .into_iter()
                .map(|tag| flatten(tag.document(), tag.node_id()))
                .filter(|line| !line.is_empty()),
        );
    }

    Ok(lines.join("\n"))
}

/// Text under `root` with block boundaries turned into spaces and whitespace
/// runs collapsed.
fn flatten(dom: &Dom, root: NodeId) -> String {
    let mut raw = String::new();
    collect_text(dom, root, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(dom: &Dom, id: NodeId, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Text { content } => out.push_str(content),
        NodeKind::Element { name, .. } => {
            if SKIPPED_TAGS.contains(&name.as_str()) {
                return;
            }
            let block = BLOCK_TAGS.contains(&name.as_str());
            if block {
                out.push(' ');
            }
            for child in dom.children(id) {
                collect_text(dom, child, out);
            }
            if block {
                out.push(' ');
            }
        }
        NodeKind::Comment { .. } => {}
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn extracts_block_elements_in_order() {
        let html = "<html><head><title>t</title><style>p{}</style></head><body>\
            <h1>Granite</h1><p>Igneous   rock,\n coarse grained.</p>\
            <ul><li>Quartz</li><li>Feldspar</li></ul></body></html>";
        let text = extract_readable_text(html).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"Granite"));
        assert!(lines.contains(&"Igneous rock, coarse grained."));
        assert!(lines.contains(&"Quartz"));
        assert!(lines.contains(&"Feldspar"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn skips_scripts_and_navigation_text() {
        let html = "<body><script>var x = 1;</script><p>Body copy.</p></body>";
        let text = extract_readable_text(html).unwrap();
        assert_eq!(text, "Body copy.");
    }

    #[test]
    fn falls_back_to_body_text() {
        let html = "<html><body><div>Only a div here</div></body></html>";
        let text = extract_readable_text(html).unwrap();
        assert_eq!(text, "Only a div here");
    }

    #[test]
    fn empty_page_yields_empty_text() {
        let text = extract_readable_text("<html><body>   </body></html>").unwrap();
        assert!(text.trim().is_empty());
    }

    #[test]
    fn nested_blocks_are_emitted_once() {
        let html = "<body><blockquote><p>Alpha sentence.</p><p>Beta sentence.</p></blockquote>\
            <ul><li><p>Gamma item.</p><p>Delta detail.</p></li></ul>\
            <table><tr><td><p>Epsilon cell.</p></td></tr></table></body>";
        let text = extract_readable_text(html).unwrap();
        for sentence in [
            "Alpha sentence.",
            "Beta sentence.",
            "Gamma item.",
            "Delta detail.",
            "Epsilon cell.",
        ] {
            assert_eq!(text.matches(sentence).count(), 1, "{sentence} in {text:?}");
        }
        assert!(text.contains("Alpha sentence. Beta sentence."));
        assert!(text.contains("Gamma item. Delta detail."));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn inline_markup_does_not_split_words() {
        let html = "<p>Mica is <b>soft</b>ly layered.<br>Second line</p>";
        let text = extract_readable_text(html).unwrap();
        assert_eq!(text, "Mica is softly layered. Second line");
    }

    #[test]
    fn textual_media_types() {
        assert!(is_textual("text/html"));
        assert!(is_textual("text/plain"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(!is_textual("image/png"));
        assert!(!is_textual("application/octet-stream"));
    }

    #[tokio::test]
    async fn binary_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
            .mount(&server)
            .await;

        let loader = WebLoader::new(reqwest::Client::new(), 1024);
        let source = Source::new(format!("{}/logo", server.uri()));
        let err = loader.load(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Html(ref msg) if msg.contains("image/png")));
    }

    #[tokio::test]
    async fn pdf_body_goes_to_pdf_extractor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4 truncated", "application/pdf"))
            .mount(&server)
            .await;

        let loader = WebLoader::new(reqwest::Client::new(), 1024);
        let source = Source::new(format!("{}/download", server.uri()));
        assert!(!source.is_pdf());
        let err = loader.load(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Pdf(_) | FetchError::Task(_)));
    }

    #[test]
    fn collapse_whitespace_normalizes_runs() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[tokio::test]
    async fn load_returns_single_unit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>Slate splits into sheets.</p>", "text/html"),
            )
            .mount(&server)
            .await;

        let loader = WebLoader::new(reqwest::Client::new(), 1024 * 1024);
        let source = Source::new(format!("{}/article", server.uri()));
        let units = loader.load(&source).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "Slate splits into sheets.");
        assert_eq!(units[0].page, None);
    }
}
