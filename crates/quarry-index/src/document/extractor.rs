use super::loader::RawUnit;
use super::types::{Document, DocumentMetadata, Source, SourceKind};

/// Wrap raw text units into documents, discarding blank ones.
#[must_use]
pub fn normalize(source: &Source, units: Vec<RawUnit>) -> Vec<Document> {
    units
        .into_iter()
        .filter(|unit| !unit.text.trim().is_empty())
        .map(|unit| {
            // Only PDF extraction yields pages, including PDFs behind web URLs.
            let kind = if unit.page.is_some() {
                SourceKind::Pdf
            } else {
                source.kind()
            };
            Document {
                content: unit.text,
                metadata: DocumentMetadata {
                    origin: source.clone(),
                    content_type: kind.content_type().to_owned(),
                    page: unit.page,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str, page: Option<usize>) -> RawUnit {
        RawUnit {
            text: text.to_owned(),
            page,
        }
    }

    #[test]
    fn blank_units_are_dropped() {
        let source = Source::new("https://example.com/a.pdf");
        let docs = normalize(
            &source,
            vec![
                unit("first page", Some(1)),
                unit("  \n\t ", Some(2)),
                unit("", Some(3)),
                unit("fourth page", Some(4)),
            ],
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, Some(1));
        assert_eq!(docs[1].metadata.page, Some(4));
    }

    #[test]
    fn content_is_kept_verbatim() {
        let source = Source::new("https://example.com/post");
        let docs = normalize(&source, vec![unit("  padded text \n", None)]);
        assert_eq!(docs[0].content, "  padded text \n");
        assert_eq!(docs[0].metadata.content_type, "text/html");
        assert_eq!(docs[0].metadata.origin, source);
    }

    #[test]
    fn paged_units_from_web_source_are_pdf() {
        let source = Source::new("https://example.com/download?id=7");
        let docs = normalize(&source, vec![unit("page text", Some(1))]);
        assert_eq!(docs[0].metadata.content_type, "application/pdf");
    }

    #[test]
    fn empty_input_yields_nothing() {
        let source = Source::new("https://example.com/");
        assert!(normalize(&source, Vec::new()).is_empty());
    }
}
