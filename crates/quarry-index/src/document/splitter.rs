use super::types::{Chunk, Document};

/// Break points tried from the coarsest to the finest. Within one level the
/// rightmost match wins; the separator stays with the chunk it ends.
const SEPARATOR_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

/// Sliding-window splitter measured in characters.
///
/// Every chunk holds at most `chunk_size` characters and begins exactly
/// `chunk_overlap` characters before the end of its predecessor. Chunk ends
/// snap to the best separator in the back half of the window and fall back to
/// a hard cut when the window has none.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let chunk_overlap = config.chunk_overlap.min(chunk_size - 1);
        Self {
            config: SplitterConfig {
                chunk_size,
                chunk_overlap,
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split documents in order; chunks of one document stay contiguous.
    #[must_use]
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .enumerate()
            .flat_map(|(i, doc)| self.split_document(i, doc))
            .collect();
        tracing::debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            "split documents"
        );
        chunks
    }

    #[must_use]
    pub fn split_document(&self, document_index: usize, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.content.chars().collect();
        windows(&chars, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                content: chars[start..end].iter().collect(),
                source: document.metadata.origin.url().to_owned(),
                page: document.metadata.page,
                document_index,
                chunk_index,
                start_char: start,
            })
            .collect()
    }
}

/// Character ranges `[start, end)` of consecutive windows over `chars`.
fn windows(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut ranges = Vec::new();
    if len == 0 {
        return ranges;
    }

    let mut start = 0;
    loop {
        if len - start <= size {
            ranges.push((start, len));
            break;
        }
        let hard_end = start + size;
        // Ends before `min_end` could make the next window start at or before `start`.
        let min_end = start + (overlap + 1).max(size / 2);
        let end = find_break(chars, min_end, hard_end).unwrap_or(hard_end);
        ranges.push((start, end));
        start = end - overlap;
    }
    ranges
}

/// Rightmost end position in `min_end..=max_end` that directly follows a
/// separator of the coarsest available level.
fn find_break(chars: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    SEPARATOR_LEVELS.iter().find_map(|level| {
        (min_end..=max_end)
            .rev()
            .find(|&end| level.iter().any(|sep| ends_with(chars, end, sep)))
    })
}

fn ends_with(chars: &[char], end: usize, sep: &str) -> bool {
    let sep_len = sep.chars().count();
    end >= sep_len && chars[end - sep_len..end].iter().copied().eq(sep.chars())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::document::types::{DocumentMetadata, Source};

    fn make_document(content: &str) -> Document {
        Document {
            content: content.to_owned(),
            metadata: DocumentMetadata {
                origin: Source::new("https://example.com/doc"),
                content_type: "text/html".to_owned(),
                page: None,
            },
        }
    }

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(
            TextSplitter::new(SplitterConfig::default())
                .split(&[make_document("")])
                .is_empty()
        );
    }

    #[test]
    fn short_document_is_single_chunk() {
        let chunks = TextSplitter::new(SplitterConfig::default())
            .split(&[make_document("A short paragraph.")]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "A short paragraph.");
        assert_eq!(chunks[0].start_char, 0);
    }

    #[test]
    fn exactly_chunk_size_is_single_chunk() {
        let text = "x".repeat(500);
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&[make_document(&text)]);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn hard_cut_without_separators() {
        let text = "a".repeat(1200);
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&[make_document(&text)]);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_char).collect();
        assert_eq!(starts, vec![0, 400, 800]);
        assert_eq!(char_len(&chunks[0].content), 500);
        assert_eq!(char_len(&chunks[2].content), 400);
    }

    #[test]
    fn default_overlap_is_exactly_one_hundred_chars() {
        let sentence = "The quarry holds granite and slate in equal measure. ";
        let text = sentence.repeat(40);
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&[make_document(&text)]);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].content.chars().collect();
            let next: Vec<char> = pair[1].content.chars().collect();
            assert!(prev.len() <= 500);
            assert_eq!(&prev[prev.len() - 100..], &next[..100]);
        }
    }

    #[test]
    fn prefers_paragraph_break() {
        let first = "word ".repeat(60);
        let second = "term ".repeat(60);
        let text = format!("{first}\n\n{second}");
        let chunks = splitter(400, 50).split(&[make_document(&text)]);
        assert!(chunks[0].content.ends_with("\n\n"));
    }

    #[test]
    fn prefers_sentence_end_over_space() {
        let text = format!("{}. {}", "alpha ".repeat(50).trim_end(), "beta ".repeat(60));
        let chunks = splitter(400, 40).split(&[make_document(&text)]);
        assert!(chunks[0].content.ends_with(". "));
    }

    #[test]
    fn chunks_follow_document_order() {
        let docs = [
            make_document(&"first ".repeat(200)),
            make_document(&"second ".repeat(200)),
        ];
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&docs);
        let order: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.document_index, c.chunk_index))
            .collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
        assert_eq!(chunks.last().unwrap().document_index, 1);
        assert_eq!(chunks[0].source, "https://example.com/doc");
    }

    #[test]
    fn multibyte_text_is_counted_in_chars() {
        let text = "é".repeat(700);
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&[make_document(&text)]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(char_len(&chunks[0].content), 500);
        assert_eq!(chunks[1].start_char, 400);
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let s = splitter(10, 25);
        assert_eq!(s.config().chunk_overlap, 9);
        let chunks = s.split(&[make_document(&"z".repeat(40))]);
        assert_eq!(chunks.len(), 31);
    }

    proptest! {
        #[test]
        fn windows_reassemble_source(
            text in "[a-zé .!?\n]{0,400}",
            size in 2usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % size;
            let chunks = splitter(size, overlap).split(&[make_document(&text)]);

            let mut rebuilt: Vec<char> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let chars: Vec<char> = chunk.content.chars().collect();
                prop_assert!(chars.len() <= size);
                prop_assert!(!chars.is_empty());
                prop_assert_eq!(chunk.chunk_index, i);
                if i == 0 {
                    prop_assert_eq!(chunk.start_char, 0);
                    rebuilt.extend(&chars);
                } else {
                    let prev = &chunks[i - 1];
                    let prev_len = prev.content.chars().count();
                    prop_assert_eq!(chunk.start_char, prev.start_char + prev_len - overlap);
                    prop_assert!(chars.len() > overlap);
                    rebuilt.extend(&chars[overlap..]);
                }
            }
            let original: Vec<char> = text.chars().collect();
            prop_assert_eq!(rebuilt, original);
        }

        #[test]
        fn split_is_deterministic(text in "\\PC{0,800}") {
            let s = TextSplitter::new(SplitterConfig::default());
            let doc = make_document(&text);
            prop_assert_eq!(s.split(std::slice::from_ref(&doc)), s.split(&[doc]));
        }
    }
}
