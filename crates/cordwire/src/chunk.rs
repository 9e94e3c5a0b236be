//! Splitting long outbound text into pieces the REST API will accept.
//!
//! Length is counted in Unicode scalar values (`char`s), which is how the
//! gateway counts message length. Lines are kept whole whenever they fit;
//! a line longer than the limit is cut at the limit, and its last piece
//! keeps collecting the lines that follow.

/// The gateway's message length limit.
pub const MAX_CONTENT_LEN: usize = 2000;

/// One piece of split text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// A `\n` separated this chunk from the next one in the original text.
    /// `false` for the last chunk and for hard-split pieces.
    pub newline_after: bool,
}

/// Splits `text` into chunks of at most `limit` characters.
///
/// A `limit` of 0 is treated as 1. Empty input yields one empty chunk.
pub fn chunk_content(text: &str, limit: usize) -> Vec<String> {
    split_content(text, limit)
        .into_iter()
        .map(|c| c.text)
        .collect()
}

/// Like [`chunk_content`], keeping track of where newlines were consumed
/// so [`reassemble`] can rebuild the input exactly.
pub fn split_content(text: &str, limit: usize) -> Vec<Chunk> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    // The chunk being built, with its length in chars.
    let mut current: Option<(String, usize)> = None;

    for line in text.split('\n') {
        let line_len = line.chars().count();

        if let Some((buf, len)) = current.as_mut() {
            if *len + 1 + line_len <= limit {
                buf.push('\n');
                buf.push_str(line);
                *len += 1 + line_len;
                continue;
            }
        }
        if let Some((buf, _)) = current.take() {
            chunks.push(Chunk {
                text: buf,
                newline_after: true,
            });
        }

        let mut pieces = hard_split(line, limit);
        let last = pieces.pop().unwrap_or_default();
        chunks.extend(pieces.into_iter().map(|p| Chunk {
            text: p.to_string(),
            newline_after: false,
        }));
        current = Some((last.to_string(), last.chars().count()));
    }

    if let Some((buf, _)) = current {
        chunks.push(Chunk {
            text: buf,
            newline_after: false,
        });
    }
    chunks
}

/// Joins chunks back into the text they were split from.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&chunk.text);
        if chunk.newline_after {
            out.push('\n');
        }
    }
    out
}

/// Cuts `line` every `limit` chars. Always returns at least one piece.
fn hard_split(line: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in line.char_indices().enumerate() {
        if count > 0 && count % limit == 0 {
            pieces.push(&line[start..idx]);
            start = idx;
        }
    }
    pieces.push(&line[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lens(chunks: &[String]) -> Vec<usize> {
        chunks.iter().map(|c| c.chars().count()).collect()
    }

    #[test]
    fn test_short_input_is_one_chunk() {
        let text = "hello\nworld";
        assert_eq!(chunk_content(text, MAX_CONTENT_LEN), vec![text.to_string()]);
    }

    #[test]
    fn test_empty_input_is_one_empty_chunk() {
        assert_eq!(chunk_content("", 10), vec![String::new()]);
    }

    #[test]
    fn test_5000_chars_no_newlines() {
        let text = "a".repeat(5000);
        let chunks = chunk_content(&text, 2000);
        assert_eq!(lens(&chunks), [2000, 2000, 1000]);
    }

    #[test]
    fn test_splits_on_newlines_when_lines_fit() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = chunk_content(text, 9);
        assert_eq!(chunks, ["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_exact_fit_includes_separator() {
        // "ab\ncd" is 5 chars: fits a limit of 5, not 4.
        assert_eq!(chunk_content("ab\ncd", 5), ["ab\ncd"]);
        assert_eq!(chunk_content("ab\ncd", 4), ["ab", "cd"]);
    }

    #[test]
    fn test_long_line_hard_split_then_accumulates() {
        let text = "xx\naaaaaaa\nb";
        let chunks = split_content(text, 3);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["xx", "aaa", "aaa", "a\nb"]);
        assert!(chunks[0].newline_after);
        assert!(!chunks[1].newline_after);
        assert!(!chunks[2].newline_after);
        assert!(!chunks[3].newline_after);
    }

    #[test]
    fn test_no_chunk_exceeds_limit() {
        let text = "line one\n".repeat(50) + &"z".repeat(333) + "\n\n\nend";
        for limit in [1, 7, 64, 100] {
            for chunk in chunk_content(&text, limit) {
                assert!(chunk.chars().count() <= limit, "limit {limit}: {chunk:?}");
            }
        }
    }

    #[test]
    fn test_reassemble_round_trips() {
        let cases = [
            String::new(),
            "\n".to_string(),
            "\n\nabc\n\n".to_string(),
            "a".repeat(4001),
            format!("{}\n{}\nshort\n\n{}", "x".repeat(10), "y".repeat(25), "z".repeat(9)),
        ];
        for text in &cases {
            for limit in [1, 3, 10, 2000] {
                let chunks = split_content(text, limit);
                assert_eq!(&reassemble(&chunks), text, "limit {limit}");
            }
        }
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let text = "é".repeat(5);
        let chunks = chunk_content(&text, 2);
        assert_eq!(lens(&chunks), [2, 2, 1]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_zero_limit_treated_as_one() {
        assert_eq!(chunk_content("abc", 0), ["a", "b", "c"]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn reassemble_restores_input(text in "[a-zé \n]{0,400}", limit in 0usize..64) {
                let chunks = split_content(&text, limit);
                prop_assert_eq!(reassemble(&chunks), text);
            }

            #[test]
            fn chunks_never_exceed_limit(text in "[a-zé \n]{0,400}", limit in 1usize..64) {
                for chunk in chunk_content(&text, limit) {
                    prop_assert!(chunk.chars().count() <= limit, "{:?}", chunk);
                }
            }

            #[test]
            fn text_within_limit_is_one_chunk(text in "[a-zé \n]{0,200}", slack in 0usize..10) {
                let limit = text.chars().count().max(1) + slack;
                prop_assert_eq!(chunk_content(&text, limit), vec![text]);
            }
        }
    }
}
