/// Above this many characters the paragraph accumulator would thrash, so a
/// sliding boundary-seeking window takes over.
pub const HUGE_TEXT_THRESHOLD: usize = 1_000_000;

/// Split `text` into chunks of at most `max_size` characters.
///
/// Every chunk respects the bound except a single over-long word, which is
/// emitted whole rather than torn apart. Cut positions are fully
/// deterministic so repeated runs reproduce identical chunk sets.
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    let length = text.chars().count();

    if length <= max_size {
        return vec![text.to_string()];
    }

    if length <= HUGE_TEXT_THRESHOLD {
        chunk_paragraphs(text, max_size)
    } else {
        chunk_sliding(text, max_size)
    }
}

/// Accumulate blank-line paragraphs into a running chunk; an oversized
/// paragraph flushes the accumulator and is word-packed on its own.
fn chunk_paragraphs(text: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for paragraph in text.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }

        let para_len = paragraph.chars().count();

        if para_len > max_size {
            if !current.is_empty() {
                chunks.push(current.join("\n\n"));
                current.clear();
                current_len = 0;
            }
            pack_words(paragraph, max_size, &mut chunks);
            continue;
        }

        let joined_len = if current.is_empty() {
            para_len
        } else {
            current_len + 2 + para_len
        };

        if !current.is_empty() && joined_len > max_size {
            chunks.push(current.join("\n\n"));
            current.clear();
            current.push(paragraph);
            current_len = para_len;
        } else {
            current.push(paragraph);
            current_len = joined_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(text.trim().to_string());
    }

    chunks
}

/// Greedy word packing: each word costs its length plus one separator.
/// A word longer than `max_size` becomes its own chunk, unshortened.
fn pack_words(paragraph: &str, max_size: usize, chunks: &mut Vec<String>) {
    let mut words: Vec<&str> = Vec::new();
    let mut width = 0usize;

    for word in paragraph.split_whitespace() {
        let word_width = word.chars().count() + 1;

        if width + word_width > max_size && !words.is_empty() {
            chunks.push(words.join(" "));
            words.clear();
            width = 0;
        }

        words.push(word);
        width += word_width;
    }

    if !words.is_empty() {
        chunks.push(words.join(" "));
    }
}

/// Slide a `max_size` window over the text, cutting at the friendliest
/// boundary inside each window: blank line past the midpoint, then sentence
/// terminator past one third, then any whitespace, then a hard cut.
fn chunk_sliding(text: &str, max_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut cursor = 0usize;

    while cursor < total {
        let end = (cursor + max_size).min(total);
        if end == total {
            chunks.push(chars[cursor..].iter().collect());
            break;
        }

        let (cut, skip) = find_cut(&chars[cursor..end]);
        chunks.push(chars[cursor..cursor + cut].iter().collect());
        cursor += cut + skip;
    }

    chunks
}

/// Returns (characters to keep, separator characters to skip).
fn find_cut(window: &[char]) -> (usize, usize) {
    let len = window.len();

    if let Some(pos) = rfind_pair(window, &[('\n', '\n')], len / 2) {
        return (pos, 2);
    }

    let terminators = [('.', ' '), ('?', ' '), ('!', ' '), ('.', '\n')];
    if let Some(pos) = rfind_pair(window, &terminators, len / 3) {
        // Keep the terminator, skip the trailing separator.
        return (pos + 1, 1);
    }

    if let Some(pos) = window.iter().rposition(|c| c.is_whitespace()) {
        if pos > 0 {
            return (pos, 1);
        }
    }

    (len, 0)
}

/// Rightmost index `i > floor` where `(window[i], window[i + 1])` matches
/// one of `pairs`.
fn rfind_pair(window: &[char], pairs: &[(char, char)], floor: usize) -> Option<usize> {
    let upper = window.len().checked_sub(1)?;
    (floor + 1..upper)
        .rev()
        .find(|&i| pairs.iter().any(|&(a, b)| window[i] == a && window[i + 1] == b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within_bound(chunks: &[String], max_size: usize) {
        for chunk in chunks {
            let len = chunk.chars().count();
            let single_word = !chunk.contains(char::is_whitespace);
            assert!(
                len <= max_size || single_word,
                "chunk of {len} chars exceeds {max_size} and is not a lone word"
            );
        }
    }

    #[test]
    fn short_text_returns_single_identical_chunk() {
        let text = "short enough to stay whole";
        assert_eq!(chunk(text, 4096), vec![text.to_string()]);
    }

    #[test]
    fn empty_input_yields_one_empty_chunk() {
        assert_eq!(chunk("", 100), vec![String::new()]);
    }

    #[test]
    fn paragraphs_accumulate_until_the_bound() {
        let text = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        let chunks = chunk(text, 11);

        // Two four-char paragraphs plus a separator fit in 10 chars.
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc\n\ndddd"]);
        assert_within_bound(&chunks, 11);
    }

    #[test]
    fn oversized_paragraph_is_word_packed() {
        let words: Vec<String> = (0..100).map(|i| format!("word{i:03}")).collect();
        let text = words.join(" ");
        let chunks = chunk(&text, 100);

        assert!(chunks.len() > 1);
        assert_within_bound(&chunks, 100);
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn overlong_word_is_emitted_whole() {
        let long_word = "x".repeat(500);
        let text = format!("small {long_word} small");
        let chunks = chunk(&text, 100);

        assert!(chunks.iter().any(|c| c == &long_word));
        assert_within_bound(&chunks, 100);
    }

    #[test]
    fn repeated_word_paragraph_fills_chunks_near_the_bound() {
        // One paragraph of 10,000 characters, no blank lines.
        let text = "abcdefghi ".repeat(1000).trim_end().to_string();
        let chunks = chunk(&text, 1000);

        assert_within_bound(&chunks, 1000);
        let reconstructed: usize = chunks.iter().map(|c| c.chars().count()).sum();
        let separators = chunks.len() - 1;
        assert_eq!(reconstructed + separators, text.chars().count());
        // 10 chunks of ~999 chars each.
        assert!(chunks.len() >= 10 && chunks.len() <= 11, "got {}", chunks.len());
    }

    #[test]
    fn concatenation_reconstructs_content_modulo_separators() {
        let text = "alpha beta\n\ngamma delta\n\nepsilon zeta eta theta";
        let chunks = chunk(text, 15);

        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&chunks.join(" ")), normalize(text));
    }

    #[test]
    fn huge_text_prefers_blank_line_past_midpoint() {
        let paragraph = "lorem ipsum dolor sit amet ".repeat(40);
        let text = format!("{paragraph}\n\n{paragraph}").repeat(500);
        assert!(text.chars().count() > HUGE_TEXT_THRESHOLD);

        let chunks = chunk(&text, 4096);
        assert_within_bound(&chunks, 4096);
        // Boundary-aware cuts: no chunk starts mid-word.
        assert!(chunks.iter().all(|c| !c.starts_with(' ')));
    }

    #[test]
    fn huge_text_without_any_whitespace_hard_cuts() {
        let text = "z".repeat(HUGE_TEXT_THRESHOLD + 10);
        let chunks = chunk(&text, 100_000);

        assert!(chunks.iter().all(|c| c.chars().count() <= 100_000));
        let reassembled: String = chunks.concat();
        assert_eq!(reassembled, text);
    }

    #[test]
    fn huge_text_falls_back_to_sentence_boundaries() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(HUGE_TEXT_THRESHOLD / sentence.len() + 10);
        assert!(text.chars().count() > HUGE_TEXT_THRESHOLD);

        let chunks = chunk(&text, 2000);
        assert_within_bound(&chunks, 2000);
        // Sentence-aware cuts end on the terminator.
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "alpha\n\nbeta gamma delta ".repeat(300);
        let first = chunk(&text, 256);
        let second = chunk(&text, 256);
        assert_eq!(first, second);
    }
}
