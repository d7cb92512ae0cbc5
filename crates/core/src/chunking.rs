use crate::error::IngestError;
use crate::models::{IngestionOptions, TextChunk};
use sha2::{Digest, Sha256};
use std::iter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
            separator: value.chunk_separator.clone(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }

        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }

        Ok(())
    }
}

/// Splits `text` into windows of at most `max_chars` chars.
///
/// Each window ends just after the last separator it contains when that
/// separator lies in the back half of the window and past the overlap,
/// otherwise at `max_chars`. The next window
/// starts `overlap_chars` before the end of the previous one, so neighbours
/// share exactly `overlap_chars` chars of source text.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, IngestError> {
    config.validate()?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // offsets[i] is the byte offset of char i; the extra entry marks the end.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let window_end = (start + config.max_chars).min(total);
        let end = if window_end == total {
            total
        } else {
            separator_break(text, &offsets, start, window_end, config).unwrap_or(window_end)
        };

        let piece = &text[offsets[start]..offsets[end]];
        let index = chunks.len() as u64;
        chunks.push(TextChunk {
            chunk_id: make_chunk_id(index, piece),
            chunk_index: index,
            start_char: start,
            text: piece.to_string(),
        });

        if end == total {
            break;
        }

        start = end - config.overlap_chars;
    }

    Ok(chunks)
}

fn separator_break(
    text: &str,
    offsets: &[usize],
    start: usize,
    window_end: usize,
    config: &ChunkingConfig,
) -> Option<usize> {
    if config.separator.is_empty() {
        return None;
    }

    let window_start_byte = offsets[start];
    let window = &text[window_start_byte..offsets[window_end]];
    let found = window.rfind(config.separator.as_str())?;
    let break_byte = window_start_byte + found + config.separator.len();
    let break_char = offsets.binary_search(&break_byte).ok()?;

    // A break in the front half would leave a short chunk before a hard break.
    let earliest = start + (config.overlap_chars + 1).max(config.max_chars / 2);
    (break_char >= earliest).then_some(break_char)
}

/// Rebuilds the source text from chunks produced with `overlap_chars`.
pub fn reassemble_chunks(chunks: &[TextChunk], overlap_chars: usize) -> String {
    let mut text = String::new();
    for (position, chunk) in chunks.iter().enumerate() {
        if position == 0 {
            text.push_str(&chunk.text);
        } else {
            text.extend(chunk.text.chars().skip(overlap_chars));
        }
    }
    text
}

fn make_chunk_id(index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
            separator: "\n".to_string(),
        }
    }

    fn long_document() -> String {
        let mut text = String::new();
        for line in 0..180 {
            text.push_str(&format!("line {line} describes the pump pressure limits\n"));
        }
        text.push_str(&"x".repeat(2_500));
        text
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "Alpha beta gamma.\nDelta epsilon.";
        assert_eq!(text.chars().count(), 32);

        let chunks = split_text(text, &ChunkingConfig::default()).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_char, 0);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let chunks = split_text("", &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_not_smaller_than_max_is_rejected() {
        for overlap in [10, 11, 500] {
            let result = split_text("some text", &config(10, overlap));
            assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
        }

        let result = split_text("", &config(0, 0));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }

    #[test]
    fn default_chunks_respect_size_and_overlap() {
        let text = long_document();
        let chunks = split_text(&text, &ChunkingConfig::default()).unwrap();

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 1_000, "chunk {} too long", chunk.chunk_index);
        }

        for pair in chunks.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            assert_eq!(next.start_char, previous.start_char + previous.char_len() - 200);

            let tail: String = previous.text.chars().skip(previous.char_len() - 200).collect();
            let head: String = next.text.chars().take(200).collect();
            assert_eq!(tail, head);
        }

        assert_eq!(reassemble_chunks(&chunks, 200), text);
    }

    #[test]
    fn separator_break_is_preferred_over_hard_break() {
        let text = "aaaa\nbbbbbbbbbbbb";
        let chunks = split_text(text, &config(10, 2)).unwrap();

        assert_eq!(chunks[0].text, "aaaa\n");
        assert_eq!(chunks[1].text, "a\nbbbbbbbb");
        assert_eq!(chunks[2].text, "bbbbbb");
        assert_eq!(reassemble_chunks(&chunks, 2), text);
    }

    #[test]
    fn separator_inside_overlap_falls_back_to_hard_break() {
        let text = "a\nbbbbbbbbbbbbbbbbbb";
        let chunks = split_text(text, &config(8, 3)).unwrap();

        assert_eq!(chunks[0].text, "a\nbbbbbb");
        assert!(chunks.iter().all(|chunk| chunk.char_len() <= 8));
        assert_eq!(reassemble_chunks(&chunks, 3), text);
    }

    #[test]
    fn separator_in_front_half_of_window_is_ignored() {
        let text = format!("abcd\n{}", "x".repeat(40));
        let chunks = split_text(&text, &config(20, 2)).unwrap();

        assert_eq!(chunks[0].char_len(), 20);
        assert!(chunks[0].text.starts_with("abcd\nxxx"));
        assert_eq!(reassemble_chunks(&chunks, 2), text);
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let text = "é".repeat(25);
        let chunks = split_text(&text, &config(10, 3)).unwrap();

        assert!(chunks.iter().all(|chunk| chunk.char_len() <= 10));
        assert_eq!(reassemble_chunks(&chunks, 3), text);
    }

    #[test]
    fn chunk_ids_are_deterministic_and_distinct() {
        let text = long_document();
        let first = split_text(&text, &ChunkingConfig::default()).unwrap();
        let second = split_text(&text, &ChunkingConfig::default()).unwrap();

        assert_eq!(first, second);
        assert_ne!(first[0].chunk_id, first[1].chunk_id);
    }
}
