//! Text chunking for the map phase
//!
//! Splitting is character-based (Unicode scalar values, not bytes) so
//! multibyte text never splits inside a code point. There is no word or
//! sentence awareness; a chunk may end mid-sentence, which is acceptable
//! because each chunk is presented to the AI explicitly as a fragment.

/// Split `text` into contiguous, non-overlapping pieces of at most
/// `limit` characters, preserving order and covering the input exactly
/// once. Every piece except possibly the last has exactly `limit`
/// characters. An empty input yields no chunks.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
