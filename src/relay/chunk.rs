//! Splitting replies to fit Telegram's per-message size limit.

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Split `text` into consecutive slices of at most `limit` characters.
///
/// Splits only on `char` boundaries. Concatenating the slices in order gives
/// back `text` exactly. Text that already fits (including the empty string)
/// comes back as a single slice.
pub fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::with_capacity(text.len() / limit + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == limit {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() || chunks.is_empty() {
        chunks.push(&text[start..]);
    }
    chunks
}
