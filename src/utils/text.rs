//! Text processing utilities.

/// Minimum non-whitespace characters a chunk needs before it is worth embedding.
pub const MIN_CHUNK_LENGTH_TO_EMBED: usize = 5;

/// Check if content has enough non-whitespace text to be embedded.
pub fn has_meaningful_content(content: &str) -> bool {
    content.chars().filter(|c| !c.is_whitespace()).count() >= MIN_CHUNK_LENGTH_TO_EMBED
}

/// Shorten `text` to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}
