//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, is_text_file, read_file_content};
pub use retry::{RetryPolicy, Retryable};
pub use text::{MIN_CHUNK_LENGTH_TO_EMBED, has_meaningful_content, truncate_chars};
