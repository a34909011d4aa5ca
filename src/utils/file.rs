//! File utilities for turning uploaded files into document text.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Check if a file is likely a text file.
///
/// Known binary extensions are rejected outright; anything else is sniffed
/// for NUL bytes in its first 512 bytes.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
    }

    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut buffer = [0u8; 512];
    let mut reader = io::BufReader::new(file);
    match reader.read(&mut buffer) {
        Ok(n) => !buffer[..n].contains(&0),
        Err(_) => false,
    }
}

/// Read file content with size limit.
pub fn read_file_content(path: &Path, max_size: u64) -> io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    if !is_text_file(path) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("not a text file: {}", path.display()),
        ));
    }

    fs::read_to_string(path)
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "exe"
            | "dll"
            | "so"
            | "dylib"
            | "o"
            | "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "webp"
            | "mp3"
            | "mp4"
            | "wav"
            | "zip"
            | "tar"
            | "gz"
            | "7z"
            | "pdf"
            | "docx"
            | "xlsx"
            | "pptx"
            | "sqlite"
            | "bin"
    )
}
