use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Browsers hand over `data:image/jpeg;base64,...` URLs; only the part after
/// the comma is base64.
fn strip_data_url(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    match trimmed.split_once(',') {
        Some((head, body)) if head.starts_with("data:") && head.ends_with(";base64") => body,
        _ => trimmed,
    }
}

/// Decodes `encoded` and writes the bytes to `filename`, replacing whatever
/// was there. Line breaks from MIME-wrapped input are ignored. Nothing is
/// written when the payload is not valid base64.
pub fn decode_image(encoded: &str, filename: &Path) -> Result<(), CodecError> {
    let compact: String = strip_data_url(encoded)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact)?;
    fs::write(filename, &bytes).map_err(|source| CodecError::Io {
        path: filename.to_path_buf(),
        source,
    })?;
    log::debug!("decoded {} bytes into {}", bytes.len(), filename.display());
    Ok(())
}

pub fn encode_image_into_base64(path: &Path) -> Result<String, CodecError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => CodecError::NotFound(path.to_path_buf()),
        _ => CodecError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Ok(STANDARD.encode(bytes))
}
