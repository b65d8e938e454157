//! Size- and binary-checked text reads.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::detect::decode_text;
use crate::error::IoError;

/// Read a text file with size, binary and UTF-8 checks.
///
/// # Arguments
/// * `path` - Path to the file
/// * `max_bytes` - Maximum file size in bytes
///
/// # Errors
/// Returns `IoError::NotFound` when the file is missing, `IoError::TooLarge`
/// above `max_bytes`, and decoding errors from [`decode_text`].
pub fn read_text<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<String, IoError> {
    let path = path.as_ref();
    let display = path.to_string_lossy().to_string();

    let metadata = fs::metadata(path).map_err(|_| IoError::NotFound(display.clone()))?;
    if metadata.len() > max_bytes {
        return Err(IoError::TooLarge {
            path: display,
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    let mut file = fs::File::open(path)?;
    let mut buffer = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or_default());
    file.read_to_end(&mut buffer)?;

    decode_text(&display, buffer)
}

/// Read any file as raw bytes, without text checks.
///
/// # Errors
/// Returns `IoError::NotFound` when the file is missing and
/// `IoError::System` when reading fails.
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, IoError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IoError::NotFound(path.to_string_lossy().to_string()));
    }
    Ok(fs::read(path)?)
}
