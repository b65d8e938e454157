//! Binary detection and strict text decoding.

use memchr::memchr;

use crate::error::IoError;

const BINARY_PROBE_BYTES: usize = 8192;

/// Quick binary detection - checks the first 8KB for NULL bytes.
#[must_use]
pub fn is_binary(buffer: &[u8]) -> bool {
    let check_len = buffer.len().min(BINARY_PROBE_BYTES);
    memchr(0, &buffer[..check_len]).is_some()
}

/// Decode bytes read from `path` into a `String`.
///
/// Unlike a lossy decode, invalid UTF-8 is rejected: a corpus file that is
/// rewritten after lossy decoding would silently lose bytes.
///
/// # Errors
/// Returns `IoError::BinaryFile` for NULL-containing buffers and
/// `IoError::Encoding` for invalid UTF-8.
pub fn decode_text(path: &str, buffer: Vec<u8>) -> Result<String, IoError> {
    if is_binary(&buffer) {
        return Err(IoError::BinaryFile(path.to_string()));
    }
    String::from_utf8(buffer).map_err(|err| IoError::Encoding {
        path: path.to_string(),
        offset: err.utf8_error().valid_up_to(),
    })
}
