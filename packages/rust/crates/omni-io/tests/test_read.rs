//! Tests for checked reads and binary detection.

use std::io::Write;
use tempfile::TempDir;

use omni_io::{IoError, decode_text, is_binary, read_text};

#[test]
fn test_read_text() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let p = dir.path().join("guide.md");
    std::fs::write(&p, "# Guide\n\n[Next](./next.md)\n")?;
    assert_eq!(read_text(&p, 1024)?, "# Guide\n\n[Next](./next.md)\n");
    Ok(())
}

#[test]
fn test_read_binary() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let p = dir.path().join("image.md");
    let mut file = std::fs::File::create(&p)?;
    file.write_all(b"\x00\x01\x02\x03")?;
    assert!(matches!(read_text(&p, 1024), Err(IoError::BinaryFile(_))));
    Ok(())
}

#[test]
fn test_file_too_large() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let p = dir.path().join("large.md");
    std::fs::write(&p, "12345678901234567890")?;
    assert!(matches!(
        read_text(&p, 10),
        Err(IoError::TooLarge {
            size: 20,
            limit: 10,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_file_not_found() {
    let result = read_text("/nonexistent/file.md", 1024);
    assert!(matches!(result, Err(IoError::NotFound(_))));
}

#[test]
fn test_binary_detection() {
    assert!(is_binary(b"\x00\x01\x02\x03"));
    assert!(!is_binary(b"Hello, world!"));
    assert!(!is_binary(b""));
}

#[test]
fn test_decode_rejects_invalid_utf8() {
    let result = decode_text("x.md", vec![0x48, 0x65, 0x6c, 0xff, 0x6f]);
    assert!(matches!(result, Err(IoError::Encoding { offset: 3, .. })));
}
