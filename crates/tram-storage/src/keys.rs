//! Content-addressed key generation.
//!
//! Key format: `documents/{sha256-hex}.{ext}`.

use sha2::{Digest, Sha256};

const DOCUMENT_PREFIX: &str = "documents";
const FALLBACK_EXTENSION: &str = "bin";

/// Storage key for a document's bytes.
///
/// The extension comes from the content type when it is a known document
/// type, else from the original file name, else `bin`.
pub fn document_key(data: &[u8], content_type: &str, original_name: &str) -> String {
    let digest = hex::encode(Sha256::digest(data));
    let extension = tram_core::classifier::extension_for(content_type)
        .map(str::to_string)
        .or_else(|| extension_from_name(original_name))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{}/{}.{}", DOCUMENT_PREFIX, digest, extension)
}

fn extension_from_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bytes_same_key() {
        let a = document_key(b"hello", "text/plain", "a.txt");
        let b = document_key(b"hello", "text/plain", "b.txt");
        assert_eq!(a, b);
        assert_eq!(
            a,
            "documents/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824.txt"
        );
    }

    #[test]
    fn test_different_bytes_different_key() {
        assert_ne!(
            document_key(b"one", "application/pdf", "r.pdf"),
            document_key(b"two", "application/pdf", "r.pdf")
        );
    }

    #[test]
    fn test_extension_falls_back_to_name_then_bin() {
        assert!(document_key(b"x", "application/x-thing", "notes.MD").ends_with(".md"));
        assert!(document_key(b"x", "application/x-thing", "../../etc/passwd").ends_with(".bin"));
        assert!(document_key(b"x", "application/x-thing", "a.tar/../b").ends_with(".bin"));
    }
}
