use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex digest of a normalized target text; names the cache entry directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

/// Length of the hex digest
pub const FINGERPRINT_LEN: usize = 64;

impl ContentFingerprint {
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accepts only a well-formed lowercase hex digest.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == FINGERPRINT_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn fingerprint(text: &str) -> ContentFingerprint {
    ContentFingerprint::of(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_text;

    #[test]
    fn test_equal_text_equal_digest() {
        let a = fingerprint(&normalize_text("Hello there").unwrap());
        let b = fingerprint(&normalize_text("  Hello there.  ").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, fingerprint("Hello there!"));
    }

    #[test]
    fn test_digest_shape() {
        let fp = fingerprint("Hello there.");
        assert_eq!(fp.as_str().len(), FINGERPRINT_LEN);
        assert_eq!(ContentFingerprint::parse(fp.as_str()), Some(fp));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ContentFingerprint::parse("abc").is_none());
        assert!(ContentFingerprint::parse(&"G".repeat(FINGERPRINT_LEN)).is_none());
        assert!(ContentFingerprint::parse(&"A".repeat(FINGERPRINT_LEN)).is_none());
        assert!(ContentFingerprint::parse("../../../etc/passwd").is_none());
    }
}
