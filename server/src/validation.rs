use tts_core::ContentFingerprint;

use crate::error::ApiError;

/// Maximum text length for TTS requests
const MAX_TEXT_LENGTH: usize = 5000;

/// Transport-level limits; content rules live in `tts_core::normalize`.
pub fn validate_tts_request(text: &str) -> Result<(), ApiError> {
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

/// Validate a fingerprint path segment
pub fn validate_fingerprint(raw: &str) -> Result<ContentFingerprint, ApiError> {
    ContentFingerprint::parse(raw)
        .ok_or_else(|| ApiError::InvalidInput(format!("Invalid fingerprint: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tts_request_too_long() {
        let long_text = "a".repeat(6000);
        let result = validate_tts_request(&long_text);
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("too long"));
        }
        assert!(validate_tts_request("Hello there").is_ok());
    }

    #[test]
    fn test_validate_fingerprint() {
        let fp = tts_core::fingerprint("Hello there.");
        assert_eq!(validate_fingerprint(fp.as_str()).unwrap(), fp);
        assert!(validate_fingerprint("..").is_err());
        assert!(validate_fingerprint("abc123").is_err());
    }
}
