//! Request normalization and validation.
//!
//! The model reads a missing terminal mark as an unfinished utterance, so every
//! target text is given one here before it is fingerprinted or synthesized.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsError};

/// Minimum number of characters in the trimmed target text
pub const MIN_TEXT_CHARS: usize = 5;

const CJK_PERIOD: char = '。';
const LATIN_PERIOD: char = '.';

/// Raw synthesis request as received from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    #[serde(default, alias = "text")]
    pub target_text: String,
    #[serde(default)]
    pub reference_text: Option<String>,
    #[serde(default, alias = "reference_audio")]
    pub reference_audio_path: Option<String>,
    #[serde(default, alias = "save_dir")]
    pub output_dir: Option<String>,
}

/// A request that passed validation; `target_text` is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub target_text: String,
    pub reference_text: String,
    pub reference_audio_path: String,
    pub output_dir: String,
}

/// True if any character falls in the CJK Unified Ideographs block.
pub fn is_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// Trim and terminate `text` with the script-appropriate period.
pub fn normalize_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < MIN_TEXT_CHARS {
        return Err(TtsError::InvalidRequest(format!(
            "Text must be at least {} characters long (got {})",
            MIN_TEXT_CHARS, len
        )));
    }

    let period = if is_cjk(trimmed) { CJK_PERIOD } else { LATIN_PERIOD };
    if trimmed.ends_with(period) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}{period}"))
    }
}

fn required(field: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(TtsError::InvalidRequest(format!("{field} is required"))),
    }
}

/// Reject paths that would resolve outside the data root.
pub fn validate_relative_path(field: &str, path: &str) -> Result<()> {
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                return Err(TtsError::InvalidRequest(format!(
                    "{field} must not contain '..': {path}"
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TtsError::InvalidRequest(format!(
                    "{field} must be relative to the data root: {path}"
                )))
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Validate required fields and normalize the target text.
///
/// Does not touch the filesystem; existence of the reference audio is checked
/// by the service once paths are resolved.
pub fn normalize_request(req: &SynthesisRequest) -> Result<NormalizedRequest> {
    let target_text = normalize_text(&req.target_text)?;
    let reference_text = required("Reference text", req.reference_text.as_deref())?;
    let reference_audio_path = required("Reference audio", req.reference_audio_path.as_deref())?;
    let output_dir = required("Output directory", req.output_dir.as_deref())?;

    validate_relative_path("Reference audio", &reference_audio_path)?;
    validate_relative_path("Output directory", &output_dir)?;

    Ok(NormalizedRequest {
        target_text,
        reference_text,
        reference_audio_path,
        output_dir,
    })
}
