//! Reference-audio conditioning.
//!
//! The engine expects a mono reference at a fixed rate. Non-conformant files get
//! a converted sibling `<stem>_16k_mono<ext>` which later calls reuse. Failures
//! never block a request: the original file is used instead.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ConditioningFailed;
use crate::wav;

#[derive(Debug, Clone, Copy)]
pub struct ReferenceConditioner {
    target_rate: u32,
}

impl ReferenceConditioner {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Deterministic sibling path for the conformant variant.
    pub fn variant_path(&self, original: &Path) -> PathBuf {
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = format!("_{}k_mono", self.target_rate / 1000);
        let name = match original.extension() {
            Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
            None => format!("{stem}{suffix}"),
        };
        original.with_file_name(name)
    }

    fn is_conformant(&self, sample_rate: u32, channels: u16) -> bool {
        sample_rate == self.target_rate && channels <= 1
    }

    /// Best-effort: returns the original path if conditioning fails.
    pub fn condition(&self, path: &Path) -> PathBuf {
        match self.try_condition(path) {
            Ok(p) => p,
            Err(e) => {
                warn!("{e}; using the original reference audio");
                path.to_path_buf()
            }
        }
    }

    pub fn try_condition(&self, path: &Path) -> Result<PathBuf, ConditioningFailed> {
        let fail = |reason: String| ConditioningFailed {
            path: path.display().to_string(),
            reason,
        };

        let (sample_rate, channels) = wav::probe(path).map_err(|e| fail(format!("{e:#}")))?;
        info!(
            "Reference audio {}: {} Hz, {} channel(s)",
            path.display(),
            sample_rate,
            channels
        );
        if self.is_conformant(sample_rate, channels) {
            return Ok(path.to_path_buf());
        }

        let variant = self.variant_path(path);
        if let Ok((rate, ch)) = wav::probe(&variant) {
            if self.is_conformant(rate, ch) {
                info!("Reusing conditioned reference {}", variant.display());
                return Ok(variant);
            }
        }

        warn!(
            "Converting reference {} from {} Hz/{}ch to {} Hz mono",
            path.display(),
            sample_rate,
            channels,
            self.target_rate
        );
        let audio = wav::read(path).map_err(|e| fail(format!("{e:#}")))?;
        let mono = wav::downmix(&audio.samples, audio.channels);
        let converted = wav::resample_linear(&mono, audio.sample_rate, self.target_rate);

        // Write beside the target and rename so readers never see a partial file
        let tmp = variant.with_file_name(format!(
            ".{}.{}.tmp",
            variant
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            uuid::Uuid::new_v4()
        ));
        if let Err(e) = wav::write_pcm16(&tmp, &converted, self.target_rate, 1) {
            let _ = std::fs::remove_file(&tmp);
            return Err(fail(format!("{e:#}")));
        }
        std::fs::rename(&tmp, &variant).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            fail(format!("rename to {}: {e}", variant.display()))
        })?;

        info!("Saved conditioned reference to {}", variant.display());
        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize, channels: u16) -> Vec<f32> {
        (0..frames * channels as usize)
            .map(|i| ((i / channels as usize) as f32 * 0.05).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_variant_naming() {
        let c = ReferenceConditioner::new(16_000);
        assert_eq!(
            c.variant_path(Path::new("voices/leijun.wav")),
            PathBuf::from("voices/leijun_16k_mono.wav")
        );
    }

    #[test]
    fn test_conformant_file_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.wav");
        wav::write_pcm16(&path, &tone(1600, 1), 16_000, 1).unwrap();

        let c = ReferenceConditioner::new(16_000);
        assert_eq!(c.condition(&path), path);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_stereo_44k_is_converted_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("44k_stereo.wav");
        wav::write_pcm16(&path, &tone(44_100, 2), 44_100, 2).unwrap();

        let c = ReferenceConditioner::new(16_000);
        let first = c.condition(&path);
        assert_eq!(first, dir.path().join("44k_stereo_16k_mono.wav"));
        assert_eq!(wav::probe(&first).unwrap(), (16_000, 1));
        assert_eq!(wav::read(&first).unwrap().frames(), 16_000);

        let modified = std::fs::metadata(&first).unwrap().modified().unwrap();
        let second = c.condition(&path);
        assert_eq!(second, first);
        assert_eq!(std::fs::metadata(&second).unwrap().modified().unwrap(), modified);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_unreadable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a wav file").unwrap();

        let c = ReferenceConditioner::new(16_000);
        assert!(c.try_condition(&path).is_err());
        assert_eq!(c.condition(&path), path);
    }
}
