//! Content-addressed store for synthesized audio.
//!
//! Layout under an output directory:
//!
//! ```text
//! <output_dir>/<fingerprint>/<fingerprint>.<ext>   audio, written last
//! <output_dir>/<fingerprint>/<fingerprint>.txt     normalized target text
//! ```
//!
//! An entry exists only when both files do. Every file is written under a
//! unique temporary name and renamed into place, text first and audio last,
//! so concurrent publishers of one fingerprint leave exactly one whole entry.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TtsError};
use crate::fingerprint::ContentFingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub fingerprint: ContentFingerprint,
    pub audio_path: PathBuf,
    pub text_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn read_text(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.text_path)?)
    }
}

/// Result of probing the store for a fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss,
    /// Only one of the two files is present
    Corrupt,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    audio_ext: String,
}

impl CacheStore {
    pub fn new<P: Into<PathBuf>>(root: P, audio_ext: &str) -> Self {
        Self {
            root: root.into(),
            audio_ext: audio_ext.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_dir(&self, fp: &ContentFingerprint) -> PathBuf {
        self.root.join(fp.as_str())
    }

    pub fn audio_path(&self, fp: &ContentFingerprint) -> PathBuf {
        self.entry_dir(fp).join(format!("{}.{}", fp, self.audio_ext))
    }

    pub fn text_path(&self, fp: &ContentFingerprint) -> PathBuf {
        self.entry_dir(fp).join(format!("{fp}.txt"))
    }

    pub fn probe(&self, fp: &ContentFingerprint) -> CacheLookup {
        let audio_path = self.audio_path(fp);
        let text_path = self.text_path(fp);

        match (audio_path.is_file(), text_path.is_file()) {
            (true, true) => {
                let created_at = fs::metadata(&audio_path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                CacheLookup::Hit(CacheEntry {
                    fingerprint: fp.clone(),
                    audio_path,
                    text_path,
                    created_at,
                })
            }
            (false, false) => CacheLookup::Miss,
            (audio, text) => {
                warn!(
                    "Cache corruption under {}: audio present={}, text present={}; treating as miss",
                    self.entry_dir(fp).display(),
                    audio,
                    text
                );
                CacheLookup::Corrupt
            }
        }
    }

    pub fn lookup(&self, fp: &ContentFingerprint) -> Option<CacheEntry> {
        match self.probe(fp) {
            CacheLookup::Hit(entry) => Some(entry),
            CacheLookup::Miss | CacheLookup::Corrupt => None,
        }
    }

    /// Move `produced_audio` into the entry for `fp` and record `text` beside it.
    ///
    /// Overwrites whatever is there, which repairs a corrupt entry.
    pub fn publish(&self, fp: &ContentFingerprint, produced_audio: &Path, text: &str) -> Result<CacheEntry> {
        let dir = self.entry_dir(fp);
        fs::create_dir_all(&dir)?;

        let text_path = self.text_path(fp);
        let audio_path = self.audio_path(fp);
        let tmp_text = temp_sibling(&text_path);
        let tmp_audio = temp_sibling(&audio_path);

        let staged = (|| -> Result<()> {
            let mut f = fs::File::create(&tmp_text)?;
            f.write_all(text.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp_text, &text_path)?;

            move_file(produced_audio, &tmp_audio)?;
            fs::rename(&tmp_audio, &audio_path)?;
            Ok(())
        })();

        if let Err(e) = staged {
            let _ = fs::remove_file(&tmp_text);
            let _ = fs::remove_file(&tmp_audio);
            return Err(TtsError::Cache(format!("publish {fp} failed: {e}")));
        }

        info!("Published cache entry {}", dir.display());
        self.lookup(fp)
            .ok_or_else(|| TtsError::Cache(format!("entry {fp} vanished right after publish")))
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}

/// Rename, or copy and delete when source and destination are on different filesystems.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("rename {} failed ({e}), copying instead", from.display());
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn produced(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn test_lookup_absent_then_present() {
        let out = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let store = CacheStore::new(out.path(), "wav");
        let fp = fingerprint("Hello there.");

        assert_eq!(store.probe(&fp), CacheLookup::Miss);

        let src = produced(staging.path(), "output.wav", b"RIFF-audio");
        let entry = store.publish(&fp, &src, "Hello there.").unwrap();

        assert!(!src.exists());
        assert_eq!(entry.audio_path, out.path().join(fp.as_str()).join(format!("{fp}.wav")));
        assert_eq!(entry.read_text().unwrap(), "Hello there.");
        assert_eq!(fs::read(&entry.audio_path).unwrap(), b"RIFF-audio");
        assert_eq!(store.lookup(&fp).map(|e| e.audio_path), Some(entry.audio_path));
    }

    #[test]
    fn test_partial_entry_is_a_miss_and_gets_repaired() {
        let out = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let store = CacheStore::new(out.path(), "wav");
        let fp = fingerprint("Partial entry.");

        fs::create_dir_all(store.entry_dir(&fp)).unwrap();
        fs::write(store.audio_path(&fp), b"orphan").unwrap();
        assert_eq!(store.probe(&fp), CacheLookup::Corrupt);
        assert!(store.lookup(&fp).is_none());

        fs::remove_file(store.audio_path(&fp)).unwrap();
        fs::write(store.text_path(&fp), "Partial entry.").unwrap();
        assert_eq!(store.probe(&fp), CacheLookup::Corrupt);

        let src = produced(staging.path(), "new.wav", b"fresh");
        let entry = store.publish(&fp, &src, "Partial entry.").unwrap();
        assert_eq!(fs::read(entry.audio_path).unwrap(), b"fresh");
    }

    #[test]
    fn test_concurrent_publish_leaves_one_entry() {
        let out = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let store = CacheStore::new(out.path(), "wav");
        let fp = fingerprint("Concurrent publish.");

        let sources: Vec<PathBuf> = (0..8)
            .map(|i| produced(staging.path(), &format!("out{i}.wav"), format!("audio-{i}").as_bytes()))
            .collect();

        std::thread::scope(|s| {
            for src in &sources {
                let store = &store;
                let fp = &fp;
                s.spawn(move || store.publish(fp, src, "Concurrent publish.").unwrap());
            }
        });

        let entry = store.lookup(&fp).expect("entry present");
        assert_eq!(entry.read_text().unwrap(), "Concurrent publish.");
        assert!(fs::read_to_string(&entry.audio_path).unwrap().starts_with("audio-"));

        let names: Vec<String> = fs::read_dir(store.entry_dir(&fp))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {names:?}");
    }
}
