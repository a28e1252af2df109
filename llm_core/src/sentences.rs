//! Numbered sentence files: `<dir>/<n>.txt`, one `"N. sentence"` per line.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\s+[^\n]+").expect("valid regex"));

/// Pull every `N. text` line out of free-form model output.
pub fn extract_numbered(text: &str) -> Vec<String> {
    NUMBERED
        .find_iter(text)
        .map(|m| m.as_str().trim_end().to_string())
        .collect()
}

fn numeric_stem(path: &Path) -> Option<u64> {
    if path.extension().and_then(|e| e.to_str()) != Some("txt") {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// Highest `<n>.txt` in `dir`, or 0.
pub fn highest_index(dir: &Path) -> std::io::Result<u64> {
    let mut max = 0;
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                if let Some(n) = numeric_stem(&entry?.path()) {
                    max = max.max(n);
                }
            }
            Ok(max)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Write `sentences` to the next free `<n>.txt` in `dir`.
pub fn save_next(dir: &Path, sentences: &[String]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.txt", highest_index(dir)? + 1));
    let mut body = String::new();
    for s in sentences {
        body.push_str(s);
        body.push('\n');
    }
    std::fs::write(&path, body)?;
    Ok(path)
}

/// Most recently modified `.txt` directly inside `dir`.
pub fn latest_sentence_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().map_or(true, |(t, _)| modified >= *t) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, p)| p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_numbered_lines() {
        let reply = "Sure! Here you go:\n1. I like coffee in the morning.\n2.   We walked home late.\n\nnot numbered\n3. The bus was on time.";
        assert_eq!(
            extract_numbered(reply),
            vec![
                "1. I like coffee in the morning.",
                "2.   We walked home late.",
                "3. The bus was on time."
            ]
        );
        assert!(extract_numbered("no sentences here").is_empty());
    }

    #[test]
    fn test_save_next_increments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("7.txt"), "1. old\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let path = save_next(dir.path(), &["1. A new line.".to_string()]).unwrap();
        assert_eq!(path, dir.path().join("8.txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1. A new line.\n");
    }

    #[test]
    fn test_latest_sentence_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_sentence_file(&dir.path().join("missing")).unwrap(), None);

        let first = save_next(dir.path(), &["1. One.".to_string()]).unwrap();
        assert_eq!(latest_sentence_file(dir.path()).unwrap(), Some(first));
    }
}
