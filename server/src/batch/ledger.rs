//! Append-only record of sentence lines already synthesized.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::AsyncWriteExt;

/// Directory, next to the sentence files, that holds one ledger per file
pub const LEDGER_DIR: &str = "tts_done_sentences";

/// Ledger location for a sentence file: `<dir>/tts_done_sentences/<name>`.
pub fn ledger_path(sentence_file: &Path) -> PathBuf {
    let dir = sentence_file.parent().unwrap_or_else(|| Path::new("."));
    let name = sentence_file.file_name().unwrap_or_default();
    dir.join(LEDGER_DIR).join(name)
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    done: HashSet<String>,
}

impl Ledger {
    /// Load existing lines. A missing ledger is empty; nothing is created
    /// until the first append.
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        let done = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e).with_context(|| format!("reading ledger {}", path.display())),
        };
        Ok(Self { path, done })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, line: &str) -> bool {
        self.done.contains(line)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Record `line` verbatim and flush before returning.
    pub async fn append(&mut self, line: &str) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating ledger dir {}", dir.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        self.done.insert(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_path() {
        let p = ledger_path(Path::new("gen/3.txt"));
        assert_eq!(p, Path::new("gen/tts_done_sentences/3.txt"));
    }

    #[tokio::test]
    async fn test_open_missing_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_DIR).join("1.txt");
        let ledger = Ledger::open(path.clone()).await.unwrap();
        assert!(ledger.is_empty());
        assert!(!path.exists());
        assert!(!dir.path().join(LEDGER_DIR).exists());
    }

    #[tokio::test]
    async fn test_append_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_DIR).join("1.txt");

        let mut ledger = Ledger::open(path.clone()).await.unwrap();
        ledger.append("1. The sun is warm today").await.unwrap();
        ledger.append("3. I like fresh bread").await.unwrap();
        assert!(ledger.contains("1. The sun is warm today"));

        let reopened = Ledger::open(path.clone()).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("3. I like fresh bread"));
        assert!(!reopened.contains("2. Missing line"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1. The sun is warm today\n3. I like fresh bread\n");
    }

    #[tokio::test]
    async fn test_append_keeps_line_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_DIR).join("2.txt");

        let mut ledger = Ledger::open(path.clone()).await.unwrap();
        ledger.append("  4. Indented line stays as written ").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "  4. Indented line stays as written \n");
        let reopened = Ledger::open(path).await.unwrap();
        assert!(reopened.contains("  4. Indented line stays as written "));
    }
}
