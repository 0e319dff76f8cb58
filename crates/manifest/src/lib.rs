//! Append-only manifest of phrase outcomes.
//!
//! One JSON record per line: `{phrase, id, status, path|null, timestamp}`.
//! The writer serializes appends behind a mutex and writes each entry as a
//! single complete line, so a crash mid-write can corrupt at most the final
//! line. The reader tolerates exactly that: an unparsable final line is
//! ignored, unparsable interior lines are skipped with a warning.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use protocol::OutcomeStatus;

/// Errors raised by manifest reads and writes.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode manifest entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One resolved phrase, never mutated after being appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Normalized phrase text; the idempotence key across runs.
    pub phrase: String,
    /// Request id assigned by the API, absent when submission itself failed.
    pub id: Option<String>,
    pub status: OutcomeStatus,
    /// Local video path, null unless the phrase reached `generated`.
    pub path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl ManifestEntry {
    pub fn new(phrase: impl Into<String>, id: Option<String>, status: OutcomeStatus, path: Option<PathBuf>) -> Self {
        ManifestEntry {
            phrase: phrase.into(),
            id,
            status,
            path,
            timestamp: Utc::now(),
        }
    }
}

/// Serialized appender for the manifest file.
///
/// A single writer (or a shared one behind this mutex) preserves the
/// atomic-line guarantee; readers may run concurrently.
pub struct ManifestWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl ManifestWriter {
    /// Open (creating if needed) the manifest at `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ManifestError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ManifestError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(ManifestWriter {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one entry as a complete line and flush.
    pub fn append(&self, entry: &ManifestEntry) -> Result<(), ManifestError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| ManifestError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every parsable entry from a manifest file.
///
/// A missing file reads as empty (first run). The final line may be a
/// partial write from a crashed run and is dropped silently when it fails
/// to parse; a bad interior line is unexpected and logged.
pub fn read_entries(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ManifestError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ManifestEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if idx + 1 == lines.len() => {
                // Possibly a torn final write; readers must ignore it.
                warn!("ignoring incomplete final manifest line: {e}");
            }
            Err(e) => {
                warn!("skipping unparsable manifest line {}: {e}", idx + 1);
            }
        }
    }
    Ok(entries)
}

/// Entries already `generated`, keyed by normalized phrase.
///
/// The submission client uses this to skip phrases that completed in a
/// previous run instead of appending duplicates.
pub fn load_completed(path: &Path) -> Result<HashMap<String, ManifestEntry>, ManifestError> {
    let mut completed = HashMap::new();
    for entry in read_entries(path)? {
        if entry.status == OutcomeStatus::Generated {
            completed.entry(entry.phrase.clone()).or_insert(entry);
        }
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(phrase: &str, status: OutcomeStatus, path: Option<&str>) -> ManifestEntry {
        ManifestEntry::new(
            phrase,
            Some(format!("uid-{phrase}")),
            status,
            path.map(PathBuf::from),
        )
    }

    #[test]
    fn append_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        let writer = ManifestWriter::open(&path).unwrap();

        let first = sample("bom dia", OutcomeStatus::Generated, Some("videos/a.mp4"));
        let second = sample("boa tarde", OutcomeStatus::Failed, None);
        writer.append(&first).unwrap();
        writer.append(&second).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].phrase, "bom dia");
        assert_eq!(entries[0].path.as_deref(), Some(Path::new("videos/a.mp4")));
        assert_eq!(entries[1].status, OutcomeStatus::Failed);
        assert_eq!(entries[1].path, None);
    }

    #[test]
    fn missing_manifest_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = read_entries(&dir.path().join("nope.jsonl")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn truncated_final_line_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        let writer = ManifestWriter::open(&path).unwrap();
        writer
            .append(&sample("bom dia", OutcomeStatus::Generated, Some("a.mp4")))
            .unwrap();
        // Simulate a crash mid-append.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"phrase\":\"boa ta").unwrap();
        }

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].phrase, "bom dia");
    }

    #[test]
    fn load_completed_keeps_only_generated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        let writer = ManifestWriter::open(&path).unwrap();
        writer
            .append(&sample("bom dia", OutcomeStatus::Generated, Some("a.mp4")))
            .unwrap();
        writer.append(&sample("boa tarde", OutcomeStatus::Timeout, None)).unwrap();
        writer.append(&sample("boa noite", OutcomeStatus::Failed, None)).unwrap();

        let completed = load_completed(&path).unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed.contains_key("bom dia"));
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        {
            let writer = ManifestWriter::open(&path).unwrap();
            writer
                .append(&sample("bom dia", OutcomeStatus::Generated, Some("a.mp4")))
                .unwrap();
        }
        {
            let writer = ManifestWriter::open(&path).unwrap();
            writer
                .append(&sample("boa tarde", OutcomeStatus::Generated, Some("b.mp4")))
                .unwrap();
        }
        assert_eq!(read_entries(&path).unwrap().len(), 2);
    }
}
