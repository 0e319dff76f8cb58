//! Durable artifact storage for finished videos.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RelayError;

/// Copies rendered artifacts into the serving location named by request id.
///
/// Placement is idempotent: redelivering a completion notification re-runs
/// the copy, which either short-circuits (destination already holds the
/// same content) or overwrites atomically via a temp file + rename. Either
/// way there is never a second, different copy for the same request.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactStore { root: root.into() }
    }

    /// Destination path for a request id, whether or not it exists yet.
    pub fn destination(&self, uid: &str) -> PathBuf {
        self.root.join(uid).join(format!("{uid}.mp4"))
    }

    /// Copy the artifact at `source` into the serving location for `uid`.
    pub async fn place(&self, uid: &str, source: &Path) -> Result<PathBuf, RelayError> {
        let source_meta =
            tokio::fs::metadata(source)
                .await
                .map_err(|_| RelayError::ArtifactMissing {
                    path: source.display().to_string(),
                })?;

        let dir = self.root.join(uid);
        tokio::fs::create_dir_all(&dir).await?;
        let dest = dir.join(format!("{uid}.mp4"));

        if let Ok(existing) = tokio::fs::metadata(&dest).await {
            if existing.len() == source_meta.len() {
                debug!(uid = %uid, dest = %dest.display(), "artifact already placed");
                return Ok(dest);
            }
        }

        let tmp = dir.join(format!("{uid}.mp4.part"));
        tokio::fs::copy(source, &tmp).await?;
        tokio::fs::rename(&tmp, &dest).await?;
        debug!(uid = %uid, dest = %dest.display(), "artifact placed");
        Ok(dest)
    }
}
