//! Where finished archives go.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use sketchbook_core::error::Result;

/// Receives the finished archive bytes under a suggested file name.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn save(&self, archive: &[u8], file_name: &str) -> Result<PathBuf>;
}

/// Saves archives into a directory.
pub struct DiskSink {
    dir: PathBuf,
}

impl DiskSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ArchiveSink for DiskSink {
    async fn save(&self, archive: &[u8], file_name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        // Atomic write: write to temp then rename
        let tmp = self.dir.join(format!("{file_name}.tmp"));
        tokio::fs::write(&tmp, archive).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), bytes = archive.len(), "Saved archive");
        Ok(path)
    }
}
