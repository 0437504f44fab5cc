//! The export pipeline.
//!
//! Fetches run concurrently and all of them settle before the archive is
//! assembled. A failed or timed-out fetch drops that one image; the rest
//! of the export goes ahead. Dropping the `export` future abandons it
//! without saving anything.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use sketchbook_core::config::Config;
use sketchbook_core::error::{Result, SketchbookError};
use sketchbook_core::session::Session;
use sketchbook_core::types::GameResult;

use crate::archive::{ArchivedImage, build_archive, entry_name};
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::sink::{ArchiveSink, DiskSink};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_FILE_NAME: &str = "images.zip";

/// Outcome of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub requested: usize,
    pub archived: usize,
    /// Ordinals whose fetch failed or timed out.
    pub failed: Vec<usize>,
    pub path: PathBuf,
}

pub struct ExportPipeline {
    fetcher: Arc<dyn ImageFetcher>,
    sink: Arc<dyn ArchiveSink>,
    fetch_timeout: Duration,
    file_name: String,
}

impl ExportPipeline {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, sink: Arc<dyn ArchiveSink>) -> Self {
        Self {
            fetcher,
            sink,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// HTTP fetcher and disk sink as configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new().map_err(SketchbookError::Other)?;
        Ok(Self::new(Arc::new(fetcher), Arc::new(DiskSink::new(config.export_dir())))
            .with_fetch_timeout(config.fetch_timeout())
            .with_file_name(config.export_file_name()))
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Export the results of `session` as they are right now.
    pub async fn export_session(&self, session: &Session) -> Result<ExportReport> {
        self.export(session.game_result.clone()).await
    }

    /// Fetch, archive and save `results`. The list is owned, so later
    /// changes to the session cannot reach an export in flight.
    pub async fn export(&self, results: Vec<GameResult>) -> Result<ExportReport> {
        let requested = results.len();
        let (images, failed) = self.fetch_all(&results).await;

        let archive = build_archive(&images)?;
        let path = self.sink.save(&archive, &self.file_name).await?;

        let report = ExportReport {
            requested,
            archived: images.len(),
            failed,
            path,
        };
        info!(
            requested = report.requested,
            archived = report.archived,
            failed = report.failed.len(),
            path = %report.path.display(),
            "Export complete"
        );
        Ok(report)
    }

    /// Fetch every image concurrently. Returns the successes and the
    /// ordinals that failed, once every fetch has settled.
    pub async fn fetch_all(&self, results: &[GameResult]) -> (Vec<ArchivedImage>, Vec<usize>) {
        let fetches = results
            .iter()
            .enumerate()
            .map(|(ordinal, result)| self.fetch_one(ordinal, &result.img));
        let outcomes = join_all(fetches).await;

        let mut images = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (ordinal, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Some(image) => images.push(image),
                None => failed.push(ordinal),
            }
        }
        (images, failed)
    }

    async fn fetch_one(&self, ordinal: usize, url: &str) -> Option<ArchivedImage> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(bytes)) => Some(ArchivedImage {
                ordinal,
                name: entry_name(ordinal, url),
                bytes,
            }),
            Ok(Err(e)) => {
                warn!(ordinal, %url, error = %e, "Image fetch failed, skipping");
                None
            }
            Err(_) => {
                warn!(
                    ordinal,
                    %url,
                    timeout_ms = u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Image fetch timed out, skipping"
                );
                None
            }
        }
    }
}
