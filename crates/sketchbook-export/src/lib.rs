//! Result export: fetch every result image, bundle them into one zip, save it.

pub mod archive;
pub mod fetch;
pub mod pipeline;
pub mod sink;

pub use archive::{ArchivedImage, build_archive, entry_name};
pub use fetch::{HttpFetcher, ImageFetcher};
pub use pipeline::{ExportPipeline, ExportReport};
pub use sink::{ArchiveSink, DiskSink};
