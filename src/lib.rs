//! Music library scanner with background, single-flight scans
//!
//! This library walks `artist/album/song` folder trees, probes each song
//! with ffprobe, detects cover images and exports every artist subtree to a
//! SQLite catalog while reporting live progress.

pub mod auth;
pub mod config;
pub mod cover;
pub mod db;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod walker;

#[cfg(test)]
mod testing;

pub use auth::{AdminOnly, Authorizer, Principal, ScanAction};
pub use config::ScanConfig;
pub use db::{CatalogStore, CatalogWriter, MemoryCatalog, SqliteCatalog};
pub use error::{ScanError, ScanErrorKind};
pub use exporter::{export_artist, ExportSummary};
pub use extractor::{FfprobeExtractor, MetadataExtractor};
pub use models::{
    Album, Artist, Cover, Metadata, ScanAlbum, ScanArtist, ScanSong, ScanStatus, Song, WalkSummary,
};
pub use orchestrator::ScanOrchestrator;
pub use progress::{ProgressDelta, ProgressReporter};
pub use walker::TreeWalker;
