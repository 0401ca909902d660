//! Core data models for the music scanner
//!
//! The `Scan*` types form the transient tree built by one walk; the
//! remaining types mirror the rows written to the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Map a probed container format name to a MIME content type.
///
/// ffprobe reports some containers as comma-separated lists
/// (`mov,mp4,m4a,3gp,3g2,mj2`); the first recognised entry wins.
pub fn content_type_for(format_name: &str) -> &'static str {
    format_name
        .split(',')
        .find_map(|name| match name.trim().to_lowercase().as_str() {
            "mp3" => Some("audio/mpeg"),
            "flac" => Some("audio/flac"),
            "wav" => Some("audio/wav"),
            "mp4" | "m4a" => Some("audio/mp4"),
            "aac" => Some("audio/aac"),
            "ogg" => Some("audio/ogg"),
            "asf" => Some("audio/x-ms-wma"),
            _ => None,
        })
        .unwrap_or("audio/mpeg")
}

/// Technical metadata obtained for one audio file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Duration in milliseconds
    pub duration_ms: u32,
    /// Bit rate in kbps
    pub bit_rate: u32,
    /// File size in bytes
    pub size: u64,
    /// Container format name as reported by the probe
    pub format_name: String,
}

/// A detected cover image, keyed by the hash of its path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cover {
    /// 16 hex characters derived from the cover path
    pub id: String,
    /// Absolute path of the cover file
    pub path: PathBuf,
}

/// A song discovered inside an album directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSong {
    pub title: String,
    pub album: String,
    pub artist: String,
    /// Duration in milliseconds
    pub duration_ms: u32,
    /// Bit rate in kbps
    pub bit_rate: u32,
    /// File size in bytes
    pub size: u64,
    /// Container format
    pub suffix: String,
    pub content_type: String,
    /// Absolute path, used to re-identify the song
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_video: bool,
}

impl ScanSong {
    /// Build a song from its location in the tree and its probed metadata
    pub fn new(path: PathBuf, album: &str, artist: &str, metadata: Metadata) -> Self {
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content_type = content_type_for(&metadata.format_name).to_string();
        Self {
            title,
            album: album.to_string(),
            artist: artist.to_string(),
            duration_ms: metadata.duration_ms,
            bit_rate: metadata.bit_rate,
            size: metadata.size,
            suffix: metadata.format_name,
            content_type,
            path,
            is_dir: false,
            is_video: false,
        }
    }
}

/// An album directory and the songs that could be resolved inside it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAlbum {
    pub name: String,
    /// Parent artist name
    pub artist: String,
    pub cover: Option<Cover>,
    pub songs: Vec<ScanSong>,
    /// Song files discovered but dropped because extraction failed
    pub skipped_files: u64,
}

impl ScanAlbum {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    pub fn cover_art(&self) -> Option<&str> {
        self.cover.as_ref().map(|c| c.id.as_str())
    }

    pub fn song_count(&self) -> u32 {
        self.songs.len() as u32
    }

    /// Total duration of all resolved songs, in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.songs.iter().map(|s| s.duration_ms as u64).sum()
    }

    /// Song files discovered in the directory, resolved or not
    pub fn discovered_files(&self) -> u64 {
        self.songs.len() as u64 + self.skipped_files
    }
}

/// An artist directory with its fully walked albums
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanArtist {
    pub name: String,
    pub cover: Option<Cover>,
    pub albums: Vec<ScanAlbum>,
    /// Album directories whose listing failed
    pub skipped_dirs: u64,
}

impl ScanArtist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn cover_art(&self) -> Option<&str> {
        self.cover.as_ref().map(|c| c.id.as_str())
    }

    pub fn album_count(&self) -> u32 {
        self.albums.len() as u32
    }

    pub fn song_count(&self) -> u64 {
        self.albums.iter().map(|a| a.songs.len() as u64).sum()
    }

    pub fn skipped_files(&self) -> u64 {
        self.albums.iter().map(|a| a.skipped_files).sum()
    }

    /// Covers of the artist and its albums, artist first
    pub fn covers(&self) -> impl Iterator<Item = &Cover> {
        self.cover
            .iter()
            .chain(self.albums.iter().filter_map(|a| a.cover.as_ref()))
    }
}

/// Artist row in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Assigned by the store; ignored on create
    pub id: i64,
    pub name: String,
    pub cover_art: Option<String>,
    pub album_count: u32,
    pub created: DateTime<Utc>,
}

/// Album row in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Assigned by the store; ignored on create
    pub id: i64,
    pub artist_id: i64,
    pub name: String,
    pub artist: String,
    pub cover_art: Option<String>,
    pub song_count: u32,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    pub created: DateTime<Utc>,
}

/// Song row in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Assigned by the store; ignored on create
    pub id: i64,
    pub album_id: i64,
    pub title: String,
    pub album: String,
    pub artist: String,
    pub cover_art: Option<String>,
    pub duration_ms: u32,
    pub bit_rate: u32,
    pub size: u64,
    pub suffix: String,
    pub content_type: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_video: bool,
    pub created: DateTime<Utc>,
}

/// Point-in-time view of the scanner, as handed to status readers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    /// Whether a scan is running
    pub scanning: bool,
    /// Artists, albums and song files discovered by the current or last scan
    pub count: u64,
    /// Song files dropped because their metadata could not be extracted
    pub skipped_files: u64,
    /// Directories whose listing failed
    pub skipped_dirs: u64,
    /// Artist subtrees that could not be written to the catalog
    pub failed_exports: u64,
}

/// Summary of one completed walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkSummary {
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
    pub skipped_files: u64,
    pub skipped_dirs: u64,
    pub failed_exports: u64,
    /// Total walk duration in milliseconds
    pub duration_ms: u64,
}

impl WalkSummary {
    /// Check if the walk finished without skipping anything
    pub fn is_clean(&self) -> bool {
        self.skipped_files == 0 && self.skipped_dirs == 0 && self.failed_exports == 0
    }
}
