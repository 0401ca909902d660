//! Tree walker - turns the artist/album/song folder hierarchy into scan trees
//!
//! Each configured music folder is read three levels deep. One artist is
//! walked completely, reported to the progress channel and exported before
//! the next artist is touched, so at most one artist subtree is held in
//! memory at a time.

use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::cover::detect_cover;
use crate::db::CatalogStore;
use crate::error::ScanError;
use crate::exporter::export_artist;
use crate::extractor::MetadataExtractor;
use crate::models::{Metadata, ScanAlbum, ScanArtist, ScanSong, WalkSummary};
use crate::progress::ProgressReporter;

/// Walks the configured music folders and exports every artist found
pub struct TreeWalker<'a, S: CatalogStore> {
    config: &'a ScanConfig,
    extractor: &'a dyn MetadataExtractor,
    catalog: &'a Mutex<S>,
    progress: ProgressReporter,
    pool: Option<rayon::ThreadPool>,
}

impl<'a, S: CatalogStore> TreeWalker<'a, S> {
    pub fn new(
        config: &'a ScanConfig,
        extractor: &'a dyn MetadataExtractor,
        catalog: &'a Mutex<S>,
        progress: ProgressReporter,
    ) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_threads())
            .thread_name(|i| format!("scan-probe-{i}"))
            .build()
            .map_err(|e| log::warn!("Probing songs sequentially, worker pool unavailable: {e}"))
            .ok();

        Self {
            config,
            extractor,
            catalog,
            progress,
            pool,
        }
    }

    /// Walk every music folder; per-item failures are logged and counted,
    /// never returned
    pub fn walk(&self) -> WalkSummary {
        let start = Instant::now();
        let mut summary = WalkSummary::default();

        for folder in &self.config.music_folders {
            self.walk_folder(folder, &mut summary);
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        summary
    }

    fn walk_folder(&self, folder: &Path, summary: &mut WalkSummary) {
        log::debug!("Scanning music folder: {:?}", folder);
        let artist_dirs = match self.list_subdirs(folder) {
            Ok(dirs) => dirs,
            Err(e) => {
                log::warn!("Skipping music folder: {}", e);
                self.progress.report_skipped_dir();
                summary.skipped_dirs += 1;
                return;
            }
        };

        for artist_dir in artist_dirs {
            let artist = match self.scan_artist(&artist_dir) {
                Ok(artist) => artist,
                Err(e) => {
                    log::warn!("Skipping artist directory: {}", e);
                    self.progress.report_skipped_dir();
                    summary.skipped_dirs += 1;
                    continue;
                }
            };

            self.progress.report_artist(&artist);
            summary.artists += 1;
            summary.albums += artist.albums.len() as u64;
            summary.songs += artist.song_count();
            summary.skipped_files += artist.skipped_files();
            summary.skipped_dirs += artist.skipped_dirs;

            let name = artist.name.clone();
            let exported = {
                let mut catalog = self.catalog.lock();
                export_artist(&mut *catalog, artist)
            };
            if let Err(e) = exported {
                log::error!("Failed to export artist {}: {}", name, e);
                self.progress.report_failed_export();
                summary.failed_exports += 1;
            }
        }
    }

    /// Build the complete subtree of one artist directory.
    ///
    /// Fails only when the artist directory itself cannot be listed; albums
    /// that cannot be listed are counted in `skipped_dirs` and left out.
    pub fn scan_artist(&self, dir: &Path) -> Result<ScanArtist, ScanError> {
        let mut artist = ScanArtist::new(entry_name(dir));
        log::debug!("Scanning artist: {}", artist.name);
        artist.cover = detect_cover(dir, &self.config.cover_names);

        for album_dir in self.list_subdirs(dir)? {
            match self.scan_album(&album_dir, &artist.name) {
                Ok(album) => artist.albums.push(album),
                Err(e) => {
                    log::warn!("Skipping album directory: {}", e);
                    artist.skipped_dirs += 1;
                }
            }
        }
        Ok(artist)
    }

    /// Build one album: its cover plus every file that could be probed
    pub fn scan_album(&self, dir: &Path, artist: &str) -> Result<ScanAlbum, ScanError> {
        let mut album = ScanAlbum::new(entry_name(dir), artist);
        log::debug!("Scanning album: {}", album.name);
        album.cover = detect_cover(dir, &self.config.cover_names);

        let files: Vec<PathBuf> = list_dir(dir)?
            .into_iter()
            .filter(|entry| !entry.file_type().is_dir())
            .filter(|entry| !self.config.is_cover_name(&entry.file_name().to_string_lossy()))
            .map(DirEntry::into_path)
            .collect();

        for (path, result) in files.iter().zip(self.extract_all(&files)) {
            match result {
                Ok(metadata) => {
                    log::trace!("Scanned song: {:?}", path);
                    album
                        .songs
                        .push(ScanSong::new(path.clone(), &album.name, artist, metadata));
                }
                Err(e) => {
                    log::warn!("Skipping song: {}", e);
                    album.skipped_files += 1;
                }
            }
        }
        Ok(album)
    }

    /// Probe every file of one album, keeping input order
    fn extract_all(&self, files: &[PathBuf]) -> Vec<Result<Metadata, ScanError>> {
        let extractor = self.extractor;
        match &self.pool {
            Some(pool) => pool.install(|| {
                files
                    .par_iter()
                    .map(|path| extractor.extract(path))
                    .collect()
            }),
            None => files.iter().map(|path| extractor.extract(path)).collect(),
        }
    }

    /// Subdirectories of `dir` that are not ignored, sorted by name
    fn list_subdirs(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        Ok(list_dir(dir)?
            .into_iter()
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| !self.config.should_ignore_dir(&entry.file_name().to_string_lossy()))
            .map(DirEntry::into_path)
            .collect())
    }
}

/// Immediate children of `dir`, sorted by file name.
///
/// Any failure while listing (the directory vanished, permissions, a child
/// that cannot be stat'ed) fails the whole listing.
fn list_dir(dir: &Path) -> Result<Vec<DirEntry>, ScanError> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ScanError::directory_read(dir.to_path_buf(), e.to_string()))
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalog;
    use crate::error::ScanErrorKind;
    use crate::progress::{self, ProgressDelta};
    use crate::testing::{write_cover, write_song, FakeExtractor};
    use crossbeam_channel::Receiver;
    use std::fs;

    fn config(root: &Path) -> ScanConfig {
        ScanConfig::builder()
            .add_music_folder(root.to_path_buf())
            .num_threads(2)
            .build()
    }

    fn drain(rx: &Receiver<ProgressDelta>) -> u64 {
        rx.try_iter().map(|d| d.discovered).sum()
    }

    #[test]
    fn test_walk_counts_and_exports() {
        let root = tempfile::tempdir().unwrap();
        let music = root.path();
        write_song(&music.join("ArtistA/Album1"), "song1.mp3", "200.5", "mp3");
        write_song(&music.join("ArtistA/Album1"), "song2.mp3", "100.25", "mp3");
        write_song(&music.join("ArtistA/Album2"), "track.flac", "60", "flac");
        write_song(&music.join("ArtistB/Only"), "a.ogg", "10", "ogg");
        write_song(&music.join("ArtistB/Only"), "b.ogg", "N/A", "ogg");
        fs::write(music.join("stray.txt"), b"not an artist").unwrap();
        fs::write(music.join("ArtistA/notes.txt"), b"not an album").unwrap();

        let config = config(music);
        let extractor = FakeExtractor::new();
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, rx) = progress::channel(64);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let summary = walker.walk();
        drop(walker);

        // 2 artists + 3 albums + 5 discovered song files
        assert_eq!(drain(&rx), 10);
        assert_eq!(summary.artists, 2);
        assert_eq!(summary.albums, 3);
        assert_eq!(summary.songs, 4);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.failed_exports, 0);

        let catalog = catalog.lock();
        assert_eq!(catalog.artists.len(), 2);
        assert_eq!(catalog.albums.len(), 3);
        assert_eq!(catalog.songs.len(), 4);
        let only = catalog.albums.iter().find(|a| a.name == "Only").unwrap();
        assert_eq!(only.song_count, 1);
        assert_eq!(only.duration_ms, 10_000);
        assert!(catalog
            .songs
            .iter()
            .all(|s| !s.path.ends_with("b.ogg")));
    }

    #[test]
    fn test_scan_album_covers_and_order() {
        let root = tempfile::tempdir().unwrap();
        let album_dir = root.path().join("ArtistA/Album1");
        write_song(&album_dir, "b.mp3", "1", "mp3");
        write_song(&album_dir, "a.mp3", "2", "mp3");
        write_cover(&album_dir, "cover.jpg");
        fs::create_dir_all(album_dir.join("scans")).unwrap();

        let config = config(root.path());
        let extractor = FakeExtractor::new();
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, _rx) = progress::channel(8);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let album = walker.scan_album(&album_dir, "ArtistA").unwrap();
        assert_eq!(album.name, "Album1");
        assert_eq!(album.artist, "ArtistA");
        let titles: Vec<&str> = album.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["a.mp3", "b.mp3"]);
        assert_eq!(album.skipped_files, 0);
        assert_eq!(
            album.cover.as_ref().map(|c| c.path.clone()),
            Some(album_dir.join("cover.jpg"))
        );
        // the cover image is not probed as a song
        assert_eq!(extractor.calls(), 2);
    }

    #[test]
    fn test_scan_artist_without_cover() {
        let root = tempfile::tempdir().unwrap();
        let artist_dir = root.path().join("ArtistA");
        write_song(&artist_dir.join("Album1"), "a.mp3", "2", "mp3");
        fs::create_dir_all(artist_dir.join(".hidden")).unwrap();

        let config = config(root.path());
        let extractor = FakeExtractor::new();
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, _rx) = progress::channel(8);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let artist = walker.scan_artist(&artist_dir).unwrap();
        assert_eq!(artist.name, "ArtistA");
        assert!(artist.cover.is_none());
        assert_eq!(artist.albums.len(), 1);
        assert_eq!(artist.skipped_dirs, 0);
    }

    #[test]
    fn test_missing_folder_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_song(&root.path().join("ArtistA/Album1"), "a.mp3", "2", "mp3");

        let config = ScanConfig::builder()
            .add_music_folder(root.path().join("does-not-exist"))
            .add_music_folder(root.path().to_path_buf())
            .build();
        let extractor = FakeExtractor::new();
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, rx) = progress::channel(64);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let summary = walker.walk();
        assert_eq!(summary.skipped_dirs, 1);
        assert_eq!(summary.artists, 1);
        assert_eq!(drain(&rx), 3);
        assert_eq!(catalog.lock().songs.len(), 1);
    }

    #[test]
    fn test_failed_album_listing_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let artist_dir = root.path().join("ArtistA");
        write_song(&artist_dir.join("Album1"), "a.mp3", "2", "mp3");
        write_song(&artist_dir.join("Album2"), "b.mp3", "2", "mp3");

        // Album2 is listed as an album, then vanishes while Album1 is probed
        let config = config(root.path());
        let extractor = FakeExtractor::removing(artist_dir.join("Album2"));
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, rx) = progress::channel(64);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let summary = walker.walk();
        drop(walker);

        assert_eq!(summary.artists, 1);
        assert_eq!(summary.albums, 1);
        assert_eq!(summary.skipped_dirs, 1);
        let deltas: Vec<ProgressDelta> = rx.try_iter().collect();
        assert_eq!(deltas.iter().map(|d| d.discovered).sum::<u64>(), 3);
        assert_eq!(deltas.iter().map(|d| d.skipped_dirs).sum::<u64>(), 1);

        let catalog = catalog.lock();
        assert_eq!(catalog.artists.len(), 1);
        assert_eq!(catalog.artists[0].album_count, 1);
        assert_eq!(catalog.albums.len(), 1);
        assert_eq!(catalog.albums[0].name, "Album1");
    }

    #[test]
    fn test_scan_album_on_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        let extractor = FakeExtractor::new();
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, _rx) = progress::channel(8);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let err = walker
            .scan_album(&root.path().join("ArtistA/Gone"), "ArtistA")
            .unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::DirectoryRead);
    }

    #[test]
    fn test_failed_artist_listing_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let music = root.path();
        write_song(&music.join("ArtistA/Album1"), "a.mp3", "2", "mp3");
        write_song(&music.join("ArtistB/Album1"), "b.mp3", "2", "mp3");
        write_song(&music.join("ArtistC/Album1"), "c.mp3", "2", "mp3");

        // ArtistB disappears while ArtistA is being walked
        let config = config(music);
        let extractor = FakeExtractor::removing(music.join("ArtistB"));
        let catalog = Mutex::new(MemoryCatalog::new());
        let (reporter, rx) = progress::channel(64);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let summary = walker.walk();
        drop(walker);

        assert_eq!(summary.artists, 2);
        assert_eq!(summary.skipped_dirs, 1);
        let deltas: Vec<ProgressDelta> = rx.try_iter().collect();
        assert_eq!(deltas.iter().map(|d| d.discovered).sum::<u64>(), 6);
        assert_eq!(deltas.iter().map(|d| d.skipped_dirs).sum::<u64>(), 1);

        let catalog = catalog.lock();
        let names: Vec<&str> = catalog.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["ArtistA", "ArtistC"]);
    }

    #[test]
    fn test_list_dir_error_kind() {
        let root = tempfile::tempdir().unwrap();
        let err = list_dir(&root.path().join("gone")).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::DirectoryRead);
        assert_eq!(err.path, Some(root.path().join("gone")));
    }

    #[test]
    fn test_failed_export_does_not_stop_walk() {
        let root = tempfile::tempdir().unwrap();
        write_song(&root.path().join("ArtistA/Album1"), "a.mp3", "2", "mp3");
        write_song(&root.path().join("ArtistB/Album1"), "b.mp3", "2", "mp3");

        let config = config(root.path());
        let extractor = FakeExtractor::new();
        let catalog = Mutex::new(MemoryCatalog::failing_on("ArtistA"));
        let (reporter, rx) = progress::channel(64);
        let walker = TreeWalker::new(&config, &extractor, &catalog, reporter);

        let summary = walker.walk();
        drop(walker);

        assert_eq!(summary.failed_exports, 1);
        let failed: u64 = rx.try_iter().map(|d| d.failed_exports).sum();
        assert_eq!(failed, 1);

        let catalog = catalog.lock();
        assert_eq!(catalog.artists.len(), 1);
        assert_eq!(catalog.artists[0].name, "ArtistB");
        assert_eq!(catalog.songs.len(), 1);
    }
}
