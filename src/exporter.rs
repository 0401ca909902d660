//! Persists one walked artist subtree to the catalog

use chrono::{DateTime, Utc};

use crate::db::{CatalogStore, CatalogWriter};
use crate::error::ScanError;
use crate::models::{Album, Artist, ScanAlbum, ScanArtist, Song};

/// Rows written for one artist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub artist_id: i64,
    pub albums: u64,
    pub songs: u64,
    pub covers: u64,
}

/// Write `artist` and everything below it as a single batch.
///
/// Rows go out in the order artist, then each album followed by its songs,
/// then the artist and album covers. Either all of them are committed or
/// none are.
pub fn export_artist<S>(store: &mut S, artist: ScanArtist) -> Result<ExportSummary, ScanError>
where
    S: CatalogStore + ?Sized,
{
    let created = Utc::now();
    let mut summary = ExportSummary::default();
    store
        .write_batch(&mut |writer| {
            summary = write_artist(writer, &artist, created)?;
            Ok(())
        })
        .map_err(|e| {
            ScanError::persistence(format!("exporting artist {}: {}", artist.name, e.message))
        })?;

    log::debug!(
        "Exported artist {} ({} albums, {} songs, {} covers)",
        artist.name,
        summary.albums,
        summary.songs,
        summary.covers
    );
    Ok(summary)
}

fn write_artist(
    writer: &mut dyn CatalogWriter,
    artist: &ScanArtist,
    created: DateTime<Utc>,
) -> Result<ExportSummary, ScanError> {
    let row = writer.create_artist(Artist {
        id: 0,
        name: artist.name.clone(),
        cover_art: artist.cover_art().map(str::to_string),
        album_count: artist.album_count(),
        created,
    })?;

    let mut summary = ExportSummary {
        artist_id: row.id,
        ..Default::default()
    };
    for album in &artist.albums {
        summary.songs += write_album(writer, row.id, album, created)?;
        summary.albums += 1;
    }

    for cover in artist.covers() {
        log::trace!("Exporting cover {}", cover.id);
        writer.create_cover(cover.clone())?;
        summary.covers += 1;
    }
    Ok(summary)
}

fn write_album(
    writer: &mut dyn CatalogWriter,
    artist_id: i64,
    album: &ScanAlbum,
    created: DateTime<Utc>,
) -> Result<u64, ScanError> {
    let row = writer.create_album(Album {
        id: 0,
        artist_id,
        name: album.name.clone(),
        artist: album.artist.clone(),
        cover_art: album.cover_art().map(str::to_string),
        song_count: album.song_count(),
        duration_ms: album.duration_ms(),
        created,
    })?;

    for song in &album.songs {
        writer.create_song(Song {
            id: 0,
            album_id: row.id,
            title: song.title.clone(),
            album: song.album.clone(),
            artist: song.artist.clone(),
            cover_art: None,
            duration_ms: song.duration_ms,
            bit_rate: song.bit_rate,
            size: song.size,
            suffix: song.suffix.clone(),
            content_type: song.content_type.clone(),
            path: song.path.clone(),
            is_dir: song.is_dir,
            is_video: song.is_video,
            created,
        })?;
    }
    Ok(album.songs.len() as u64)
}
