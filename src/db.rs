//! Catalog storage for scanned artists, albums, songs and covers

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::models::{Album, Artist, Cover, Song};

/// Row-level write operations available inside a batch
pub trait CatalogWriter {
    fn create_artist(&mut self, artist: Artist) -> Result<Artist, ScanError>;
    fn create_album(&mut self, album: Album) -> Result<Album, ScanError>;
    fn create_song(&mut self, song: Song) -> Result<Song, ScanError>;
    /// Covers are keyed by identifier; an existing identifier is kept as is
    fn create_cover(&mut self, cover: Cover) -> Result<Cover, ScanError>;
}

/// A catalog that applies a batch of writes atomically
pub trait CatalogStore: Send {
    /// Run `batch` against a writer; commit if it returns `Ok`, otherwise
    /// discard every write it made
    fn write_batch(
        &mut self,
        batch: &mut dyn FnMut(&mut dyn CatalogWriter) -> Result<(), ScanError>,
    ) -> Result<(), ScanError>;
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
    pub covers: u64,
}

/// SQLite-backed catalog
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let conn = Connection::open(path).map_err(|e| ScanError::from(e).with_path(path))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self, ScanError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), ScanError> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS artists (
                artist_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                cover_art TEXT,
                album_count INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS albums (
                album_id INTEGER PRIMARY KEY AUTOINCREMENT,
                artist_id INTEGER NOT NULL REFERENCES artists(artist_id),
                name TEXT NOT NULL,
                artist TEXT NOT NULL,
                cover_art TEXT,
                song_count INTEGER NOT NULL DEFAULT 0,
                duration INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);

            CREATE TABLE IF NOT EXISTS songs (
                song_id INTEGER PRIMARY KEY AUTOINCREMENT,
                album_id INTEGER NOT NULL REFERENCES albums(album_id),
                title TEXT NOT NULL,
                album TEXT NOT NULL,
                artist TEXT NOT NULL,
                cover_art TEXT,
                duration INTEGER NOT NULL,
                bit_rate INTEGER NOT NULL,
                size INTEGER NOT NULL,
                suffix TEXT NOT NULL,
                content_type TEXT NOT NULL,
                is_dir INTEGER NOT NULL DEFAULT 0,
                is_video INTEGER NOT NULL DEFAULT 0,
                path TEXT NOT NULL,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_songs_album ON songs(album_id);
            CREATE INDEX IF NOT EXISTS idx_songs_path ON songs(path);

            CREATE TABLE IF NOT EXISTS covers (
                cover_id TEXT PRIMARY KEY,
                path TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Get row counts for every catalog table
    pub fn counts(&self) -> Result<CatalogCounts, ScanError> {
        let count = |table: &str| -> Result<u64, ScanError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(CatalogCounts {
            artists: count("artists")?,
            albums: count("albums")?,
            songs: count("songs")?,
            covers: count("covers")?,
        })
    }

    /// Load all albums ordered by id
    pub fn albums(&self) -> Result<Vec<Album>, ScanError> {
        let mut stmt = self.conn.prepare(
            "SELECT album_id, artist_id, name, artist, cover_art, song_count, duration, created
             FROM albums ORDER BY album_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Album {
                id: row.get(0)?,
                artist_id: row.get(1)?,
                name: row.get(2)?,
                artist: row.get(3)?,
                cover_art: row.get(4)?,
                song_count: row.get(5)?,
                duration_ms: row.get::<_, i64>(6)? as u64,
                created: row.get::<_, DateTime<Utc>>(7)?,
            })
        })?;

        let mut albums = Vec::new();
        for row in rows {
            albums.push(row?);
        }
        Ok(albums)
    }

    /// Load all songs ordered by id
    pub fn songs(&self) -> Result<Vec<Song>, ScanError> {
        let mut stmt = self.conn.prepare(
            "SELECT song_id, album_id, title, album, artist, cover_art, duration, bit_rate,
                    size, suffix, content_type, path, is_dir, is_video, created
             FROM songs ORDER BY song_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Song {
                id: row.get(0)?,
                album_id: row.get(1)?,
                title: row.get(2)?,
                album: row.get(3)?,
                artist: row.get(4)?,
                cover_art: row.get(5)?,
                duration_ms: row.get(6)?,
                bit_rate: row.get(7)?,
                size: row.get::<_, i64>(8)? as u64,
                suffix: row.get(9)?,
                content_type: row.get(10)?,
                path: PathBuf::from(row.get::<_, String>(11)?),
                is_dir: row.get(12)?,
                is_video: row.get(13)?,
                created: row.get::<_, DateTime<Utc>>(14)?,
            })
        })?;

        let mut songs = Vec::new();
        for row in rows {
            songs.push(row?);
        }
        Ok(songs)
    }

    /// Look up the path stored for a cover identifier
    pub fn cover_path(&self, cover_id: &str) -> Result<Option<PathBuf>, ScanError> {
        let path: Option<String> = self
            .conn
            .query_row(
                "SELECT path FROM covers WHERE cover_id = ?1",
                [cover_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }
}

impl CatalogStore for SqliteCatalog {
    fn write_batch(
        &mut self,
        batch: &mut dyn FnMut(&mut dyn CatalogWriter) -> Result<(), ScanError>,
    ) -> Result<(), ScanError> {
        let tx = self.conn.transaction()?;
        {
            let mut writer = SqliteWriter { tx: &tx };
            batch(&mut writer)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Writer bound to an open transaction; dropping the transaction uncommitted
/// rolls every row back
struct SqliteWriter<'a> {
    tx: &'a Transaction<'a>,
}

impl CatalogWriter for SqliteWriter<'_> {
    fn create_artist(&mut self, mut artist: Artist) -> Result<Artist, ScanError> {
        self.tx.execute(
            "INSERT INTO artists (name, cover_art, album_count, created) VALUES (?1, ?2, ?3, ?4)",
            params![artist.name, artist.cover_art, artist.album_count, artist.created],
        )?;
        artist.id = self.tx.last_insert_rowid();
        Ok(artist)
    }

    fn create_album(&mut self, mut album: Album) -> Result<Album, ScanError> {
        self.tx.execute(
            "INSERT INTO albums (artist_id, name, artist, cover_art, song_count, duration, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                album.artist_id,
                album.name,
                album.artist,
                album.cover_art,
                album.song_count,
                album.duration_ms as i64,
                album.created,
            ],
        )?;
        album.id = self.tx.last_insert_rowid();
        Ok(album)
    }

    fn create_song(&mut self, mut song: Song) -> Result<Song, ScanError> {
        // stored as scanned; the path re-identifies the song
        let path_str = song.path.to_string_lossy().to_string();
        self.tx.execute(
            "INSERT INTO songs
             (album_id, title, album, artist, cover_art, duration, bit_rate, size, suffix,
              content_type, is_dir, is_video, path, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                song.album_id,
                song.title,
                song.album,
                song.artist,
                song.cover_art,
                song.duration_ms,
                song.bit_rate,
                song.size as i64,
                song.suffix,
                song.content_type,
                song.is_dir,
                song.is_video,
                path_str,
                song.created,
            ],
        )?;
        song.id = self.tx.last_insert_rowid();
        Ok(song)
    }

    fn create_cover(&mut self, cover: Cover) -> Result<Cover, ScanError> {
        self.tx.execute(
            "INSERT OR IGNORE INTO covers (cover_id, path) VALUES (?1, ?2)",
            params![cover.id, cover.path.to_string_lossy().to_string()],
        )?;
        Ok(cover)
    }
}

/// In-memory catalog with the same batch semantics as [`SqliteCatalog`]
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub songs: Vec<Song>,
    pub covers: Vec<Cover>,
    /// Artist name whose creation is refused, to exercise failed exports
    fail_artist: Option<String>,
    next_id: i64,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog that refuses to store the artist named `name`
    pub fn failing_on(name: impl Into<String>) -> Self {
        Self {
            fail_artist: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn counts(&self) -> CatalogCounts {
        CatalogCounts {
            artists: self.artists.len() as u64,
            albums: self.albums.len() as u64,
            songs: self.songs.len() as u64,
            covers: self.covers.len() as u64,
        }
    }
}

impl CatalogStore for MemoryCatalog {
    fn write_batch(
        &mut self,
        batch: &mut dyn FnMut(&mut dyn CatalogWriter) -> Result<(), ScanError>,
    ) -> Result<(), ScanError> {
        let mut staged = MemoryBatch {
            next_id: self.next_id,
            fail_artist: self.fail_artist.as_deref(),
            known_covers: self.covers.iter().map(|c| c.id.clone()).collect(),
            artists: Vec::new(),
            albums: Vec::new(),
            songs: Vec::new(),
            covers: Vec::new(),
        };
        batch(&mut staged)?;

        self.next_id = staged.next_id;
        self.artists.append(&mut staged.artists);
        self.albums.append(&mut staged.albums);
        self.songs.append(&mut staged.songs);
        self.covers.append(&mut staged.covers);
        Ok(())
    }
}

/// Writes staged by one in-memory batch
struct MemoryBatch<'a> {
    next_id: i64,
    fail_artist: Option<&'a str>,
    known_covers: HashSet<String>,
    artists: Vec<Artist>,
    albums: Vec<Album>,
    songs: Vec<Song>,
    covers: Vec<Cover>,
}

impl MemoryBatch<'_> {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl CatalogWriter for MemoryBatch<'_> {
    fn create_artist(&mut self, mut artist: Artist) -> Result<Artist, ScanError> {
        if self.fail_artist == Some(artist.name.as_str()) {
            return Err(ScanError::persistence(format!(
                "refusing to store artist {}",
                artist.name
            )));
        }
        artist.id = self.assign_id();
        self.artists.push(artist.clone());
        Ok(artist)
    }

    fn create_album(&mut self, mut album: Album) -> Result<Album, ScanError> {
        album.id = self.assign_id();
        self.albums.push(album.clone());
        Ok(album)
    }

    fn create_song(&mut self, mut song: Song) -> Result<Song, ScanError> {
        song.id = self.assign_id();
        self.songs.push(song.clone());
        Ok(song)
    }

    fn create_cover(&mut self, cover: Cover) -> Result<Cover, ScanError> {
        if self.known_covers.insert(cover.id.clone()) {
            self.covers.push(cover.clone());
        }
        Ok(cover)
    }
}
