//! Progress reporting for scan operations
//!
//! The walker pushes [`ProgressDelta`] values through a bounded channel as
//! it finishes each artist subtree. The orchestrator drains the channel and
//! folds every delta into the shared [`ScanStatus`] under one lock, so a
//! reader never observes a partially applied delta.

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::models::{ScanArtist, ScanStatus};

/// A bounded set of counter increments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressDelta {
    /// Artists, albums or song files discovered
    pub discovered: u64,
    /// Song files dropped after a failed extraction
    pub skipped_files: u64,
    /// Directories whose listing failed
    pub skipped_dirs: u64,
    /// Artist subtrees that failed to export
    pub failed_exports: u64,
}

impl ProgressDelta {
    pub fn discovered(n: u64) -> Self {
        Self {
            discovered: n,
            ..Default::default()
        }
    }

    pub fn skipped_dir() -> Self {
        Self {
            skipped_dirs: 1,
            ..Default::default()
        }
    }

    pub fn failed_export() -> Self {
        Self {
            failed_exports: 1,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold this delta into a status snapshot
    pub fn apply_to(&self, status: &mut ScanStatus) {
        status.count += self.discovered;
        status.skipped_files += self.skipped_files;
        status.skipped_dirs += self.skipped_dirs;
        status.failed_exports += self.failed_exports;
    }
}

/// Create a bounded progress channel
pub fn channel(capacity: usize) -> (ProgressReporter, Receiver<ProgressDelta>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (ProgressReporter { tx }, rx)
}

/// Sending half of the progress channel, owned by the walker
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Sender<ProgressDelta>,
}

impl ProgressReporter {
    /// Push one delta; blocks while the channel is full
    pub fn send(&self, delta: ProgressDelta) {
        if delta.is_empty() {
            return;
        }
        if self.tx.send(delta).is_err() {
            log::debug!("Progress receiver dropped, discarding {:?}", delta);
        }
    }

    /// Report a fully walked artist: the artist, its albums, then the song
    /// files of each album, followed by whatever the walk had to skip
    pub fn report_artist(&self, artist: &ScanArtist) {
        self.send(ProgressDelta::discovered(1));
        self.send(ProgressDelta::discovered(artist.albums.len() as u64));
        for album in &artist.albums {
            self.send(ProgressDelta::discovered(album.discovered_files()));
        }

        self.send(ProgressDelta {
            skipped_files: artist.skipped_files(),
            skipped_dirs: artist.skipped_dirs,
            ..Default::default()
        });
    }

    pub fn report_skipped_dir(&self) {
        self.send(ProgressDelta::skipped_dir());
    }

    pub fn report_failed_export(&self) {
        self.send(ProgressDelta::failed_export());
    }
}
