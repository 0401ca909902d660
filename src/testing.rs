//! Test fixtures: a probe-free extractor and helpers for building library trees

use crossbeam_channel::Receiver;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ScanError;
use crate::extractor::{parse_probe_output, MetadataExtractor};
use crate::models::Metadata;

/// Reads each song file as if it were ffprobe's JSON output for that file.
///
/// With a gate attached, every extraction first waits for a message on the
/// gate (or for its sender to be dropped), which keeps a scan in progress
/// for as long as a test needs. With `removing` set, every extraction
/// deletes that directory first, so a later listing of it fails mid-walk.
#[derive(Debug, Default)]
pub(crate) struct FakeExtractor {
    gate: Option<Receiver<()>>,
    removing: Option<PathBuf>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated(gate: Receiver<()>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub(crate) fn removing(dir: PathBuf) -> Self {
        Self {
            removing: Some(dir),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetadataExtractor for FakeExtractor {
    fn extract(&self, path: &Path) -> Result<Metadata, ScanError> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if let Some(dir) = &self.removing {
            let _ = fs::remove_dir_all(dir);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = fs::read(path)
            .map_err(|e| ScanError::extraction(path.to_path_buf(), e.to_string()))?;
        parse_probe_output(path, &bytes)
    }
}

/// ffprobe-shaped JSON for a song
pub(crate) fn probe_json(duration: &str, format_name: &str) -> String {
    format!(
        r#"{{"format": {{"format_name": "{format_name}", "duration": "{duration}", "bit_rate": "320000", "size": "4096"}}}}"#
    )
}

/// Write a song file that [`FakeExtractor`] resolves to the given metadata
pub(crate) fn write_song(dir: &Path, name: &str, duration: &str, format_name: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), probe_json(duration, format_name)).unwrap();
}

/// Write a placeholder cover image
pub(crate) fn write_cover(dir: &Path, name: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), b"\xff\xd8\xff\xe0").unwrap();
}
