//! Configuration for the music scanner

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ScanError;

/// Default timeout for a single probe invocation (seconds)
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Default capacity of the bounded progress channel
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// Default probing executable, resolved through `PATH`
pub const DEFAULT_FFPROBE: &str = "ffprobe";

/// Environment variable naming the directory that holds the config file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// File name looked up inside `CONFIG_PATH`
pub const CONFIG_FILE_NAME: &str = "music_scanner.json";

/// Configuration for the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Top-level music folders; each direct subdirectory is an artist
    pub music_folders: Vec<PathBuf>,

    /// Directory names never treated as artists or albums
    pub ignore_dirs: HashSet<String>,

    /// Cover file names, probed in order
    pub cover_names: Vec<String>,

    /// Path to the ffprobe executable
    pub ffprobe_path: PathBuf,

    /// Upper bound for one probe invocation, in seconds
    pub probe_timeout_secs: u64,

    /// Number of threads extracting metadata within one album
    /// 0 means auto-detect (available CPU cores)
    pub num_threads: usize,

    /// Capacity of the bounded progress channel
    pub progress_capacity: usize,

    /// SQLite catalog file
    pub db_path: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            music_folders: Vec::new(),
            ignore_dirs: Self::default_ignore_dirs(),
            cover_names: Self::default_cover_names(),
            ffprobe_path: PathBuf::from(DEFAULT_FFPROBE),
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            num_threads: 0,
            progress_capacity: DEFAULT_PROGRESS_CAPACITY,
            db_path: None,
        }
    }
}

impl ScanConfig {
    /// Create a new config with the given music folders
    pub fn new(music_folders: Vec<PathBuf>) -> Self {
        Self {
            music_folders,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Load a config from a JSON file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScanError::configuration(e.to_string()).with_path(path))?;
        let config: ScanConfig =
            serde_json::from_str(&raw).map_err(|e| ScanError::from(e).with_path(path))?;
        Ok(config)
    }

    /// Resolve the config file named by `CONFIG_PATH`, if the variable is set
    pub fn env_config_file() -> Option<PathBuf> {
        std::env::var_os(CONFIG_PATH_ENV).map(|dir| PathBuf::from(dir).join(CONFIG_FILE_NAME))
    }

    /// Get the default cover file candidates
    pub fn default_cover_names() -> Vec<String> {
        ["cover.jpg", "cover.jpeg", "cover.png"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        [
            "$RECYCLE.BIN",
            "System Volume Information",
            "@eaDir",
            "lost+found",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Check if a directory should be ignored
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        // Ignore hidden directories (starting with .)
        if name.starts_with('.') {
            return true;
        }
        self.ignore_dirs.contains(name)
    }

    /// Check whether a file name is one of the cover candidates
    pub fn is_cover_name(&self, name: &str) -> bool {
        self.cover_names
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    /// Get the effective number of extraction threads
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_threads
        }
    }

    /// Get the probe timeout as a `Duration`
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    /// Get the effective progress channel capacity (never zero)
    pub fn effective_progress_capacity(&self) -> usize {
        self.progress_capacity.max(1)
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the music folders
    pub fn music_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.config.music_folders = folders;
        self
    }

    /// Add a music folder
    pub fn add_music_folder(mut self, folder: PathBuf) -> Self {
        self.config.music_folders.push(folder);
        self
    }

    /// Set the directories to ignore
    pub fn ignore_dirs(mut self, dirs: HashSet<String>) -> Self {
        self.config.ignore_dirs = dirs;
        self
    }

    /// Add a directory to ignore
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.ignore_dirs.insert(dir.into());
        self
    }

    /// Set the cover file candidates
    pub fn cover_names(mut self, names: Vec<String>) -> Self {
        self.config.cover_names = names;
        self
    }

    /// Set the ffprobe executable
    pub fn ffprobe_path(mut self, path: PathBuf) -> Self {
        self.config.ffprobe_path = path;
        self
    }

    /// Set the probe timeout in seconds
    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    /// Set the number of extraction threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the progress channel capacity
    pub fn progress_capacity(mut self, capacity: usize) -> Self {
        self.config.progress_capacity = capacity;
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = Some(path);
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}
