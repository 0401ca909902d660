//! Error types for the music scanner

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while scanning a music library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// The requesting principal lacks the administrative capability
    NotAuthorized,
    /// The scanner configuration is unusable (e.g. no music folders)
    Configuration,
    /// A directory listing failed mid-walk
    DirectoryRead,
    /// Metadata for a single file could not be obtained or parsed
    Extraction,
    /// Writing an artist subtree to the catalog failed
    Persistence,
    /// I/O error outside of a directory listing
    IoError,
}

impl ScanErrorKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanErrorKind::NotAuthorized => "not_authorized",
            ScanErrorKind::Configuration => "configuration",
            ScanErrorKind::DirectoryRead => "directory_read",
            ScanErrorKind::Extraction => "extraction",
            ScanErrorKind::Persistence => "persistence",
            ScanErrorKind::IoError => "io",
        }
    }
}

/// Represents an error that occurred during scanning
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not-authorized error naming the user and the refused action
    pub fn not_authorized(username: &str, action: &str) -> Self {
        Self::new(
            ScanErrorKind::NotAuthorized,
            None,
            format!("user {username} is not authorized to perform action: {action}"),
        )
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Configuration, None, message)
    }

    /// Create a directory listing error
    pub fn directory_read(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::DirectoryRead, Some(path), message)
    }

    /// Create a metadata extraction error
    pub fn extraction(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Extraction, Some(path), message)
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Persistence, None, message)
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Attach a path to an error that does not carry one yet
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }

    pub fn is_not_authorized(&self) -> bool {
        self.kind == ScanErrorKind::NotAuthorized
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(None, err.to_string())
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        Self::new(ScanErrorKind::DirectoryRead, path, err.to_string())
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        Self::configuration(err.to_string())
    }
}
