//! Metadata extraction via an external probing process (ffprobe)

use crossbeam_channel::RecvTimeoutError;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::models::Metadata;

/// Obtains technical metadata for a single audio file
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Metadata, ScanError>;
}

/// `-show_format` output; ffprobe reports numbers as strings
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

/// Parse ffprobe's JSON output for `path` into `Metadata`
pub fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<Metadata, ScanError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout).map_err(|e| {
        ScanError::extraction(path.to_path_buf(), format!("unparseable probe output: {e}"))
    })?;
    let format = probe
        .format
        .ok_or_else(|| ScanError::extraction(path.to_path_buf(), "probe output has no format"))?;

    let duration_secs: f64 = required_field(path, "duration", format.duration.as_deref())?;
    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(ScanError::extraction(
            path.to_path_buf(),
            format!("invalid duration {duration_secs}"),
        ));
    }
    let bit_rate: u64 = required_field(path, "bit_rate", format.bit_rate.as_deref())?;
    let size: u64 = required_field(path, "size", format.size.as_deref())?;

    Ok(Metadata {
        duration_ms: duration_millis(duration_secs),
        bit_rate: (bit_rate / 1000).min(u32::MAX as u64) as u32,
        size,
        format_name: format.format_name.unwrap_or_default(),
    })
}

/// Round fractional seconds to whole milliseconds
pub fn duration_millis(secs: f64) -> u32 {
    (secs * 1000.0).round().min(u32::MAX as f64) as u32
}

fn required_field<T: std::str::FromStr>(
    path: &Path,
    name: &str,
    value: Option<&str>,
) -> Result<T, ScanError> {
    let raw = value.ok_or_else(|| {
        ScanError::extraction(path.to_path_buf(), format!("probe output has no {name}"))
    })?;
    raw.trim().parse().map_err(|_| {
        ScanError::extraction(path.to_path_buf(), format!("{name} {raw:?} is not numeric"))
    })
}

/// Runs `ffprobe` once per file, bounded by a timeout
#[derive(Debug, Clone)]
pub struct FfprobeExtractor {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeExtractor {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.ffprobe_path.clone(), config.probe_timeout())
    }

    /// Check if ffprobe can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run(&self, path: &Path) -> Result<Vec<u8>, ScanError> {
        let mut child = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-hide_banner"])
            .args(["-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ScanError::extraction(
                    path.to_path_buf(),
                    format!("failed to execute {:?}: {e}", self.ffprobe_path),
                )
            })?;

        // stderr drains on its own thread while stdout is read
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut err = Vec::new();
                let _ = pipe.read_to_end(&mut err);
                err
            })
        });
        let stdout = child.stdout.take();
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let mut out = Vec::new();
            if let Some(mut pipe) = stdout {
                let _ = pipe.read_to_end(&mut out);
            }
            let err = stderr_reader
                .and_then(|reader| reader.join().ok())
                .unwrap_or_default();
            let _ = tx.send((out, err));
        });

        let (out, err) = match rx.recv_timeout(self.timeout) {
            Ok(output) => output,
            Err(RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScanError::extraction(
                    path.to_path_buf(),
                    format!("probe timed out after {}s", self.timeout.as_secs()),
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScanError::extraction(
                    path.to_path_buf(),
                    "probe output reader stopped unexpectedly",
                ));
            }
        };

        let status = child
            .wait()
            .map_err(|e| ScanError::extraction(path.to_path_buf(), e.to_string()))?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&err);
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ScanError::extraction(
                path.to_path_buf(),
                format!(
                    "probe exited with code {code}: {}",
                    if stderr.trim().is_empty() {
                        "no error output"
                    } else {
                        stderr.trim()
                    }
                ),
            ));
        }

        Ok(out)
    }
}

impl Default for FfprobeExtractor {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl MetadataExtractor for FfprobeExtractor {
    fn extract(&self, path: &Path) -> Result<Metadata, ScanError> {
        let stdout = self.run(path)?;
        parse_probe_output(path, &stdout)
    }
}
