//! Scan orchestration: authorization, single-flight scans and live status
//!
//! A started scan runs on two named threads. `scan-walker` walks the music
//! folders and exports each artist; `scan-monitor` drains the progress
//! channel into the shared status and flips the scanning flag back once the
//! walker is done. Callers only ever see consistent [`ScanStatus`] snapshots.

use crossbeam_channel::select;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::auth::{AdminOnly, Authorizer, Principal, ScanAction};
use crate::config::ScanConfig;
use crate::db::CatalogStore;
use crate::error::ScanError;
use crate::extractor::MetadataExtractor;
use crate::models::{ScanStatus, WalkSummary};
use crate::progress::{self, ProgressDelta};
use crate::walker::TreeWalker;

/// State shared between the orchestrator and its background threads
struct Shared<S> {
    config: ScanConfig,
    extractor: Arc<dyn MetadataExtractor>,
    catalog: Arc<Mutex<S>>,
    status: Mutex<ScanStatus>,
}

/// Entry point for starting scans and reading their status
pub struct ScanOrchestrator<S: CatalogStore + 'static> {
    shared: Arc<Shared<S>>,
    authorizer: Box<dyn Authorizer>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl<S: CatalogStore + 'static> ScanOrchestrator<S> {
    /// Create an orchestrator that only lets administrators scan
    pub fn new(config: ScanConfig, extractor: Arc<dyn MetadataExtractor>, catalog: S) -> Self {
        Self::with_authorizer(config, extractor, catalog, Box::new(AdminOnly))
    }

    pub fn with_authorizer(
        config: ScanConfig,
        extractor: Arc<dyn MetadataExtractor>,
        catalog: S,
        authorizer: Box<dyn Authorizer>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                extractor,
                catalog: Arc::new(Mutex::new(catalog)),
                status: Mutex::new(ScanStatus::default()),
            }),
            authorizer,
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.shared.config
    }

    /// The catalog scans export into
    pub fn catalog(&self) -> &Arc<Mutex<S>> {
        &self.shared.catalog
    }

    /// Start a scan unless one is already running.
    ///
    /// Returns the status right after the call: a fresh `{scanning: true,
    /// count: 0}` when a walk was launched, or the running scan's current
    /// status otherwise. With no music folders configured nothing is launched
    /// and the idle status is returned.
    pub fn start_scan(&self, principal: &Principal) -> Result<ScanStatus, ScanError> {
        self.authorize(principal, ScanAction::StartScan)?;

        let mut status = self.shared.status.lock();
        if status.scanning {
            log::debug!("Scan already running, requested by {}", principal.username);
            return Ok(*status);
        }
        if self.shared.config.music_folders.is_empty() {
            log::error!(
                "{}",
                ScanError::configuration("no music folders configured, nothing to scan")
            );
            return Ok(*status);
        }

        let previous = *status;
        *status = ScanStatus {
            scanning: true,
            ..Default::default()
        };

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("scan-monitor".to_string())
            .spawn(move || shared.monitor());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                *status = previous;
                return Err(ScanError::io_error(
                    None,
                    format!("failed to spawn scan monitor: {e}"),
                ));
            }
        };

        log::info!(
            "Scan started by {} over {} music folder(s)",
            principal.username,
            self.shared.config.music_folders.len()
        );
        *self.monitor.lock() = Some(handle);
        Ok(*status)
    }

    /// Snapshot of the current or most recent scan
    pub fn get_scan_status(&self, principal: &Principal) -> Result<ScanStatus, ScanError> {
        self.authorize(principal, ScanAction::ReadScanStatus)?;
        Ok(*self.shared.status.lock())
    }

    /// Block until the most recently started scan has finished
    pub fn wait_until_idle(&self) {
        let handle = self.monitor.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Scan monitor thread panicked");
                self.shared.status.lock().scanning = false;
            }
        }
    }

    fn authorize(&self, principal: &Principal, action: ScanAction) -> Result<(), ScanError> {
        if self.authorizer.is_allowed(principal, action) {
            return Ok(());
        }
        log::warn!("Denied {} to {}", action.as_str(), principal.username);
        Err(ScanError::not_authorized(&principal.username, action.as_str()))
    }
}

impl<S: CatalogStore + 'static> Shared<S> {
    /// Body of the `scan-monitor` thread
    fn monitor(self: Arc<Self>) {
        let (reporter, progress_rx) =
            progress::channel(self.config.effective_progress_capacity());
        let (done_tx, done_rx) = crossbeam_channel::bounded::<WalkSummary>(1);

        let shared = Arc::clone(&self);
        let spawned = thread::Builder::new()
            .name("scan-walker".to_string())
            .spawn(move || {
                let walker = TreeWalker::new(
                    &shared.config,
                    shared.extractor.as_ref(),
                    shared.catalog.as_ref(),
                    reporter,
                );
                let summary = walker.walk();
                drop(walker);
                let _ = done_tx.send(summary);
            });
        let walker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to spawn scan walker: {}", e);
                self.finish(None);
                return;
            }
        };

        let summary = loop {
            select! {
                recv(progress_rx) -> msg => match msg {
                    Ok(delta) => self.apply(delta),
                    // reporter dropped, the summary follows unless the walker died
                    Err(_) => break done_rx.recv().ok(),
                },
                recv(done_rx) -> msg => break msg.ok(),
            }
        };
        for delta in progress_rx.try_iter() {
            self.apply(delta);
        }

        if walker.join().is_err() {
            log::error!("Scan walker thread panicked");
        }
        self.finish(summary);
    }

    fn apply(&self, delta: ProgressDelta) {
        delta.apply_to(&mut self.status.lock());
    }

    fn finish(&self, summary: Option<WalkSummary>) {
        let status = {
            let mut status = self.status.lock();
            status.scanning = false;
            *status
        };

        match summary {
            Some(summary) => {
                log::info!(
                    "Scan finished in {}ms: {} items ({} artists, {} albums, {} songs)",
                    summary.duration_ms,
                    status.count,
                    summary.artists,
                    summary.albums,
                    summary.songs
                );
                if !summary.is_clean() {
                    log::warn!(
                        "Scan skipped {} files and {} directories, {} artists failed to export",
                        summary.skipped_files,
                        summary.skipped_dirs,
                        summary.failed_exports
                    );
                }
            }
            None => log::error!("Scan aborted after {} items", status.count),
        }
    }
}
