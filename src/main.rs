//! Music Scanner CLI
//!
//! Scans music folders into a SQLite catalog.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use music_scanner::{
    FfprobeExtractor, Principal, ScanConfig, ScanError, ScanOrchestrator, ScanStatus,
    SqliteCatalog,
};

const ABOUT: &str = r#"
Music Scanner - scans artist/album/song folders into a SQLite catalog

Examples:
  music_scanner scan -f /music                     scan one music folder
  music_scanner scan -f /music -f /mnt/archive     scan several folders
  music_scanner scan -c music_scanner.json         read settings from a file
  music_scanner scan -f /music -d library.db       choose the catalog file
  music_scanner scan -f /music --json              print the final status as JSON

The CONFIG_PATH environment variable names a settings file as well;
command-line flags override both.
"#;

const DEFAULT_DB: &str = "music_scanner.db";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Music library scanner
#[derive(Parser)]
#[command(name = "music_scanner")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan music folders into the catalog
    Scan {
        /// Music folder to scan (repeatable)
        #[arg(short = 'f', long = "folder")]
        folders: Vec<PathBuf>,

        /// JSON settings file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// SQLite catalog file
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// ffprobe executable
        #[arg(long)]
        ffprobe: Option<PathBuf>,

        /// Probe threads per album, 0 means auto-detect
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Print the final status as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Scan {
            folders,
            config,
            db,
            ffprobe,
            threads,
            json,
        }) => {
            let config = match load_config(config, folders, db, ffprobe, threads) {
                Ok(config) => config,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            match run_scan(config) {
                Ok(status) => {
                    print_status(&status, json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            println!("{}", ABOUT);
            println!("Run 'music_scanner scan --help' for scan options");
            ExitCode::SUCCESS
        }
    }
}

/// Settings file (explicit flag, then `CONFIG_PATH`), then flag overrides
fn load_config(
    file: Option<PathBuf>,
    folders: Vec<PathBuf>,
    db: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    threads: Option<usize>,
) -> Result<ScanConfig, ScanError> {
    let mut config = match file.or_else(ScanConfig::env_config_file) {
        Some(path) => {
            info!("Loading settings from {:?}", path);
            ScanConfig::from_file(&path)?
        }
        None => ScanConfig::default(),
    };

    if !folders.is_empty() {
        config.music_folders = folders;
    }
    if let Some(db) = db {
        config.db_path = Some(db);
    }
    if let Some(ffprobe) = ffprobe {
        config.ffprobe_path = ffprobe;
    }
    if let Some(threads) = threads {
        config.num_threads = threads;
    }
    Ok(config)
}

fn run_scan(config: ScanConfig) -> Result<ScanStatus, ScanError> {
    let db_path = config
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
    info!("Music folders: {:?}", config.music_folders);
    info!("Catalog: {:?}", db_path);

    let catalog = SqliteCatalog::open(&db_path)?;
    let extractor = FfprobeExtractor::from_config(&config);
    if !extractor.is_available() {
        warn!(
            "{:?} could not be run, every song will be skipped",
            config.ffprobe_path
        );
    }

    let orchestrator = ScanOrchestrator::new(config, Arc::new(extractor), catalog);
    let principal = Principal::admin("cli");

    let mut status = orchestrator.start_scan(&principal)?;
    while status.scanning {
        thread::sleep(POLL_INTERVAL);
        status = orchestrator.get_scan_status(&principal)?;
        info!("Scanned {} items so far", status.count);
    }
    orchestrator.wait_until_idle();
    orchestrator.get_scan_status(&principal)
}

fn print_status(status: &ScanStatus, json: bool) {
    if json {
        match serde_json::to_string_pretty(status) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to serialize status: {}", e),
        }
    } else {
        println!("Scan completed:");
        println!("  Items: {}", status.count);
        println!("  Skipped files: {}", status.skipped_files);
        println!("  Skipped dirs: {}", status.skipped_dirs);
        println!("  Failed exports: {}", status.failed_exports);
    }
}
