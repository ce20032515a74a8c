use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use env_logger::{Builder, Env};
use log::{error, info};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;

use waste_gauge::error::CalibrationError;
use waste_gauge::features::decode;
use waste_gauge::ingest;
use waste_gauge::state::ThresholdLog;
use waste_gauge::{Classifier, ClassifierConfig, ClassifierError, ImageMeta, Library};

#[derive(Subcommand)]
enum Commands {
    /// Classify image files as full or empty and store the results
    Classify {
        /// Image files to classify
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Note attached to every stored record
        #[arg(long)]
        annotation: Option<String>,

        /// Where the containers were photographed
        #[arg(long)]
        location: Option<String>,

        /// Score only: do not append to the history or recalibrate
        #[arg(long)]
        no_store: bool,
    },

    /// Classify every image below a folder, then recalibrate once
    Ingest {
        folder: PathBuf,

        #[arg(long)]
        location: Option<String>,
    },

    /// Re-fit the thresholds to the stored history now
    Calibrate,

    /// Restore the default thresholds
    Reset,

    /// Show the thresholds in use
    Thresholds,

    /// Show the threshold log, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the default configuration as JSON
    DefaultConfig,
}

#[derive(Parser)]
#[command(name = "waste-gauge")]
#[command(about = "Explainable full/empty classifier for waste container photos")]
struct Cli {
    /// Catalog database (defaults to the user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Commands,
}

/// RUST_LOG applies only when no -v/-q was passed
fn honor_rust_log(verbosity: &Verbosity<WarnLevel>, rust_log: Option<&OsStr>) -> bool {
    !verbosity.is_present() && rust_log.is_some()
}

fn init_logging(verbosity: &Verbosity<WarnLevel>) {
    let mut logger = if honor_rust_log(verbosity, std::env::var_os("RUST_LOG").as_deref()) {
        Builder::from_env(Env::default())
    } else {
        // -q -> ERROR, default -> WARN, -v -> INFO, -vv -> DEBUG
        let mut b = Builder::new();
        b.filter_level(verbosity.log_level_filter());
        b
    };
    logger.init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.verbosity);

    if let Err(e) = run(cli).await {
        error!("❌ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ClassifierConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClassifierConfig::default(),
    };

    let db = cli.db.clone();
    let open = move || -> Result<Classifier<Library>> {
        let library = match &db {
            Some(path) => Library::open(path),
            None => Library::open_default(),
        }
        .context("opening catalog")?;
        Ok(Classifier::new(Arc::new(library), config))
    };

    match cli.command {
        Commands::Classify {
            files,
            annotation,
            location,
            no_store,
        } => {
            let classifier = open()?;
            let mut failures = 0;
            for path in files {
                let filename = path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                let meta = ImageMeta {
                    filename,
                    annotation: annotation.clone(),
                    location: location.clone(),
                };

                let outcome = match decode::read_image_bytes(&path).await {
                    Ok(bytes) if no_store => classifier.score_deferred(bytes, meta).await,
                    Ok(bytes) => classifier.classify_deferred(bytes, meta).await,
                    Err(e) => Err(e.into()),
                };
                match outcome {
                    Ok(result) => print_json(&result)?,
                    Err(e) => {
                        error!("❌ {}: {e}", path.display());
                        failures += 1;
                    }
                }
            }

            // The process exits right after, so calibrate in the foreground
            if classifier.config().auto_calibrate && !no_store {
                if let Some(handle) = classifier.schedule_calibration() {
                    handle.await.context("calibration task")?;
                }
            }

            if failures > 0 {
                anyhow::bail!("{failures} file(s) could not be classified");
            }
        }
        Commands::Ingest { folder, location } => {
            let classifier = open()?;
            let report = ingest::ingest_folder(&classifier, &folder, location).await;
            print_json(&report)?;
        }
        Commands::Calibrate => {
            let classifier = open()?;
            let this = classifier.clone();
            match tokio::task::spawn_blocking(move || this.calibrate_now()).await? {
                Ok(outcome) => print_json(&outcome)?,
                Err(ClassifierError::Calibration(CalibrationError::EmptyHistory)) => {
                    info!("Nothing to calibrate: history is empty");
                    print_json(&classifier.current_thresholds())?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Reset => {
            let classifier = open()?;
            let thresholds = classifier.reset()?;
            print_json(&thresholds)?;
        }
        Commands::Thresholds => {
            let classifier = open()?;
            print_json(&classifier.current_thresholds())?;
        }
        Commands::History { limit } => {
            let classifier = open()?;
            for entry in classifier.store().threshold_entries(limit)? {
                print_json(&entry)?;
            }
        }
        Commands::DefaultConfig => {
            println!("{}", ClassifierConfig::default().to_json()?);
        }
    }

    Ok(())
}
