//! card-scanner - Identify trading cards from photos
//!
//! Recognizes a card's name and printing from an image, a known name, or a
//! folder of images.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use card_scanner::catalog::{CardCatalog, MemoryCatalog, ScryfallCatalog};
use card_scanner::config::{self, AppConfig};
use card_scanner::vision::{SourceImage, TesseractRecognizer};
use card_scanner::{CardRecognizer, RecognitionResult};

/// Image extensions picked up in batch mode
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// card-scanner - Trading card recognition
#[derive(Parser, Debug)]
#[command(name = "card-scanner")]
#[command(about = "Identify a trading card's name and exact printing from a photo")]
struct Args {
    /// Photo of a single card
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Card name (skips title reading)
    #[arg(short, long)]
    name: Option<String>,

    /// Folder of card photos to recognize in parallel
    #[arg(short, long)]
    batch: Option<PathBuf>,

    /// List every printing of --name and exit
    #[arg(long)]
    all_versions: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Disable text recognition
    #[arg(long)]
    no_ocr: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Offline catalog JSON file instead of the online catalog
    #[arg(long)]
    catalog_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_or_default_config(args.config.as_deref())?;
    if args.no_ocr {
        config.ocr.enabled = false;
    }

    let catalog: Arc<dyn CardCatalog> = match &args.catalog_file {
        Some(path) => Arc::new(
            MemoryCatalog::from_json_file(path)
                .with_context(|| format!("Failed to load catalog file {:?}", path))?,
        ),
        None => Arc::new(ScryfallCatalog::new(&config.catalog).context("Failed to create catalog client")?),
    };
    let backend = Arc::new(TesseractRecognizer::new(config.ocr.language.clone()));
    let recognizer = CardRecognizer::new(config, catalog, backend);

    if !recognizer.ocr_available() {
        warn!("Text recognition unavailable; a card name must be supplied with --name");
    }

    if args.all_versions {
        let Some(name) = &args.name else {
            bail!("--all-versions requires --name");
        };
        return list_versions(&recognizer, name, args.json);
    }

    if let Some(folder) = &args.batch {
        return run_batch(&recognizer, folder, args.json);
    }

    if args.image.is_none() && args.name.is_none() {
        bail!("Nothing to recognize: pass --image, --name or --batch");
    }

    let image = match &args.image {
        Some(path) => Some(SourceImage::from_path(path)?),
        None => None,
    };
    let result = recognizer.recognize(image.as_ref(), args.name.as_deref());
    print_result(&result, args.json)?;

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Load configuration from the given path, the default location, or defaults
fn load_or_default_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(default_path) = config::default_config_path() {
        if default_path.exists() {
            match config::load_config(&default_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", default_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable config {:?}: {:#}", default_path, e),
            }
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn print_result(result: &RecognitionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", result.summary());
    }
    Ok(())
}

fn list_versions(recognizer: &CardRecognizer, name: &str, json: bool) -> Result<()> {
    let prints = recognizer
        .all_printings(name)
        .with_context(|| format!("Failed to list printings of '{}'", name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prints)?);
        return Ok(());
    }

    println!("{} printings:", prints.len());
    for printing in &prints {
        println!(
            "  {}  {} - {}",
            printing.released_at.as_deref().unwrap_or("----------"),
            printing.label(),
            printing.set_name.as_deref().unwrap_or("?")
        );
    }
    Ok(())
}

/// Collect image files in a folder, sorted by path
fn image_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read folder {:?}", folder))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn run_batch(recognizer: &CardRecognizer, folder: &Path, json: bool) -> Result<()> {
    let files = image_files(folder)?;
    if files.is_empty() {
        bail!("No images found in {:?}", folder);
    }

    let mut paths = Vec::with_capacity(files.len());
    let mut images = Vec::with_capacity(files.len());
    for path in files {
        match SourceImage::from_path(&path) {
            Ok(image) => {
                paths.push(path);
                images.push(image);
            }
            Err(e) => warn!("Skipping {:?}: {:#}", path, e),
        }
    }

    let results = recognizer.recognize_batch(&images);
    let recognized = results.iter().filter(|r| r.is_success()).count();

    if json {
        let entries: Vec<serde_json::Value> = paths
            .iter()
            .zip(&results)
            .map(|(path, result)| serde_json::json!({ "file": path, "result": result }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (path, result) in paths.iter().zip(&results) {
            println!("== {}", path.display());
            print!("{}", result.summary());
        }
        println!("{}/{} cards recognized", recognized, results.len());
    }
    Ok(())
}
