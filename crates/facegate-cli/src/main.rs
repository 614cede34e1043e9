use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::access_log::AccessLog;
use facegate_core::enroll::{capture_crop, enroll, validate_name};
use facegate_core::gallery::{Added, GalleryStore};
use facegate_core::{Config, Pipeline};
use facegate_hw::{Camera, FrameSource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facegate", about = "facegate face access control CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the single face in an image file
    Enroll {
        /// Name to enroll under
        #[arg(short, long)]
        name: String,
        /// Photo containing exactly one face
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Grab one camera frame and enroll the largest face in it
    Capture {
        #[arg(short, long)]
        name: String,
        /// Also save the face crop to this file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
    /// Remove an enrolled face
    Remove {
        name: String,
    },
    /// List enrolled faces
    List {
        /// Sort names alphabetically instead of by enrollment order
        #[arg(long)]
        sorted: bool,
    },
    /// Show or clear the access log
    Logs {
        /// Delete the log
        #[arg(long)]
        clear: bool,
        /// Show only the newest N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(
        extractor = %config.extractor,
        gallery = %config.gallery_path.display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Enroll { name, image } => {
            let name = validate_name(&name)?.to_string();
            let photo = image::open(&image)
                .with_context(|| format!("cannot read {}", image.display()))?
                .to_luma8();
            let mut pipeline = Pipeline::build(&config).context("failed to load models")?;
            let mut store = GalleryStore::open(&config.gallery_path, config.extractor);
            let added = enroll(&mut pipeline, &mut store, &name, &photo)?;
            report_added(&name, added);
        }
        Commands::Capture { name, save } => {
            let name = validate_name(&name)?.to_string();
            let mut pipeline = Pipeline::build(&config).context("failed to load models")?;

            let mut camera = Camera::new(&config.camera_device, config.read_timeout);
            camera.open().context("camera unavailable")?;
            let frame = camera.read();
            camera.release();
            let frame = frame.context("failed to capture a frame")?;
            let image = frame
                .into_image()
                .context("camera returned a malformed frame")?;

            let Some(face) = capture_crop(&mut pipeline, &image) else {
                bail!("no face found in camera frame");
            };
            if let Some(path) = save {
                face.save(&path)
                    .with_context(|| format!("cannot write {}", path.display()))?;
                println!("Saved face crop to {}", path.display());
            }

            let mut store = GalleryStore::open(&config.gallery_path, config.extractor);
            let added = enroll(&mut pipeline, &mut store, &name, &face)?;
            report_added(&name, added);
        }
        Commands::Remove { name } => {
            let mut store = GalleryStore::open(&config.gallery_path, config.extractor);
            store.remove(name.trim())?;
            println!("Removed {}", name.trim());
        }
        Commands::List { sorted } => {
            let store = GalleryStore::open(&config.gallery_path, config.extractor);
            let mut names = store.names();
            if sorted {
                names.sort_by_key(|n| n.to_lowercase());
            }
            if names.is_empty() {
                println!("No faces enrolled");
            }
            for name in names {
                println!("{name}");
            }
        }
        Commands::Logs { clear, limit, json } => {
            let log = AccessLog::new(&config.log_path);
            if clear {
                log.clear()?;
                println!("Access log cleared");
                return Ok(());
            }

            let mut entries = log.list();
            if let Some(limit) = limit {
                let skip = entries.len().saturating_sub(limit);
                entries.drain(..skip);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("Access log is empty");
            }
            for entry in entries {
                let confidence = entry
                    .confidence
                    .map(|c| format!("{c:.3}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<9}  {:<24}  {confidence}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.status,
                    entry.name
                );
            }
        }
    }

    Ok(())
}

fn report_added(name: &str, added: Added) {
    match added {
        Added::Inserted => println!("Enrolled {name}"),
        Added::Replaced => println!("Re-enrolled {name} (previous face replaced)"),
    }
}
