use anyhow::{Context, Result};
use facegate_core::access_log::AccessLog;
use facegate_core::enroll::enroll_shared;
use facegate_core::gallery::{read_gallery, write_gallery, GalleryStore, SharedGallery};
use facegate_core::matcher::Tolerance;
use facegate_core::{Config, Pipeline};
use facegate_hw::{Camera, FrameSource, ImageSequence};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::block_in_place;
use tracing_subscriber::EnvFilter;

mod console;
mod engine;

use console::Command;
use engine::{Session, SessionEvent, SessionSettings, StopReason};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = Config::from_env();
    tracing::info!(
        extractor = %config.extractor,
        tolerance = config.tolerance,
        gallery = %config.gallery_path.display(),
        log = %config.log_path.display(),
        "configuration loaded"
    );

    let gallery = GalleryStore::open(&config.gallery_path, config.extractor).shared();
    let log = AccessLog::new(&config.log_path);
    let tolerance = Arc::new(Tolerance::new(config.tolerance));

    // The session owns one pipeline while running; enrollment uses its own.
    let recognition = Pipeline::build(&config).context("failed to load recognition models")?;
    let mut enroller = Pipeline::build(&config).context("failed to load enrollment models")?;

    let source: Box<dyn FrameSource> = match &config.frames_dir {
        Some(dir) => Box::new(ImageSequence::new(dir)),
        None => Box::new(Camera::new(&config.camera_device, config.read_timeout)),
    };

    let (tx, mut events) = mpsc::unbounded_channel();
    let mut session = Session::new(
        recognition,
        source,
        gallery.clone(),
        log,
        tolerance,
        SessionSettings::from_config(&config),
        tx,
    );

    if let Err(e) = block_in_place(|| session.start()) {
        println!("{e}; type 'start' to retry");
    }

    tracing::info!("facegated ready");
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match console::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        run_command(command, &mut session, &mut enroller, &gallery)
                    }
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            Some(event) = events.recv() => print_event(&event),
        }
    }

    block_in_place(|| session.stop());
    tracing::info!("facegated shutting down");

    Ok(())
}

fn run_command(
    command: Command,
    session: &mut Session,
    enroller: &mut Pipeline,
    gallery: &SharedGallery,
) {
    match command {
        Command::Start => match block_in_place(|| session.start()) {
            Ok(()) => println!("session running"),
            Err(e) => println!("{e}"),
        },
        Command::Stop => {
            block_in_place(|| session.stop());
            println!("session stopped");
        }
        Command::Status => {
            println!(
                "session {:?}, tolerance {:.3}, {} enrolled",
                session.state(),
                session.tolerance().get(),
                read_gallery(gallery).len()
            );
            if let Some(frame) = session.latest_frame() {
                let (width, height) = frame.image.dimensions();
                let names: Vec<&str> = frame.faces.iter().map(|f| f.result.name.as_str()).collect();
                println!(
                    "last frame #{} ({width}x{height}): {} face(s) {names:?}",
                    frame.sequence,
                    frame.faces.len()
                );
            }
        }
        Command::Tolerance(None) => println!("tolerance {:.3}", session.tolerance().get()),
        Command::Tolerance(Some(value)) => {
            session.tolerance().set(value);
            tracing::info!(tolerance = value, "tolerance changed");
            println!("tolerance {value:.3}");
        }
        Command::Enroll { name, image } => {
            let photo = match image::open(&image) {
                Ok(photo) => photo.to_luma8(),
                Err(e) => {
                    println!("cannot read {}: {e}", image.display());
                    return;
                }
            };
            let outcome = block_in_place(|| enroll_shared(enroller, gallery, &name, &photo));
            match outcome {
                Ok(_) => println!("enrolled {}", name.trim()),
                Err(e) => println!("enrollment failed: {e}"),
            }
        }
        Command::Remove(name) => match write_gallery(gallery).remove(&name) {
            Ok(()) => println!("removed {name}"),
            Err(e) => println!("{e}"),
        },
        Command::List => {
            let names = read_gallery(gallery).names();
            if names.is_empty() {
                println!("no faces enrolled");
            }
            for name in names {
                println!("  {name}");
            }
        }
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {}
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Access(entry) => {
            let confidence = entry
                .confidence
                .map(|c| format!(" ({c:.2})"))
                .unwrap_or_default();
            println!(
                "[{}] {} {}{confidence}",
                entry.timestamp.format("%H:%M:%S"),
                entry.status,
                entry.name
            );
        }
        SessionEvent::Frame { sequence, faces } => {
            tracing::trace!(sequence, faces = faces.len(), "frame processed");
        }
        SessionEvent::Stopped(StopReason::SourceFailed(reason)) => {
            println!("session stopped: {reason}; type 'start' to retry");
        }
        SessionEvent::Stopped(StopReason::Panicked(message)) => {
            println!("session stopped after an internal error: {message}; type 'start' to retry");
        }
        SessionEvent::Stopped(StopReason::Requested) => {}
    }
}
