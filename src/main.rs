use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rust_photo_gallery::config::Configuration;
use rust_photo_gallery::events::{GalleryEntry, GalleryLoaded};
use rust_photo_gallery::gallery::layout::LayoutKind;
use rust_photo_gallery::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "photo-gallery",
    version,
    about = "3D photo gallery with inertial scrolling and pinch gestures"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Override the layout shown at startup (corridor, ring, spiral, heart)
    #[arg(long, value_name = "LAYOUT")]
    layout: Option<LayoutKind>,
    /// Print the resolved gallery entries without launching the UI
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        layout,
        dry_run,
    } = Args::parse();

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if let Some(layout) = layout {
        cfg.viewer.initial_layout = layout;
    }
    tracing::info!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let source = cfg.gallery_source.resolve()?;
    let entries = tasks::source::discover(source, cfg.page_size)
        .context("failed to resolve gallery source")?;

    if dry_run {
        print_entries(&entries);
        return Ok(());
    }

    // Loader -> Viewer; the loader delivers a single snapshot.
    let (loaded_tx, loaded_rx) = mpsc::channel::<GalleryLoaded>(1);

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cancel = cancel.clone();
        let max_in_flight = cfg.loader_max_concurrent_decodes;
        let max_texture_dim = cfg.max_texture_dim;
        async move {
            tasks::loader::run(entries, loaded_tx, cancel, max_in_flight, max_texture_dim)
                .await
                .context("loader task failed")
        }
    });

    // Run the windowed viewer on the main thread (blocking) after spawning other tasks
    // This call returns when the window closes or cancellation occurs
    if let Err(e) = tasks::viewer::run_windowed(loaded_rx, cancel.clone(), cfg)
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn print_entries(entries: &[GalleryEntry]) {
    println!("# gallery dry run\n# entries: {}\n", entries.len());
    if entries.is_empty() {
        println!("(no images found)");
        return;
    }
    for (idx, entry) in entries.iter().enumerate() {
        println!("  {:>4}: {} {}", idx + 1, entry.id, entry.path.display());
    }
}
