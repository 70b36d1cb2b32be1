#![deny(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use water_runtime::{app, watcher, Cli};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.resolve()?;

    let (_kernel_watcher, reload) = match (&config.shader_dir, config.watch) {
        (Some(dir), true) => match watcher::start(dir) {
            Ok((watcher_instance, rx)) => {
                tracing::info!("kernel watcher started successfully");
                (Some(watcher_instance), Some(rx))
            }
            Err(e) => {
                tracing::error!("failed to start kernel watcher: {e:?}");
                (None, None)
            }
        },
        (None, true) => {
            tracing::warn!("--watch needs --shader-dir; not watching");
            (None, None)
        }
        _ => (None, None),
    };

    if cli.headless {
        let report = app::run_headless(&config, cli.backend, reload.as_ref())?;
        tracing::info!(
            "simulated {} frames with {} passes",
            report.frames,
            report.swaps
        );
    } else {
        app::run_windowed(&config, reload)?;
    }
    Ok(())
}
