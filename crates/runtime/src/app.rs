//! Headless and windowed entry points.

use std::{path::PathBuf, sync::mpsc::Receiver};

use anyhow::{Context as _, Result};
use water_gpu::{CommandLog, Context, RecordingDevice, ShaderLibrary, Viewport};
use water_render::{full_library, Scene};

use crate::config::{Backend, RuntimeConfig};

pub const HEADLESS_SIZE: (u32, u32) = (800, 600);
const PROGRESS_INTERVAL: u64 = 50;

/// Every kernel, with the configured override directory applied.
#[must_use]
pub fn library(config: &RuntimeConfig) -> ShaderLibrary {
    let mut library = full_library();
    library.set_override_dir(config.shader_dir.clone());
    library
}

/// What a headless run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlessReport {
    pub frames: u64,
    /// Simulation passes, each of which swapped the state textures.
    pub swaps: u64,
    /// Draws issued, when the backend records them.
    pub draws: Option<usize>,
    /// Droplets still falling when the run ended.
    pub droplets: usize,
    pub reloads: u64,
}

fn headless_context(backend: Backend) -> Result<(Context, Option<CommandLog>)> {
    let (width, height) = HEADLESS_SIZE;
    match backend {
        Backend::Recording => {
            let device = RecordingDevice::new();
            let log = device.log();
            let mut context = Context::new(Box::new(device));
            context.resize(width, height);
            context.set_viewport(Viewport::new(0, 0, width, height));
            Ok((context, Some(log)))
        }
        #[cfg(feature = "gpu")]
        Backend::Wgpu => {
            let device = water_gpu::WgpuDevice::headless(width, height).context("opening a wgpu adapter")?;
            Ok((Context::new(Box::new(device)), None))
        }
        #[cfg(not(feature = "gpu"))]
        Backend::Wgpu => anyhow::bail!("built without the `gpu` feature"),
    }
}

/// Simulates and draws `config.frames` frames offscreen.
pub fn run_headless(
    config: &RuntimeConfig,
    backend: Backend,
    reload: Option<&Receiver<PathBuf>>,
) -> Result<HeadlessReport> {
    let (mut context, log) = headless_context(backend)?;
    let library = library(config);
    let mut scene = Scene::new(&mut context, &library, config.scene.clone(), config.seed)?;
    let mut report = HeadlessReport {
        draws: log.as_ref().map(|_| 0),
        ..HeadlessReport::default()
    };

    tracing::info!(frames = config.frames, dt = config.dt, ?backend, "starting headless run");
    for frame in 1..=config.frames {
        if let Some(rx) = reload {
            if rx.try_iter().count() > 0 {
                match scene.reload_kernels(&mut context, &library) {
                    Ok(()) => report.reloads += 1,
                    Err(err) => tracing::warn!(%err, "keeping previous kernels"),
                }
            }
        }

        scene
            .frame(&mut context, config.dt)
            .with_context(|| format!("frame {frame}"))?;

        // The recording log would otherwise hold every command of the run.
        if let (Some(log), Some(draws)) = (&log, report.draws.as_mut()) {
            *draws += log.draws().len();
            log.clear();
        }
        report.frames = frame;

        if frame % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                frame,
                swaps = scene.water().swap_count(),
                droplets = scene.droplets().len(),
                "simulation progress"
            );
        }
    }

    report.swaps = scene.water().swap_count();
    report.droplets = scene.droplets().len();
    tracing::info!(?report, "headless run finished");
    Ok(report)
}

/// Opens a window and runs until it is closed.
#[cfg(feature = "gpu")]
pub fn run_windowed(config: &RuntimeConfig, reload: Option<Receiver<PathBuf>>) -> Result<()> {
    water_render::run(water_render::RunOptions {
        config: config.scene.clone(),
        library: library(config),
        seed: config.seed,
        reload,
    })
}

#[cfg(not(feature = "gpu"))]
pub fn run_windowed(_config: &RuntimeConfig, _reload: Option<Receiver<PathBuf>>) -> Result<()> {
    anyhow::bail!("built without the `gpu` feature; use --headless")
}
