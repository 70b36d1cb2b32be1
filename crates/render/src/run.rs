//! Windowed run loop: a winit window, a wgpu surface and the scene, with
//! pointer and keyboard input wired to it.

use std::{
    path::PathBuf,
    sync::{mpsc::Receiver, Arc},
    time::Instant,
};

use anyhow::{Context as _, Result};
use water_gpu::{Context, GpuError, ShaderLibrary, WgpuDevice};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

use crate::scene::{Scene, SceneConfig};

pub struct RunOptions {
    pub config: SceneConfig,
    pub library: ShaderLibrary,
    pub seed: Option<u64>,
    /// Changed kernel files. Every batch received triggers a kernel rebuild.
    pub reload: Option<Receiver<PathBuf>>,
}

fn drain_reloads(reload: Option<&Receiver<PathBuf>>) -> Vec<PathBuf> {
    reload.map(|rx| rx.try_iter().collect()).unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation)]
fn pointer(position: PhysicalPosition<f64>) -> (f32, f32) {
    (position.x as f32, position.y as f32)
}

/// Opens a window and runs the scene until it is closed.
#[allow(clippy::too_many_lines)]
pub fn run(options: RunOptions) -> Result<()> {
    let RunOptions {
        config,
        library,
        seed,
        reload,
    } = options;

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Water")
            .build(&event_loop)
            .context("failed to create window")?,
    );
    let size = window.inner_size();

    let instance = wgpu::Instance::default();
    let surface = instance
        .create_surface(window.clone())
        .context("failed to create surface")?;
    let device = WgpuDevice::with_surface(&instance, surface, size.width, size.height)?;
    let mut context = Context::new(Box::new(device));
    let mut scene = Scene::new(&mut context, &library, config, seed)?;
    scene.resize(&mut context, size.width, size.height);

    let mut cursor = (0.0, 0.0);
    let mut last_frame = Instant::now();
    let mut failure: Option<anyhow::Error> = None;

    event_loop.run(|event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => scene.resize(&mut context, size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                cursor = pointer(*position);
                scene.during_drag(cursor.0, cursor.1, Instant::now());
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    scene.start_drag(cursor.0, cursor.1, Instant::now());
                }
                ElementState::Released => scene.stop_drag(),
            },
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match logical_key {
                Key::Named(NamedKey::Space) => {
                    scene.toggle_pause();
                }
                Key::Named(NamedKey::Escape) => elwt.exit(),
                Key::Character(c) if c.eq_ignore_ascii_case("r") => {
                    let enabled = !scene.random_drops_enabled();
                    scene.set_random_drops(enabled);
                }
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                let changed = drain_reloads(reload.as_ref());
                if !changed.is_empty() {
                    tracing::info!(files = ?changed, "kernel sources changed");
                    if let Err(err) = scene.reload_kernels(&mut context, &library) {
                        tracing::warn!(%err, "keeping previous kernels");
                    }
                }

                let now = Instant::now();
                let seconds = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;
                match scene.frame(&mut context, seconds) {
                    Ok(()) => {}
                    Err(GpuError::Surface(reason)) => {
                        tracing::warn!(%reason, "surface lost, reconfiguring");
                        let size = window.inner_size();
                        scene.resize(&mut context, size.width, size.height);
                    }
                    Err(err) => {
                        failure = Some(anyhow::Error::new(err).context("rendering a frame"));
                        elwt.exit();
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    failure.map_or(Ok(()), Err)
}
