use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
};

use anyhow::Result;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tracing::info;

/// Kernel files touched by `event`.
fn kernel_paths(event: &Event) -> impl Iterator<Item = &PathBuf> {
    let relevant = event.kind.is_modify() || event.kind.is_create();
    event
        .paths
        .iter()
        .filter(move |path| relevant && path.extension().is_some_and(|ext| ext == "wgsl"))
}

/// Watches `dir` for created or modified `.wgsl` files and sends their paths.
/// Dropping the returned watcher stops it.
pub fn start(dir: &Path) -> Result<(RecommendedWatcher, Receiver<PathBuf>)> {
    info!(dir = %dir.display(), "initializing kernel watcher");
    let (tx, rx) = mpsc::channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in kernel_paths(&event) {
                info!(path = %path.display(), "kernel changed");
                if tx.send(path.clone()).is_err() {
                    return;
                }
            }
        }
        Err(e) => tracing::error!("error watching kernel files: {e:?}"),
    })?;

    watcher.watch(dir, RecursiveMode::Recursive)?;
    Ok((watcher, rx))
}
