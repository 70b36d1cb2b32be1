#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! # Water Runtime
//!
//! The `water` binary: command-line and JSON configuration, logging, the
//! kernel file watcher, and the headless and windowed apps.

pub mod app;
pub mod config;
pub mod watcher;

pub use app::{run_headless, run_windowed, HeadlessReport};
pub use config::{Backend, Cli, RuntimeConfig};
