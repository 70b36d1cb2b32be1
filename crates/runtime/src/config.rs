//! Runtime settings: a JSON file with command-line overrides on top.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use water_render::SceneConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    #[serde(flatten)]
    pub scene: SceneConfig,
    /// Frames simulated by a headless run.
    pub frames: u64,
    /// Seconds per headless frame.
    pub dt: f32,
    /// Directory whose kernel files replace the embedded ones.
    pub shader_dir: Option<PathBuf>,
    /// Rebuild kernels when files in `shader_dir` change.
    pub watch: bool,
    pub seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            frames: 300,
            dt: 1.0 / 60.0,
            shader_dir: None,
            watch: false,
            seed: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config `{}`", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config `{}`", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Record commands without touching a GPU.
    Recording,
    /// Render offscreen on a real adapter.
    Wgpu,
}

#[derive(Parser, Debug)]
#[command(name = "water", version, about = "Interactive height-field water simulation")]
pub struct Cli {
    /// JSON settings file. Flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Simulate without opening a window.
    #[arg(long)]
    pub headless: bool,
    /// Device used by headless runs.
    #[arg(long, value_enum, default_value_t = Backend::Recording)]
    pub backend: Backend,
    #[arg(long)]
    pub frames: Option<u64>,
    #[arg(long)]
    pub dt: Option<f32>,
    #[arg(long)]
    pub shader_dir: Option<PathBuf>,
    #[arg(long)]
    pub watch: bool,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub no_random_drops: bool,
    /// Edge length of the simulation textures.
    #[arg(long)]
    pub resolution: Option<u32>,
}

impl Cli {
    /// The config file, if any, with every flag that was given applied.
    pub fn resolve(&self) -> Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::load(path)?,
            None => RuntimeConfig::default(),
        };
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(dt) = self.dt {
            config.dt = dt;
        }
        if let Some(dir) = &self.shader_dir {
            config.shader_dir = Some(dir.clone());
        }
        if self.watch {
            config.watch = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.no_random_drops {
            config.scene.random_drops.enabled = false;
        }
        if let Some(resolution) = self.resolution {
            config.scene.resolution = resolution;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_keys_sit_at_the_top_level() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{ "frames": 120, "resolution": 64, "random_drops": { "enabled": false }, "seed": 3 }"#,
        )
        .unwrap();
        assert_eq!(config.frames, 120);
        assert_eq!(config.scene.resolution, 64);
        assert!(!config.scene.random_drops.enabled);
        assert_eq!(config.seed, Some(3));
        assert!((config.dt - 1.0 / 60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn flags_override_the_file() {
        let path = std::env::temp_dir().join(format!("water-runtime-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "frames": 10, "resolution": 64 }"#).unwrap();

        let cli = Cli::parse_from([
            "water",
            "--config",
            path.to_str().unwrap(),
            "--frames",
            "25",
            "--no-random-drops",
            "--seed",
            "9",
        ]);
        let config = cli.resolve().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.frames, 25);
        assert_eq!(config.scene.resolution, 64);
        assert!(!config.scene.random_drops.enabled);
        assert_eq!(config.seed, Some(9));
        assert_eq!(cli.backend, Backend::Recording);
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let cli = Cli::parse_from(["water", "--config", "/missing/water.json"]);
        let message = format!("{:#}", cli.resolve().unwrap_err());
        assert!(message.contains("/missing/water.json"), "{message}");
    }
}
