//! TOML configuration deserialisation for blur jobs.

use std::path::{Path, PathBuf};

use haloblur_core::Weighting;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub blur: BlurConfig,
    pub io: IoConfig,
}

/// Blur parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct BlurConfig {
    /// Neighbourhood depth; clamped to `matrix_size - 1` at run time.
    pub depth: usize,
    pub matrix_size: usize,
    /// Worker count. Default: available parallelism, capped at `matrix_size`.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Compute backend: "cpu" or "distributed". Default: "distributed".
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub weighting: Weighting,
}

pub fn default_backend() -> String {
    "distributed".into()
}

/// Input and output matrix files.
#[derive(Debug, Deserialize)]
pub struct IoConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Optional JSON run summary.
    #[serde(default)]
    pub summary: Option<PathBuf>,
}

impl JobConfig {
    /// Resolve relative file paths against `base` (the config file's directory).
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.io.input);
        resolve(&mut self.io.output);
        if let Some(summary) = self.io.summary.as_mut() {
            resolve(summary);
        }
    }
}

/// Parse a job configuration from TOML text.
pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    Ok(config)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}
