use std::path::PathBuf;

use facegate_core::{ProviderConfig, ProviderOptions};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading options file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing options file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Number of provider worker threads.
    pub workers: usize,
    /// Pending requests each worker queue holds before callers wait.
    pub queue_depth: usize,
    /// Optional TOML file with provider options.
    pub options_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACEGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facegate_onnx::default_model_dir());

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            model_dir,
            workers: env_usize("FACEGATE_WORKERS", default_workers).max(1),
            queue_depth: env_usize("FACEGATE_QUEUE_DEPTH", 4).max(1),
            options_path: std::env::var("FACEGATE_OPTIONS").ok().map(PathBuf::from),
        }
    }

    /// Provider configuration: defaults overlaid with the options file, if any.
    pub fn provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        let base = ProviderConfig::default();
        let Some(path) = &self.options_path else {
            return Ok(base);
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(base.with_options(&parse_options(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?))
    }
}

fn parse_options(text: &str) -> Result<ProviderOptions, toml::de::Error> {
    toml::from_str(text)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
