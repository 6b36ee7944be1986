//! Receiver configuration.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. explicit path (the `--config` flag)
//!   2. $VIS_TRANSFER_CONFIG
//!   3. $XDG_CONFIG_HOME/vis-transfer/config.toml
//!   4. ~/.config/vis-transfer/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisConfig {
    pub decode: DecodeConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

/// Barcode family printed by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    DataMatrix,
    QrCode,
}

impl std::str::FromStr for Symbology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_matrix" => Ok(Symbology::DataMatrix),
            "qr_code" => Ok(Symbology::QrCode),
            other => Err(ConfigError::UnknownSymbology(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub symbology: Symbology,
    /// Retry each channel on a Gaussian-blurred copy when the plain read fails.
    pub blur_retry: bool,
    /// Blur sigma for the retry. 0.8 is close to a 3x3 kernel.
    pub blur_sigma: f32,
    /// Let the recogniser spend more time per image.
    pub try_harder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames decoded ahead of the protocol engine. Minimum 1.
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Appended to the output path while the transfer is in flight.
    pub temp_suffix: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            symbology: Symbology::DataMatrix,
            blur_retry: true,
            blur_sigma: 0.8,
            try_harder: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 1 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            temp_suffix: ".vis-transfer-incomplete".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("vis-transfer")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("unknown symbology: {0} (expected data_matrix or qr_code)")]
    UnknownSymbology(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl VisConfig {
    /// Load config: env vars → file → defaults. `explicit` overrides the
    /// file location and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::file_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    VisConfig::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.normalize();
        Ok(config)
    }

    /// Default config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VIS_TRANSFER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Apply VIS_TRANSFER_* overrides, looked up through `var`.
    fn apply_env_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = var("VIS_TRANSFER_DECODE__SYMBOLOGY") {
            self.decode.symbology = v.parse()?;
        }
        if let Some(v) = var("VIS_TRANSFER_DECODE__BLUR_RETRY") {
            self.decode.blur_retry = v == "true" || v == "1";
        }
        if let Some(v) = var("VIS_TRANSFER_DECODE__BLUR_SIGMA") {
            self.decode.blur_sigma = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("decode.blur_sigma", v))?;
        }
        if let Some(v) = var("VIS_TRANSFER_PIPELINE__QUEUE_CAPACITY") {
            self.pipeline.queue_capacity = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("pipeline.queue_capacity", v))?;
        }
        Ok(())
    }

    fn normalize(&mut self) {
        if self.pipeline.queue_capacity == 0 {
            tracing::warn!("pipeline.queue_capacity of 0 raised to 1");
            self.pipeline.queue_capacity = 1;
        }
    }
}
