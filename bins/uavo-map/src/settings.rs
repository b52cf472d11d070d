//! Configuration file loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uavo_geo::EngineConfig;
use uavo_telemetry::TelemetryConfig;

/// Candidate file names, searched in order
const CANDIDATES: [&str; 3] = ["uavo.toml", ".uavo.toml", ".config/uavo.toml"];

/// On-disk layout: engine sections at the top level plus `[telemetry]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(flatten)]
    engine: EngineConfig,

    #[serde(default)]
    telemetry: TelemetryConfig,
}

/// Resolved settings and where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Load from an explicit path, else the first candidate in the working
    /// directory, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        Self::load_from(path, &cwd)
    }

    fn load_from(path: Option<&Path>, dir: &Path) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).or_else(|| find_config_file(dir));

        let file = match &config_path {
            Some(p) => load_config_file(p)?,
            None => SettingsFile::default(),
        };

        Ok(Self {
            engine: file.engine,
            telemetry: file.telemetry,
            path: config_path,
        })
    }
}

/// Find configuration file in standard locations
fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|candidate| candidate.is_file())
}

/// Load, parse and validate a TOML configuration file
fn load_config_file(path: &Path) -> Result<SettingsFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let file: SettingsFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    file.engine
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    Ok(file)
}
