use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BracecovError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Instrumentation settings
    pub instrument: InstrumentConfig,

    /// Stats correlation settings
    pub correlate: CorrelateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Source tree to instrument
    pub source_dir: PathBuf,

    /// Mirrored output tree for instrumented/copied files
    pub output_dir: PathBuf,

    /// Directory receiving the generated coverage support files
    pub support_dir: PathBuf,

    /// Directory names skipped during the walk
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// File extensions that get probes; everything else is copied verbatim
    pub source_extensions: Vec<String>,

    /// Exact file names never instrumented even when the extension matches
    pub exclude_names: Vec<String>,

    /// Report ambiguous multi-brace lines while instrumenting
    pub display_warnings: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelateConfig {
    /// Counter dump written by the instrumented program
    pub dump_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                source_dir: PathBuf::from("src"),
                output_dir: PathBuf::from("covsrc"),
                support_dir: PathBuf::from("covsrc"),
                ignore_patterns: vec![
                    "target".to_string(),
                    ".git".to_string(),
                    "node_modules".to_string(),
                ],
            },
            instrument: InstrumentConfig {
                source_extensions: vec!["cpp".to_string()],
                exclude_names: vec![
                    "coverage.h".to_string(),
                    "coverage.cpp".to_string(),
                ],
                display_warnings: false,
            },
            correlate: CorrelateConfig {
                dump_file: PathBuf::from("coverageStats.txt"),
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| BracecovError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BracecovError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Bracecov.toml",
                    "bracecov.toml",
                    ".bracecov.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
