//! CLI-level configuration. [`Config::load`] reads `~/.config/llp/config.toml`,
//! creating it with built-in defaults if it does not yet exist. These values
//! are only ever used as defaults for CLI flags the user didn't pass — the
//! core crate never reads this file, or any file, itself.

use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = r#"
[parse]
outdir    = "artifacts"
jobs      = 1

[export]
tz                  = "UTC"
formatting          = "light"
split_soft_overflow = 0.20
tiny_tail_threshold = 20
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parse: ParseDefaults,
    #[serde(default)]
    pub export: ExportDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseDefaults {
    #[serde(default = "default_outdir")]
    pub outdir: String,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_outdir() -> String {
    "artifacts".to_string()
}
fn default_jobs() -> usize {
    1
}

impl Default for ParseDefaults {
    fn default() -> Self {
        Self {
            outdir: default_outdir(),
            jobs: default_jobs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportDefaults {
    #[serde(default = "default_tz")]
    pub tz: String,
    #[serde(default = "default_formatting")]
    pub formatting: String,
    #[serde(default = "default_soft_overflow")]
    pub split_soft_overflow: f64,
    #[serde(default = "default_tiny_tail_threshold")]
    pub tiny_tail_threshold: usize,
}

fn default_tz() -> String {
    "UTC".to_string()
}
fn default_formatting() -> String {
    "light".to_string()
}
fn default_soft_overflow() -> f64 {
    0.20
}
fn default_tiny_tail_threshold() -> usize {
    20
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            tz: default_tz(),
            formatting: default_formatting(),
            split_soft_overflow: default_soft_overflow(),
            tiny_tail_threshold: default_tiny_tail_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/llp/config.toml`, layered on top of the built-in
    /// defaults. Creates the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
        }

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string())).join(".config")
        })
        .join("llp")
        .join("config.toml")
}
