// config.rs

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::link::DEFAULT_FAVICON_SIZE;

pub const DATA_ENV: &str = "RUSTYTAB_DATA";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "RustyTab")
}

fn fallback_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|p| p.join(".config").join("RustyTab"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(fallback_dir)
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(fallback_dir)
}

fn default_data_file() -> PathBuf {
    data_dir().join("storage.json")
}

fn default_log_file() -> PathBuf {
    data_dir().join("rustytab.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_favicon_size() -> u32 {
    DEFAULT_FAVICON_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_favicon_size")]
    pub favicon_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            log_file: default_log_file(),
            log_level: default_log_level(),
            favicon_size: default_favicon_size(),
        }
    }
}

impl Config {
    /// Reads `<config dir>/config.toml`, then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = Self::load_from(&config_dir().join("config.toml"))?;
        if let Some(path) = std::env::var_os(DATA_ENV) {
            cfg.data_file = PathBuf::from(path);
        }
        Ok(cfg)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.favicon_size, 48);
        assert!(cfg.data_file.ends_with("storage.json"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_file = \"/tmp/tab.json\"\nfavicon_size = 64\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.data_file, PathBuf::from("/tmp/tab.json"));
        assert_eq!(cfg.favicon_size, 64);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "favicon_size = \"big\"").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
