use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use metadata::{ExtractOptions, ARTWORK_SEARCH_DEPTH};
use serde::{Deserialize, Serialize};

use crate::index::IndexOptions;
use crate::scan::{ScanOptions, SUPPORTED_EXTENSIONS};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub version: u32,
    pub settings_path: String,
    pub music_root: String,
    pub scan_extensions: Vec<String>,
    pub follow_links: bool,
    pub include_hidden: bool,
    pub artwork_search_depth: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            settings_path: "settings.redb".to_string(),
            music_root: "".to_string(),
            scan_extensions: SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            follow_links: false,
            include_hidden: false,
            artwork_search_depth: ARTWORK_SEARCH_DEPTH,
        }
    }
}

impl LibraryConfig {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            artwork_search_depth: self.artwork_search_depth,
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self.scan_extensions.clone(),
            follow_links: self.follow_links,
            include_hidden: self.include_hidden,
            extract: self.extract_options(),
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            artist_image_depth: self.artwork_search_depth,
            ..IndexOptions::default()
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("MUSIC_LIBRARY_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Loads the config at `path`, writing defaults first when it does not exist.
/// The flag is `true` when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(LibraryConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: LibraryConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.settings_path.trim().is_empty() {
            config.settings_path = "settings.redb".to_string();
        }
        config.scan_extensions = config
            .scan_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if config.scan_extensions.is_empty() {
            config.scan_extensions = LibraryConfig::default().scan_extensions;
        }
        return Ok((config, false));
    }

    let config = LibraryConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &LibraryConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(resolve_path(config_path, trimmed))
    }
}
