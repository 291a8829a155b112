use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub window: WindowConfig,
    pub session: SessionConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub data_dir: String,
    pub doc_extension: String,
    pub doc_filter_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub default_width: u32,
    pub default_height: u32,
    pub cascade_offset: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub restore_on_launch: bool,
    pub max_recent: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub enabled: bool,
}

const DEFAULTS: &str = include_str!("../../config/default.toml");

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let mut config = Self::defaults()?;

        if let Some(proj_dirs) = project_dirs() {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                let user_str = fs::read_to_string(&config_path)?;
                config = toml::from_str(&user_str)?; // TODO: deep merge instead of full replace
            }
        }

        config.general.data_dir = expand_home(&config.general.data_dir)?;
        Ok(config)
    }

    pub fn defaults() -> Result<Self> {
        Ok(toml::from_str(DEFAULTS)?)
    }

    /// Directory holding the preferences file, logs and scratch documents.
    pub fn data_dir(&self) -> PathBuf {
        if !self.general.data_dir.trim().is_empty() {
            return PathBuf::from(&self.general.data_dir);
        }
        project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("docshell"))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir().join("preferences.json")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir().join("currentDocs")
    }
}

pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "docshell")
}

fn expand_home(raw: &str) -> Result<String> {
    if !raw.starts_with('~') {
        return Ok(raw.to_string());
    }
    let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(raw.replacen('~', &home.to_string_lossy(), 1))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
