use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::board::history;
use crate::board::layout::LayoutMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    // If None, use OS default autosave directory
    pub autosave_override: Option<PathBuf>,
    // If None, use OS temporary directory for exports
    pub export_override: Option<PathBuf>,
    pub history_capacity: usize,
    pub history_debounce_ms: u64,
    pub duplicate_offset: f32,
    pub layout: LayoutMetrics,
    // Active brand palette, most prominent color first
    pub brand_palette: Vec<String>,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            autosave_override: None,
            export_override: None,
            history_capacity: history::DEFAULT_CAPACITY,
            history_debounce_ms: history::DEFAULT_DEBOUNCE.as_millis() as u64,
            duplicate_offset: 40.0,
            layout: LayoutMetrics::default(),
            brand_palette: vec![
                "#1F2937".to_string(),
                "#F97316".to_string(),
                "#FDE68A".to_string(),
                "#0EA5E9".to_string(),
            ],
        }
    }
}

impl BoardSettings {
    #[cfg_attr(target_os = "windows", allow(dead_code))]
    fn home() -> PathBuf {
        std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"))
    }

    fn env_dir(var: &str) -> Option<PathBuf> {
        std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    /// Per-user configuration directory: Application Support on macOS,
    /// `%APPDATA%` on Windows, XDG config elsewhere.
    fn config_dir() -> PathBuf {
        #[cfg(target_os = "macos")]
        let dir = Self::home().join("Library/Application Support/Moodboard");
        #[cfg(target_os = "windows")]
        let dir = Self::env_dir("APPDATA").unwrap_or_default().join("Moodboard");
        #[cfg(all(unix, not(target_os = "macos")))]
        let dir = Self::env_dir("XDG_CONFIG_HOME")
            .unwrap_or_else(|| Self::home().join(".config"))
            .join("moodboard");
        dir
    }

    // Boards live next to the config on macOS, in local app data on Windows
    // and under XDG state elsewhere
    fn autosave_default_dir() -> PathBuf {
        #[cfg(target_os = "macos")]
        let dir = Self::config_dir().join("Boards");
        #[cfg(target_os = "windows")]
        let dir = Self::env_dir("LOCALAPPDATA")
            .map(|p| p.join("Moodboard").join("Boards"))
            .or_else(|| Self::env_dir("TEMP").map(|p| p.join("Moodboard")))
            .unwrap_or_else(|| PathBuf::from("Moodboard"));
        #[cfg(all(unix, not(target_os = "macos")))]
        let dir = Self::env_dir("XDG_STATE_HOME")
            .unwrap_or_else(|| Self::home().join(".local").join("state"))
            .join("moodboard");
        dir
    }

    /// Load settings from the per-user config dir, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_dir(&Self::config_dir())
    }

    /// Read `settings.json` from `dir`. A legacy `settings.ron` is read
    /// instead when no JSON file exists, and rewritten as JSON.
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Self> {
        let json_path = dir.join("settings.json");
        if json_path.exists() {
            return Ok(serde_json::from_str(&fs::read_to_string(&json_path)?)?);
        }
        let ron_path = dir.join("settings.ron");
        if !ron_path.exists() {
            return Ok(Self::default());
        }
        let legacy: Self = ron::from_str(&fs::read_to_string(&ron_path)?)?;
        match legacy.save_to_dir(dir) {
            Ok(()) => info!("migrated {} to settings.json", ron_path.display()),
            Err(e) => warn!("keeping legacy settings.ron, could not write json: {}", e),
        }
        Ok(legacy)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_dir(&Self::config_dir())
    }

    pub fn save_to_dir(&self, dir: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(dir)?;
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(dir.join("settings.json"))?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn autosave_dir(&self) -> PathBuf {
        if let Some(p) = &self.autosave_override { return p.clone(); }
        Self::autosave_default_dir()
    }

    /// Default export directory when no override is set: OS temporary directory.
    /// Example: {temp_dir}/moodboard/exports
    pub fn export_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push("moodboard");
        p.push("exports");
        p
    }

    pub fn export_dir(&self) -> PathBuf {
        if let Some(p) = &self.export_override { return p.clone(); }
        Self::export_default_dir()
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.history_debounce_ms)
    }
}
