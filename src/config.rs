use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub poll: PollConfig,
    pub volume: VolumeConfig,
    pub hotkeys: HotkeysConfig,
    pub ui: UiConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between session list refreshes
    pub interval_secs: f64,
    /// Peak level below which a session counts as silent
    pub active_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VolumeConfig {
    /// Volume change per hotkey press, in [0, 1] units
    pub step: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HotkeysConfig {
    /// Path of the persisted hotkey assignment file
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct UiConfig {
    /// Language override ("en"/"es"); system locale when absent
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub log_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            volume: VolumeConfig::default(),
            hotkeys: HotkeysConfig::default(),
            ui: UiConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1.0,
            active_threshold: 0.02,
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { step: 0.05 }
    }
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            path: "~/.volume-hotkey/hotkeys.json".to_owned(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: "~/.volume-hotkey/volume-hotkey.log".to_owned(),
        }
    }
}

impl Config {
    /// Load config from ~/.volume-hotkey.toml
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;

        let config: Self = toml::from_str(&contents).context("failed to parse config TOML")?;

        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(home_dir()?.join(".volume-hotkey.toml"))
    }

    fn create_default(path: &PathBuf) -> Result<()> {
        let default_config = r#"[poll]
interval_secs = 1.0
active_threshold = 0.02

[volume]
step = 0.05

[hotkeys]
path = "~/.volume-hotkey/hotkeys.json"

[ui]
# language = "en"

[telemetry]
enabled = false
log_path = "~/.volume-hotkey/volume-hotkey.log"
"#;
        fs::write(path, default_config).context("failed to write default config")?;
        Ok(())
    }

    /// Expand ~ in paths to home directory
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            Ok(home_dir()?.join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .context("neither HOME nor USERPROFILE is set")
}
