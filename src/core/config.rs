use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::LayoutMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub toggle_fullscreen: String,
    pub exit_fullscreen: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            toggle_fullscreen: "F11".to_string(),
            exit_fullscreen: "Escape".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Tried in order whenever a pane's engine is (re)created.
    pub video_backends: Vec<String>,
    pub hardware_decoding: bool,
    pub precise_seek: bool,
    pub default_volume: f64,
    pub progress_interval_ms: u64,
    pub seek_tolerance_secs: f64,
    pub end_guard_secs: f64,
    pub load_timeout_ms: u64,
    pub initial_layout: LayoutMode,
    pub remember_layout: bool,
    pub key_bindings: KeyBindings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            video_backends: ["auto", "cuda", "vaapi", "d3d11va", "videotoolbox", "none"]
                .iter()
                .map(|backend| backend.to_string())
                .collect(),
            hardware_decoding: true,
            precise_seek: true,
            default_volume: 50.0,
            progress_interval_ms: 1000,
            seek_tolerance_secs: 0.5,
            end_guard_secs: 1.0,
            load_timeout_ms: 1500,
            initial_layout: LayoutMode::OneByFour,
            remember_layout: true,
            key_bindings: KeyBindings::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    log::info!("Loaded existing config from {}", config_path.display());
                    Ok(config.sanitized())
                }
                Err(e) => {
                    log::warn!("Config file exists but has issues ({}), creating new one with defaults", e);
                    let new_config = Self::default();
                    new_config.save_to(config_path)
                        .map_err(|save_err| anyhow::anyhow!("Failed to save new config: {}", save_err))?;
                    log::info!("Created new config file at {}", config_path.display());
                    Ok(new_config)
                }
            }
        } else {
            log::info!("No config file found, creating default config");
            let config = Self::default();
            config.save_to(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to save default config: {}", e))?;
            log::info!("Created new config file at {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("simul-pb")
            .join("config.json")
    }

    /// Clamps hand-edited values back into ranges the controllers accept.
    fn sanitized(mut self) -> Self {
        if self.video_backends.is_empty() {
            log::warn!("Config lists no video backends, falling back to defaults");
            self.video_backends = Self::default().video_backends;
        }
        self.default_volume = self.default_volume.clamp(0.0, 100.0);
        self.progress_interval_ms = self.progress_interval_ms.max(100);
        self.seek_tolerance_secs = self.seek_tolerance_secs.max(0.0);
        self.end_guard_secs = self.end_guard_secs.max(0.0);
        self
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn ffmpeg_program(&self) -> PathBuf {
        self.ffmpeg_path.clone().unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn ffprobe_program(&self) -> PathBuf {
        self.ffprobe_path.clone().unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}
