// Promptdock Settings Module
// User-configurable engine tuning loaded from a TOML file

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::target::{default_containers, ContainerSpec};

/// Engine settings.
///
/// Loaded from a TOML file (default: ~/.config/promptdock/settings.toml).
/// Everything the engine would otherwise bake in as a magic constant is
/// a field here: the template-match confidence threshold, the settle
/// delay after window activation, the pacing delay between synthesized
/// input steps, and the hotkey redirect configuration. Screen-pixel
/// automation is non-deterministic by nature; keeping these knobs
/// explicit keeps that non-determinism visible and testable.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Minimum normalized cross-correlation score for an anchor match.
    pub confidence_threshold: f32,
    /// Drag rectangles thinner than this are rejected during calibration.
    pub min_anchor_size_px: u32,
    /// Pause after window activation before any further interaction.
    pub settle_delay_ms: u64,
    /// Pause between consecutive synthesized input steps.
    pub pace_delay_ms: u64,
    /// Hotkey redirect configuration.
    pub hotkey: HotkeySettings,
    /// Companion application raised by the redirect alternate action.
    pub companion: CompanionSettings,
    /// Container definitions; defaults are used when the file has none.
    pub containers: Vec<ContainerSpec>,
    /// Directory where captured anchor images are written.
    pub anchors_dir: PathBuf,
    /// Path of the persisted calibration store.
    pub store_path: PathBuf,
}

/// The intercepted combination and its modifiers, by key name
/// (Linux input-event-codes names, lowercase, without the KEY_ prefix).
#[derive(Debug, Clone, Deserialize)]
pub struct HotkeySettings {
    /// Whether the redirect feature starts enabled.
    #[serde(default)]
    pub redirect_enabled: bool,
    /// The monitored trigger key.
    #[serde(default = "default_trigger")]
    pub trigger: String,
    /// Held modifier that arms the interception.
    #[serde(default = "default_primary")]
    pub primary_modifier: String,
    /// Held modifier that forces the original system action instead.
    #[serde(default = "default_override")]
    pub override_modifier: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            redirect_enabled: false,
            trigger: default_trigger(),
            primary_modifier: default_primary(),
            override_modifier: default_override(),
        }
    }
}

fn default_trigger() -> String {
    "v".to_string()
}

fn default_primary() -> String {
    "meta".to_string()
}

fn default_override() -> String {
    "shift".to_string()
}

/// Where the redirect alternate action delivers its click.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanionSettings {
    /// Regex matched against the companion window class.
    #[serde(default = "default_companion_class")]
    pub window_class: String,
    /// Regex matched against the companion window title.
    #[serde(default = "default_companion_title")]
    pub title_pattern: String,
    /// Command used to launch the companion when no window matches.
    #[serde(default)]
    pub launch_command: Option<String>,
    /// Click point, relative to the companion window origin.
    #[serde(default = "default_companion_click_x")]
    pub click_x: i32,
    #[serde(default = "default_companion_click_y")]
    pub click_y: i32,
    /// How long the companion stays topmost after the click.
    #[serde(default = "default_topmost_ms")]
    pub topmost_ms: u64,
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            window_class: default_companion_class(),
            title_pattern: default_companion_title(),
            launch_command: None,
            click_x: default_companion_click_x(),
            click_y: default_companion_click_y(),
            topmost_ms: default_topmost_ms(),
        }
    }
}

fn default_companion_class() -> String {
    "^promptdock-panel$".to_string()
}

fn default_companion_title() -> String {
    "Promptdock".to_string()
}

fn default_companion_click_x() -> i32 {
    40
}

fn default_companion_click_y() -> i32 {
    40
}

fn default_topmost_ms() -> u64 {
    800
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, Deserialize, Default)]
struct SettingsToml {
    #[serde(default)]
    matching: Option<MatchingToml>,
    #[serde(default)]
    timing: Option<TimingToml>,
    #[serde(default)]
    hotkey: Option<HotkeySettings>,
    #[serde(default)]
    companion: Option<CompanionSettings>,
    #[serde(default)]
    containers: Vec<ContainerSpec>,
    #[serde(default)]
    paths: Option<PathsToml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct MatchingToml {
    confidence_threshold: Option<f32>,
    min_anchor_size_px: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TimingToml {
    settle_delay_ms: Option<u64>,
    pace_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PathsToml {
    anchors_dir: Option<PathBuf>,
    store_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            confidence_threshold: 0.7,
            min_anchor_size_px: 5,
            settle_delay_ms: 100,
            pace_delay_ms: 50,
            hotkey: HotkeySettings::default(),
            companion: CompanionSettings::default(),
            containers: default_containers(),
            anchors_dir: data_dir.join("anchors"),
            store_path: data_dir.join("targets.json"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptdock")
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Load settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let parsed: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::default();

        if let Some(matching) = parsed.matching {
            if let Some(threshold) = matching.confidence_threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(SettingsError::InvalidValue(format!(
                        "confidence_threshold must be within 0.0..=1.0, got {}",
                        threshold
                    )));
                }
                settings.confidence_threshold = threshold;
            }
            if let Some(min) = matching.min_anchor_size_px {
                settings.min_anchor_size_px = min;
            }
        }

        if let Some(timing) = parsed.timing {
            if let Some(ms) = timing.settle_delay_ms {
                settings.settle_delay_ms = ms;
            }
            if let Some(ms) = timing.pace_delay_ms {
                settings.pace_delay_ms = ms;
            }
        }

        if let Some(hotkey) = parsed.hotkey {
            settings.hotkey = hotkey;
        }
        if let Some(companion) = parsed.companion {
            settings.companion = companion;
        }
        if !parsed.containers.is_empty() {
            settings.containers = parsed.containers;
        }
        if let Some(paths) = parsed.paths {
            if let Some(dir) = paths.anchors_dir {
                settings.anchors_dir = dir;
            }
            if let Some(path) = paths.store_path {
                settings.store_path = path;
            }
        }

        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("promptdock").join("settings.toml"))
    }

    /// Load from the default location, falling back to defaults when
    /// the file does not exist.
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::default())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn pace_delay(&self) -> Duration {
        Duration::from_millis(self.pace_delay_ms)
    }

    /// Look up a container definition by id.
    pub fn container(&self, id: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ContainerKind;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.confidence_threshold, 0.7);
        assert_eq!(settings.settle_delay_ms, 100);
        assert!(!settings.hotkey.redirect_enabled);
        assert!(settings.container("native-cli").is_some());
    }

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
[matching]
confidence_threshold = 0.85

[timing]
settle_delay_ms = 250
pace_delay_ms = 10

[hotkey]
redirect_enabled = true
trigger = "c"
primary_modifier = "meta"
override_modifier = "shift"
"#;

        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.confidence_threshold, 0.85);
        assert_eq!(settings.settle_delay(), Duration::from_millis(250));
        assert!(settings.hotkey.redirect_enabled);
        assert_eq!(settings.hotkey.trigger, "c");
        // Containers absent from the file fall back to defaults.
        assert!(settings.container("vscode").is_some());
    }

    #[test]
    fn test_settings_custom_containers_replace_defaults() {
        let toml = r#"
[[containers]]
id = "zed"
window_class = "^dev\\.zed\\.Zed$"
title_pattern = "Zed"
kind = "anchored"
"#;

        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.containers.len(), 1);
        let zed = settings.container("zed").unwrap();
        assert_eq!(zed.kind, ContainerKind::Anchored);
        assert!(settings.container("vscode").is_none());
    }

    #[test]
    fn test_settings_rejects_bad_threshold() {
        let toml = r#"
[matching]
confidence_threshold = 1.5
"#;
        assert!(matches!(
            Settings::from_toml(toml),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_settings_invalid_toml() {
        assert!(matches!(
            Settings::from_toml("not [ valid"),
            Err(SettingsError::TomlParse(_))
        ));
    }
}
