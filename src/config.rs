// SPDX-License-Identifier: GPL-3.0-only
//! Configuration loaded from `config.kdl`
//!
//! Every key is optional. A missing file means defaults; a file that fails to
//! parse is reported and ignored; a single key with the wrong type falls back
//! to its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kdl::{KdlDocument, KdlValue};

use crate::error::{AppError, Result};

pub const APP_NAME: &str = "monitor-brightness-ctl";
pub const CONFIG_FILE: &str = "config.kdl";

const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_DDC_MAX: u32 = 250;

/// Which window manager answers "which output is focused"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WindowManagerKind {
    #[default]
    Hyprland,
    None,
}

/// Programs used to talk to each backend
#[derive(Clone, Debug, PartialEq)]
pub struct HelperConfig {
    pub apple: String,
    pub ddcutil: String,
    pub backlight: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            apple: "asdbctl".to_string(),
            ddcutil: "ddcutil".to_string(),
            backlight: "brightnessctl".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub debounce_ms: u64,
    /// VCP maximum assumed for a DDC display until its first read
    pub ddc_default_max: u32,
    pub window_manager: WindowManagerKind,
    pub socket: Option<PathBuf>,
    pub hotplug: bool,
    pub helpers: HelperConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ddc_default_max: DEFAULT_DDC_MAX,
            window_manager: WindowManagerKind::default(),
            socket: None,
            hotplug: true,
            helpers: HelperConfig::default(),
        }
    }
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Socket path, either configured or under the runtime dir
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(format!("{}.sock", APP_NAME))
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load the config, logging and falling back to defaults on any problem
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                warn!("No config directory available, using defaults");
                return Self::default();
            }
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                error!("can't read config {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match Self::from_kdl(&text) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                error!("errors loading config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_kdl(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e: kdl::KdlError| AppError::Config(e.to_string()))?;

        let mut config = Self::default();

        if let Some(value) = doc.get_arg("debounce-ms") {
            match value.as_integer().and_then(|v| u64::try_from(v).ok()) {
                Some(ms) => config.debounce_ms = ms,
                None => warn_invalid("debounce-ms", value),
            }
        }

        if let Some(value) = doc.get_arg("ddc-default-max") {
            match value
                .as_integer()
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
            {
                Some(max) => config.ddc_default_max = max,
                None => warn_invalid("ddc-default-max", value),
            }
        }

        if let Some(value) = doc.get_arg("window-manager") {
            match value.as_string() {
                Some(name) if name.eq_ignore_ascii_case("hyprland") => {
                    config.window_manager = WindowManagerKind::Hyprland
                }
                Some(name) if name.eq_ignore_ascii_case("none") => {
                    config.window_manager = WindowManagerKind::None
                }
                _ => warn_invalid("window-manager", value),
            }
        }

        if let Some(value) = doc.get_arg("socket") {
            match value.as_string() {
                Some(path) => config.socket = Some(PathBuf::from(path)),
                None => warn_invalid("socket", value),
            }
        }

        if let Some(value) = doc.get_arg("hotplug") {
            match value.as_bool() {
                Some(enabled) => config.hotplug = enabled,
                None => warn_invalid("hotplug", value),
            }
        }

        if let Some(helpers) = doc.get("helpers").and_then(|node| node.children()) {
            for (key, slot) in [
                ("apple", &mut config.helpers.apple),
                ("ddcutil", &mut config.helpers.ddcutil),
                ("backlight", &mut config.helpers.backlight),
            ] {
                if let Some(value) = helpers.get_arg(key) {
                    match value.as_string() {
                        Some(program) => *slot = program.to_string(),
                        None => warn_invalid(key, value),
                    }
                }
            }
        }

        Ok(config)
    }
}

fn warn_invalid(key: &str, value: &KdlValue) {
    warn!("Ignoring invalid value for `{}`: {}", key, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_kdl("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.ddc_default_max, 250);
    }

    #[test]
    fn test_full_document() {
        let config = Config::from_kdl(
            r#"
            debounce-ms 300
            ddc-default-max 100
            window-manager "none"
            socket "/tmp/test.sock"
            hotplug #false
            helpers {
                apple "/opt/bin/asdbctl"
                ddcutil "ddcutil-wrapper"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.ddc_default_max, 100);
        assert_eq!(config.window_manager, WindowManagerKind::None);
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/test.sock"));
        assert!(!config.hotplug);
        assert_eq!(config.helpers.apple, "/opt/bin/asdbctl");
        assert_eq!(config.helpers.ddcutil, "ddcutil-wrapper");
        assert_eq!(config.helpers.backlight, "brightnessctl");
    }

    #[test]
    fn test_wrong_types_fall_back_per_key() {
        let config = Config::from_kdl(
            r#"
            debounce-ms "fast"
            window-manager "sway"
            ddc-default-max 0
            "#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.window_manager, WindowManagerKind::Hyprland);
        assert_eq!(config.ddc_default_max, 250);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(matches!(
            Config::from_kdl("helpers {"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/monitor-brightness-ctl.kdl")));
        assert_eq!(config, Config::default());
    }
}
