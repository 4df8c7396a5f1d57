use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::preview::{EngineConfig, Zoom};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "typeset-preview";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Padding subtracted from the container width before fitting pages
    #[serde(default = "default_horizontal_padding")]
    pub horizontal_padding: f64,

    /// Rasters are never produced below this pixel density
    #[serde(default = "default_min_pixel_density")]
    pub min_pixel_density: f64,

    /// Fraction of the viewport ignored at top and bottom when picking the current page
    #[serde(default = "default_visibility_band")]
    pub visibility_band: f64,

    #[serde(default = "default_container_padding")]
    pub container_padding: f64,

    #[serde(default = "default_page_gap")]
    pub page_gap: f64,

    #[serde(default = "default_zoom")]
    pub default_zoom: u16,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_horizontal_padding() -> f64 {
    48.0
}

fn default_min_pixel_density() -> f64 {
    4.0
}

fn default_visibility_band() -> f64 {
    0.2
}

fn default_container_padding() -> f64 {
    24.0
}

fn default_page_gap() -> f64 {
    16.0
}

fn default_zoom() -> u16 {
    Zoom::FIT_PERCENT
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            horizontal_padding: default_horizontal_padding(),
            min_pixel_density: default_min_pixel_density(),
            visibility_band: default_visibility_band(),
            container_padding: default_container_padding(),
            page_gap: default_page_gap(),
            default_zoom: default_zoom(),
            device_pixel_ratio: default_device_pixel_ratio(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Pull out-of-range values back into range
    fn clamp(&mut self) {
        self.horizontal_padding = non_negative_or(self.horizontal_padding, default_horizontal_padding());
        self.min_pixel_density = if self.min_pixel_density.is_finite() {
            self.min_pixel_density.clamp(1.0, 8.0)
        } else {
            default_min_pixel_density()
        };
        self.visibility_band = if self.visibility_band.is_finite() {
            self.visibility_band.clamp(0.0, 0.45)
        } else {
            default_visibility_band()
        };
        self.container_padding = non_negative_or(self.container_padding, default_container_padding());
        self.page_gap = non_negative_or(self.page_gap, default_page_gap());
        self.default_zoom = Zoom::clamp_percent(self.default_zoom);
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            self.device_pixel_ratio = default_device_pixel_ratio();
        }
        if log::LevelFilter::from_str(&self.log_level).is_err() {
            warn!("Unknown log level {:?}, using info", self.log_level);
            self.log_level = default_log_level();
        }
    }

    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            horizontal_padding: self.horizontal_padding,
            min_pixel_density: self.min_pixel_density,
            visibility_band: self.visibility_band,
            container_padding: self.container_padding,
            page_gap: self.page_gap,
            default_zoom: self.default_zoom,
            device_pixel_ratio: self.device_pixel_ratio,
        }
    }

    #[must_use]
    pub fn log_level_filter(&self) -> log::LevelFilter {
        log::LevelFilter::from_str(&self.log_level).unwrap_or(log::LevelFilter::Info)
    }
}

fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { fallback }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `path` (or the default location), creating the file with
/// defaults when it does not exist. Problems are logged and defaults are used.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path.map(Path::to_path_buf).or_else(preferred_config_path) else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };

    if path.exists() {
        match read_settings(&path) {
            Ok(settings) => settings,
            Err(e) => {
                error!("{e}");
                Settings::default()
            }
        }
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        if let Err(e) = write_settings(&settings, &path) {
            error!("{e}");
        }
        settings
    }
}

/// Read and validate a settings file
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings =
        serde_yaml::from_str::<Settings>(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        if let Err(e) = write_settings(&settings, path) {
            error!("{e}");
        }
    }

    settings.clamp();
    Ok(settings)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn write_settings(settings: &Settings, path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, generate_settings_yaml(settings)).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Page layout, in CSS pixels\n");
    content.push_str(&format!("horizontal_padding: {:?}\n", settings.horizontal_padding));
    content.push_str(&format!("container_padding: {:?}\n", settings.container_padding));
    content.push_str(&format!("page_gap: {:?}\n", settings.page_gap));
    content.push('\n');
    content.push_str("# Rendering\n");
    content.push_str(&format!("min_pixel_density: {:?}  # 1 - 8\n", settings.min_pixel_density));
    content.push_str(&format!("device_pixel_ratio: {:?}\n", settings.device_pixel_ratio));
    content.push_str(&format!("default_zoom: {}  # 50 - 200\n", settings.default_zoom));
    content.push('\n');
    content.push_str("# Share of the viewport ignored at top and bottom for the current page\n");
    content.push_str(&format!("visibility_band: {:?}\n", settings.visibility_band));
    content.push('\n');
    content.push_str(&format!("log_level: \"{}\"  # off, error, warn, info, debug, trace\n", settings.log_level));

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn written_settings_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);

        let settings = Settings {
            page_gap: 8.0,
            default_zoom: 150,
            log_level: "debug".to_string(),
            ..Settings::default()
        };
        write_settings(&settings, &path).unwrap();

        assert_eq!(read_settings(&path).unwrap(), settings);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 1\npage_gap: 4\n").unwrap();

        let settings = read_settings(&path).unwrap();
        assert_eq!(settings.page_gap, 4.0);
        assert_eq!(settings.horizontal_padding, 48.0);
        assert_eq!(settings.min_pixel_density, 4.0);
        assert_eq!(settings.default_zoom, 100);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(
            &path,
            "version: 1\ndefault_zoom: 900\nvisibility_band: 0.9\nmin_pixel_density: 0.5\ndevice_pixel_ratio: -2\nlog_level: loud\n",
        )
        .unwrap();

        let settings = read_settings(&path).unwrap();
        assert_eq!(settings.default_zoom, 200);
        assert_eq!(settings.visibility_band, 0.45);
        assert_eq!(settings.min_pixel_density, 1.0);
        assert_eq!(settings.device_pixel_ratio, 1.0);
        assert_eq!(settings.log_level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "page_gap: [not, a, number]\n").unwrap();

        assert!(matches!(read_settings(&path), Err(SettingsError::Parse { .. })));
        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("typeset-preview").join(SETTINGS_FILENAME);

        let settings = load_settings(Some(&path));
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(read_settings(&path).unwrap(), Settings::default());
    }

    #[test]
    fn engine_config_mirrors_settings() {
        let settings = Settings {
            container_padding: 10.0,
            ..Settings::default()
        };
        let config = settings.engine_config();
        assert_eq!(config.container_padding, 10.0);
        assert_eq!(config.min_pixel_density, 4.0);
    }
}
