use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::LaptraceError;

const CONFIG_DIR_NAME: &str = "laptrace";
const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
// Loading a session for the first time makes the server download it, which
// can take minutes.
const DEFAULT_REQUEST_TIMEOUT_S: u64 = 180;

/// One dropdown of the cascade and the endpoint that lists its options.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldConfig {
    pub id: String,
    pub label: String,
    pub endpoint: String,
    /// Query parameter name, defaults to `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Defaults to every field listed before this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    /// Display template for options, `{}` is replaced by the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_label: Option<String>,
}

impl FieldConfig {
    fn new(id: &str, label: &str, endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            endpoint: endpoint.to_string(),
            param: None,
            depends_on: None,
            option_label: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowSize {
    pub width: f32,
    pub height: f32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1200.,
            height: 900.,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub server_url: String,
    pub request_timeout_s: u64,
    pub fields: Vec<FieldConfig>,
    pub telemetry_endpoint: String,
    pub window_size: WindowSize,
    pub show_raw_json: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
            fields: vec![
                FieldConfig::new("year", "Year", "/years"),
                FieldConfig::new("gp", "Grand Prix", "/gps"),
                FieldConfig::new("session", "Session", "/sessions"),
                FieldConfig::new("driver", "Driver", "/drivers"),
                FieldConfig {
                    option_label: Some("Lap {}".to_string()),
                    ..FieldConfig::new("lap", "Lap", "/laps")
                },
            ],
            telemetry_endpoint: "/telemetry".to_string(),
            window_size: WindowSize::default(),
            show_raw_json: false,
        }
    }
}

impl ViewerConfig {
    pub fn default_path() -> Option<PathBuf> {
        Some(
            dirs::config_dir()?
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        )
    }

    /// Reads the config from the user's config directory, if there is one.
    pub fn from_local_file() -> Result<Option<Self>, LaptraceError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LaptraceError> {
        debug!("Reading config from {:?}", path);
        let file =
            std::fs::File::open(path).map_err(|e| LaptraceError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| LaptraceError::ConfigParseError {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn save(&self) -> Result<(), LaptraceError> {
        let config_path = Self::default_path().ok_or(LaptraceError::NoConfigDir)?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), LaptraceError> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| LaptraceError::ConfigIOError { source: e })?;
        }

        let file =
            std::fs::File::create(path).map_err(|e| LaptraceError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| LaptraceError::ConfigSerializeError { source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = ViewerConfig {
            server_url: "http://telemetry.local:8080".to_string(),
            show_raw_json: true,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(ViewerConfig::from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"server_url": "http://10.0.0.2:5000"}"#).unwrap();

        let config = ViewerConfig::from_path(&path).unwrap();
        assert_eq!(config.server_url, "http://10.0.0.2:5000");
        assert_eq!(config.fields.len(), 5);
        assert_eq!(config.telemetry_endpoint, "/telemetry");
    }

    #[test]
    fn test_invalid_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let err = ViewerConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, LaptraceError::ConfigParseError { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}
