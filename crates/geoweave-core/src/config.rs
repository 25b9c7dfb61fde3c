use crate::error::{GeoweaveError, Result};
use crate::models::{SpatialReference, TimeInterval, TimeStep};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3030/api";
pub const DEFAULT_STORAGE_DEBOUNCE_MS: u64 = 1500;
pub const DEFAULT_PROJECT_NAME: &str = "Default";
pub const DEFAULT_PROJECT_TIME: &str = "2000-01-01T00:00:00Z";
pub const DEFAULT_PROJECT_TIME_STEP: &str = "1 month";
pub const DEFAULT_PROJECT_PROJECTION: &str = "EPSG:4326";

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for Geoweave
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub api_url: ConfigValue<String>,
    pub storage_debounce_ms: ConfigValue<u64>,
    pub project_name: ConfigValue<String>,
    pub project_time: ConfigValue<TimeInterval>,
    pub project_time_step: ConfigValue<TimeStep>,
    pub project_projection: ConfigValue<SpatialReference>,
    pub allow_time_ranges: ConfigValue<bool>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            api_url: ConfigValue::new(DEFAULT_API_URL.to_string(), ConfigSource::Default),
            storage_debounce_ms: ConfigValue::new(
                DEFAULT_STORAGE_DEBOUNCE_MS,
                ConfigSource::Default,
            ),
            project_name: ConfigValue::new(
                DEFAULT_PROJECT_NAME.to_string(),
                ConfigSource::Default,
            ),
            project_time: ConfigValue::new(
                parse_project_time(DEFAULT_PROJECT_TIME).unwrap_or_else(|_| {
                    TimeInterval::instant(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH)
                }),
                ConfigSource::Default,
            ),
            project_time_step: ConfigValue::new(
                TimeStep::from_config(DEFAULT_PROJECT_TIME_STEP),
                ConfigSource::Default,
            ),
            project_projection: ConfigValue::new(
                parse_projection(DEFAULT_PROJECT_PROJECTION)
                    .unwrap_or_else(|_| SpatialReference::wgs84()),
                ConfigSource::Default,
            ),
            allow_time_ranges: ConfigValue::new(true, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| GeoweaveError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| GeoweaveError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(api_url) = file_config.api_url {
            self.api_url.update(api_url, ConfigSource::File);
        }

        if let Some(debounce) = file_config.storage_debounce_ms {
            self.storage_debounce_ms.update(debounce, ConfigSource::File);
        }

        if let Some(name) = file_config.project_name {
            self.project_name.update(name, ConfigSource::File);
        }

        if let Some(time) = file_config.project_time {
            let time = parse_project_time(&time)?;
            self.project_time.update(time, ConfigSource::File);
        }

        if let Some(step) = file_config.project_time_step {
            self.project_time_step
                .update(TimeStep::from_config(&step), ConfigSource::File);
        }

        if let Some(projection) = file_config.project_projection {
            let projection = parse_projection(&projection)?;
            self.project_projection.update(projection, ConfigSource::File);
        }

        if let Some(allow) = file_config.allow_time_ranges {
            self.allow_time_ranges.update(allow, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // GEOWEAVE_API_URL
        if let Ok(api_url) = env::var("GEOWEAVE_API_URL") {
            self.api_url.update(api_url, ConfigSource::Environment);
        }

        // GEOWEAVE_STORAGE_DEBOUNCE_MS
        if let Ok(debounce_str) = env::var("GEOWEAVE_STORAGE_DEBOUNCE_MS") {
            match debounce_str.parse::<u64>() {
                Ok(debounce) => self
                    .storage_debounce_ms
                    .update(debounce, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_STORAGE_DEBOUNCE_MS value '{}': expected milliseconds",
                    debounce_str
                ),
            }
        }

        // GEOWEAVE_PROJECT_NAME
        if let Ok(name) = env::var("GEOWEAVE_PROJECT_NAME") {
            self.project_name.update(name, ConfigSource::Environment);
        }

        // GEOWEAVE_PROJECT_TIME
        if let Ok(time_str) = env::var("GEOWEAVE_PROJECT_TIME") {
            match parse_project_time(&time_str) {
                Ok(time) => self.project_time.update(time, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_PROJECT_TIME value '{}': expected an RFC 3339 timestamp",
                    time_str
                ),
            }
        }

        // GEOWEAVE_PROJECT_TIME_STEP
        if let Ok(step) = env::var("GEOWEAVE_PROJECT_TIME_STEP") {
            self.project_time_step
                .update(TimeStep::from_config(&step), ConfigSource::Environment);
        }

        // GEOWEAVE_PROJECT_PROJECTION
        if let Ok(projection_str) = env::var("GEOWEAVE_PROJECT_PROJECTION") {
            match parse_projection(&projection_str) {
                Ok(projection) => self
                    .project_projection
                    .update(projection, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_PROJECT_PROJECTION value '{}': expected AUTHORITY:CODE",
                    projection_str
                ),
            }
        }

        // GEOWEAVE_ALLOW_TIME_RANGES
        if let Ok(allow_str) = env::var("GEOWEAVE_ALLOW_TIME_RANGES") {
            match parse_bool(&allow_str) {
                Ok(allow) => self.allow_time_ranges.update(allow, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOWEAVE_ALLOW_TIME_RANGES value '{}': expected true or false",
                    allow_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(api_url) = overrides.api_url {
            self.api_url.update(api_url, ConfigSource::Cli);
        }

        if let Some(debounce) = overrides.storage_debounce_ms {
            self.storage_debounce_ms.update(debounce, ConfigSource::Cli);
        }

        if let Some(name) = overrides.project_name {
            self.project_name.update(name, ConfigSource::Cli);
        }

        if let Some(projection) = overrides.project_projection {
            self.project_projection.update(projection, ConfigSource::Cli);
        }
    }

    pub fn storage_debounce(&self) -> Duration {
        Duration::from_millis(self.storage_debounce_ms.value)
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert("api_url".to_string(), (self.api_url.value.clone(), self.api_url.source));

        map.insert(
            "storage_debounce_ms".to_string(),
            (self.storage_debounce_ms.value.to_string(), self.storage_debounce_ms.source),
        );

        map.insert(
            "project_name".to_string(),
            (self.project_name.value.clone(), self.project_name.source),
        );

        map.insert(
            "project_time".to_string(),
            (self.project_time.value.to_string(), self.project_time.source),
        );

        map.insert(
            "project_time_step".to_string(),
            (self.project_time_step.value.to_string(), self.project_time_step.source),
        );

        map.insert(
            "project_projection".to_string(),
            (self.project_projection.value.srs_string(), self.project_projection.source),
        );

        map.insert(
            "allow_time_ranges".to_string(),
            (self.allow_time_ranges.value.to_string(), self.allow_time_ranges.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    api_url: Option<String>,
    storage_debounce_ms: Option<u64>,
    project_name: Option<String>,
    project_time: Option<String>,
    project_time_step: Option<String>,
    project_projection: Option<String>,
    allow_time_ranges: Option<bool>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub api_url: Option<String>,
    pub storage_debounce_ms: Option<u64>,
    pub project_name: Option<String>,
    pub project_projection: Option<SpatialReference>,
}

/// Parse the default project time from an RFC 3339 timestamp
pub fn parse_project_time(s: &str) -> Result<TimeInterval> {
    TimeInterval::parse_instant(s).map_err(|_| GeoweaveError::ConfigInvalid {
        key: "project_time".to_string(),
        reason: format!("Invalid project time: {}. Use an RFC 3339 timestamp", s),
    })
}

/// Parse the default projection from `AUTHORITY:CODE`
pub fn parse_projection(s: &str) -> Result<SpatialReference> {
    s.parse().map_err(|_| GeoweaveError::ConfigInvalid {
        key: "project_projection".to_string(),
        reason: format!("Invalid projection: {}. Use AUTHORITY:CODE, e.g. EPSG:4326", s),
    })
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(GeoweaveError::ConfigInvalid {
            key: "allow_time_ranges".to_string(),
            reason: format!("Invalid boolean: {}", s),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeGranularity;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.storage_debounce_ms.value, 1500);
        assert_eq!(config.storage_debounce(), Duration::from_millis(1500));
        assert_eq!(config.project_name.value, "Default");
        assert_eq!(config.project_time_step.value, TimeStep::new(1, TimeGranularity::Months));
        assert_eq!(config.project_projection.value, SpatialReference::wgs84());
        assert_eq!(config.project_time.value.to_string(), "2000-01-01T00:00:00+00:00");
        assert!(config.allow_time_ranges.value);
        assert_eq!(config.api_url.source, ConfigSource::Default);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_url = "https://geo.example.org/api"
storage_debounce_ms = 250
project_name = "Survey"
project_time = "2014-04-01T12:00:00Z"
project_time_step = "1 day"
project_projection = "EPSG:32632"
allow_time_ranges = false
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.api_url.value, "https://geo.example.org/api");
        assert_eq!(config.api_url.source, ConfigSource::File);
        assert_eq!(config.storage_debounce_ms.value, 250);
        assert_eq!(config.project_name.value, "Survey");
        assert_eq!(config.project_time_step.value, TimeStep::new(1, TimeGranularity::Days));
        assert_eq!(config.project_projection.value, SpatialReference::new("EPSG", 32632));
        assert!(!config.allow_time_ranges.value);
    }

    #[test]
    fn test_load_from_file_rejects_bad_projection() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"project_projection = "WGS84""#).unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(GeoweaveError::ConfigInvalid { key, .. }) if key == "project_projection"));
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        env::set_var("GEOWEAVE_STORAGE_DEBOUNCE_MS", "40");
        env::set_var("GEOWEAVE_PROJECT_PROJECTION", "not-a-projection");

        let config = LayeredConfig::with_defaults().load_from_env();

        env::remove_var("GEOWEAVE_STORAGE_DEBOUNCE_MS");
        env::remove_var("GEOWEAVE_PROJECT_PROJECTION");

        assert_eq!(config.storage_debounce_ms.value, 40);
        assert_eq!(config.storage_debounce_ms.source, ConfigSource::Environment);
        // invalid values are skipped
        assert_eq!(config.project_projection.value, SpatialReference::wgs84());
        assert_eq!(config.project_projection.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            api_url: Some("http://127.0.0.1:8080/api".to_string()),
            ..Default::default()
        });

        assert_eq!(config.api_url.value, "http://127.0.0.1:8080/api");
        assert_eq!(config.api_url.source, ConfigSource::Cli);
        assert_eq!(config.project_name.source, ConfigSource::Default);
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert_eq!(map.len(), 7);
        let (projection, source) = &map["project_projection"];
        assert_eq!(projection, "EPSG:4326");
        assert_eq!(*source, ConfigSource::Default);
        assert_eq!(map["project_time_step"].0, "1 month");
    }
}
