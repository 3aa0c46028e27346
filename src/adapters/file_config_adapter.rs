//! INI run configuration backed by `configparser`.
//!
//! Sections are `[data]`, `[compute]` and `[output]`. Values are trimmed;
//! malformed numbers and booleans read as absent and are reported by
//! `validate_config`.

use std::path::Path;

use configparser::ini::Ini;
use tracing::warn;

use crate::domain::error::ShadowfolioError;
use crate::ports::config_port::ConfigPort;

pub const KNOWN_SECTIONS: &[&str] = &["data", "compute", "output"];

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ShadowfolioError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| ShadowfolioError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self::with_ini(config))
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self::with_ini(config))
    }

    fn with_ini(config: Ini) -> Self {
        let adapter = Self { config };
        for section in adapter.unknown_sections() {
            warn!(section = %section, "ignoring unknown config section");
        }
        adapter
    }

    /// Sections other than [`KNOWN_SECTIONS`], sorted.
    pub fn unknown_sections(&self) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .config
            .sections()
            .into_iter()
            .filter(|s| !KNOWN_SECTIONS.contains(&s.as_str()))
            .collect();
        unknown.sort();
        unknown
    }

    fn value(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).map(|v| v.trim().to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.value(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.value(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.value(section, key)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default)
    }
}
