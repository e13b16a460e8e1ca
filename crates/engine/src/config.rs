use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use classify::Classifier;
use fetch::{FetchOptions, HttpSource};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidEnv { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config io error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::InvalidEnv { key, value } => {
                write!(f, "invalid value {value:?} for environment variable {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::InvalidEnv { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Engine tuning shared by every visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiescence window before a fetch is issued (ms).
    pub debounce_ms: u64,

    /// Quiescence window before the viewport filter is recomputed (ms).
    pub viewport_debounce_ms: u64,

    /// Pointer hit distance for points and lines (meters).
    pub selection_threshold_m: f64,

    /// Significant figures kept when rounding bins.
    pub significant_figures: u32,

    /// Default continuous bin count.
    pub continuous_bins: usize,

    /// Default diverging breaks on each side of zero.
    pub diverging_breaks: usize,

    /// Base URL of the HTTP data source.
    pub base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 400,
            viewport_debounce_ms: 200,
            selection_threshold_m: 50.0,
            significant_figures: 2,
            continuous_bins: 8,
            diverging_breaks: 3,
            base_url: None,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Override fields from `VIZBIND_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| env::var(key).ok())
    }

    /// Override fields from any variable lookup; unset variables are ignored.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let lookup = &lookup;
        if let Some(v) = env_var_u64(lookup, "VIZBIND_DEBOUNCE_MS")? {
            self.debounce_ms = v;
        }
        if let Some(v) = env_var_u64(lookup, "VIZBIND_VIEWPORT_DEBOUNCE_MS")? {
            self.viewport_debounce_ms = v;
        }
        if let Some(v) = env_var_f64(lookup, "VIZBIND_SELECTION_THRESHOLD_M")? {
            self.selection_threshold_m = v;
        }
        if let Some(v) = env_var_u32(lookup, "VIZBIND_SIGNIFICANT_FIGURES")? {
            self.significant_figures = v;
        }
        if let Some(v) = lookup("VIZBIND_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = Some(v);
        }
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            viewport_debounce: Duration::from_millis(self.viewport_debounce_ms),
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier {
            significant_figures: self.significant_figures,
            continuous_bins: self.continuous_bins,
            diverging_breaks: self.diverging_breaks,
        }
    }

    /// An HTTP source for `base_url`, if one is configured.
    pub fn http_source(&self) -> Option<HttpSource> {
        self.base_url.as_deref().map(HttpSource::new)
    }
}

fn env_var<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw,
        })
}

fn env_var_u64(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, ConfigError> {
    env_var(lookup, key)
}

fn env_var_u32(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>, ConfigError> {
    env_var(lookup, key)
}

fn env_var_f64(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<f64>, ConfigError> {
    let value: Option<f64> = env_var(lookup, key)?;
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: v.to_string(),
        }),
        other => Ok(other),
    }
}
