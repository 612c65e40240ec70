//! Settings for the urlmap engine.
//!
//! Route configuration itself is programmatic (urlconf trees built in code);
//! the settings here cover the ambient concerns: debug mode and log level.
//! [`SETTINGS`] is the globally-accessible, configure-once instance.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{UrlmapError, UrlmapResult};

/// Engine settings.
///
/// # Examples
///
/// ```
/// use urlmap_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.log_level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether debug mode is enabled. Controls the logging output format.
    pub debug: bool,
    /// The log level filter (e.g. "debug", "info", "warn", "error").
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML string. Fields not present in the TOML
    /// keep their default values.
    ///
    /// # Errors
    ///
    /// Returns [`UrlmapError::ImproperlyConfigured`] if the TOML is malformed.
    pub fn from_toml_str(toml_str: &str) -> UrlmapResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| UrlmapError::ImproperlyConfigured(format!("Invalid settings TOML: {e}")))
    }

    /// Loads settings from a JSON string. Fields not present in the JSON
    /// keep their default values.
    ///
    /// # Errors
    ///
    /// Returns [`UrlmapError::ImproperlyConfigured`] if the JSON is malformed.
    pub fn from_json_str(json_str: &str) -> UrlmapResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| UrlmapError::ImproperlyConfigured(format!("Invalid settings JSON: {e}")))
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> UrlmapResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }
}

/// A lazily-initialized, configure-once settings holder.
///
/// Call [`configure`](LazySettings::configure) once at startup; afterwards
/// [`get`](LazySettings::get) returns the configured settings. If settings
/// were never configured, [`get`](LazySettings::get) falls back to the
/// defaults rather than panicking, since every default is usable.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Sets the global settings. Later calls are ignored; the first
    /// configuration wins.
    pub fn configure(&self, settings: Settings) {
        let _ = self.inner.set(settings);
    }

    /// Returns the configured settings, or the defaults if unconfigured.
    pub fn get(&self) -> &Settings {
        self.inner.get_or_init(Settings::default)
    }

    /// Returns `true` if [`configure`](Self::configure) has been called.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();
