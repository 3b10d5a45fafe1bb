use std::{fs, io, path::Path, time::Duration};

use shared::domain::DurationInSeconds;
use thiserror::Error;
use url::Url;

pub const SETTINGS_FILE: &str = "dashboard.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub default_duration_secs: i64,
    /// Zero disables periodic refresh.
    pub refresh_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:20001/kiali".into(),
            request_timeout_secs: 30,
            default_duration_secs: 600,
            refresh_interval_secs: 15,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn default_duration(&self) -> DurationInSeconds {
        DurationInSeconds(self.default_duration_secs)
    }

    /// Applies a flat `key = value` table.
    pub fn apply_file(&mut self, raw: &str, path: &str) -> Result<(), ConfigError> {
        let table: toml::Table = raw.parse().map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;

        for (key, value) in &table {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                other => other.to_string(),
            };
            self.set(key, &value)?;
        }
        Ok(())
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let overrides = [
            ("DASHBOARD_SERVER_URL", "server_url"),
            ("APP__SERVER_URL", "server_url"),
            ("APP__REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
            ("APP__DEFAULT_DURATION_SECS", "default_duration_secs"),
            ("APP__REFRESH_INTERVAL_SECS", "refresh_interval_secs"),
        ];
        for (var, key) in overrides {
            if let Some(value) = lookup(var) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "server_url" => {
                let normalized = normalize_server_url(value);
                Url::parse(&normalized).map_err(|_| invalid())?;
                self.server_url = normalized;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value.trim().parse().map_err(|_| invalid())?
            }
            "default_duration_secs" => {
                let parsed: i64 = value.trim().parse().map_err(|_| invalid())?;
                if parsed <= 0 {
                    return Err(invalid());
                }
                self.default_duration_secs = parsed;
            }
            "refresh_interval_secs" => {
                self.refresh_interval_secs = value.trim().parse().map_err(|_| invalid())?
            }
            other => tracing::debug!(key = other, "ignoring unknown settings key"),
        }
        Ok(())
    }
}

/// Defaults, then `dashboard.toml` in the working directory, then environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(Path::new(SETTINGS_FILE), |var| std::env::var(var).ok())
}

pub fn load_settings_from(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    let display = path.display().to_string();

    match fs::read_to_string(path) {
        Ok(raw) => settings.apply_file(&raw, &display)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::Read {
                path: display,
                source,
            })
        }
    }

    settings.apply_env(lookup)?;
    Ok(settings)
}

pub fn normalize_server_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Settings::default().server_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
