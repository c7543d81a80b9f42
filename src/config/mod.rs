//! Process configuration.
//!
//! Read once at startup, immutable afterwards. Sources, later wins:
//! 1. Built-in defaults
//! 2. TOML file (explicit path, else `<config dir>/research-core/config.toml`)
//! 3. Environment variables (`AUTH_*`, `REPORT_*`)

pub mod schema;

pub use schema::{AuthConfig, Config, StorageConfig, DEFAULT_SECRET_KEY};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

impl Config {
    /// Load configuration from `path` (or the default location when `None`)
    /// and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut config = match file {
            Some(ref p) => Self::from_file(p)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.expand_paths()?;

        if config.auth.enabled && config.auth.uses_default_secret() {
            tracing::warn!(
                "Auth is enabled with the built-in signing secret; set AUTH_SECRET_KEY"
            );
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse TOML, warning about (not rejecting) unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(raw)?;
        let config = serde_ignored::deserialize(value, |path| {
            tracing::warn!("Ignoring unknown config key: {path}");
        })?;
        Ok(config)
    }

    /// Apply `AUTH_*` / `REPORT_*` overrides obtained through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AUTH_SECRET_KEY") {
            self.auth.secret_key = v;
        }
        if let Some(v) = lookup("AUTH_TOKEN_EXPIRE_HOURS") {
            self.auth.token_expire_hours = parse_env("AUTH_TOKEN_EXPIRE_HOURS", &v)?;
        }
        if let Some(v) = lookup("AUTH_ENABLED") {
            self.auth.enabled = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("AUTH_USERS") {
            self.auth.users = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("AUTH_MAX_ATTEMPTS") {
            self.auth.max_attempts = parse_env("AUTH_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("AUTH_LOCKOUT_SECONDS") {
            self.auth.lockout_seconds = parse_env("AUTH_LOCKOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("REPORT_STORE_PATH") {
            self.storage.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("REPORT_LEGACY_PATH") {
            self.storage.legacy_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("REPORT_LOCK_TIMEOUT_SECS") {
            self.storage.lock_timeout_secs = parse_env("REPORT_LOCK_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    /// Expand `~` and `$VAR` in storage paths.
    pub fn expand_paths(&mut self) -> Result<()> {
        self.storage.path = expand_path(&self.storage.path)?;
        if let Some(ref legacy) = self.storage.legacy_path {
            self.storage.legacy_path = Some(expand_path(legacy)?);
        }
        Ok(())
    }

    /// Copy safe to print: the signing secret and passwords are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.auth.secret_key = "***".into();
        copy.auth.users = copy
            .auth
            .users
            .iter()
            .map(|entry| match entry.split_once(':') {
                Some((user, _)) => format!("{}:***", user.trim()),
                None => "***".into(),
            })
            .collect();
        copy
    }

    /// JSON schema of the configuration file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Config)).unwrap_or_default()
    }
}

/// `<config dir>/config.toml` as reported by the platform.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "research-core")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: {value:?}"))
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
