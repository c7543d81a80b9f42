use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Signing secret used when none is configured. Fine for local development,
/// never for a deployment with auth enabled.
pub const DEFAULT_SECRET_KEY: &str = "research-core-default-secret-change-me";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a valid session token on protected operations.
    pub enabled: bool,
    /// HMAC key for token signatures.
    pub secret_key: String,
    /// Token lifetime in hours.
    pub token_expire_hours: u64,
    /// Preset accounts as `username:password` entries.
    pub users: Vec<String>,
    /// Failed logins tolerated per origin inside the lockout window (0 disables).
    pub max_attempts: u32,
    /// Sliding lockout window in seconds.
    pub lockout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: DEFAULT_SECRET_KEY.into(),
            token_expire_hours: 24,
            users: vec!["admin:admin123".into()],
            max_attempts: 5,
            lockout_seconds: 900,
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. A `.json` path means "legacy snapshot here,
    /// database next to it with a `.db` extension".
    pub path: PathBuf,
    /// Legacy JSON snapshot to import once.
    pub legacy_path: Option<PathBuf>,
    /// Upper bound on waiting for the store gate or the SQLite lock.
    pub lock_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/reports.db"),
            legacy_path: None,
            lock_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Resolve the database path and optional legacy snapshot path.
    pub fn resolved_paths(&self) -> (PathBuf, Option<PathBuf>) {
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        match (&self.legacy_path, is_json) {
            (Some(legacy), true) => (self.path.with_extension("db"), Some(legacy.clone())),
            (Some(legacy), false) => (self.path.clone(), Some(legacy.clone())),
            (None, true) => (self.path.with_extension("db"), Some(self.path.clone())),
            (None, false) => (self.path.clone(), None),
        }
    }
}
