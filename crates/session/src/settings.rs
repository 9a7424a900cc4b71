use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Login form state persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginSettings {
    pub server_url: String,
    pub username: String,
    pub remember_server: bool,
    pub remember_username: bool,
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "settings io error: {err}"),
            SettingsError::Parse(err) => write!(f, "settings parse error: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Parse(err)
    }
}

impl LoginSettings {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the settings; server URL and username are only persisted when
    /// remembered.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let mut persisted = self.clone();
        if !persisted.remember_server {
            persisted.server_url.clear();
        }
        if !persisted.remember_username {
            persisted.username.clear();
        }
        std::fs::write(path, serde_json::to_string_pretty(&persisted)?)?;
        Ok(())
    }

    /// Applies `VIEWER_SERVER_URL` / `VIEWER_USERNAME` when set.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("VIEWER_SERVER_URL").filter(|v| !v.is_empty()) {
            self.server_url = url;
        }
        if let Some(user) = lookup("VIEWER_USERNAME").filter(|v| !v.is_empty()) {
            self.username = user;
        }
    }
}
