use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths;
use crate::session::UserIdentity;

/// How long a transient validation error stays visible.
pub const DEFAULT_ERROR_DISPLAY_MS: u64 = 3000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default = "default_error_display_ms")]
    pub error_display_ms: u64,
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

const CONFIG_FILE_PATH: &str = "config.toml";

fn default_error_display_ms() -> u64 {
    DEFAULT_ERROR_DISPLAY_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            user_id: None,
            user_name: None,
            user_email: None,
            error_display_ms: DEFAULT_ERROR_DISPLAY_MS,
            storage_path: None,
        }
    }
}

impl ClientConfig {
    /// Load from ~/.chatmate/config.json, falling back to ./config.toml,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let mut config =
            Self::from_files(&paths::config_json_path(), Path::new(CONFIG_FILE_PATH));
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn from_files(json_path: &Path, toml_path: &Path) -> Self {
        if json_path.exists() {
            match paths::load_config_json::<ClientConfig>(json_path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %json_path.display(), "Ignoring config: {}", e),
            }
        }

        if toml_path.exists() {
            if let Ok(content) = std::fs::read_to_string(toml_path) {
                match toml::from_str::<ClientConfig>(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!(path = %toml_path.display(), "Ignoring config: {}", e)
                    }
                }
            }
        }

        Self::default()
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("CHAT_API_BASE") {
            self.api_base = Some(api_base);
        }
        if let Some(user_id) = lookup("CHAT_USER_ID") {
            self.user_id = Some(user_id);
        }
        if let Some(user_name) = lookup("CHAT_USER_NAME") {
            self.user_name = Some(user_name);
        }
        if let Some(user_email) = lookup("CHAT_USER_EMAIL") {
            self.user_email = Some(user_email);
        }
        if let Some(ms) = lookup("CHAT_ERROR_DISPLAY_MS").and_then(|v| v.trim().parse().ok()) {
            self.error_display_ms = ms;
        }
    }

    /// The configured user, if an id is known.
    pub fn user(&self) -> Option<UserIdentity> {
        let id = self.user_id.as_ref().filter(|id| !id.trim().is_empty())?;
        Some(UserIdentity {
            id: id.clone(),
            full_name: self.user_name.clone(),
            email: self.user_email.clone(),
        })
    }

    pub fn error_display_duration(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(paths::state_json_path)
    }
}
