use std::path::{Path, PathBuf};

/// Chatmate data directory (~/.chatmate)
pub fn chatmate_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".chatmate")
}

/// config.json path
pub fn config_json_path() -> PathBuf {
    chatmate_dir().join("config.json")
}

/// Default file for the persisted `sessionId` / `chatHistory` keys
pub fn state_json_path() -> PathBuf {
    chatmate_dir().join("state.json")
}

/// Load a JSON config file
pub fn load_config_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()));
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read config: {e}"))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {e}"))
}
