/**
 * ============================================================================
 * SESSION CONFIG MODULE
 * ============================================================================
 *
 * PURPOSE: Configuration persistence for the session writer
 *
 * FUNCTIONALITY:
 * - Load/save writer configuration as JSON
 * - Default configuration when none exists
 * - Validation before a writer is built from it
 *
 * Session length and buffer count are fixed for the lifetime of a writer;
 * changing them means building a new one.
 *
 * ============================================================================
 */

use crate::session::buffers::BufferPool;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Default session length: 5 minutes
pub const SESSION_LENGTH_SECONDS: u64 = 300;

// Shortest session length accepted by validate()
pub const MIN_SESSION_LENGTH_SECONDS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    // Root under which per-session telemetry cache directories are created
    pub cache_root: PathBuf,

    // Directory holding the rotating video buffers
    pub buffer_dir: PathBuf,

    // Number of video buffers in the rotation
    pub buffer_count: usize,

    #[serde(default = "default_buffer_prefix")]
    pub buffer_prefix: String,

    #[serde(default = "default_buffer_extension")]
    pub buffer_extension: String,

    // Length of each session (seconds)
    #[serde(default = "default_session_length")]
    pub session_length_seconds: u64,

    // Cache directories older than this are removed after each session.
    // None keeps everything.
    #[serde(default)]
    pub cache_retention_days: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let base = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("session-writer");

        Self {
            cache_root: base.join("telemetry"),
            buffer_dir: base.join("video"),
            buffer_count: 3,
            buffer_prefix: default_buffer_prefix(),
            buffer_extension: default_buffer_extension(),
            session_length_seconds: default_session_length(),
            cache_retention_days: None,
        }
    }
}

fn default_buffer_prefix() -> String {
    "buffer_".to_string()
}

fn default_buffer_extension() -> String {
    "mp4".to_string()
}

fn default_session_length() -> u64 {
    SESSION_LENGTH_SECONDS
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_count == 0 {
            return Err("Buffer count must be at least 1".to_string());
        }

        if self.session_length_seconds < MIN_SESSION_LENGTH_SECONDS {
            return Err(format!(
                "Session length must be at least {} seconds",
                MIN_SESSION_LENGTH_SECONDS
            ));
        }

        if self.cache_retention_days == Some(0) {
            return Err("Cache retention must be at least 1 day".to_string());
        }

        if self.cache_root.as_os_str().is_empty() {
            return Err("Cache root must not be empty".to_string());
        }

        Ok(())
    }

    pub fn session_length(&self) -> Duration {
        Duration::from_secs(self.session_length_seconds)
    }

    pub fn buffer_pool(&self) -> Result<BufferPool, String> {
        let count = NonZeroUsize::new(self.buffer_count)
            .ok_or_else(|| "Buffer count must be at least 1".to_string())?;

        Ok(BufferPool::new(
            self.buffer_dir.clone(),
            self.buffer_prefix.clone(),
            self.buffer_extension.clone(),
            count,
        ))
    }
}

// Load configuration from disk
pub fn load_config(path: &Path) -> Result<SessionConfig, String> {
    if !path.exists() {
        log::info!("No session config found at {:?}, using defaults", path);
        return Ok(SessionConfig::default());
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: SessionConfig =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))?;

    config.validate()?;

    log::info!("Loaded session config from {:?}", path);
    Ok(config)
}

// Save configuration to disk
pub fn save_config(path: &Path, config: &SessionConfig) -> Result<(), String> {
    // Ensure directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config dir: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(path, contents).map_err(|e| format!("Failed to write config: {}", e))?;

    log::info!("Saved session config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.session_length_seconds, 300);
        assert_eq!(config.session_length(), Duration::from_secs(300));
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.buffer_extension, "mp4");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = SessionConfig::default();
        config.buffer_count = 0;
        assert!(config.validate().is_err());
        assert!(config.buffer_pool().is_err());

        let mut config = SessionConfig::default();
        config.session_length_seconds = 5;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.cache_retention_days = Some(0);
        assert!(config.validate().is_err());
        config.cache_retention_days = Some(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config(&tmp.path().join("missing.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("session_config.json");

        let mut config = SessionConfig::default();
        config.buffer_count = 5;
        config.cache_retention_days = Some(2);
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{"cache_root":"/c","buffer_dir":"/v","buffer_count":2}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.session_length_seconds, SESSION_LENGTH_SECONDS);
        assert_eq!(config.buffer_prefix, "buffer_");
        assert_eq!(config.cache_retention_days, None);

        let pool = config.buffer_pool().unwrap();
        assert_eq!(pool.current(), PathBuf::from("/v/buffer_0.mp4"));
    }
}
