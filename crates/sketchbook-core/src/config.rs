//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Sketchbook client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal: Option<RevealConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket URL; `{room}` is replaced with the room id.
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Display name sent after joining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
}

fn default_server_url() -> String {
    "ws://127.0.0.1:8000/ws/room/{room}".into()
}

impl ServerConfig {
    pub fn room_url(&self, room: &str) -> String {
        self.url.replace("{room}", room)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the archive is saved into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Per-image fetch timeout in milliseconds (default: 30000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevealConfig {
    /// Delay between consecutive reveals in milliseconds (default: 2000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "sketchbook_core=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "plain".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::SketchbookError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        json5::from_str(&substituted)
            .map_err(|e| crate::error::SketchbookError::Config(e.to_string()))
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_else(|| ServerConfig {
            url: default_server_url(),
            player_name: None,
        })
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export
            .as_ref()
            .and_then(|e| e.dir.as_ref())
            .map(PathBuf::from)
            .or_else(dirs::download_dir)
            .unwrap_or_else(data_dir)
    }

    pub fn export_file_name(&self) -> String {
        self.export
            .as_ref()
            .and_then(|e| e.file_name.clone())
            .unwrap_or_else(|| "images.zip".to_string())
    }

    pub fn fetch_timeout(&self) -> Duration {
        let ms = self
            .export
            .as_ref()
            .and_then(|e| e.fetch_timeout_ms)
            .unwrap_or(30_000);
        Duration::from_millis(ms)
    }

    pub fn reveal_interval(&self) -> Duration {
        self.reveal
            .as_ref()
            .and_then(|r| r.interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(crate::reveal::REVEAL_INTERVAL)
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(server) = &self.server {
            if !server.url.starts_with("ws://") && !server.url.starts_with("wss://") {
                errors.push(format!(
                    "Server URL must use ws:// or wss://: {}",
                    server.url
                ));
            }
            if !server.url.contains("{room}") {
                warnings.push("Server URL has no {room} placeholder".to_string());
            }
        }

        if let Some(export) = &self.export {
            if export.fetch_timeout_ms == Some(0) {
                errors.push("Export fetch timeout cannot be 0".to_string());
            }
            if let Some(name) = &export.file_name {
                if name.contains('/') || name.contains('\\') {
                    errors.push(format!("Export file name must not contain a path: {name}"));
                }
            }
        }

        if let Some(logging) = &self.logging {
            if logging.format != "plain" && logging.format != "json" {
                warnings.push(format!(
                    "Unknown log format '{}', falling back to plain",
                    logging.format
                ));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Sketchbook data: `~/.sketchbook/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sketchbook")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_SKB_HOST", "game.example") };
        let input = r#"{"url": "wss://${TEST_SKB_HOST}/ws", "other": "plain"}"#;
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("wss://game.example/ws"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_SKB_HOST") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_SKB_TEST}"}"#;
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export_file_name(), "images.zip");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.reveal_interval(), Duration::from_secs(2));
        assert_eq!(
            config.server().room_url("42"),
            "ws://127.0.0.1:8000/ws/room/42"
        );
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                server: { url: "wss://play.example/room/{room}/" },
                export: { dir: "/tmp/out", fetch_timeout_ms: 500 },
                reveal: { interval_ms: 250 },
            }"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server().room_url("7"), "wss://play.example/room/7/");
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/out"));
        assert_eq!(config.fetch_timeout(), Duration::from_millis(500));
        assert_eq!(config.reveal_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/sketchbook/config.json")).unwrap();
        assert!(config.server.is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate() {
        let config = Config {
            server: Some(ServerConfig {
                url: "http://nope".into(),
                player_name: None,
            }),
            export: Some(ExportConfig {
                dir: None,
                file_name: Some("../x.zip".into()),
                fetch_timeout_ms: Some(0),
            }),
            ..Config::default()
        };
        let (warnings, errors) = config.validate();
        assert!(warnings.iter().any(|w| w.contains("{room}")));
        assert_eq!(errors.len(), 3, "got: {errors:?}");
    }
}
