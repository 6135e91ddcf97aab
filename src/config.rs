//! Configuration file parser for ~/.config/fluxread/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! It holds connection and process-level options. Reader preferences that
//! the UI edits at runtime live in [`crate::settings`] instead.
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Env var holding the Miniflux API token. Wins over `api_token`.
pub const TOKEN_ENV: &str = "FLUXREAD_TOKEN";
/// Env var holding the Miniflux server URL. Wins over `server_url`.
pub const SERVER_ENV: &str = "FLUXREAD_SERVER";
/// Env var overriding `version_info_url`.
pub const VERSION_URL_ENV: &str = "FLUXREAD_VERSION_INFO_URL";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No server URL configured (set server_url in config.toml or {SERVER_ENV})")]
    MissingServer,

    #[error("No API token configured (set api_token in config.toml or {TOKEN_ENV})")]
    MissingToken,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `Debug` masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Miniflux server, e.g. `https://reader.example.com`.
    pub server_url: Option<String>,

    /// Miniflux API token (alternative to the FLUXREAD_TOKEN env var).
    pub api_token: Option<String>,

    /// Theme variant name. Empty means follow the `themeMode` setting.
    pub theme: String,

    /// How often unread counters are re-fetched. 0 disables the timer.
    pub counters_refresh_minutes: u64,

    /// How often the version check runs. 0 checks once at startup only.
    pub version_check_interval_minutes: u64,

    /// Where the published build metadata is fetched from. `None` uses the project default.
    pub version_info_url: Option<String>,

    /// Log every step of the version check at info level.
    pub version_check_debug: bool,

    /// Per-request timeout for the Miniflux client and AI providers.
    pub request_timeout_secs: u64,

    /// Custom keybinding overrides. Keys are action names, values are key strings.
    pub keybindings: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            api_token: None,
            theme: String::new(),
            counters_refresh_minutes: 5,
            version_check_interval_minutes: 60,
            version_info_url: None,
            version_check_debug: false,
            request_timeout_secs: 30,
            keybindings: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("theme", &self.theme)
            .field("counters_refresh_minutes", &self.counters_refresh_minutes)
            .field(
                "version_check_interval_minutes",
                &self.version_check_interval_minutes,
            )
            .field("version_info_url", &self.version_info_url)
            .field("version_check_debug", &self.version_check_debug)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("keybindings", &self.keybindings)
            .finish()
    }
}

/// Server URL and token after env overrides are applied.
pub struct Connection {
    pub server_url: String,
    pub token: SecretString,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "server_url",
        "api_token",
        "theme",
        "counters_refresh_minutes",
        "version_check_interval_minutes",
        "version_info_url",
        "version_check_debug",
        "request_timeout_secs",
        "keybindings",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parses config TOML. Blank input yields defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            server = config.server_url.as_deref().unwrap_or("<unset>"),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Resolves server and token, letting `env` override file values.
    ///
    /// `env` is a lookup so tests do not depend on the process environment.
    pub fn connection(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Connection, ConfigError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let server_url = non_empty(env(SERVER_ENV))
            .or_else(|| non_empty(self.server_url.clone()))
            .ok_or(ConfigError::MissingServer)?;
        let token = non_empty(env(TOKEN_ENV))
            .or_else(|| non_empty(self.api_token.clone()))
            .ok_or(ConfigError::MissingToken)?;

        Ok(Connection {
            server_url,
            token: SecretString::from(token),
        })
    }

    /// Version metadata URL, env first.
    pub fn version_url(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(VERSION_URL_ENV)
            .or_else(|| self.version_info_url.clone())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.server_url.is_none());
        assert_eq!(config.counters_refresh_minutes, 5);
        assert_eq!(config.version_check_interval_minutes, 60);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.keybindings.is_empty());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/fluxread_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("fluxread_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
server_url = "https://reader.example.com"
api_token = "tok-123"
theme = "light"
counters_refresh_minutes = 2
version_info_url = "https://example.com/version.json"
version_check_debug = true

[keybindings]
quit = "Ctrl+q"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server_url.as_deref(), Some("https://reader.example.com"));
        assert_eq!(config.theme, "light");
        assert_eq!(config.counters_refresh_minutes, 2);
        assert!(config.version_check_debug);
        assert_eq!(
            config.keybindings.get("quit").map(String::as_str),
            Some("Ctrl+q")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("theme = \"dark\"\nmystery = 1\n").unwrap();
        assert_eq!(config.theme, "dark");
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("fluxread_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides_file() {
        let config = Config::parse(
            "server_url = \"https://file.example.com\"\napi_token = \"file-token\"\n",
        )
        .unwrap();

        let env = |key: &str| (key == TOKEN_ENV).then(|| "env-token".to_string());
        let conn = config.connection(env).unwrap();
        assert_eq!(conn.server_url, "https://file.example.com");
        assert_eq!(conn.token.expose_secret(), "env-token");
    }

    #[test]
    fn test_missing_connection_fields() {
        let config = Config::default();
        assert!(matches!(
            config.connection(no_env),
            Err(ConfigError::MissingServer)
        ));

        let config = Config::parse("server_url = \"https://x.example.com\"\napi_token = \"  \"\n")
            .unwrap();
        assert!(matches!(
            config.connection(no_env),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-key-12345".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-key-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
