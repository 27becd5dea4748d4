/*!
 * Configuration types for the cyber range
 *
 * Loaded once from `cyberrange.toml` (every field defaulted) and passed by
 * value into the components that need it. Nothing here is global.
 */

use crate::error::{RangeError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "cyberrange.toml";

/// Placeholder JWT secret used when none is configured
pub const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_CHANGE_ME_IN_PRODUCTION";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection to the GNS3-compatible emulation server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the server, e.g. `http://10.48.229.210:80`
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// API version path segment
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Upper bound for a whole request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Optional HTTP basic auth credentials
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            api_prefix: default_api_prefix(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            username: None,
            password: None,
        }
    }
}

impl BackendConfig {
    /// `<url>/<api_prefix>` without a trailing slash
    pub fn api_base(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Relational store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// HTTP server and token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Secret used to sign login tokens
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,

    /// Password for the admin account created when no users exist
    #[serde(default, skip_serializing)]
    pub bootstrap_admin_password: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            jwt_secret: None,
            token_ttl_hours: default_token_ttl(),
            bootstrap_admin_password: None,
        }
    }
}

impl ServerSettings {
    /// Configured secret, or the insecure placeholder with a warning
    pub fn jwt_secret_or_default(&self) -> String {
        match &self.jwt_secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                tracing::warn!("server.jwt_secret not set, using insecure default!");
                INSECURE_DEFAULT_SECRET.to_string()
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Replace host and port from a `host:port` string
    pub fn set_bind_addr(&mut self, bind: &str) -> Result<()> {
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| RangeError::Config(format!("Invalid bind address '{}': {}", bind, e)))?;
        self.host = addr.ip().to_string();
        self.port = addr.port();
        Ok(())
    }
}

/// Diagnostic output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// JSON lines instead of the compact human format
    #[serde(default)]
    pub json: bool,

    /// Write logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:3080".to_string()
}

fn default_api_prefix() -> String {
    "v2".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cyberrange.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_token_ttl() -> i64 {
    24
}

impl RangeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RangeError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// File (if any) + environment overrides, validated
    ///
    /// Without an explicit path, `./cyberrange.toml` is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path(path, Path::new(DEFAULT_CONFIG_FILE)) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CYBERRANGE_*` overrides using the given lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CYBERRANGE_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(db) = lookup("CYBERRANGE_DB") {
            self.database.path = PathBuf::from(db);
        }
        if let Some(secret) = lookup("CYBERRANGE_JWT_SECRET") {
            self.server.jwt_secret = Some(secret);
        }
        if let Some(bind) = lookup("CYBERRANGE_BIND") {
            self.server.set_bind_addr(&bind)?;
        }
        Ok(())
    }

    /// Reject values that would only fail later at runtime
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.backend.url).map_err(|e| {
            RangeError::Config(format!("Invalid backend url '{}': {}", self.backend.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RangeError::Config(format!(
                "Backend url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.backend.request_timeout_secs == 0 || self.backend.connect_timeout_secs == 0 {
            return Err(RangeError::Config(
                "Backend timeouts must be at least one second".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(RangeError::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }
        if matches!(&self.server.jwt_secret, Some(secret) if secret.is_empty()) {
            return Err(RangeError::Config("server.jwt_secret is empty".to_string()));
        }
        if self.server.token_ttl_hours <= 0 {
            return Err(RangeError::Config(
                "server.token_ttl_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Explicit path wins; otherwise the fallback, if it exists
fn config_path(explicit: Option<&Path>, fallback: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if fallback.is_file() => Some(fallback.to_path_buf()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: RangeConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend.api_base(), "http://127.0.0.1:3080/v2");
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, LogLevel::Info);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_file() {
        let config: RangeConfig = toml::from_str(
            r#"
            [backend]
            url = "http://10.48.229.210:80/"
            request_timeout_secs = 30
            username = "gns3"
            password = "secret"

            [database]
            path = "/var/lib/cyberrange/range.db"

            [server]
            port = 8443
            jwt_secret = "s3cr3t"

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.api_base(), "http://10.48.229.210:80/v2");
        assert_eq!(config.backend.password.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.server.jwt_secret_or_default(), "s3cr3t");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.json);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CYBERRANGE_BACKEND_URL", "http://gns3.lab:3080"),
            ("CYBERRANGE_DB", "/tmp/range.db"),
            ("CYBERRANGE_BIND", "0.0.0.0:8080"),
        ]
        .into_iter()
        .collect();

        let mut config = RangeConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend.url, "http://gns3.lab:3080");
        assert_eq!(config.database.path, PathBuf::from("/tmp/range.db"));
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_bad_bind_override_rejected() {
        let mut config = RangeConfig::default();
        let err = config
            .apply_env_overrides(|k| (k == "CYBERRANGE_BIND").then(|| "nowhere".to_string()))
            .unwrap_err();
        assert!(matches!(err, RangeError::Config(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = RangeConfig::default();
        config.backend.url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = RangeConfig::default();
        config.backend.url = "ftp://gns3".to_string();
        assert!(config.validate().is_err());

        let mut config = RangeConfig::default();
        config.backend.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RangeConfig::default();
        config.server.jwt_secret = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_path_prefers_explicit_then_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join(DEFAULT_CONFIG_FILE);
        let explicit = dir.path().join("other.toml");

        assert_eq!(config_path(None, &local), None);
        assert_eq!(
            config_path(Some(&explicit), &local),
            Some(explicit.clone())
        );

        std::fs::write(&local, "[server]\nport = 9000\n").unwrap();
        let found = config_path(None, &local).unwrap();
        assert_eq!(found, local);
        assert_eq!(RangeConfig::from_file(&found).unwrap().server.port, 9000);
        assert_eq!(config_path(Some(&explicit), &local), Some(explicit));
    }

    #[test]
    fn test_missing_secret_falls_back() {
        let settings = ServerSettings::default();
        assert_eq!(settings.jwt_secret_or_default(), INSECURE_DEFAULT_SECRET);
    }
}
