use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::fs;

use chrono_tz::Tz;
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use thiserror::Error;

use crate::booking::{DEFAULT_GRACE_MINUTES, ExpiryPolicy};
use crate::scheduler::SchedulerConfig;
use crate::store::DEFAULT_MAX_CONNECTIONS;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "feelme.yaml";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub live_store: LiveStoreConfig,
    #[serde(default)]
    pub archive_store: ArchiveStoreConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Config {
    /// Load the config file, falling back to defaults if it does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        let config: Self = serde_saphyr::from_str(&expanded)?;
        config.reconcile.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_concurrent_requests() -> usize {
    crate::server::DEFAULT_MAX_CONNECTIONS
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_database() -> String {
    "feelmetown".to_string()
}

fn default_mongo_collection() -> String {
    "booking".to_string()
}

fn default_mysql_host() -> String {
    "localhost".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_mysql_database() -> String {
    "feelme_town".to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_interval() -> u64 {
    300
}

/// Upper bound for `reconcile.grace_minutes` (one week).
pub const MAX_GRACE_MINUTES: i64 = 7 * 24 * 60;

fn default_grace_minutes() -> i64 {
    DEFAULT_GRACE_MINUTES
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

/// Serde default for bool fields that should be `true` (serde's default is `false`).
fn default_true() -> bool {
    true
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports the following syntax (shell-compatible):
/// - `${VAR}` - Required variable, errors if not set
/// - `${VAR:-default}` - Optional variable with default value
/// - `${VAR:-}` - Optional variable, empty string if not set
/// - `$$` - Escaped `$` (only needed before `{` to prevent expansion)
///
/// Nested expansion (`${VAR:-${DEFAULT}}`) is not supported.
///
/// ```yaml
/// archive_store:
///   host: ${GODADDY_DB_HOST:-localhost}
///   password: ${GODADDY_DB_PASSWORD}
/// ```
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                result.push_str(&parse_var_reference(&mut chars)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Parse a variable reference after seeing `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;
    let mut closed = false;

    while let Some(c) = chars.next() {
        if c == '}' {
            closed = true;
            break;
        }
        if let Some(default) = default_value.as_mut() {
            default.push(c);
        } else if c == ':' && chars.peek() == Some(&'-') {
            chars.next();
            default_value = Some(String::new());
        } else {
            var_name.push(c);
        }
    }

    if !closed {
        return Err(ConfigError::UnclosedVarReference);
    }

    match std::env::var(&var_name) {
        Ok(value) => Ok(value),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(var_name)),
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Requests handled at once under `/api`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Optional admin API token. If set, admin endpoints require this token.
    /// If not set, admin endpoints only accept requests from localhost.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent_requests(),
            admin_token: None,
        }
    }
}

// ============================================================================
// LiveStoreConfig
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveBackend {
    #[default]
    Mongo,
    Memory,
}

/// Live booking store (MongoDB).
#[derive(Debug, Deserialize)]
pub struct LiveStoreConfig {
    #[serde(default)]
    pub backend: LiveBackend,
    #[serde(default = "default_mongo_uri")]
    pub uri: String,
    #[serde(default = "default_mongo_database")]
    pub database: String,
    #[serde(default = "default_mongo_collection")]
    pub collection: String,
}

impl Default for LiveStoreConfig {
    fn default() -> Self {
        Self {
            backend: LiveBackend::default(),
            uri: default_mongo_uri(),
            database: default_mongo_database(),
            collection: default_mongo_collection(),
        }
    }
}

// ============================================================================
// ArchiveStoreConfig
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackend {
    #[default]
    Mysql,
    Memory,
}

/// Archive store (MySQL).
#[derive(Debug, Deserialize)]
pub struct ArchiveStoreConfig {
    #[serde(default)]
    pub backend: ArchiveBackend,
    #[serde(default = "default_mysql_host")]
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default = "default_mysql_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_mysql_database")]
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ArchiveStoreConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::default(),
            host: default_mysql_host(),
            port: default_mysql_port(),
            user: default_mysql_user(),
            password: String::new(),
            database: default_mysql_database(),
            max_connections: default_max_connections(),
        }
    }
}

impl ArchiveStoreConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

// ============================================================================
// ReconcileConfig
// ============================================================================

/// Expiry detection and cleanup scheduling.
#[derive(Debug, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    /// IANA zone that booking slots are written in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Start the cleanup scheduler with the server.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    /// Run a pass as soon as the scheduler starts.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            grace_minutes: default_grace_minutes(),
            timezone: default_timezone(),
            auto_start: true,
            run_on_start: true,
        }
    }
}

impl ReconcileConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "reconcile.interval_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        self.grace()?;
        self.zone().map(|_| ())
    }

    fn grace(&self) -> Result<chrono::Duration, ConfigError> {
        if !(0..=MAX_GRACE_MINUTES).contains(&self.grace_minutes) {
            return Err(ConfigError::Invalid {
                field: "reconcile.grace_minutes",
                reason: format!("must be between 0 and {MAX_GRACE_MINUTES}"),
            });
        }
        chrono::Duration::try_minutes(self.grace_minutes).ok_or(ConfigError::Invalid {
            field: "reconcile.grace_minutes",
            reason: "out of range".to_string(),
        })
    }

    fn zone(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| ConfigError::Invalid {
            field: "reconcile.timezone",
            reason: e.to_string(),
        })
    }

    pub fn policy(&self) -> Result<ExpiryPolicy, ConfigError> {
        Ok(ExpiryPolicy::new(self.grace()?, self.zone()?))
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.interval_seconds.max(1)),
            run_on_start: self.run_on_start,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    // ========================================================================
    // Config Tests
    // ========================================================================

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_seconds, 60);
        assert!(config.server.admin_token.is_none());
        assert_eq!(config.live_store.backend, LiveBackend::Mongo);
        assert_eq!(config.live_store.collection, "booking");
        assert_eq!(config.archive_store.backend, ArchiveBackend::Mysql);
        assert_eq!(config.archive_store.port, 3306);
        assert_eq!(config.archive_store.database, "feelme_town");
        assert_eq!(config.archive_store.max_connections, 10);
        assert_eq!(config.reconcile.interval_seconds, 300);
        assert_eq!(config.reconcile.grace_minutes, 5);
        assert!(config.reconcile.auto_start);
        assert!(config.reconcile.run_on_start);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let missing_path = tmp_dir.path().join("missing-config.yaml");
        let config = Config::load(&missing_path).await.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.reconcile.timezone, "Asia/Kolkata");
    }

    #[tokio::test]
    async fn test_load_valid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 8080
  admin_token: "s3cret"
live_store:
  backend: memory
archive_store:
  backend: mysql
  host: db.example.com
  user: feelme
  password: hunter2
reconcile:
  interval_seconds: 120
  grace_minutes: 10
  auto_start: false
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.live_store.backend, LiveBackend::Memory);
        assert_eq!(config.archive_store.host, "db.example.com");
        assert_eq!(config.archive_store.port, 3306);
        assert_eq!(config.reconcile.interval_seconds, 120);
        assert!(!config.reconcile.auto_start);
        assert!(config.reconcile.run_on_start);

        let policy = config.reconcile.policy().unwrap();
        assert_eq!(policy.grace, chrono::Duration::minutes(10));
        assert_eq!(
            config.reconcile.scheduler().interval,
            Duration::from_secs(120)
        );
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_timezone() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reconcile:\n  timezone: Mars/Olympus").unwrap();

        let result = Config::load(file.path()).await;
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "reconcile.timezone",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_out_of_range_grace() {
        for grace in ["-1", "9223372036854775807"] {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "reconcile:\n  grace_minutes: {grace}").unwrap();
            assert!(matches!(
                Config::load(file.path()).await,
                Err(ConfigError::Invalid {
                    field: "reconcile.grace_minutes",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_policy_rejects_grace_without_load() {
        let reconcile = ReconcileConfig {
            grace_minutes: i64::MAX,
            ..Default::default()
        };
        assert!(reconcile.policy().is_err());

        let week = ReconcileConfig {
            grace_minutes: MAX_GRACE_MINUTES,
            ..Default::default()
        };
        assert_eq!(week.policy().unwrap().grace.num_minutes(), MAX_GRACE_MINUTES);
    }

    #[tokio::test]
    async fn test_load_rejects_zero_interval() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reconcile:\n  interval_seconds: 0").unwrap();
        assert!(Config::load(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_expands_env_vars() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("FEELME_TEST_DB_HOST", "mysql.internal") };
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "archive_store:\n  host: ${{FEELME_TEST_DB_HOST}}\n  database: ${{FEELME_TEST_UNSET_DB:-archive}}"
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.archive_store.host, "mysql.internal");
        assert_eq!(config.archive_store.database, "archive");
        unsafe { std::env::remove_var("FEELME_TEST_DB_HOST") };
    }

    // ========================================================================
    // Environment Variable Expansion Tests
    // ========================================================================

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "plain string without variables";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("FEELME_MISSING_12345") };
        match expand_env_vars("value: ${FEELME_MISSING_12345}") {
            Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, "FEELME_MISSING_12345"),
            other => panic!("expected MissingEnvVar error, got {other:?}"),
        }
    }

    #[test]
    fn test_expand_env_vars_with_defaults() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("FEELME_UNSET_A") };
        assert_eq!(
            expand_env_vars("a: ${FEELME_UNSET_A:-fallback}, b: ${FEELME_UNSET_A:-}").unwrap(),
            "a: fallback, b: "
        );
    }

    #[test]
    fn test_expand_env_vars_set_var_ignores_default() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("FEELME_SET_B", "actual") };
        assert_eq!(
            expand_env_vars("value: ${FEELME_SET_B:-ignored}").unwrap(),
            "value: actual"
        );
        unsafe { std::env::remove_var("FEELME_SET_B") };
    }

    #[test]
    fn test_expand_env_vars_escaped_dollar() {
        let input = "price: $$100 and ${FEELME_ESCAPE:-value} and $5";
        assert_eq!(
            expand_env_vars(input).unwrap(),
            "price: $100 and value and $5"
        );
    }

    #[test]
    fn test_expand_env_vars_unclosed_brace() {
        assert!(matches!(
            expand_env_vars("value: ${UNCLOSED:-default"),
            Err(ConfigError::UnclosedVarReference)
        ));
    }
}
