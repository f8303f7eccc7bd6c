//! Configuration module for Outbox.
//!
//! The configuration file is a flat YAML mapping of scalar values. It is read
//! once at startup into a [`ConfigStore`], which exposes typed lookups by key.
//! [`Config::from_store`] turns the store into typed sections; the resulting
//! [`Config`] is passed to every component and never mutated afterwards.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_yaml::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or reading configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML.
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document is valid YAML but not a flat mapping of scalars.
    #[error("config document must be a flat mapping of scalar values: {0}")]
    NotFlat(String),

    /// A required key is absent.
    #[error("missing config key: {0}")]
    MissingKey(String),

    /// A key is present but its value does not parse as the requested type.
    #[error("malformed value for '{key}': '{value}' is not a valid {expected}")]
    Malformed {
        /// The offending key
        key: String,
        /// The raw value found in the document
        value: String,
        /// Human-readable description of the expected type
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Key names recognised in the configuration file.
pub mod keys {
    pub const WATCH_FOLDER_WINDOWS: &str = "watch_folder_windows";
    pub const WATCH_FOLDER_UNIX: &str = "watch_folder_unix";
    pub const SERVER_IP_WINDOWS: &str = "server_ip_windows";
    pub const SERVER_IP_UNIX: &str = "server_ip_unix";
    pub const FILE_TRANSFER_PORT: &str = "file_transfer_port";
    pub const PING_PORT: &str = "ping_port";
    pub const SIZE_LIMIT_BYTES: &str = "size_limit_bytes";

    pub const IDLE_DELAY_MS: &str = "idle_delay_ms";
    pub const RESTART_POLICY: &str = "restart_policy";
    pub const STABILITY_CHECK_MS: &str = "stability_check_ms";

    pub const DELETE_RETRIES: &str = "delete_retries";
    pub const DELETE_BASE_DELAY_MS: &str = "delete_base_delay_ms";
    pub const FOLDER_DELETE_DELAY_MS: &str = "folder_delete_delay_ms";

    pub const CHUNK_SIZE_BYTES: &str = "chunk_size_bytes";
    pub const SETTLE_DELAY_MS: &str = "settle_delay_ms";
    pub const RESPONSE_TIMEOUT_MS: &str = "response_timeout_ms";
    pub const CONNECT_TIMEOUT_MS: &str = "connect_timeout_ms";
    pub const MAX_ATTEMPTS: &str = "max_attempts";
    pub const RETRY_DELAY_MS: &str = "retry_delay_ms";

    pub const HEARTBEAT_INTERVAL_MS: &str = "heartbeat_interval_ms";
    pub const PONG_TIMEOUT_MS: &str = "pong_timeout_ms";
    pub const RECONNECT_RETRIES: &str = "reconnect_retries";
    pub const RECONNECT_DELAY_MS: &str = "reconnect_delay_ms";

    pub const LOG_LEVEL: &str = "log_level";
    pub const LOG_FILE: &str = "log_file";
}

// ---------------------------------------------------------------------------
// ConfigStore: raw key/value lookups
// ---------------------------------------------------------------------------

/// Immutable key/value view of the configuration file.
///
/// Scalars (strings, numbers, booleans) are kept as their textual form and
/// parsed on lookup, so every getter can tell an absent key apart from a
/// present but malformed one. `null` values count as absent.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Load the store from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse the store from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mapping = match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(mapping) => mapping,
            // An empty document parses as null.
            Value::Null => return Ok(Self::default()),
            _ => return Err(ConfigError::NotFlat("top level is not a mapping".into())),
        };

        let mut values = BTreeMap::new();
        for (key, value) in mapping {
            let key = match key {
                Value::String(key) => key,
                other => {
                    return Err(ConfigError::NotFlat(format!(
                        "non-string key {other:?}"
                    )))
                }
            };
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => continue,
                _ => return Err(ConfigError::NotFlat(format!("'{key}' is not a scalar"))),
            };
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Build a store from in-memory key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_optional_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    pub fn get_int(&self, key: &str) -> Result<i32, ConfigError> {
        self.parse(key, "32-bit integer")
    }

    pub fn get_optional_int(&self, key: &str) -> Result<Option<i32>, ConfigError> {
        self.parse_optional(key, "32-bit integer")
    }

    pub fn get_long(&self, key: &str) -> Result<i64, ConfigError> {
        self.parse(key, "64-bit integer")
    }

    pub fn get_optional_long(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.parse_optional(key, "64-bit integer")
    }

    /// Look up a path whose key depends on the target OS.
    pub fn get_os_path(&self, windows_key: &str, unix_key: &str) -> Result<PathBuf, ConfigError> {
        let key = os_key(windows_key, unix_key);
        let value = self.get_string(key)?;
        if value.trim().is_empty() {
            return Err(ConfigError::Malformed {
                key: key.to_string(),
                value,
                expected: "path",
            });
        }
        Ok(PathBuf::from(value))
    }

    /// Look up an IP address whose key depends on the target OS.
    pub fn get_os_ip(&self, windows_key: &str, unix_key: &str) -> Result<IpAddr, ConfigError> {
        self.parse(os_key(windows_key, unix_key), "IP address")
    }

    fn parse<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError> {
        self.parse_optional(key, expected)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    fn parse_optional<T: FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(raw) = self.values.get(key) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Malformed {
                key: key.to_string(),
                value: raw.clone(),
                expected,
            })
    }
}

/// Selects between the Windows and the Unix flavour of a key.
fn os_key<'a>(windows_key: &'a str, unix_key: &'a str) -> &'a str {
    if cfg!(windows) {
        windows_key
    } else {
        unix_key
    }
}

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

/// Top-level configuration for Outbox.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub watch: WatchConfig,
    pub retention: RetentionConfig,
    pub transfer: TransferConfig,
    pub heartbeat: HeartbeatConfig,
    pub logging: LoggingConfig,
}

/// When the dispatcher recreates the filesystem notifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Restart after every handled event, except a failed send.
    #[default]
    Always,
    /// Restart only after a failed delete or a failed send.
    OnFailure,
}

impl FromStr for RestartPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "on_failure" => Ok(Self::OnFailure),
            _ => Err(()),
        }
    }
}

/// Watch folder and dispatcher loop settings.
#[derive(Debug, Clone, Serialize)]
pub struct WatchConfig {
    /// The single directory whose new entries trigger all processing.
    pub folder: PathBuf,
    /// Pause after every consumer loop iteration, in milliseconds.
    pub idle_delay_ms: u64,
    /// Notifier restart policy.
    pub restart_policy: RestartPolicy,
    /// Interval for the file stability check in milliseconds (0 disables it).
    pub stability_check_ms: u64,
}

/// Retention (folder size) policy and delete retry settings.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionConfig {
    /// Maximum total size of the watch folder in bytes.
    pub size_limit_bytes: u64,
    /// Retries allowed for a busy file or folder.
    pub delete_retries: u32,
    /// First backoff delay in milliseconds; doubles on every retry.
    pub delete_base_delay_ms: u64,
    /// Delay before a folder delete starts, in milliseconds.
    pub folder_delete_delay_ms: u64,
}

/// Data connection settings.
#[derive(Debug, Clone, Serialize)]
pub struct TransferConfig {
    pub server_ip: IpAddr,
    pub file_port: u16,
    pub ping_port: u16,
    /// Size of each streamed chunk in bytes.
    pub chunk_size: usize,
    /// Pause between sending the header and reading the resume offset.
    pub settle_delay_ms: u64,
    /// Upper bound for reading the resume offset.
    pub response_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Connect-through-transfer attempts per file.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

/// Heartbeat channel settings.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub reconnect_retries: u32,
    pub reconnect_delay_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional append-only log file; console only when unset.
    pub file: Option<PathBuf>,
}

impl WatchConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Returns the stability check interval, or `None` when disabled.
    pub fn stability_check(&self) -> Option<Duration> {
        (self.stability_check_ms > 0).then(|| Duration::from_millis(self.stability_check_ms))
    }
}

impl RetentionConfig {
    pub fn delete_base_delay(&self) -> Duration {
        Duration::from_millis(self.delete_base_delay_ms)
    }

    pub fn folder_delete_delay(&self) -> Duration {
        Duration::from_millis(self.folder_delete_delay_ms)
    }
}

impl TransferConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            folder: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Outbox"),
            idle_delay_ms: 1000,
            restart_policy: RestartPolicy::Always,
            stability_check_ms: 0,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            size_limit_bytes: 1024 * 1024 * 1024,
            delete_retries: 5,
            delete_base_delay_ms: 500,
            folder_delete_delay_ms: 1000,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            server_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            file_port: 9000,
            ping_port: 9001,
            chunk_size: 8192,
            settle_delay_ms: 100,
            response_timeout_ms: 10_000,
            connect_timeout_ms: 5000,
            max_attempts: 5,
            retry_delay_ms: 2000,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            pong_timeout_ms: 3000,
            reconnect_retries: 3,
            reconnect_delay_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::from_store() / Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Build the typed configuration from a key/value store.
    ///
    /// The watch folder, server address, both ports and the size limit are
    /// required; every other key falls back to its default when absent.
    pub fn from_store(store: &ConfigStore) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let watch = WatchConfig {
            folder: store.get_os_path(keys::WATCH_FOLDER_WINDOWS, keys::WATCH_FOLDER_UNIX)?,
            idle_delay_ms: u64_or(store, keys::IDLE_DELAY_MS, defaults.watch.idle_delay_ms)?,
            restart_policy: match store.get_optional_string(keys::RESTART_POLICY) {
                Some(raw) => raw.trim().parse().map_err(|()| ConfigError::Malformed {
                    key: keys::RESTART_POLICY.to_string(),
                    value: raw.clone(),
                    expected: "restart policy (always, on_failure)",
                })?,
                None => defaults.watch.restart_policy,
            },
            stability_check_ms: u64_or(
                store,
                keys::STABILITY_CHECK_MS,
                defaults.watch.stability_check_ms,
            )?,
        };

        let size_limit = store.get_long(keys::SIZE_LIMIT_BYTES)?;
        let retention = RetentionConfig {
            size_limit_bytes: non_negative(keys::SIZE_LIMIT_BYTES, size_limit)?,
            delete_retries: u32_or(store, keys::DELETE_RETRIES, defaults.retention.delete_retries)?,
            delete_base_delay_ms: u64_or(
                store,
                keys::DELETE_BASE_DELAY_MS,
                defaults.retention.delete_base_delay_ms,
            )?,
            folder_delete_delay_ms: u64_or(
                store,
                keys::FOLDER_DELETE_DELAY_MS,
                defaults.retention.folder_delete_delay_ms,
            )?,
        };

        let transfer = TransferConfig {
            server_ip: store.get_os_ip(keys::SERVER_IP_WINDOWS, keys::SERVER_IP_UNIX)?,
            file_port: port(store, keys::FILE_TRANSFER_PORT)?,
            ping_port: port(store, keys::PING_PORT)?,
            chunk_size: u64_or(
                store,
                keys::CHUNK_SIZE_BYTES,
                defaults.transfer.chunk_size as u64,
            )? as usize,
            settle_delay_ms: u64_or(store, keys::SETTLE_DELAY_MS, defaults.transfer.settle_delay_ms)?,
            response_timeout_ms: u64_or(
                store,
                keys::RESPONSE_TIMEOUT_MS,
                defaults.transfer.response_timeout_ms,
            )?,
            connect_timeout_ms: u64_or(
                store,
                keys::CONNECT_TIMEOUT_MS,
                defaults.transfer.connect_timeout_ms,
            )?,
            max_attempts: u32_or(store, keys::MAX_ATTEMPTS, defaults.transfer.max_attempts)?,
            retry_delay_ms: u64_or(store, keys::RETRY_DELAY_MS, defaults.transfer.retry_delay_ms)?,
        };

        let heartbeat = HeartbeatConfig {
            interval_ms: u64_or(
                store,
                keys::HEARTBEAT_INTERVAL_MS,
                defaults.heartbeat.interval_ms,
            )?,
            pong_timeout_ms: u64_or(
                store,
                keys::PONG_TIMEOUT_MS,
                defaults.heartbeat.pong_timeout_ms,
            )?,
            reconnect_retries: u32_or(
                store,
                keys::RECONNECT_RETRIES,
                defaults.heartbeat.reconnect_retries,
            )?,
            reconnect_delay_ms: u64_or(
                store,
                keys::RECONNECT_DELAY_MS,
                defaults.heartbeat.reconnect_delay_ms,
            )?,
        };

        let logging = LoggingConfig {
            level: store
                .get_optional_string(keys::LOG_LEVEL)
                .unwrap_or(defaults.logging.level),
            file: store.get_optional_string(keys::LOG_FILE).map(PathBuf::from),
        };

        Ok(Self {
            watch,
            retention,
            transfer,
            heartbeat,
            logging,
        })
    }

    /// Load a YAML file at `path` and build the typed configuration from it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_store(&ConfigStore::load(path)?)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/outbox/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("outbox")
            .join("config.yaml")
    }

    /// Render the resolved configuration as nested YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn non_negative(key: &str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::Malformed {
        key: key.to_string(),
        value: value.to_string(),
        expected: "non-negative integer",
    })
}

fn u64_or(store: &ConfigStore, key: &str, default: u64) -> Result<u64, ConfigError> {
    match store.get_optional_long(key)? {
        Some(value) => non_negative(key, value),
        None => Ok(default),
    }
}

fn u32_or(store: &ConfigStore, key: &str, default: u32) -> Result<u32, ConfigError> {
    match store.get_optional_int(key)? {
        Some(value) => u32::try_from(value).map_err(|_| ConfigError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
            expected: "non-negative integer",
        }),
        None => Ok(default),
    }
}

fn port(store: &ConfigStore, key: &str) -> Result<u16, ConfigError> {
    let value = store.get_int(key)?;
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
            expected: "port number (1-65535)",
        }),
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.chunk_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        positive("watch.idle_delay_ms", self.watch.idle_delay_ms);
        positive("transfer.chunk_size", self.transfer.chunk_size as u64);
        positive("transfer.max_attempts", u64::from(self.transfer.max_attempts));
        positive("transfer.response_timeout_ms", self.transfer.response_timeout_ms);
        positive("transfer.connect_timeout_ms", self.transfer.connect_timeout_ms);
        positive("heartbeat.interval_ms", self.heartbeat.interval_ms);
        positive("heartbeat.pong_timeout_ms", self.heartbeat.pong_timeout_ms);

        // --- watch ---
        if !self.watch.folder.is_absolute() {
            errors.push(ValidationError {
                field: "watch.folder".into(),
                message: format!("must be an absolute path: {}", self.watch.folder.display()),
            });
        }

        // --- transfer ---
        if self.transfer.file_port == self.transfer.ping_port {
            errors.push(ValidationError {
                field: "transfer.ping_port".into(),
                message: format!(
                    "must differ from file_port ({})",
                    self.transfer.file_port
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use outbox_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .watch_folder(PathBuf::from("/srv/outbox"))
///     .size_limit_bytes(10 * 1024 * 1024)
///     .server("10.0.0.5".parse().unwrap(), 9000, 9001)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- watch ---

    pub fn watch_folder(mut self, folder: PathBuf) -> Self {
        self.config.watch.folder = folder;
        self
    }

    pub fn idle_delay_ms(mut self, ms: u64) -> Self {
        self.config.watch.idle_delay_ms = ms;
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.config.watch.restart_policy = policy;
        self
    }

    pub fn stability_check_ms(mut self, ms: u64) -> Self {
        self.config.watch.stability_check_ms = ms;
        self
    }

    // --- retention ---

    pub fn size_limit_bytes(mut self, bytes: u64) -> Self {
        self.config.retention.size_limit_bytes = bytes;
        self
    }

    pub fn delete_retries(mut self, retries: u32) -> Self {
        self.config.retention.delete_retries = retries;
        self
    }

    pub fn delete_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retention.delete_base_delay_ms = ms;
        self
    }

    pub fn folder_delete_delay_ms(mut self, ms: u64) -> Self {
        self.config.retention.folder_delete_delay_ms = ms;
        self
    }

    // --- transfer ---

    pub fn server(mut self, ip: IpAddr, file_port: u16, ping_port: u16) -> Self {
        self.config.transfer.server_ip = ip;
        self.config.transfer.file_port = file_port;
        self.config.transfer.ping_port = ping_port;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.transfer.chunk_size = bytes;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.transfer.settle_delay_ms = ms;
        self
    }

    pub fn response_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transfer.response_timeout_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transfer.connect_timeout_ms = ms;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.transfer.max_attempts = attempts;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.transfer.retry_delay_ms = ms;
        self
    }

    // --- heartbeat ---

    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.heartbeat.interval_ms = ms;
        self
    }

    pub fn pong_timeout_ms(mut self, ms: u64) -> Self {
        self.config.heartbeat.pong_timeout_ms = ms;
        self
    }

    pub fn reconnect_retries(mut self, retries: u32) -> Self {
        self.config.heartbeat.reconnect_retries = retries;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.heartbeat.reconnect_delay_ms = ms;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
