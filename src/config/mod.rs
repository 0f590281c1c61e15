//! Process configuration.
//!
//! A `Config` is built once at startup and handed to every component that
//! needs it. Sources, later overriding earlier:
//! 1. Built-in defaults
//! 2. `config.json` in the current directory (if present)
//! 3. File given by the `path` argument or `CTXCTL_CONFIG` (must exist)
//! 4. `CTXCTL__<FIELD>` environment variables
//!
//! Fields missing from every source keep their defaults; unknown fields are ignored.
//! File keys may be written snake_case (`service_port`) or kebab-case
//! (`service-port`), the form EMCO controller config files use.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "CTXCTL_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "CTXCTL";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "CTXCTL_LOG";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: ConfigKey,
        value: String,
        reason: String,
    },
}

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the HTTP API listens on.
    #[serde(alias = "service-port")]
    pub service_port: String,
    /// Deadline for each outbound controller RPC, in milliseconds.
    #[serde(alias = "grpc-call-timeout-ms")]
    pub grpc_call_timeout_ms: u64,
    /// Informational; the active filter comes from `CTXCTL_LOG`.
    #[serde(alias = "log-level")]
    pub log_level: String,
    /// How long in-flight HTTP requests may drain after shutdown is requested.
    #[serde(alias = "shutdown-timeout-ms")]
    pub shutdown_timeout_ms: u64,
    /// Workflow manager `host:port` used when a policy intent does not name one.
    #[serde(alias = "workflow-mgr-url")]
    pub workflow_mgr_url: String,
    /// Timeout for workflow trigger calls. 0 disables the timeout.
    #[serde(alias = "workflow-timeout-ms")]
    pub workflow_timeout_ms: u64,
    /// Retries for workflow trigger calls. 0 sends exactly one request.
    #[serde(alias = "workflow-max-retries")]
    pub workflow_max_retries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_port: "9015".to_string(),
            grpc_call_timeout_ms: 5000,
            log_level: "info".to_string(),
            shutdown_timeout_ms: 10_000,
            workflow_mgr_url: String::new(),
            workflow_timeout_ms: 0,
            workflow_max_retries: 0,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Json).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Json).required(true));
        } else if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Json).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }

    /// Override a single field by name.
    ///
    /// The value is parsed into the field's type; a value that does not parse
    /// leaves the configuration unchanged.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        match key {
            ConfigKey::ServicePort => self.service_port = value.to_string(),
            ConfigKey::GrpcCallTimeoutMs => self.grpc_call_timeout_ms = parse(key, value)?,
            ConfigKey::LogLevel => self.log_level = value.to_string(),
            ConfigKey::ShutdownTimeoutMs => self.shutdown_timeout_ms = parse(key, value)?,
            ConfigKey::WorkflowMgrUrl => self.workflow_mgr_url = value.to_string(),
            ConfigKey::WorkflowTimeoutMs => self.workflow_timeout_ms = parse(key, value)?,
            ConfigKey::WorkflowMaxRetries => self.workflow_max_retries = parse(key, value)?,
        }
        Ok(())
    }

    /// Override a field by its string name.
    pub fn set_by_name(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let key: ConfigKey = name.parse()?;
        self.set(key, value)
    }

    pub fn grpc_call_timeout(&self) -> Duration {
        Duration::from_millis(self.grpc_call_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Workflow call timeout, `None` when disabled.
    pub fn workflow_timeout(&self) -> Option<Duration> {
        (self.workflow_timeout_ms > 0).then(|| Duration::from_millis(self.workflow_timeout_ms))
    }
}

fn parse<T>(key: ConfigKey, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Every field that can be overridden by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ServicePort,
    GrpcCallTimeoutMs,
    LogLevel,
    ShutdownTimeoutMs,
    WorkflowMgrUrl,
    WorkflowTimeoutMs,
    WorkflowMaxRetries,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::ServicePort,
        ConfigKey::GrpcCallTimeoutMs,
        ConfigKey::LogLevel,
        ConfigKey::ShutdownTimeoutMs,
        ConfigKey::WorkflowMgrUrl,
        ConfigKey::WorkflowTimeoutMs,
        ConfigKey::WorkflowMaxRetries,
    ];

    /// Field name as it appears in the JSON file.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ServicePort => "service_port",
            ConfigKey::GrpcCallTimeoutMs => "grpc_call_timeout_ms",
            ConfigKey::LogLevel => "log_level",
            ConfigKey::ShutdownTimeoutMs => "shutdown_timeout_ms",
            ConfigKey::WorkflowMgrUrl => "workflow_mgr_url",
            ConfigKey::WorkflowTimeoutMs => "workflow_timeout_ms",
            ConfigKey::WorkflowMaxRetries => "workflow_max_retries",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
