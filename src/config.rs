//! Configuration file management for check_ssl_cert.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments, and turns the merged result into the validated
//! [`CheckRequest`] consumed by the check pipeline.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! hostname = "example.com"
//! port = 443
//! warning = 14
//! critical = 7
//! timeout = 30
//! dns_server = "8.8.8.8:53"
//! min_tls_version = "none"
//! output = "text"
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use crate::resolver::split_host_port;

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_WARNING_DAYS: i64 = 14;
pub const DEFAULT_CRITICAL_DAYS: i64 = 7;
pub const DEFAULT_TIMEOUT_SECS: i64 = 30;
pub const DEFAULT_PROMETHEUS_ADDRESS: &str = "http://localhost:9091";

/// Lowest protocol version the handshake may negotiate.
///
/// The default is no floor at all: the check observes whatever the server
/// negotiates instead of enforcing a transport policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum MinTlsVersion {
    #[default]
    #[strum(serialize = "none")]
    NoFloor,
    #[strum(serialize = "ssl3")]
    Ssl3,
    #[strum(to_string = "tls1", serialize = "tls1.0")]
    Tls1,
    #[strum(serialize = "tls1.1")]
    Tls1_1,
    #[strum(serialize = "tls1.2")]
    Tls1_2,
    #[strum(serialize = "tls1.3")]
    Tls1_3,
}

/// How the verdict is written to standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Input of a single certificate check.
///
/// [`Config::into_request`] checks that `warn_days > crit_days`,
/// `crit_days >= 0` and the timeout is positive. [`CheckRequest::new`] starts
/// from defaults that satisfy them; callers that then set fields directly are
/// responsible for keeping them.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    /// Name used for SNI and identity verification, and the default dial target
    pub hostname: String,
    /// Dial address overriding `hostname`
    pub ip_address: Option<String>,
    pub port: u16,
    /// Custom resolver as `host:port`
    pub dns_server: Option<String>,
    /// Bounds the DNS lookup and the dial + handshake
    pub timeout: Duration,
    pub warn_days: i64,
    pub crit_days: i64,
    pub min_tls_version: MinTlsVersion,
}

impl CheckRequest {
    /// Request for `hostname` with every other setting at its default.
    pub fn new(hostname: &str) -> Self {
        CheckRequest {
            hostname: hostname.to_string(),
            ip_address: None,
            port: DEFAULT_PORT,
            dns_server: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64),
            warn_days: DEFAULT_WARNING_DAYS,
            crit_days: DEFAULT_CRITICAL_DAYS,
            min_tls_version: MinTlsVersion::NoFloor,
        }
    }
}

/// Main configuration structure for check_ssl_cert.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values will be filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Hostname to check
    pub hostname: Option<String>,
    /// IP address to dial instead of the hostname
    pub ip_address: Option<String>,
    /// TCP port
    pub port: Option<u16>,
    /// Warning threshold in days
    pub warning: Option<i64>,
    /// Critical threshold in days
    pub critical: Option<i64>,
    /// Connect timeout in seconds
    pub timeout: Option<i64>,
    /// Custom DNS server, `host:port`
    pub dns_server: Option<String>,
    /// Minimum accepted protocol version: none, ssl3, tls1, tls1.1, tls1.2, tls1.3
    pub min_tls_version: Option<String>,
    /// Output format: text, json
    pub output: Option<String>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus integration configuration.
///
/// Controls whether metrics are pushed to a Prometheus Push Gateway
/// and specifies the gateway address.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use check_ssl_cert::config::Config;
    /// let config = Config::from_file("check_ssl_cert.toml")?;
    /// # Ok::<(), check_ssl_cert::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Creates a configuration holding the built-in defaults.
    ///
    /// # Default Values
    ///
    /// - `hostname`: "localhost"
    /// - `port`: 443
    /// - `warning`: 14, `critical`: 7
    /// - `timeout`: 30
    /// - `min_tls_version`: "none"
    /// - `output`: "text"
    /// - `prometheus.enabled`: false
    /// - `prometheus.address`: "http://localhost:9091"
    pub fn defaults() -> Self {
        Config {
            hostname: Some(DEFAULT_HOSTNAME.to_string()),
            ip_address: None,
            port: Some(DEFAULT_PORT),
            warning: Some(DEFAULT_WARNING_DAYS),
            critical: Some(DEFAULT_CRITICAL_DAYS),
            timeout: Some(DEFAULT_TIMEOUT_SECS),
            dns_server: None,
            min_tls_version: Some(MinTlsVersion::NoFloor.to_string()),
            output: Some(OutputFormat::Text.to_string()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some(DEFAULT_PROMETHEUS_ADDRESS.to_string()),
            }),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    pub fn merge_with(mut self, other: Config) -> Self {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.hostname, other.hostname);
        take(&mut self.ip_address, other.ip_address);
        take(&mut self.port, other.port);
        take(&mut self.warning, other.warning);
        take(&mut self.critical, other.critical);
        take(&mut self.timeout, other.timeout);
        take(&mut self.dns_server, other.dns_server);
        take(&mut self.min_tls_version, other.min_tls_version);
        take(&mut self.output, other.output);
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                take(&mut self_prom.enabled, other_prom.enabled);
                take(&mut self_prom.address, other_prom.address);
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Validates the merged configuration and builds the check input.
    ///
    /// # Errors
    ///
    /// `ConfigError::Validation` when the thresholds are out of order, the
    /// timeout is not positive, the port is zero, the DNS server is not
    /// `host:port` or the minimum TLS version is unknown.
    pub fn into_request(self) -> Result<CheckRequest, ConfigError> {
        let warn_days = self.warning.unwrap_or(DEFAULT_WARNING_DAYS);
        let crit_days = self.critical.unwrap_or(DEFAULT_CRITICAL_DAYS);
        if warn_days <= crit_days {
            return Err(ConfigError::Validation(
                "warning threshold must be greater than critical threshold".to_string(),
            ));
        }
        if crit_days < 0 {
            return Err(ConfigError::Validation(
                "critical threshold must not be negative".to_string(),
            ));
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout <= 0 {
            return Err(ConfigError::Validation(
                "timeout must be a positive number of seconds".to_string(),
            ));
        }

        let port = self.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::Validation(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let dns_server = self.dns_server.filter(|s| !s.is_empty());
        if let Some(server) = &dns_server {
            if split_host_port(server).is_none() {
                return Err(ConfigError::Validation(
                    "invalid DNS server format, expected host:port (e.g., 8.8.8.8:53)".to_string(),
                ));
            }
        }

        let min_tls_version = match self.min_tls_version.as_deref() {
            None => MinTlsVersion::NoFloor,
            Some(value) => MinTlsVersion::from_str(value).map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown minimum TLS version '{}', expected one of none, ssl3, tls1, tls1.1, tls1.2, tls1.3",
                    value
                ))
            })?,
        };

        Ok(CheckRequest {
            hostname: self
                .hostname
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            ip_address: self.ip_address.filter(|ip| !ip.is_empty()),
            port,
            dns_server,
            timeout: Duration::from_secs(timeout as u64),
            warn_days,
            crit_days,
            min_tls_version,
        })
    }

    /// Parses the configured output format.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        match self.output.as_deref() {
            None => Ok(OutputFormat::Text),
            Some(value) => OutputFormat::from_str(value).map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown output format '{}', expected text or json",
                    value
                ))
            }),
        }
    }

    /// Push gateway address when Prometheus pushing is enabled.
    pub fn prometheus_address(&self) -> Option<String> {
        let prometheus = self.prometheus.as_ref()?;
        if prometheus.enabled.unwrap_or(false) {
            Some(
                prometheus
                    .address
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROMETHEUS_ADDRESS.to_string()),
            )
        } else {
            None
        }
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// Creates a sample configuration with all available options set to
    /// example values. Useful for bootstrapping a new configuration file.
    pub fn example_toml() -> String {
        let example = Config {
            hostname: Some("example.com".to_string()),
            ip_address: Some("93.184.216.34".to_string()),
            port: Some(DEFAULT_PORT),
            warning: Some(DEFAULT_WARNING_DAYS),
            critical: Some(DEFAULT_CRITICAL_DAYS),
            timeout: Some(DEFAULT_TIMEOUT_SECS),
            dns_server: Some("8.8.8.8:53".to_string()),
            min_tls_version: Some(MinTlsVersion::NoFloor.to_string()),
            output: Some(OutputFormat::Text.to_string()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some(DEFAULT_PROMETHEUS_ADDRESS.to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (threshold ordering, timeout, DNS server format, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn validation_message(config: Config) -> String {
        match config.into_request() {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            hostname = "jpbd.dev"
            ip_address = "192.0.2.10"
            port = 8443
            warning = 30
            critical = 10
            timeout = 5
            dns_server = "1.1.1.1:53"
            min_tls_version = "tls1.2"
            output = "json"

            [prometheus]
            enabled = true
            address = "http://localhost:9092"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output_format().unwrap(), OutputFormat::Json);
        assert_eq!(
            config.prometheus_address(),
            Some("http://localhost:9092".to_string())
        );

        let request = config.into_request().unwrap();
        assert_eq!(request.hostname, "jpbd.dev");
        assert_eq!(request.ip_address, Some("192.0.2.10".to_string()));
        assert_eq!(request.port, 8443);
        assert_eq!(request.warn_days, 30);
        assert_eq!(request.crit_days, 10);
        assert_eq!(request.timeout, Duration::from_secs(5));
        assert_eq!(request.dns_server, Some("1.1.1.1:53".to_string()));
        assert_eq!(request.min_tls_version, MinTlsVersion::Tls1_2);
    }

    #[test]
    fn test_defaults_produce_reference_request() {
        let request = Config::defaults().into_request().unwrap();
        assert_eq!(request, CheckRequest::new("localhost"));
        assert_eq!(request.min_tls_version, MinTlsVersion::NoFloor);
    }

    #[test]
    fn test_config_merge() {
        let file_config = Config {
            hostname: Some("file.example".to_string()),
            warning: Some(21),
            output: Some("json".to_string()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: None,
            }),
            ..Config::default()
        };
        let cli_config = Config {
            hostname: Some("cli.example".to_string()),
            critical: Some(3),
            ..Config::default()
        };

        let merged = Config::defaults()
            .merge_with(file_config)
            .merge_with(cli_config);

        assert_eq!(merged.hostname, Some("cli.example".to_string()));
        assert_eq!(merged.warning, Some(21));
        assert_eq!(merged.critical, Some(3));
        assert_eq!(merged.port, Some(443));
        assert_eq!(merged.output, Some("json".to_string()));
        assert_eq!(
            merged.prometheus_address(),
            Some(DEFAULT_PROMETHEUS_ADDRESS.to_string())
        );
    }

    #[test]
    fn test_threshold_ordering_rejected() {
        let config = Config {
            warning: Some(7),
            critical: Some(7),
            ..Config::defaults()
        };
        assert_eq!(
            validation_message(config),
            "warning threshold must be greater than critical threshold"
        );
    }

    #[test]
    fn test_non_positive_timeout_rejected() {
        let config = Config {
            timeout: Some(0),
            ..Config::defaults()
        };
        assert_eq!(
            validation_message(config),
            "timeout must be a positive number of seconds"
        );
    }

    #[test]
    fn test_malformed_dns_server_rejected() {
        for server in ["8.8.8.8", "8.8.8.8:", ":53", "8.8.8.8:dns"] {
            let config = Config {
                dns_server: Some(server.to_string()),
                ..Config::defaults()
            };
            assert!(validation_message(config).starts_with("invalid DNS server format"));
        }

        let config = Config {
            dns_server: Some("[2001:4860:4860::8888]:53".to_string()),
            ..Config::defaults()
        };
        assert!(config.into_request().is_ok());
    }

    #[test]
    fn test_unknown_min_tls_version_rejected() {
        let config = Config {
            min_tls_version: Some("tls9".to_string()),
            ..Config::defaults()
        };
        assert!(validation_message(config).contains("tls9"));
    }

    #[test]
    fn test_prometheus_disabled_by_default() {
        assert_eq!(Config::defaults().prometheus_address(), None);
    }

    #[test]
    fn test_invalid_toml() {
        let invalid_toml = "hostname = [invalid toml";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::from_file(temp_file.path());
        assert!(result.is_err());

        match result.unwrap_err() {
            ConfigError::Parse(_) => {} // Expected
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_example_toml_generation() {
        let example = Config::example_toml();

        let parsed: Config = toml::from_str(&example).unwrap();
        assert_eq!(parsed.hostname, Some("example.com".to_string()));
        assert!(parsed.into_request().is_ok());
    }
}
