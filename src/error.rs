//! Error types for a certificate check.
//!
//! Every variant is terminal: the check makes a single attempt and any failure
//! is reported as CRITICAL. The `Display` text of each variant is the message
//! that ends up on the status line.

use std::fmt;
use std::time::Duration;

/// Failure of one of the pipeline stages before a verdict tier was reached.
#[derive(Debug)]
pub enum CheckError {
    /// Lookup against the custom DNS server failed
    Resolution {
        /// The hostname that was looked up
        hostname: String,
        /// The DNS server queried, as `host:port`
        dns_server: String,
        /// Why the lookup failed, `None` when it returned no addresses
        reason: Option<String>,
    },

    /// TCP connect or TLS handshake did not finish before the deadline
    ConnectTimeout {
        /// The dialed `address:port`
        target: String,
        /// The configured timeout
        timeout: Duration,
    },

    /// TCP connection failed (refused, reset, unreachable, unresolvable)
    ConnectFailed {
        /// The dialed `address:port`
        target: String,
        /// The underlying cause
        reason: String,
    },

    /// TLS handshake failed
    Tls {
        /// The dialed `address:port`
        target: String,
        /// The underlying cause
        reason: String,
    },

    /// Certificate chain is not trusted or not valid for the hostname
    Identity {
        /// The dialed `address:port`
        target: String,
        /// The verification failure reported by OpenSSL
        reason: String,
    },
}

impl CheckError {
    /// True for the timeout sub-case of a connection failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. })
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution {
                hostname,
                dns_server,
                reason: Some(reason),
            } => write!(
                f,
                "failed to resolve {} using DNS server {}: {}",
                hostname, dns_server, reason
            ),
            Self::Resolution {
                hostname,
                dns_server,
                reason: None,
            } => write!(
                f,
                "no IP addresses resolved for {} using DNS server {}",
                hostname, dns_server
            ),
            Self::ConnectTimeout { target, timeout } => {
                write!(
                    f,
                    "TCP connection timeout after {}s to {}",
                    timeout.as_secs(),
                    target
                )
            }
            Self::ConnectFailed { target, reason } => {
                write!(f, "failed to connect to {}: {}", target, reason)
            }
            Self::Tls { target, reason } => {
                write!(f, "TLS handshake with {} failed: {}", target, reason)
            }
            Self::Identity { target, reason } => {
                write!(f, "hostname verification failed for {}: {}", target, reason)
            }
        }
    }
}

impl std::error::Error for CheckError {}
