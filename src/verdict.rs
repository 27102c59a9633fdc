//! Verdict and its rendering for the monitoring system.
//!
//! The text format is one status line, preceded by an informational line with
//! the negotiated protocol whenever a handshake completed:
//!
//! ```text
//! SSL_CERT INFO example.com: negotiated TLS version TLS 1.3
//! SSL_CERT OK example.com: valid, expires on 2026-12-01 (1 month from now), issuer: CN=R3,O=Let's Encrypt,C=US
//! ```

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;

use crate::config::OutputFormat;
use crate::error::CheckError;
use crate::expiry::{humanize, Expiry, LeafCertificateFacts};

/// Monitoring severity, ordered from healthy to failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Level {
    Ok,
    Warning,
    Critical,
}

impl Level {
    /// Process exit status understood by Nagios-style monitoring.
    pub fn exit_code(self) -> i32 {
        match self {
            Level::Ok => 0,
            Level::Warning => 1,
            Level::Critical => 2,
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub level: Level,
    pub exit_code: i32,
    pub hostname: String,
    pub message: String,
    /// Negotiated protocol, set whenever the handshake completed
    pub protocol: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub days_remaining: Option<f64>,
}

impl Verdict {
    /// CRITICAL verdict for a stage that failed before classification.
    pub fn failure(hostname: &str, error: &CheckError, protocol: Option<String>) -> Self {
        Verdict {
            level: Level::Critical,
            exit_code: Level::Critical.exit_code(),
            hostname: hostname.to_string(),
            message: error.to_string(),
            protocol,
            expires: None,
            issuer: None,
            days_remaining: None,
        }
    }

    /// Verdict for a verified certificate, tiered by its remaining lifetime.
    pub fn expiry(
        hostname: &str,
        facts: LeafCertificateFacts,
        expiry: Expiry,
        protocol: String,
        now: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "valid, expires on {} ({}), issuer: {}",
            facts.not_after.format("%Y-%m-%d"),
            humanize(facts.not_after, now),
            facts.issuer
        );
        Verdict {
            level: expiry.level,
            exit_code: expiry.level.exit_code(),
            hostname: hostname.to_string(),
            message,
            protocol: Some(protocol),
            expires: Some(facts.not_after),
            issuer: Some(facts.issuer),
            days_remaining: Some(expiry.days_remaining),
        }
    }

    /// `SSL_CERT <LEVEL> <hostname>: <message>`
    pub fn status_line(&self) -> String {
        format!("SSL_CERT {} {}: {}", self.level, self.hostname, self.message)
    }

    /// `SSL_CERT INFO <hostname>: negotiated TLS version <protocol>`, when known.
    pub fn info_line(&self) -> Option<String> {
        self.protocol.as_ref().map(|protocol| {
            format!(
                "SSL_CERT INFO {}: negotiated TLS version {}",
                self.hostname, protocol
            )
        })
    }
}

/// Writes `verdict` to `out`. Never changes the verdict.
pub fn report<W: Write>(verdict: &Verdict, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            if let Some(info) = verdict.info_line() {
                writeln!(out, "{}", info)?;
            }
            writeln!(out, "{}", verdict.status_line())
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, verdict)?;
            writeln!(out)
        }
    }
}
