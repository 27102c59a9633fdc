//! TCP dial and TLS handshake.
//!
//! The configured timeout is one deadline covering the TCP connect and the
//! handshake. Peer verification runs during the handshake but never aborts
//! it: the outcome is left on the session for [`crate::identity`] to judge.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::debug;
use openssl::error::ErrorStack;
use openssl::ssl::{
    HandshakeError, Ssl, SslConnector, SslMethod, SslOptions, SslRef, SslStream, SslVerifyMode,
    SslVersion,
};

use crate::config::{CheckRequest, MinTlsVersion};
use crate::error::CheckError;
use crate::resolver::ResolvedTarget;

/// Longest wait honoured for one check; larger timeouts are treated as this.
pub(crate) const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// An established TLS connection.
///
/// Owns the socket for the duration of a check. Dropping it sends a
/// close_notify and closes the socket, whatever stage ended the check.
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    target: String,
}

impl TlsSession {
    /// The dialed `address:port`.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Read-only view of the completed handshake.
    pub fn ssl(&self) -> &SslRef {
        self.stream.ssl()
    }

    /// Label of the negotiated protocol version, e.g. "TLS 1.2".
    pub fn protocol(&self) -> String {
        protocol_label(self.ssl())
    }
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        if let Err(e) = self.stream.shutdown() {
            debug!("TLS shutdown with {} failed: {}", self.target, e);
        }
    }
}

/// Dials `target` and completes a TLS handshake announcing `request.hostname`.
pub fn connect(request: &CheckRequest, target: &ResolvedTarget) -> Result<TlsSession, CheckError> {
    let authority = target.authority();
    let deadline = deadline_after(request.timeout);
    let timed_out = || CheckError::ConnectTimeout {
        target: authority.clone(),
        timeout: request.timeout,
    };

    let tcp = dial(target, deadline, &authority, request.timeout)?;
    debug!("connected to {}", authority);

    let ssl = build_ssl(request).map_err(|e| CheckError::Tls {
        target: authority.clone(),
        reason: e.to_string(),
    })?;

    let remaining = remaining(deadline).ok_or_else(timed_out)?;
    tcp.set_read_timeout(Some(remaining))
        .and_then(|_| tcp.set_write_timeout(Some(remaining)))
        .map_err(|e| CheckError::ConnectFailed {
            target: authority.clone(),
            reason: e.to_string(),
        })?;

    match ssl.connect(tcp) {
        Ok(stream) => {
            let session = TlsSession {
                stream,
                target: authority,
            };
            debug!(
                "handshake with {} complete, protocol {}",
                session.target,
                session.protocol()
            );
            Ok(session)
        }
        // a read or write hit the socket timeout
        Err(HandshakeError::WouldBlock(_)) => Err(timed_out()),
        Err(HandshakeError::Failure(mid)) => {
            if mid.error().io_error().map(is_timeout).unwrap_or(false) {
                Err(timed_out())
            } else {
                Err(CheckError::Tls {
                    target: authority.clone(),
                    reason: mid.error().to_string(),
                })
            }
        }
        Err(HandshakeError::SetupFailure(e)) => Err(CheckError::Tls {
            target: authority.clone(),
            reason: e.to_string(),
        }),
    }
}

fn build_ssl(request: &CheckRequest) -> Result<Ssl, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_min_proto_version(min_proto_version(request.min_tls_version))?;
    if matches!(
        request.min_tls_version,
        MinTlsVersion::NoFloor | MinTlsVersion::Ssl3
    ) {
        // the connector defaults refuse legacy protocols and ciphers
        builder.clear_options(SslOptions::NO_SSLV3);
        builder.set_security_level(0);
    }
    // record verification failures without aborting the handshake
    builder.set_verify_callback(SslVerifyMode::PEER, |_, _| true);

    builder.build().configure()?.into_ssl(&request.hostname)
}

fn min_proto_version(version: MinTlsVersion) -> Option<SslVersion> {
    match version {
        MinTlsVersion::NoFloor => None,
        MinTlsVersion::Ssl3 => Some(SslVersion::SSL3),
        MinTlsVersion::Tls1 => Some(SslVersion::TLS1),
        MinTlsVersion::Tls1_1 => Some(SslVersion::TLS1_1),
        MinTlsVersion::Tls1_2 => Some(SslVersion::TLS1_2),
        MinTlsVersion::Tls1_3 => Some(SslVersion::TLS1_3),
    }
}

/// Tries every address of the dial target in order until one accepts or the
/// deadline passes.
fn dial(
    target: &ResolvedTarget,
    deadline: Instant,
    authority: &str,
    timeout: Duration,
) -> Result<TcpStream, CheckError> {
    let failed = |reason: String| CheckError::ConnectFailed {
        target: authority.to_string(),
        reason,
    };
    let timed_out = || CheckError::ConnectTimeout {
        target: authority.to_string(),
        timeout,
    };

    let addresses: Vec<SocketAddr> = (target.dial_address.as_str(), target.dial_port)
        .to_socket_addrs()
        .map_err(|e| failed(e.to_string()))?
        .collect();

    let mut last_error = None;
    for address in addresses {
        let remaining = remaining(deadline).ok_or_else(timed_out)?;
        match TcpStream::connect_timeout(&address, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect to {} failed: {}", address, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if is_timeout(&e) => Err(timed_out()),
        Some(e) => Err(failed(e.to_string())),
        None => Err(failed(format!("no addresses found for {}", target.dial_address))),
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_WAIT)).unwrap_or(now)
}

fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn protocol_label(ssl: &SslRef) -> String {
    let version = match ssl.version2() {
        Some(version) => version,
        None => return format!("Unknown ({})", ssl.version_str()),
    };
    let label = if version == SslVersion::SSL3 {
        "SSLv3"
    } else if version == SslVersion::TLS1 {
        "TLS 1.0"
    } else if version == SslVersion::TLS1_1 {
        "TLS 1.1"
    } else if version == SslVersion::TLS1_2 {
        "TLS 1.2"
    } else if version == SslVersion::TLS1_3 {
        "TLS 1.3"
    } else {
        return format!("Unknown ({})", ssl.version_str());
    };
    label.to_string()
}
