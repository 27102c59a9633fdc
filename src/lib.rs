//! Certificate health check for Nagios-style monitoring.
//!
//! One call to [`check`] resolves the target, performs a TLS handshake,
//! verifies the presented identity and classifies the leaf certificate's
//! remaining lifetime into a [`Verdict`]. Any failure along the way
//! short-circuits to a CRITICAL verdict; nothing here exits the process.
//!
//! ```no_run
//! use check_ssl_cert::{check, CheckRequest};
//!
//! let verdict = check(&CheckRequest::new("example.com"));
//! println!("{}", verdict.status_line());
//! std::process::exit(verdict.exit_code);
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod expiry;
pub mod identity;
pub mod metrics;
pub mod resolver;
pub mod verdict;

use chrono::Utc;
use log::debug;

pub use config::{CheckRequest, Config, ConfigError, MinTlsVersion, OutputFormat};
pub use error::CheckError;
pub use expiry::LeafCertificateFacts;
pub use verdict::{Level, Verdict};

/// Runs a single check and returns its verdict.
pub fn check(request: &CheckRequest) -> Verdict {
    match inspect(request) {
        Ok((facts, protocol)) => {
            let now = Utc::now();
            let expiry =
                expiry::Expiry::evaluate(facts.not_after, now, request.warn_days, request.crit_days);
            debug!(
                "{} expires in {:.2} days: {}",
                request.hostname, expiry.days_remaining, expiry.level
            );
            Verdict::expiry(&request.hostname, facts, expiry, protocol, now)
        }
        Err((error, protocol)) => {
            debug!("check of {} failed: {}", request.hostname, error);
            Verdict::failure(&request.hostname, &error, protocol)
        }
    }
}

/// Resolves, connects and verifies, returning the leaf facts and negotiated
/// protocol. On failure the protocol is included when the handshake completed.
fn inspect(
    request: &CheckRequest,
) -> Result<(LeafCertificateFacts, String), (CheckError, Option<String>)> {
    let target = resolver::resolve_target(request).map_err(|e| (e, None))?;
    debug!("dialing {} for {}", target.authority(), request.hostname);

    let session = connector::connect(request, &target).map_err(|e| (e, None))?;
    let protocol = session.protocol();

    if let Err(e) = identity::verify_identity(&session, &request.hostname) {
        return Err((e, Some(protocol)));
    }

    let facts = match session.ssl().peer_certificate() {
        Some(cert) => LeafCertificateFacts::from_certificate(&cert).map_err(|e| CheckError::Tls {
            target: session.target().to_string(),
            reason: format!("unreadable peer certificate: {}", e),
        }),
        None => Err(CheckError::Identity {
            target: session.target().to_string(),
            reason: "no peer certificate".to_string(),
        }),
    };
    drop(session);

    match facts {
        Ok(facts) => Ok((facts, protocol)),
        Err(e) => Err((e, Some(protocol))),
    }
}
