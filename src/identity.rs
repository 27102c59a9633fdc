use openssl::x509::X509VerifyResult;

use crate::connector::TlsSession;
use crate::error::CheckError;

/// Confirms the peer chain is trusted by the default store and valid for
/// `hostname`, whatever address was dialed.
///
/// The check itself already ran during the handshake against `hostname`;
/// this reads its recorded result.
pub fn verify_identity(session: &TlsSession, hostname: &str) -> Result<(), CheckError> {
    let failed = |reason: String| CheckError::Identity {
        target: session.target().to_string(),
        reason,
    };

    if session.ssl().peer_certificate().is_none() {
        return Err(failed(format!(
            "no certificate presented for {}",
            hostname
        )));
    }

    let result = session.ssl().verify_result();
    if result != X509VerifyResult::OK {
        return Err(failed(format!(
            "certificate is not valid for {}: {}",
            hostname,
            result.error_string()
        )));
    }

    Ok(())
}
