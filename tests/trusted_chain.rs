//! End-to-end checks against loopback servers whose certificates chain to a
//! locally generated CA.
//!
//! The CA is installed through `SSL_CERT_FILE`, which applies to the whole
//! process, so these tests live in their own binary.

use std::io::Read;
use std::net::TcpListener;
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};

use check_ssl_cert::{check, Config, Level, Verdict};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509Name, X509NameBuilder, X509};
use tempfile::NamedTempFile;

const CA_NAME: &str = "Loopback Root CA";

struct TestCa {
    cert: X509,
    key: PKey<Private>,
    // keeps the trust file alive for the whole run
    _pem: NamedTempFile,
}

fn new_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn serial_number(builder: &mut openssl::x509::X509Builder) {
    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
}

fn name(common_name: &str) -> X509Name {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("O", "check_ssl_cert tests").unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    name.build()
}

/// The process-wide test CA, trusted through `SSL_CERT_FILE` on first use.
fn ca() -> &'static TestCa {
    static CA: OnceLock<TestCa> = OnceLock::new();
    CA.get_or_init(|| {
        let key = new_key();
        let subject = name(CA_NAME);

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        serial_number(&mut builder);
        builder.set_subject_name(&subject).unwrap();
        builder.set_issuer_name(&subject).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(365).unwrap())
            .unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        let cert = builder.build();

        let mut pem = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut pem, &cert.to_pem().unwrap()).unwrap();
        std::env::set_var("SSL_CERT_FILE", pem.path());

        TestCa {
            cert,
            key,
            _pem: pem,
        }
    })
}

/// Leaf for `dns_name` signed by the test CA, expiring in `valid_days`.
fn issue_leaf(dns_name: &str, valid_days: u32) -> (X509, PKey<Private>) {
    let ca = ca();
    let key = new_key();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    serial_number(&mut builder);
    builder.set_subject_name(&name(dns_name)).unwrap();
    builder.set_issuer_name(ca.cert.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(valid_days).unwrap())
        .unwrap();
    let san = SubjectAlternativeName::new()
        .dns(dns_name)
        .build(&builder.x509v3_context(Some(&ca.cert), None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&ca.key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}

/// Serves one TLS connection on a random loopback port. The handle finishes
/// once the client has closed its side.
fn spawn_tls_server(cert: X509, key: PKey<Private>) -> (u16, JoinHandle<()>) {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.check_private_key().unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            if let Ok(mut tls) = acceptor.accept(stream) {
                let _ = tls.read(&mut [0u8; 1]);
            }
        }
    });
    (port, handle)
}

/// Checks `localhost` against a server presenting a CA-issued leaf.
fn check_leaf(dns_name: &str, valid_days: u32) -> Verdict {
    let (cert, key) = issue_leaf(dns_name, valid_days);
    let (port, server) = spawn_tls_server(cert, key);

    let request = Config {
        hostname: Some("localhost".to_string()),
        ip_address: Some("127.0.0.1".to_string()),
        port: Some(port),
        timeout: Some(10),
        ..Config::defaults()
    }
    .into_request()
    .unwrap();
    let verdict = check(&request);

    // the session is closed before check returns, so the server side ends
    server.join().unwrap();
    verdict
}

#[test]
fn test_trusted_leaf_far_from_expiry_is_ok() {
    let verdict = check_leaf("localhost", 30);

    assert_eq!(verdict.level, Level::Ok, "unexpected: {}", verdict.message);
    assert_eq!(verdict.exit_code, 0);
    let days = verdict.days_remaining.unwrap();
    assert!(days > 29.9 && days <= 30.0, "days remaining: {}", days);
    assert!(verdict
        .message
        .ends_with(&format!("issuer: CN={},O=check_ssl_cert tests", CA_NAME)));
}

#[test]
fn test_trusted_leaf_inside_warning_window() {
    let verdict = check_leaf("localhost", 10);

    assert_eq!(verdict.level, Level::Warning, "unexpected: {}", verdict.message);
    assert_eq!(verdict.exit_code, 1);
    assert!(
        verdict
            .status_line()
            .starts_with("SSL_CERT WARNING localhost: valid, expires on "),
        "unexpected status line: {}",
        verdict.status_line()
    );
    assert!(verdict.message.contains("(1 week from now)"));
    let info = verdict.info_line().unwrap();
    assert!(info.starts_with("SSL_CERT INFO localhost: negotiated TLS version TLS 1."));
    assert!(verdict.issuer.unwrap().contains(CA_NAME));
}

#[test]
fn test_trusted_leaf_inside_critical_window() {
    let verdict = check_leaf("localhost", 3);

    assert_eq!(verdict.level, Level::Critical, "unexpected: {}", verdict.message);
    assert_eq!(verdict.exit_code, 2);
    assert!(verdict.message.starts_with("valid, expires on "));
    assert!(verdict.message.contains("(2 days from now)"));
}

#[test]
fn test_trusted_leaf_for_other_name_is_critical() {
    let verdict = check_leaf("other.example", 30);

    assert_eq!(verdict.level, Level::Critical);
    assert!(
        verdict
            .message
            .starts_with("hostname verification failed for 127.0.0.1:"),
        "unexpected message: {}",
        verdict.message
    );
    assert!(verdict
        .message
        .contains("certificate is not valid for localhost: hostname mismatch"));
    assert!(verdict.days_remaining.is_none());
    assert!(verdict.protocol.is_some());
}
