use lazy_static::lazy_static;
use log::{debug, warn};
use prometheus::{labels, register_gauge, Gauge};

use crate::verdict::Verdict;

lazy_static! {
    static ref CHECK_SSL_CERT_DAYS_UNTIL_EXPIRY: Gauge = register_gauge!(
        "check_ssl_cert_days_until_expiry",
        "days until the leaf certificate expires"
    )
    .unwrap();
    static ref CHECK_SSL_CERT_STATUS: Gauge = register_gauge!(
        "check_ssl_cert_status",
        "check status: 0 ok, 1 warning, 2 critical"
    )
    .unwrap();
}

/// Function to push the verdict to a prometheus push gateway
/// # Arguments
/// * `verdict` - Outcome of the check
/// * `prometheus_address` - Push gateway base address
///
/// Push failures are logged and otherwise ignored.
pub fn prometheus_metrics(verdict: &Verdict, prometheus_address: &str) {
    record(verdict);

    let metric_families = prometheus::gather();
    let result = prometheus::push_metrics(
        "check_ssl_cert",
        labels! {
            "instance".to_owned() => "check_ssl_cert".to_owned(),
            "host".to_owned() => verdict.hostname.to_owned(),
            "level".to_owned() => verdict.level.to_string(),
            "protocol".to_owned() => verdict.protocol.clone().unwrap_or_default(),
            "issuer".to_owned() => verdict.issuer.clone().unwrap_or_default(),
        },
        &format!("{}/metrics/job", prometheus_address),
        metric_families,
        None,
    );

    match result {
        Ok(_) => debug!("pushed metrics to {}", prometheus_address),
        Err(e) => warn!("Failed to push metrics to prometheus: {}", e),
    }
}

/// Sets the gauges for `verdict`. The expiry gauge is only touched when a
/// certificate was read, so a failed connection never looks like an expired
/// certificate.
fn record(verdict: &Verdict) {
    if let Some(days) = verdict.days_remaining {
        CHECK_SSL_CERT_DAYS_UNTIL_EXPIRY.set(days);
    }
    CHECK_SSL_CERT_STATUS.set(f64::from(verdict.exit_code));
}
