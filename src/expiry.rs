//! Leaf certificate facts and expiry classification.

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::x509::{X509NameRef, X509Ref};

use crate::verdict::Level;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What the check needs from the leaf certificate, copied out of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafCertificateFacts {
    /// Issuer distinguished name, most specific attribute first
    pub issuer: String,
    pub not_after: DateTime<Utc>,
}

impl LeafCertificateFacts {
    pub fn from_certificate(cert: &X509Ref) -> Result<Self, ErrorStack> {
        Ok(LeafCertificateFacts {
            issuer: distinguished_name(cert.issuer_name()),
            not_after: to_datetime(cert.not_after())?,
        })
    }
}

/// Remaining lifetime and the tier it falls into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expiry {
    pub level: Level,
    pub days_remaining: f64,
}

impl Expiry {
    pub fn evaluate(
        not_after: DateTime<Utc>,
        now: DateTime<Utc>,
        warn_days: i64,
        crit_days: i64,
    ) -> Self {
        let days_remaining = days_until(not_after, now);
        Expiry {
            level: classify(days_remaining, warn_days, crit_days),
            days_remaining,
        }
    }
}

/// Fractional days from `now` until `not_after`, negative once expired.
pub fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let remaining = not_after.signed_duration_since(now);
    remaining.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Maps remaining days to a tier. Both thresholds are inclusive and the
/// critical one is tested first.
pub fn classify(days_remaining: f64, warn_days: i64, crit_days: i64) -> Level {
    if days_remaining <= crit_days as f64 {
        Level::Critical
    } else if days_remaining <= warn_days as f64 {
        Level::Warning
    } else {
        Level::Ok
    }
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 12 * MONTH;
const LONG_TIME: i64 = 37 * YEAR;

enum Magnitude {
    Fixed(&'static str),
    Count(&'static str, i64),
}

/// Upper bounds (exclusive, in seconds) and how to render a distance below them.
const MAGNITUDES: &[(i64, Magnitude)] = &[
    (1, Magnitude::Fixed("now")),
    (2, Magnitude::Fixed("1 second")),
    (MINUTE, Magnitude::Count("seconds", 1)),
    (2 * MINUTE, Magnitude::Fixed("1 minute")),
    (HOUR, Magnitude::Count("minutes", MINUTE)),
    (2 * HOUR, Magnitude::Fixed("1 hour")),
    (DAY, Magnitude::Count("hours", HOUR)),
    (2 * DAY, Magnitude::Fixed("1 day")),
    (WEEK, Magnitude::Count("days", DAY)),
    (2 * WEEK, Magnitude::Fixed("1 week")),
    (MONTH, Magnitude::Count("weeks", WEEK)),
    (2 * MONTH, Magnitude::Fixed("1 month")),
    (YEAR, Magnitude::Count("months", MONTH)),
    (18 * MONTH, Magnitude::Fixed("1 year")),
    (2 * YEAR, Magnitude::Fixed("2 years")),
    (LONG_TIME, Magnitude::Count("years", YEAR)),
    (i64::MAX, Magnitude::Fixed("a long while")),
];

/// Relative description of `then` seen from `now`, e.g. "3 days from now"
/// or "1 week ago".
pub fn humanize(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = then.signed_duration_since(now).num_seconds();
    let label = if seconds > 0 { "from now" } else { "ago" };
    let distance = seconds.saturating_abs();

    let magnitude = MAGNITUDES
        .iter()
        .find(|(limit, _)| distance < *limit)
        .map(|(_, magnitude)| magnitude)
        .unwrap_or(&Magnitude::Fixed("a long while"));

    match magnitude {
        Magnitude::Fixed("now") => "now".to_string(),
        Magnitude::Fixed(text) => format!("{} {}", text, label),
        Magnitude::Count(unit, divisor) => format!("{} {} {}", distance / divisor, unit, label),
    }
}

fn to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>, ErrorStack> {
    let diff = Asn1Time::from_unix(0)?.diff(time)?;
    let seconds = i64::from(diff.days) * DAY + i64::from(diff.secs);
    Ok(DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::<Utc>::MAX_UTC))
}

/// Renders a name as `CN=..,O=..,C=..`, reversing the encoded RDN order.
fn distinguished_name(name: &X509NameRef) -> String {
    let mut parts: Vec<String> = name
        .entries()
        .map(|entry| {
            let key = entry
                .object()
                .nid()
                .short_name()
                .map(str::to_string)
                .unwrap_or_else(|_| entry.object().to_string());
            let value = String::from_utf8_lossy(entry.data().as_slice());
            format!("{}={}", key, value)
        })
        .collect();
    parts.reverse();
    parts.join(",")
}
