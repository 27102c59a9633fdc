//! Dial target resolution.
//!
//! Without a custom DNS server the dial address is the IP override or the
//! hostname itself, and the connector lets the system resolver handle it.
//! With one, the hostname is looked up against that server only.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use log::debug;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::Resolver;

use crate::config::CheckRequest;
use crate::connector::MAX_WAIT;
use crate::error::CheckError;

/// Address and port the connector dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub dial_address: String,
    pub dial_port: u16,
}

impl ResolvedTarget {
    /// `address:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        if self.dial_address.contains(':') {
            format!("[{}]:{}", self.dial_address, self.dial_port)
        } else {
            format!("{}:{}", self.dial_address, self.dial_port)
        }
    }
}

/// Picks the address to dial for `request`.
///
/// An explicit IP override always wins. A custom DNS server is still queried
/// when an override is set, and a failed lookup is still terminal.
pub fn resolve_target(request: &CheckRequest) -> Result<ResolvedTarget, CheckError> {
    let mut dial_address = request
        .ip_address
        .clone()
        .unwrap_or_else(|| request.hostname.clone());

    if let Some(dns_server) = &request.dns_server {
        let addresses = lookup_with_server(request, dns_server)?;
        debug!(
            "{} resolved to {:?} via {}",
            request.hostname, addresses, dns_server
        );
        if request.ip_address.is_none() {
            dial_address = addresses[0].to_string();
        }
    }

    Ok(ResolvedTarget {
        dial_address,
        dial_port: request.port,
    })
}

/// Looks `request.hostname` up against `dns_server` only. Never returns an
/// empty list: an empty answer is a `Resolution` error without a reason, a
/// negative one (NXDOMAIN, SERVFAIL, ..) carries its response code.
fn lookup_with_server(
    request: &CheckRequest,
    dns_server: &str,
) -> Result<Vec<IpAddr>, CheckError> {
    let failure = |reason: Option<String>| CheckError::Resolution {
        hostname: request.hostname.clone(),
        dns_server: dns_server.to_string(),
        reason,
    };

    let server = nameserver_address(dns_server).map_err(|e| failure(Some(e)))?;

    let mut opts = ResolverOpts::default();
    opts.timeout = request.timeout.min(MAX_WAIT);
    opts.attempts = 1;
    opts.use_hosts_file = false;
    opts.ndots = 0;
    opts.cache_size = 0;

    let nameservers = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
    let config = ResolverConfig::from_parts(None, vec![], nameservers);
    let resolver = Resolver::new(config, opts).map_err(|e| failure(Some(e.to_string())))?;

    let addresses: Vec<IpAddr> = match resolver.lookup_ip(request.hostname.as_str()) {
        Ok(lookup) => lookup.iter().collect(),
        Err(e) => match e.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. }
                if *response_code == ResponseCode::NoError =>
            {
                Vec::new()
            }
            ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                return Err(failure(Some(format!("no such host ({})", response_code))));
            }
            _ => return Err(failure(Some(e.to_string()))),
        },
    };

    if addresses.is_empty() {
        return Err(failure(None));
    }
    Ok(addresses)
}

/// Socket address of the DNS server. A server given by name goes through the
/// system resolver first.
fn nameserver_address(dns_server: &str) -> Result<SocketAddr, String> {
    let (host, port) = split_host_port(dns_server)
        .ok_or_else(|| format!("invalid DNS server address {}", dns_server))?;
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|e| e.to_string())?
        .next()
        .ok_or_else(|| format!("no address for DNS server {}", host))
}

/// Splits `host:port` or `[v6]:port`. The host must not be empty and the port
/// must be numeric.
pub(crate) fn split_host_port(value: &str) -> Option<(&str, u16)> {
    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        (host, tail.strip_prefix(':')?)
    } else {
        let (host, port) = value.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        (host, port)
    };
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}
