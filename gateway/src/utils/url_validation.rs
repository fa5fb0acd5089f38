//! Recording URL validation for SSRF protection
//!
//! Recording URLs arrive in webhook form fields, so they are untrusted. Before
//! the gateway downloads one it checks that the URL:
//! - Uses HTTPS
//! - Names a host rather than a raw IP address
//! - Resolves only to public addresses
//!
//! Insecure mode (local development and tests) skips all three checks but
//! still requires an http(s) URL with a host.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be HTTPS, got: {0}")]
    HttpsRequired(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL resolves to private/internal IP address: {0}")]
    PrivateIpDetected(IpAddr),

    #[error("Failed to resolve hostname: {0}")]
    DnsResolutionFailed(String),

    #[error("URL host is a raw IP address which is not allowed")]
    RawIpNotAllowed,
}

/// Loopback, RFC 1918, link-local, CGNAT, benchmarking, documentation,
/// broadcast and unspecified IPv4 ranges
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
        || (a == 100 && (b & 0xC0) == 64)
        || (a == 198 && (b == 18 || b == 19))
}

/// Loopback, unspecified, link-local, unique-local, documentation and
/// IPv4-mapped private IPv6 ranges
pub fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    let segments = ip.segments();
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    if segments[0] & 0xFFC0 == 0xFE80 || segments[0] & 0xFE00 == 0xFC00 {
        return true;
    }
    if segments[0] == 0x2001 && segments[1] == 0x0DB8 {
        return true;
    }
    ip.to_ipv4_mapped()
        .map(|v4| is_private_ipv4(&v4))
        .unwrap_or(false)
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

/// Validate a caller-supplied recording URL and return it parsed
///
/// With `allow_insecure` set, http:// URLs, raw IPs and private addresses are
/// accepted. Otherwise the host is resolved and every address must be public.
pub async fn validate_recording_url(
    url: &str,
    allow_insecure: bool,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme_ok = match parsed.scheme() {
        "https" => true,
        "http" => allow_insecure,
        _ => false,
    };
    if !scheme_ok {
        return Err(UrlValidationError::HttpsRequired(
            parsed.scheme().to_string(),
        ));
    }

    let host = match parsed.host() {
        Some(host) => host,
        None => return Err(UrlValidationError::MissingHost),
    };

    if allow_insecure {
        return Ok(parsed);
    }

    let domain = match host {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(_) | Host::Ipv6(_) => {
            warn!(url, "Recording URL contains raw IP address");
            return Err(UrlValidationError::RawIpNotAllowed);
        }
    };

    let port = parsed.port_or_known_default().unwrap_or(443);
    let addrs: Vec<_> = tokio::net::lookup_host((domain.as_str(), port))
        .await
        .map_err(|e| UrlValidationError::DnsResolutionFailed(format!("{domain}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(UrlValidationError::DnsResolutionFailed(format!(
            "No addresses found for {domain}"
        )));
    }

    if let Some(private) = addrs.iter().map(|a| a.ip()).find(is_private_ip) {
        warn!(
            host = %domain,
            resolved_ip = %private,
            "Recording URL resolves to private IP address (SSRF protection)"
        );
        return Err(UrlValidationError::PrivateIpDetected(private));
    }

    Ok(parsed)
}
