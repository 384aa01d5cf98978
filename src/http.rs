//! Outbound HTTP helpers shared by the fetchers and senders.
//!
//! Every URL taken from a feed or from configuration goes through
//! [`validate_url`] before a request is made, and response bodies are read
//! under a size limit.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, Response};

use crate::{FeedcastError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent string for outbound requests.
pub const USER_AGENT: &str = concat!("feedcast/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with the given total timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FeedcastError::Config(format!("failed to create HTTP client: {}", e)))
}

/// Read a response body, refusing bodies larger than `max_bytes`.
pub async fn read_limited(response: Response, max_bytes: u64) -> Result<Vec<u8>> {
    if let Some(content_length) = response.content_length() {
        if content_length > max_bytes {
            return Err(FeedcastError::Fetch(format!(
                "response too large: {} bytes (max {} bytes)",
                content_length, max_bytes
            )));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FeedcastError::Fetch(format!("failed to read response: {}", e)))?;

    if bytes.len() as u64 > max_bytes {
        return Err(FeedcastError::Fetch(format!(
            "response too large: {} bytes (max {} bytes)",
            bytes.len(),
            max_bytes
        )));
    }

    Ok(bytes.to_vec())
}

/// Whether `url` parses as an absolute http(s) URL with a host.
pub fn is_absolute_http_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}

/// Validate a URL before fetching it.
///
/// The URL must use http or https and must not point at a loopback,
/// private or otherwise internal host.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| FeedcastError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedcastError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedcastError::Fetch("URL has no host".to_string()))?;

    let forbidden = match host {
        url::Host::Domain(domain) => is_forbidden_hostname(domain),
        url::Host::Ipv4(ipv4) => is_private_ip(&IpAddr::V4(ipv4)),
        url::Host::Ipv6(ipv6) => is_private_ip(&IpAddr::V6(ipv6)),
    };

    if forbidden {
        return Err(FeedcastError::Fetch(format!("forbidden host: {}", host)));
    }

    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: [&str; 5] = [".local", ".localhost", ".internal", ".intranet", ".lan"];

    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                // Documentation: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                || (octets[0] == 192 && octets[1] == 0 && octets[2] == 2)
                || (octets[0] == 198 && octets[1] == 51 && octets[2] == 100)
                || (octets[0] == 203 && octets[1] == 0 && octets[2] == 113)
        }
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_public_hosts() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://8.8.8.8/rss").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_scheme() {
        assert!(validate_url("ftp://example.com/feed").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_validate_url_rejects_internal_hosts() {
        assert!(validate_url("http://localhost/feed").is_err());
        assert!(validate_url("http://printer.local/feed").is_err());
        assert!(validate_url("http://127.0.0.1/feed").is_err());
        assert!(validate_url("http://10.1.2.3/feed").is_err());
        assert!(validate_url("http://172.16.0.1/feed").is_err());
        assert!(validate_url("http://192.168.1.1/feed").is_err());
        assert!(validate_url("http://169.254.169.254/latest").is_err());
        assert!(validate_url("http://[::1]/feed").is_err());
        assert!(validate_url("http://[fd00::1]/feed").is_err());
    }

    #[test]
    fn test_is_absolute_http_url() {
        assert!(is_absolute_http_url("https://example.com/a"));
        assert!(!is_absolute_http_url("/relative/path"));
        assert!(!is_absolute_http_url(""));
        assert!(!is_absolute_http_url("mailto:someone@example.com"));
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
