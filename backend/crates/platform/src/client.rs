//! Client identification utilities
//!
//! Common functions for identifying clients via HTTP headers.

use axum::http::{HeaderMap, header};
use std::fmt;
use std::net::IpAddr;

/// Coarse device class derived from the User-Agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceClass {
    /// Classify a User-Agent string
    ///
    /// Order matters: phones are checked before tablets, so an iPad UA that
    /// advertises "Mobile" is reported as a mobile device.
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent.filter(|ua| !ua.trim().is_empty()) else {
            return DeviceClass::Unknown;
        };
        let ua = ua.to_lowercase();

        if ["mobile", "android", "iphone"].iter().any(|k| ua.contains(k)) {
            DeviceClass::Mobile
        } else if ["tablet", "ipad"].iter().any(|k| ua.contains(k)) {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    /// Human readable label shown in session lists
    pub const fn label(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "Mobile Device",
            DeviceClass::Tablet => "Tablet",
            DeviceClass::Desktop => "Desktop Computer",
            DeviceClass::Unknown => "Unknown Device",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a request tells us about the client, captured once per request
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip: Option<IpAddr>,
    pub device: DeviceClass,
}

/// Number of reverse proxies in front of the server that append to
/// `X-Forwarded-For`
///
/// With zero (the default) the header is ignored and the peer address is
/// the client. Placed in request extensions by the binary; extractors that
/// find none fall back to the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedProxies(pub usize);

/// Collect [`ClientInfo`] from request headers and the peer address
pub fn extract_client_info(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    proxies: TrustedProxies,
) -> ClientInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        device: DeviceClass::from_user_agent(user_agent.as_deref()),
        ip: extract_client_ip(headers, direct_ip, proxies),
        user_agent,
    }
}

/// Client IP address as seen through `proxies` trusted hops
///
/// Hops are read right to left: the peer is hop 0, the last
/// `X-Forwarded-For` entry hop 1, and so on. The address `proxies.0` hops
/// back is the client; entries further left were written by the client
/// and are never consulted. A short chain yields its left-most hop; an
/// unparseable hop ends the walk.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    proxies: TrustedProxies,
) -> Option<IpAddr> {
    if proxies.0 == 0 {
        return direct_ip;
    }

    let forwarded: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .collect();

    let mut client = direct_ip;
    for hop in forwarded.iter().rev().take(proxies.0) {
        match hop.trim().parse::<IpAddr>() {
            Ok(ip) => client = Some(ip),
            Err(_) => break,
        }
    }
    client
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_device_classification() {
        let cases = [
            (Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"), DeviceClass::Mobile),
            (Some("Mozilla/5.0 (Linux; Android 14)"), DeviceClass::Mobile),
            (Some("Mozilla/5.0 (iPad; CPU OS 17_0)"), DeviceClass::Tablet),
            (Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"), DeviceClass::Desktop),
            (Some("   "), DeviceClass::Unknown),
            (None, DeviceClass::Unknown),
        ];
        for (ua, expected) in cases {
            assert_eq!(DeviceClass::from_user_agent(ua), expected, "{ua:?}");
        }
        assert_eq!(DeviceClass::Desktop.label(), "Desktop Computer");
    }

    fn peer() -> Option<IpAddr> {
        Some("203.0.113.7".parse().unwrap())
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_extract_client_info() {
        let mut headers = forwarded("198.51.100.9, 10.0.0.1");
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.5.0"));

        let info = extract_client_info(&headers, peer(), TrustedProxies(1));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.5.0"));
        assert_eq!(info.ip, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(info.device, DeviceClass::Desktop);
    }

    #[test]
    fn test_forwarded_for_ignored_without_trusted_proxies() {
        let headers = forwarded("198.51.100.9");
        assert_eq!(extract_client_ip(&headers, peer(), TrustedProxies::default()), peer());
    }

    #[test]
    fn test_spoofed_left_entries_are_skipped() {
        // Client sent "1.2.3.4", the single trusted proxy appended the real address.
        let headers = forwarded("1.2.3.4, 198.51.100.9");
        assert_eq!(
            extract_client_ip(&headers, peer(), TrustedProxies(1)),
            Some("198.51.100.9".parse().unwrap())
        );
        assert_eq!(
            extract_client_ip(&headers, peer(), TrustedProxies(2)),
            Some("1.2.3.4".parse().unwrap())
        );
    }

    #[test]
    fn test_short_or_malformed_chain() {
        assert_eq!(
            extract_client_ip(&forwarded("198.51.100.9"), peer(), TrustedProxies(3)),
            Some("198.51.100.9".parse().unwrap())
        );
        assert_eq!(
            extract_client_ip(&forwarded("garbage"), peer(), TrustedProxies(1)),
            peer()
        );
        assert_eq!(
            extract_client_ip(&forwarded("1.2.3.4, garbage"), peer(), TrustedProxies(2)),
            peer()
        );
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), None, TrustedProxies(1)),
            None
        );
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
