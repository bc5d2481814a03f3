//! Client IP resolution.
//!
//! Order: first `X-Forwarded-For` entry, `X-Real-IP`, transport peer address,
//! then the `"unknown"` sentinel. IPv4-mapped IPv6 prefixes are stripped so
//! the same client always yields the same identifier.

use std::net::IpAddr;

use axum::http::HeaderMap;

pub const UNKNOWN_IP: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";
const MAPPED_PREFIX: &str = "::ffff:";

pub fn resolve_client_ip(headers: &HeaderMap, transport: Option<IpAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    match forwarded.or_else(real_ip) {
        Some(ip) => normalize(ip).to_string(),
        None => match transport {
            Some(addr) => normalize(&addr.to_string()).to_string(),
            None => UNKNOWN_IP.to_string(),
        },
    }
}

fn normalize(ip: &str) -> &str {
    match ip.get(..MAPPED_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(MAPPED_PREFIX) => &ip[MAPPED_PREFIX.len()..],
        _ => ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let h = headers(&[("x-forwarded-for", "10.0.0.1, 10.0.0.2"), ("x-real-ip", "10.9.9.9")]);
        assert_eq!(resolve_client_ip(&h, None), "10.0.0.1");
    }

    #[test]
    fn test_real_ip_strips_mapped_prefix() {
        let h = headers(&[("x-real-ip", "::ffff:192.168.1.1")]);
        assert_eq!(resolve_client_ip(&h, None), "192.168.1.1");
    }

    #[test]
    fn test_transport_fallback() {
        let v4 = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(v4)), "127.0.0.1");

        let mapped = IpAddr::V6(Ipv4Addr::new(172, 16, 0, 3).to_ipv6_mapped());
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(mapped)), "172.16.0.3");

        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(v6)), "::1");
    }

    #[test]
    fn test_unknown_when_nothing_available() {
        let h = headers(&[("x-forwarded-for", " ")]);
        assert_eq!(resolve_client_ip(&h, None), UNKNOWN_IP);
    }
}
