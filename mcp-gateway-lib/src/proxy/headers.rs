use std::net::SocketAddr;

use http::header::{HeaderValue, HOST};
use http::HeaderMap;

use crate::security::identity::names;

/// Add X-Forwarded-* headers to an outbound request
///
/// This function:
/// 1. Appends the peer IP to X-Forwarded-For (or creates it if missing)
/// 2. Sets X-Forwarded-Host from the inbound Host header
/// 3. Sets X-Forwarded-Proto based on is_https
pub fn add_forwarded_headers(headers: &mut HeaderMap, peer: SocketAddr, is_https: bool) {
    let client_ip = peer.ip().to_string();
    let forwarded_for = match headers.get(names::FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(names::FORWARDED_FOR, value);
    }

    if let Some(host) = headers.get(HOST).cloned() {
        headers.insert(names::FORWARDED_HOST, host);
    }

    let proto = if is_https { "https" } else { "http" };
    headers.insert(names::FORWARDED_PROTO, HeaderValue::from_static(proto));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_existing_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(names::FORWARDED_FOR, HeaderValue::from_static("203.0.113.5"));
        headers.insert(HOST, HeaderValue::from_static("gateway.example.com"));

        add_forwarded_headers(&mut headers, SocketAddr::from(([10, 0, 0, 2], 4000)), true);

        assert_eq!(
            headers.get(names::FORWARDED_FOR).and_then(|v| v.to_str().ok()),
            Some("203.0.113.5, 10.0.0.2")
        );
        assert_eq!(
            headers.get(names::FORWARDED_HOST).and_then(|v| v.to_str().ok()),
            Some("gateway.example.com")
        );
        assert_eq!(
            headers.get(names::FORWARDED_PROTO).and_then(|v| v.to_str().ok()),
            Some("https")
        );
    }

    #[test]
    fn creates_forwarded_for_from_peer() {
        let mut headers = HeaderMap::new();
        add_forwarded_headers(&mut headers, SocketAddr::from(([192, 0, 2, 1], 4000)), false);
        assert_eq!(
            headers.get(names::FORWARDED_FOR).and_then(|v| v.to_str().ok()),
            Some("192.0.2.1")
        );
        assert!(headers.get(names::FORWARDED_HOST).is_none());
    }
}
