use std::net::SocketAddr;

use http::HeaderMap;

pub mod names {
    pub const REAL_IP: &str = "x-real-ip";
    pub const FORWARDED_FOR: &str = "x-forwarded-for";
    pub const FORWARDED_HOST: &str = "x-forwarded-host";
    pub const FORWARDED_PROTO: &str = "x-forwarded-proto";
}

/// Derives the identity used to throttle authentication attempts.
///
/// Precedence: a non-empty `X-Real-IP`, then the first entry of
/// `X-Forwarded-For`, then the peer IP without its port. Forwarding headers
/// are taken at face value; there is no trusted-proxy list.
pub fn client_identity(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(real_ip) = header_str(headers, names::REAL_IP) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    if let Some(xff) = header_str(headers, names::FORWARDED_FOR) {
        if let Some(first) = xff.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    peer.ip().to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
