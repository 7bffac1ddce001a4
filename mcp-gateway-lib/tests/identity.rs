use std::net::SocketAddr;

use http::{HeaderMap, HeaderValue};
use mcp_gateway_lib::client_identity;

fn peer() -> SocketAddr {
    SocketAddr::from(([198, 51, 100, 7], 40000))
}

#[test]
fn first_forwarded_for_entry_is_the_identity() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.2"));
    assert_eq!(client_identity(&headers, peer()), "203.0.113.5");
}

#[test]
fn real_ip_takes_precedence() {
    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.44"));
    headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5"));
    assert_eq!(client_identity(&headers, peer()), "192.0.2.44");
}

#[test]
fn peer_address_without_port_is_the_fallback() {
    assert_eq!(client_identity(&HeaderMap::new(), peer()), "198.51.100.7");

    let v6: SocketAddr = SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 1], 8443));
    assert_eq!(client_identity(&HeaderMap::new(), v6), "::1");
}

#[test]
fn values_are_used_verbatim() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
    assert_eq!(client_identity(&headers, peer()), "not-an-ip");
}
