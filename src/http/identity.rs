//! Caller identification from request headers.

use axum::http::HeaderMap;

/// Identifier used when no address header is present.
pub const LOOPBACK_IDENTIFIER: &str = "127.0.0.1";

/// Headers consulted for the client address, in priority order.
const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const CF_CONNECTING_IP: &str = "cf-connecting-ip";

/// Derive the rate limit identifier for a request.
///
/// Checks the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// `CF-Connecting-IP`, and falls back to [`LOOPBACK_IDENTIFIER`]. Values are
/// trimmed; blank or non-ASCII values count as absent.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| trimmed(headers, REAL_IP))
        .or_else(|| trimmed(headers, CF_CONNECTING_IP))
        .unwrap_or(LOOPBACK_IDENTIFIER)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn trimmed<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    header_str(headers, name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
