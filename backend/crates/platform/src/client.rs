//! Client identification utilities
//!
//! Resolves the logical client a rate-limit decision is made for.

use axum::http::HeaderMap;
use std::fmt;
use std::net::IpAddr;

/// Header carrying an explicit client identifier
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Identifier used when neither the header nor the peer address is known
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Opaque client identity
///
/// Used verbatim as part of every store key. No normalization is performed,
/// so `"Alice"` and `"alice"` are different clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error when resolving the client identity
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientIdError {
    #[error("Header {0} is not valid UTF-8")]
    InvalidHeader(&'static str),
}

/// Resolve the client identity for a request
///
/// The `X-Client-ID` header wins when present and non-empty; otherwise the
/// peer IP address is used. The peer port is deliberately ignored so that
/// separate connections from the same host share one limit.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `peer_ip` - IP address of the direct connection, if known
///
/// ## Returns
/// * `Ok(ClientId)` - Resolved identity
/// * `Err(ClientIdError)` - Header present but not valid UTF-8
pub fn resolve_client_id(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
) -> Result<ClientId, ClientIdError> {
    if let Some(value) = headers.get(CLIENT_ID_HEADER) {
        let value = std::str::from_utf8(value.as_bytes())
            .map_err(|_| ClientIdError::InvalidHeader("X-Client-ID"))?;
        if !value.is_empty() {
            return Ok(ClientId::new(value));
        }
    }

    Ok(match peer_ip {
        Some(ip) => ClientId::new(ip.to_string()),
        None => ClientId::new(UNKNOWN_CLIENT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("tenant-42"));

        let peer: IpAddr = "10.0.0.7".parse().unwrap();
        let id = resolve_client_id(&headers, Some(peer)).unwrap();
        assert_eq!(id.as_str(), "tenant-42");
    }

    #[test]
    fn test_header_used_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("  Mixed:Case  "));

        let id = resolve_client_id(&headers, None).unwrap();
        assert_eq!(id.as_str(), "  Mixed:Case  ");
    }

    #[test]
    fn test_empty_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static(""));

        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        let id = resolve_client_id(&headers, Some(peer)).unwrap();
        assert_eq!(id.as_str(), "127.0.0.1");
    }

    #[test]
    fn test_no_header_no_peer() {
        let id = resolve_client_id(&HeaderMap::new(), None).unwrap();
        assert_eq!(id.as_str(), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_utf8_header_used_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_ID_HEADER,
            HeaderValue::from_bytes("café".as_bytes()).unwrap(),
        );

        let id = resolve_client_id(&headers, None).unwrap();
        assert_eq!(id.as_str(), "café");
    }

    #[test]
    fn test_invalid_utf8_header_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_ID_HEADER,
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );

        let result = resolve_client_id(&headers, None);
        assert!(matches!(result, Err(ClientIdError::InvalidHeader(_))));
    }
}
