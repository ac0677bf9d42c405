//! Request extractors

use crate::error::LimiterError;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use platform::client::{ClientId, resolve_client_id};
use std::net::SocketAddr;

/// Client identity resolved from `X-Client-ID` or the peer address
///
/// The peer address is only known when the router is served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Debug, Clone)]
pub struct ResolvedClient(pub ClientId);

impl<S> FromRequestParts<S> for ResolvedClient
where
    S: Send + Sync,
{
    type Rejection = LimiterError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        Ok(Self(resolve_client_id(&parts.headers, peer_ip)?))
    }
}
