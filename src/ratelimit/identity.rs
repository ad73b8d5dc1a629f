//! Client identity derivation.
//!
//! Rate limit state is partitioned by [`ClientId`]. How a request maps to an
//! identity is a deployment decision captured by [`IdentitySource`]: proxy
//! headers are client-controlled, so they are only honored when explicitly
//! enabled, and even then only well-formed IP literals are accepted.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Identity shared by every client whose address cannot be determined.
pub const SHARED_CLIENT_ID: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Key that partitions rate limit state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Create an identity from an arbitrary key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The shared fallback identity.
    pub fn shared() -> Self {
        Self(SHARED_CLIENT_ID.to_string())
    }

    /// Whether this is the shared fallback identity.
    pub fn is_shared(&self) -> bool {
        self.0 == SHARED_CLIENT_ID
    }

    /// The identity as a string key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientId {
    fn from(ip: IpAddr) -> Self {
        // Canonical textual form, so equivalent IPv6 spellings share a budget.
        Self(ip.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the client identity of a request comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Every request shares one budget
    #[default]
    Shared,
    /// Trust `X-Forwarded-For` / `X-Real-IP` set by a reverse proxy
    Forwarded,
    /// Use the TCP peer address of the connection
    Peer,
}

impl IdentitySource {
    /// Derive the client identity of a request.
    ///
    /// Falls back to the shared identity whenever the configured source is
    /// missing or malformed.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientId {
        let ip = match self {
            IdentitySource::Shared => None,
            IdentitySource::Forwarded => forwarded_ip(headers),
            IdentitySource::Peer => peer.map(|addr| addr.ip()),
        };
        ip.map(ClientId::from).unwrap_or_else(ClientId::shared)
    }
}

/// First hop of `X-Forwarded-For`, or `X-Real-IP`, parsed as an IP literal.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(value) = headers.get(X_FORWARDED_FOR) {
        let first = value.to_str().ok()?.split(',').next()?.trim();
        return first.parse().ok();
    }

    headers
        .get(X_REAL_IP)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
