use std::{net::SocketAddr, time::Duration};

use common::AllowList;
use http::HeaderValue;

pub const DEFAULT_ROUTE: &str = "/audio-proxy";
pub const DEFAULT_ALLOWED_HOSTS: [&str; 2] = ["dls.musics-fa.com", "dl.musics-fa.com"];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_USER_AGENT: &str = concat!("audio-relay/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Immutable relay settings, built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Path the relay answers on, everything else is a 404.
    pub route: String,
    pub allow_list: AllowList,
    /// Bound on connecting to upstream and receiving its response headers.
    pub timeout: Duration,
    /// Sent upstream when the client didn't provide one.
    pub user_agent: HeaderValue,
    /// DNS overrides for upstream hosts, port 0 keeps the url port.
    pub resolve: Vec<(String, SocketAddr)>,
    /// Body chunks held between upstream and client before backpressure kicks in.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            route: DEFAULT_ROUTE.to_owned(),
            allow_list: AllowList::new(DEFAULT_ALLOWED_HOSTS),
            timeout: DEFAULT_TIMEOUT,
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
            resolve: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Parses a `host=ip:port` DNS override.
pub fn parse_resolve(s: &str) -> Result<(String, SocketAddr), String> {
    let (host, addr) = s
        .split_once('=')
        .ok_or_else(|| format!("expected host=ip:port, got {s:?}"))?;
    let host = host.trim();
    if host.is_empty() {
        return Err(format!("missing host in {s:?}"));
    }
    let addr = addr
        .trim()
        .parse::<SocketAddr>()
        .map_err(|err| format!("invalid address in {s:?}: {err}"))?;
    Ok((host.to_ascii_lowercase(), addr))
}
