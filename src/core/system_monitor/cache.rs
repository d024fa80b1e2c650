//! Volatile lookup cache for slow or rate-limited network calls.
//!
//! Entries live for a fixed TTL that is configured separately from the
//! refresh interval. Failures are never stored, so the next tick retries.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::reading::{Reading, UnavailableReason};
use crate::error::{DashError, Result};

/// A remote target tried by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// GET the URL; the trimmed body is the value
    Http(&'static str),
    /// Open a TCP connection; success is the value
    Tcp(&'static str),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Http(url) => write!(f, "{}", url),
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

const PUBLIC_IPV4_ENDPOINTS: [Endpoint; 3] = [
    Endpoint::Http("https://api.ipify.org"),
    Endpoint::Http("https://ipv4.icanhazip.com"),
    Endpoint::Http("https://v4.ident.me"),
];

const PUBLIC_IPV6_ENDPOINTS: [Endpoint; 3] = [
    Endpoint::Http("https://api6.ipify.org"),
    Endpoint::Http("https://ipv6.icanhazip.com"),
    Endpoint::Http("https://v6.ident.me"),
];

const CONNECTIVITY_ENDPOINTS: [Endpoint; 2] = [Endpoint::Tcp("8.8.8.8:53"), Endpoint::Tcp("1.1.1.1:53")];

/// Value returned by a successful TCP endpoint.
pub const REACHABLE: &str = "reachable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupKey {
    PublicIpv4,
    PublicIpv6,
    Connectivity,
}

impl LookupKey {
    pub const ALL: [LookupKey; 3] = [LookupKey::PublicIpv4, LookupKey::PublicIpv6, LookupKey::Connectivity];

    /// Fallback endpoints, tried in order.
    pub fn endpoints(&self) -> &'static [Endpoint] {
        match self {
            LookupKey::PublicIpv4 => &PUBLIC_IPV4_ENDPOINTS,
            LookupKey::PublicIpv6 => &PUBLIC_IPV6_ENDPOINTS,
            LookupKey::Connectivity => &CONNECTIVITY_ENDPOINTS,
        }
    }
}

/// Performs the actual external call for one endpoint.
pub trait LookupTransport: Send + Sync {
    fn fetch<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, Result<String>>;
}

/// Upper bound for one connectivity connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Real transport: HTTPS via reqwest, TCP via tokio.
pub struct NetTransport {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl NetTransport {
    /// `timeout` bounds each HTTP request; TCP connects also stop at [`CONNECT_TIMEOUT`].
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sysdash/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            connect_timeout: timeout.min(CONNECT_TIMEOUT),
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl LookupTransport for NetTransport {
    fn fetch<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            match *endpoint {
                Endpoint::Http(url) => {
                    let body = self
                        .client
                        .get(url)
                        .send()
                        .await?
                        .error_for_status()?
                        .text()
                        .await?;
                    let value = body.trim();
                    if value.is_empty() {
                        Err(DashError::lookup(format!("{} returned an empty body", url)))
                    } else {
                        Ok(value.to_string())
                    }
                }
                Endpoint::Tcp(addr) => {
                    match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                        Ok(Ok(_stream)) => Ok(REACHABLE.to_string()),
                        Ok(Err(e)) => Err(DashError::Io(e)),
                        Err(_) => Err(DashError::lookup(format!("{} timed out", addr))),
                    }
                }
            }
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

/// Memoizes lookups per [`LookupKey`].
///
/// Each key has its own async mutex, held for the whole lookup. Two ticks
/// asking for the same key are therefore serialized: the second one sees the
/// entry written by the first instead of issuing its own request.
pub struct LookupCache {
    ttl: Duration,
    transport: Box<dyn LookupTransport>,
    slots: HashMap<LookupKey, Mutex<Option<CacheEntry>>>,
}

impl LookupCache {
    pub fn new(ttl: Duration, transport: Box<dyn LookupTransport>) -> Self {
        let slots = LookupKey::ALL.iter().map(|key| (*key, Mutex::new(None))).collect();
        Self { ttl, transport, slots }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, fetching it on a miss or expiry.
    pub async fn get(&self, key: LookupKey) -> Reading<String> {
        let Some(slot) = self.slots.get(&key) else {
            return Reading::Unavailable(UnavailableReason::QueryFailed);
        };
        let mut slot = slot.lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh(Instant::now()) {
                log::trace!("Cache hit for {:?}", key);
                return Reading::Available(entry.value.clone());
            }
        }

        for endpoint in key.endpoints() {
            match self.transport.fetch(endpoint).await {
                Ok(value) => {
                    log::debug!("{:?} resolved via {}", key, endpoint);
                    *slot = Some(CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                        ttl: self.ttl,
                    });
                    return Reading::Available(value);
                }
                Err(e) => log::debug!("{:?} lookup via {} failed: {}", key, endpoint, e),
            }
        }

        log::warn!("All endpoints failed for {:?}", key);
        *slot = None;
        Reading::Unavailable(UnavailableReason::QueryFailed)
    }

    /// Drop every entry, forcing fresh lookups on the next call.
    pub async fn invalidate_all(&self) {
        for slot in self.slots.values() {
            *slot.lock().await = None;
        }
    }
}
