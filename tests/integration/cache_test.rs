// Tests for the volatile lookup cache through its public API

use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sysdash::core::system_monitor::cache::{Endpoint, LookupCache, LookupKey, LookupTransport, REACHABLE};
use sysdash::core::system_monitor::{Reading, UnavailableReason};
use sysdash::{DashError, Result};

/// Answers every endpoint after a short delay, or fails them all.
struct SlowTransport {
    calls: Arc<AtomicUsize>,
    online: bool,
}

impl LookupTransport for SlowTransport {
    fn fetch<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            if !self.online {
                return Err(DashError::lookup(format!("{} unreachable", endpoint)));
            }
            match endpoint {
                Endpoint::Http(_) => Ok("198.51.100.4".to_string()),
                Endpoint::Tcp(_) => Ok(REACHABLE.to_string()),
            }
        })
    }
}

fn cache(ttl: Duration, online: bool) -> (Arc<LookupCache>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = SlowTransport {
        calls: calls.clone(),
        online,
    };
    (Arc::new(LookupCache::new(ttl, Box::new(transport))), calls)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_ticks_share_one_lookup() {
    let (cache, calls) = cache(Duration::from_secs(45), true);

    let (a, b) = tokio::join!(cache.get(LookupKey::PublicIpv4), cache.get(LookupKey::PublicIpv4));

    assert_eq!(a, b);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_outlives_several_refreshes() {
    let (cache, calls) = cache(Duration::from_secs(45), true);

    // Refresh every 10 seconds against a 45 second TTL
    for _ in 0..4 {
        cache.get(LookupKey::Connectivity).await;
        tokio::time::advance(Duration::from_secs(10)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    cache.get(LookupKey::Connectivity).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_offline_tries_every_endpoint_each_time() {
    let (cache, calls) = cache(Duration::from_secs(45), false);

    let first = cache.get(LookupKey::Connectivity).await;
    let second = cache.get(LookupKey::Connectivity).await;

    assert_eq!(first, Reading::Unavailable(UnavailableReason::QueryFailed));
    assert_eq!(second, Reading::Unavailable(UnavailableReason::QueryFailed));
    let per_round = LookupKey::Connectivity.endpoints().len();
    assert_eq!(calls.load(Ordering::SeqCst), per_round * 2);
}

#[tokio::test(start_paused = true)]
async fn test_configured_ttl_is_reported() {
    let (cache, _calls) = cache(Duration::from_secs(300), true);
    assert_eq!(cache.ttl(), Duration::from_secs(300));
}
