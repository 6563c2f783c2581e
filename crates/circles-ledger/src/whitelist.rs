//! # Whitelist Oracle
//!
//! Answers "may this address act?" from a cached snapshot of the
//! authorized address list.
//!
//! ## Refresh rules
//!
//! - The snapshot is refreshed when it is missing or older than the TTL
//!   (default five minutes). Checks inside the window never fetch.
//! - A failed refresh keeps the last good snapshot. With no snapshot at
//!   all the oracle denies everyone.
//! - A failed refresh stamps the attempt time. Checks within the failure
//!   backoff (default 30 s, never longer than the TTL) answer from the
//!   fallback instead of fetching again.
//! - The cache sits behind an async mutex: concurrent checks that find a
//!   stale snapshot wait for one fetch instead of each issuing their own.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use circles_core::WalletAddress;
use thiserror::Error;
use tokio::sync::Mutex;

/// Default snapshot lifetime.
pub const DEFAULT_WHITELIST_TTL: Duration = Duration::from_secs(300);

/// Default wait after a failed refresh before the next fetch.
pub const DEFAULT_WHITELIST_FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// A whitelist fetch failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("whitelist fetch failed: {0}")]
pub struct WhitelistFetchError(pub String);

/// Where the authorized address list comes from.
#[async_trait]
pub trait WhitelistSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Vec<WalletAddress>, WhitelistFetchError>;
}

/// A fixed address list.
#[derive(Debug, Clone, Default)]
pub struct StaticWhitelistSource {
    addresses: Vec<WalletAddress>,
}

impl StaticWhitelistSource {
    pub fn new(addresses: Vec<WalletAddress>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl WhitelistSource for StaticWhitelistSource {
    async fn fetch(&self) -> Result<Vec<WalletAddress>, WhitelistFetchError> {
        Ok(self.addresses.clone())
    }
}

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// The process clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Default)]
struct Cache {
    snapshot: Option<HashSet<WalletAddress>>,
    last_fetch: Option<Instant>,
    last_failure: Option<Instant>,
}

/// Cached address authorization.
pub struct WhitelistOracle {
    source: Arc<dyn WhitelistSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    failure_backoff: Duration,
    cache: Mutex<Cache>,
}

impl std::fmt::Debug for WhitelistOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitelistOracle")
            .field("ttl", &self.ttl)
            .field("failure_backoff", &self.failure_backoff)
            .finish_non_exhaustive()
    }
}

impl WhitelistOracle {
    /// An oracle over `source` using the system clock.
    pub fn new(source: Arc<dyn WhitelistSource>, ttl: Duration) -> Self {
        Self::with_clock(source, Arc::new(SystemClock), ttl)
    }

    pub fn with_clock(source: Arc<dyn WhitelistSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            failure_backoff: DEFAULT_WHITELIST_FAILURE_BACKOFF.min(ttl),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Override the wait after a failed refresh. Capped at the TTL.
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff.min(self.ttl);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether `address` is on the whitelist, refreshing a stale snapshot first.
    pub async fn is_authorized(&self, address: &WalletAddress) -> bool {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();
        let fresh = match cache.last_fetch {
            Some(at) => cache.snapshot.is_some() && now.saturating_duration_since(at) < self.ttl,
            None => false,
        };
        let backing_off = cache
            .last_failure
            .is_some_and(|at| now.saturating_duration_since(at) < self.failure_backoff);
        if !fresh && !backing_off {
            self.refresh_locked(&mut cache).await;
        }
        cache
            .snapshot
            .as_ref()
            .is_some_and(|set| set.contains(address))
    }

    /// Fetch now, regardless of age. Returns the snapshot size after the attempt.
    pub async fn refresh(&self) -> usize {
        let mut cache = self.cache.lock().await;
        self.refresh_locked(&mut cache).await;
        cache.snapshot.as_ref().map_or(0, HashSet::len)
    }

    async fn refresh_locked(&self, cache: &mut Cache) {
        match self.source.fetch().await {
            Ok(addresses) => {
                let set: HashSet<WalletAddress> = addresses.into_iter().collect();
                tracing::debug!(count = set.len(), "whitelist refreshed");
                metrics::counter!("circles_whitelist_refresh_total", "outcome" => "ok").increment(1);
                cache.snapshot = Some(set);
                cache.last_fetch = Some(self.clock.now());
                cache.last_failure = None;
            }
            Err(e) => {
                let kept = cache.snapshot.as_ref().map_or(0, HashSet::len);
                tracing::warn!(error = %e, kept, "whitelist refresh failed; keeping last snapshot");
                metrics::counter!("circles_whitelist_refresh_total", "outcome" => "error").increment(1);
                cache.snapshot.get_or_insert_with(HashSet::new);
                cache.last_failure = Some(self.clock.now());
            }
        }
    }
}
