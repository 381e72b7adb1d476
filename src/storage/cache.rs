// src/storage/cache.rs
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use log::{debug, error};
use parking_lot::RwLock;
use tokio::time::Instant;
use crate::config::Config;
use crate::directory::DirectoryClient;
use crate::models::server::ServerRecord;
use crate::view::LookupOutcome;

/// Directory responses reused for their revalidation windows.
pub struct DirectoryCache {
    client: DirectoryClient,
    listing: RwLock<Option<(Instant, Arc<Vec<ServerRecord>>)>>,
    lookups: DashMap<String, (Instant, LookupOutcome)>,
    listing_ttl: Duration,
    lookup_ttl: Duration,
}

impl DirectoryCache {
    pub fn new(client: DirectoryClient, config: &Config) -> Self {
        Self {
            client,
            listing: RwLock::new(None),
            lookups: DashMap::new(),
            listing_ttl: Duration::from_secs(config.listing_revalidate_secs),
            lookup_ttl: Duration::from_secs(config.lookup_revalidate_secs),
        }
    }

    /// Current listing snapshot. A failed fetch yields an empty snapshot that is not kept.
    pub async fn listing(&self) -> Arc<Vec<ServerRecord>> {
        if let Some(records) = self.cached_listing(Instant::now()) {
            return records;
        }

        match self.client.fetch_listing().await {
            Ok(records) => {
                let records = Arc::new(records);
                self.store_listing(records.clone(), Instant::now());
                records
            }
            Err(e) => {
                error!("Failed to fetch server listing: {}", e);
                Arc::new(Vec::new())
            }
        }
    }

    pub async fn lookup(&self, address: &str) -> LookupOutcome {
        if let Some(outcome) = self.cached_lookup(address, Instant::now()) {
            debug!("Serving cached lookup for {}", address);
            return outcome;
        }

        let outcome = self.client.lookup(address).await;
        if outcome != LookupOutcome::Failed {
            self.lookups.insert(address.to_string(), (Instant::now(), outcome.clone()));
        }
        outcome
    }

    fn cached_listing(&self, now: Instant) -> Option<Arc<Vec<ServerRecord>>> {
        let guard = self.listing.read();
        match guard.as_ref() {
            Some((fetched_at, records)) if now.duration_since(*fetched_at) < self.listing_ttl => {
                Some(records.clone())
            }
            _ => None,
        }
    }

    fn store_listing(&self, records: Arc<Vec<ServerRecord>>, at: Instant) {
        *self.listing.write() = Some((at, records));
    }

    fn cached_lookup(&self, address: &str, now: Instant) -> Option<LookupOutcome> {
        self.lookups
            .get(address)
            .filter(|entry| now.duration_since(entry.value().0) < self.lookup_ttl)
            .map(|entry| entry.value().1.clone())
    }

    pub fn purge_expired_lookups(&self) {
        let now = Instant::now();
        self.lookups
            .retain(|_, (fetched_at, _)| now.duration_since(*fetched_at) < self.lookup_ttl);
    }
}
