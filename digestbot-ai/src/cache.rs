// LRU cache of summaries keyed by the message set they were made from

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use digestbot_common::error::Error;
use digestbot_common::models::SummaryRequest;
use digestbot_common::traits::SummaryBackend;

pub const DEFAULT_CAPACITY: usize = 100;

pub struct SummaryCache {
    entries: Mutex<LruCache<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SummaryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Stable hash of the request's messages. Messages are ordered by
    /// timestamp (then by the remaining fields) before hashing, so the
    /// channel grouping and arrival order do not matter.
    pub fn fingerprint(request: &SummaryRequest) -> String {
        let mut tuples: Vec<_> = request
            .channels
            .values()
            .flatten()
            .map(|m| (m.timestamp, m.author.as_str(), m.content.as_str(), m.attachment_count, m.embed_count))
            .collect();
        tuples.sort();

        let mut hasher = Sha256::new();
        hasher.update(request.mode.as_str().as_bytes());
        for (timestamp, author, content, attachments, embeds) in tuples {
            hasher.update([0x1e]);
            hasher.update(author.as_bytes());
            hasher.update([0x1f]);
            hasher.update(content.as_bytes());
            hasher.update([0x1f]);
            hasher.update(timestamp.timestamp_micros().to_le_bytes());
            hasher.update(attachments.to_le_bytes());
            hasher.update(embeds.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let found = self.entries.lock().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Lookup that leaves the hit/miss counters and recency alone.
    fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().peek(key).cloned()
    }

    pub fn put(&self, key: String, summary: String) {
        self.entries.lock().put(key, summary);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Memoization layer over another [`SummaryBackend`]. Only successful
/// results are stored, so a failed call is retried next time. Concurrent
/// misses on the same key queue behind one inner call.
pub struct Memoized<B> {
    inner: B,
    cache: Arc<SummaryCache>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<B> Memoized<B> {
    pub fn new(inner: B, cache: Arc<SummaryCache>) -> Self {
        Self {
            inner,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Drops the key's gate once nobody else holds or waits on it.
    fn release(&self, key: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock();
        // one reference in the map, one held by the caller
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(key);
        }
    }
}

#[async_trait]
impl<B: SummaryBackend> SummaryBackend for Memoized<B> {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, Error> {
        let key = SummaryCache::fingerprint(request);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Summary cache hit for {} messages", request.message_count());
            return Ok(hit);
        }

        let gate = self.in_flight.lock().entry(key.clone()).or_default().clone();
        let result = {
            let _turn = gate.lock().await;
            match self.cache.peek(&key) {
                Some(hit) => {
                    debug!("Joined an in-flight summary of {} messages", request.message_count());
                    Ok(hit)
                }
                None => {
                    let result = self.inner.summarize(request).await;
                    if let Ok(summary) = &result {
                        self.cache.put(key.clone(), summary.clone());
                    }
                    result
                }
            }
        };
        self.release(&key, &gate);
        result
    }
}
