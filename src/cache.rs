use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Whole-response cache for rendered feed pages.
///
/// Entries expire after the configured TTL; every write that can change a
/// cached page calls [`PageCache::clear`] before redirecting.
///
/// Entries are stored under the generation that was current when the page's
/// rows were read. `clear` moves to a new generation, so a page rendered from
/// rows read before a write can never be served after it, even when its
/// insert lands after the clear.
#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, Arc<String>>,
    generation: Arc<AtomicU64>,
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let pages = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            pages,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cache key for the index feed. The nav bar differs per viewer.
    pub fn index_key(page: i64, viewer: Option<i64>) -> String {
        match viewer {
            Some(id) => format!("index:{page}:user:{id}"),
            None => format!("index:{page}:anon"),
        }
    }

    /// Read this before querying the rows a page is rendered from.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn scoped(generation: u64, key: &str) -> String {
        format!("{generation}:{key}")
    }

    pub async fn get(&self, key: &str) -> Option<Arc<String>> {
        self.pages.get(&Self::scoped(self.generation(), key)).await
    }

    /// Stores a page rendered from rows read at `generation`. Pages from an
    /// older generation are dropped.
    pub async fn insert(&self, generation: u64, key: &str, body: String) {
        if generation != self.generation() {
            tracing::debug!(key, "Skipping cache insert from a cleared generation");
            return;
        }
        self.pages
            .insert(Self::scoped(generation, key), Arc::new(body))
            .await;
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.pages.invalidate_all();
        tracing::debug!("Page cache cleared");
    }
}
