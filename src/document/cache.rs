//! Version-keyed LRU cache for values derived from documents.
//!
//! Every entry remembers the document version it was computed from; a lookup
//! with a different version recomputes. The cache is bounded by entry count
//! (least recently accessed entry evicted first) and by age (entries not
//! accessed within `max_age` are swept on a later access).

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tower_lsp::lsp_types::Url;

use super::TextDocument;

type Compute<T, E> = Box<dyn Fn(&TextDocument) -> Result<T, E> + Send + Sync>;

struct CacheEntry<T> {
    version: i32,
    value: Arc<T>,
    last_access: Instant,
}

struct CacheState<T> {
    entries: HashMap<Url, CacheEntry<T>>,
    last_sweep: Instant,
}

/// Memoizes `compute(document)` per URI until the document's version changes.
pub struct LanguageModelCache<T, E = Infallible> {
    state: Mutex<CacheState<T>>,
    max_entries: usize,
    max_age: Duration,
    compute: Compute<T, E>,
}

impl<T> LanguageModelCache<T, Infallible> {
    /// Create a cache for an infallible computation.
    pub fn new<F>(max_entries: usize, max_age: Duration, compute: F) -> Self
    where
        F: Fn(&TextDocument) -> T + Send + Sync + 'static,
    {
        Self::fallible(max_entries, max_age, move |doc| Ok(compute(doc)))
    }

    pub fn refresh_and_get(&self, document: &TextDocument) -> Arc<T> {
        match self.try_refresh_and_get(document) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<T, E> LanguageModelCache<T, E> {
    /// Create a cache whose computation may fail. Failures are returned to
    /// the caller and never stored.
    pub fn fallible<F>(max_entries: usize, max_age: Duration, compute: F) -> Self
    where
        F: Fn(&TextDocument) -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            max_entries: max_entries.max(1),
            max_age,
            compute: Box::new(compute),
        }
    }

    pub fn try_refresh_and_get(&self, document: &TextDocument) -> Result<Arc<T>, E> {
        self.refresh_and_get_at(document, Instant::now())
    }

    pub(crate) fn refresh_and_get_at(
        &self,
        document: &TextDocument,
        now: Instant,
    ) -> Result<Arc<T>, E> {
        {
            let mut state = self.lock();
            self.sweep(&mut state, now);
            if let Some(entry) = state.entries.get_mut(document.uri()) {
                if entry.version == document.version() {
                    entry.last_access = now;
                    log::trace!("cache hit for {} v{}", document.uri(), entry.version);
                    return Ok(Arc::clone(&entry.value));
                }
            }
        }

        // The lock is released while computing so that one cache can be
        // computed from another.
        let value = Arc::new((self.compute)(document)?);
        log::trace!("cache miss for {} v{}", document.uri(), document.version());

        let mut state = self.lock();
        if !state.entries.contains_key(document.uri()) && state.entries.len() >= self.max_entries {
            evict_least_recent(&mut state.entries);
        }
        state.entries.insert(
            document.uri().clone(),
            CacheEntry {
                version: document.version(),
                value: Arc::clone(&value),
                last_access: now,
            },
        );
        Ok(value)
    }

    pub fn on_document_removed(&self, uri: &Url) {
        self.lock().entries.remove(uri);
    }

    pub fn dispose(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep(&self, state: &mut CacheState<T>, now: Instant) {
        if now.saturating_duration_since(state.last_sweep) < self.max_age {
            return;
        }
        state.last_sweep = now;
        let max_age = self.max_age;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) <= max_age);
        let swept = before - state.entries.len();
        if swept > 0 {
            log::debug!("swept {} expired cache entries", swept);
        }
    }
}

fn evict_least_recent<T>(entries: &mut HashMap<Url, CacheEntry<T>>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_access)
        .map(|(uri, _)| uri.clone());
    if let Some(uri) = oldest {
        log::debug!("evicting cache entry for {}", uri);
        entries.remove(&uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(name: &str, version: i32, text: &str) -> TextDocument {
        let uri = Url::parse(&format!("file:///{name}.vue")).unwrap();
        TextDocument::new(uri, "vue", version, text)
    }

    fn counting_cache(max_entries: usize) -> (LanguageModelCache<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = LanguageModelCache::new(max_entries, Duration::from_secs(60), move |d| {
            counter.fetch_add(1, Ordering::SeqCst);
            d.len()
        });
        (cache, calls)
    }

    #[test]
    fn reuses_value_for_same_version() {
        let (cache, calls) = counting_cache(10);
        let d = doc("a", 1, "abc");
        assert_eq!(*cache.refresh_and_get(&d), 3);
        assert_eq!(*cache.refresh_and_get(&d), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recomputes_when_version_changes() {
        let (cache, calls) = counting_cache(10);
        assert_eq!(*cache.refresh_and_get(&doc("a", 1, "abc")), 3);
        assert_eq!(*cache.refresh_and_get(&doc("a", 2, "abcdef")), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn removed_document_recomputes_with_same_version() {
        let (cache, calls) = counting_cache(10);
        cache.refresh_and_get(&doc("a", 1, "abc"));
        cache.on_document_removed(&Url::parse("file:///a.vue").unwrap());
        assert!(cache.is_empty());
        assert_eq!(*cache.refresh_and_get(&doc("a", 1, "reopened")), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn eleventh_uri_evicts_least_recently_accessed() {
        let (cache, _) = counting_cache(10);
        let start = Instant::now();
        for i in 0..10 {
            let at = start + Duration::from_millis(i as u64);
            cache.refresh_and_get_at(&doc(&format!("d{i}"), 1, "x"), at).unwrap();
        }
        // touch d0 so d1 becomes the oldest
        cache
            .refresh_and_get_at(&doc("d0", 1, "x"), start + Duration::from_millis(20))
            .unwrap();
        cache
            .refresh_and_get_at(&doc("d10", 1, "x"), start + Duration::from_millis(30))
            .unwrap();

        let state = cache.lock();
        assert_eq!(state.entries.len(), 10);
        assert!(state.entries.contains_key(&Url::parse("file:///d0.vue").unwrap()));
        assert!(!state.entries.contains_key(&Url::parse("file:///d1.vue").unwrap()));
        assert!(state.entries.contains_key(&Url::parse("file:///d10.vue").unwrap()));
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let cache = LanguageModelCache::new(10, Duration::from_secs(60), |d: &TextDocument| d.len());
        let start = Instant::now();
        cache.refresh_and_get_at(&doc("old", 1, "x"), start).unwrap();
        cache
            .refresh_and_get_at(&doc("new", 1, "x"), start + Duration::from_secs(50))
            .unwrap();
        cache
            .refresh_and_get_at(&doc("new", 1, "x"), start + Duration::from_secs(90))
            .unwrap();

        let state = cache.lock();
        assert!(!state.entries.contains_key(&Url::parse("file:///old.vue").unwrap()));
        assert!(state.entries.contains_key(&Url::parse("file:///new.vue").unwrap()));
    }

    #[test]
    fn failed_compute_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = LanguageModelCache::fallible(10, Duration::from_secs(60), move |d: &TextDocument| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("boom")
            } else {
                Ok(d.len())
            }
        });
        let d = doc("a", 1, "abc");
        assert_eq!(cache.try_refresh_and_get(&d).unwrap_err(), "boom");
        assert!(cache.is_empty());
        assert_eq!(*cache.try_refresh_and_get(&d).unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispose_clears_everything() {
        let (cache, _) = counting_cache(10);
        cache.refresh_and_get(&doc("a", 1, "x"));
        cache.refresh_and_get(&doc("b", 1, "x"));
        cache.dispose();
        assert!(cache.is_empty());
    }
}
