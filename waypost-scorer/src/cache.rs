//! Result cache keyed by feature fingerprints.
//!
//! Equivalent records produce equal feature vectors and therefore equal
//! [`Fingerprint`]s, so the cache amortises repeated scoring regardless of
//! record identity. The model version is part of every fingerprint; entries
//! written by an older model simply stop being addressed.
#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::warn;
use moka::Expiry;
use moka::sync::Cache;
use waypost_core::FeatureVector;

use crate::error::CacheError;
use crate::quality::ScoringResult;

/// Default lifetime of a cached result.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1_800);

/// Default maximum number of cached results.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Content hash of a feature vector and model version.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; blake3::OUT_LEN]);

impl Fingerprint {
    /// Fingerprint `features` as scored by `model_version`.
    ///
    /// Features are hashed in name order as `name=bits;` where `bits` is the
    /// hexadecimal IEEE-754 pattern, with `-0.0` normalised to `0.0`.
    #[must_use]
    pub fn new(features: &FeatureVector, model_version: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in features.sorted_by_name() {
            let bits = if value.to_bits() == (-0.0_f64).to_bits() {
                0.0_f64.to_bits()
            } else {
                value.to_bits()
            };
            hasher.update(name.as_bytes());
            hasher.update(format!("={bits:016x};").as_bytes());
        }
        hasher.update(b"model_version=");
        hasher.update(model_version.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Lower-case hexadecimal form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Storage behind a [`ResultCache`].
///
/// Implementations must be internally synchronised; concurrent writes to the
/// same key resolve as last-write-wins.
pub trait CacheBackend: Send + Sync {
    /// Fetch a live entry.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the backend cannot answer.
    fn get(&self, key: &Fingerprint) -> Result<Option<ScoringResult>, CacheError>;

    /// Store `result` for `ttl`.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the backend cannot store the entry.
    fn put(&self, key: Fingerprint, result: ScoringResult, ttl: Duration)
    -> Result<(), CacheError>;

    /// Drop every entry.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the backend cannot be cleared.
    fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct Stored {
    result: ScoringResult,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<Fingerprint, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &Fingerprint,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend built on `moka` with per-entry expiry.
pub struct MemoryCache {
    cache: Cache<Fingerprint, Stored>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` results.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Approximate number of live entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &Fingerprint) -> Result<Option<ScoringResult>, CacheError> {
        Ok(self.cache.get(key).map(|stored| stored.result))
    }

    fn put(
        &self,
        key: Fingerprint,
        result: ScoringResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.cache.insert(key, Stored { result, ttl });
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        Ok(())
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Results written to the cache.
    pub writes: u64,
    /// Backend failures that forced direct computation.
    pub errors: u64,
}

impl CacheStats {
    /// Share of lookups answered from the cache, `None` before any lookup.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "hit rate is an approximate ratio for reporting"
    )]
    pub fn hit_rate(&self) -> Option<f64> {
        let lookups = self.hits.saturating_add(self.misses);
        (lookups > 0).then(|| self.hits as f64 / lookups as f64)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

/// Fault-tolerant front for a [`CacheBackend`].
///
/// Backend failures are logged at warn level and reported as misses, so a
/// broken cache degrades to direct computation instead of failing requests.
#[derive(Clone)]
pub struct ResultCache {
    backend: Option<Arc<dyn CacheBackend>>,
    counters: Arc<Counters>,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResultCache {
    /// Wrap `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            counters: Arc::default(),
        }
    }

    /// In-memory cache holding at most `capacity` results.
    #[must_use]
    pub fn memory(capacity: u64) -> Self {
        Self::new(Arc::new(MemoryCache::new(capacity)))
    }

    /// A cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: None,
            counters: Arc::default(),
        }
    }

    /// Whether a backend is attached.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Look up `key`, treating backend failures as misses.
    #[must_use]
    pub fn get(&self, key: &Fingerprint) -> Option<ScoringResult> {
        let backend = self.backend.as_ref()?;
        match backend.get(key) {
            Ok(Some(result)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(error) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!("cache lookup for {key} failed; scoring directly: {error}");
                None
            }
        }
    }

    /// Store a copy of `result` under `key` for `ttl`.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn put(&self, key: Fingerprint, result: &ScoringResult, ttl: Duration) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match backend.put(key, result.clone(), ttl) {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!("cache write for {key} failed: {error}");
            }
        }
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        if let Some(Err(error)) = self.backend.as_ref().map(|backend| backend.clear()) {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!("cache clear failed: {error}");
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use waypost_core::FeatureName;

    fn vector(num_images: f64) -> FeatureVector {
        FeatureVector::from_fn(|name| {
            if name == FeatureName::NumImages {
                num_images
            } else {
                0.0
            }
        })
        .expect("finite vector")
    }

    #[fixture]
    fn result() -> ScoringResult {
        ScoringResult {
            record_id: "poi_001".to_owned(),
            quality_score: 72.5,
            confidence: 0.9,
            features: None,
            computed_at: Utc
                .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
                .single()
                .expect("valid instant"),
            model_version: "v1".to_owned(),
        }
    }

    struct Unreachable;

    impl CacheBackend for Unreachable {
        fn get(&self, _key: &Fingerprint) -> Result<Option<ScoringResult>, CacheError> {
            Err(CacheError::Unavailable {
                reason: "connection refused".to_owned(),
            })
        }

        fn put(
            &self,
            _key: Fingerprint,
            _result: ScoringResult,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable {
                reason: "connection refused".to_owned(),
            })
        }

        fn clear(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[rstest]
    fn fingerprints_depend_on_features_and_version() {
        let base = Fingerprint::new(&vector(3.0), "v1");
        assert_eq!(base, Fingerprint::new(&vector(3.0), "v1"));
        assert_ne!(base, Fingerprint::new(&vector(4.0), "v1"));
        assert_ne!(base, Fingerprint::new(&vector(3.0), "v2"));
        assert_eq!(base.to_hex().len(), 64);
    }

    #[rstest]
    fn negative_zero_is_normalised() {
        assert_eq!(
            Fingerprint::new(&vector(-0.0), "v1"),
            Fingerprint::new(&vector(0.0), "v1")
        );
    }

    #[rstest]
    fn put_then_get_returns_an_equal_copy(result: ScoringResult) {
        let cache = ResultCache::memory(16);
        let key = Fingerprint::new(&vector(1.0), "v1");
        cache.put(key, &result, DEFAULT_CACHE_TTL);
        assert_eq!(cache.get(&key), Some(result.clone()));
        assert_eq!(cache.get(&key), Some(result));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.writes), (2, 0, 1));
    }

    #[rstest]
    fn entries_expire_after_their_ttl(result: ScoringResult) {
        let cache = ResultCache::memory(16);
        let key = Fingerprint::new(&vector(1.0), "v1");
        cache.put(key, &result, Duration::from_millis(50));
        assert_eq!(cache.get(&key), Some(result));
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get(&key), None);
    }

    #[rstest]
    #[case(Duration::from_millis(50), DEFAULT_CACHE_TTL, true)]
    #[case(DEFAULT_CACHE_TTL, Duration::from_millis(50), false)]
    fn rewriting_an_entry_applies_the_new_ttl(
        result: ScoringResult,
        #[case] first: Duration,
        #[case] second: Duration,
        #[case] alive: bool,
    ) {
        let cache = ResultCache::memory(16);
        let key = Fingerprint::new(&vector(1.0), "v1");
        cache.put(key, &result, first);
        cache.put(key, &result, second);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get(&key).is_some(), alive);
    }

    #[rstest]
    fn clear_drops_entries(result: ScoringResult) {
        let cache = ResultCache::memory(16);
        let key = Fingerprint::new(&vector(1.0), "v1");
        cache.put(key, &result, DEFAULT_CACHE_TTL);
        cache.clear();
        assert_eq!(cache.get(&key), None);
    }

    #[rstest]
    fn backend_failures_degrade_to_misses(result: ScoringResult) {
        let cache = ResultCache::new(Arc::new(Unreachable));
        let key = Fingerprint::new(&vector(1.0), "v1");
        cache.put(key, &result, DEFAULT_CACHE_TTL);
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.stats().errors, 2);
        assert_eq!(cache.stats().hit_rate(), None);
    }

    #[rstest]
    fn disabled_cache_stores_nothing(result: ScoringResult) {
        let cache = ResultCache::disabled();
        let key = Fingerprint::new(&vector(1.0), "v1");
        cache.put(key, &result, DEFAULT_CACHE_TTL);
        assert!(!cache.is_enabled());
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
