//! Freshness-aware weather cache with stale fallback.
//!
//! Entries are keyed by location identity, variable set and request mode,
//! encoded with postcard and kept in a [`CacheStore`]. Historical entries
//! never expire; current and forecast entries expire per [`FreshnessPolicy`].

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Location, LocationId, Variable, WeatherRecord};
use crate::transform::normalize;
use crate::weather::{Mode, RawSeries};
use crate::Result;

pub mod store;

pub use store::{CacheStore, FjallStore, MemoryStore};

/// Bumped whenever the encoded entry layout changes
const KEY_VERSION: &str = "v1";

/// How long entries of each mode stay fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub current: Duration,
    pub forecast: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            current: Duration::from_secs(15 * 60),
            forecast: Duration::from_secs(3 * 60 * 60),
        }
    }
}

impl FreshnessPolicy {
    /// Freshness window for a mode, `None` when entries never expire
    #[must_use]
    pub fn window(&self, mode: &Mode) -> Option<Duration> {
        match mode {
            Mode::Current => Some(self.current),
            Mode::Forecast { .. } => Some(self.forecast),
            Mode::Historical { .. } => None,
        }
    }

    #[must_use]
    pub fn is_fresh(&self, mode: &Mode, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let Some(window) = self.window(mode) else {
            return true;
        };
        let age = now.signed_duration_since(fetched_at);
        match age.to_std() {
            Ok(age) => age < window,
            // fetched_at in the future, treat as just fetched
            Err(_) => true,
        }
    }
}

/// Identity of a cached series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub location: LocationId,
    pub variables: Vec<Variable>,
    pub mode: Mode,
}

impl CacheKey {
    /// Key for the default variable set of `mode`
    #[must_use]
    pub fn new(location: &Location, mode: Mode) -> Self {
        Self::with_variables(location, mode, mode.variables())
    }

    #[must_use]
    pub fn with_variables(location: &Location, mode: Mode, mut variables: Vec<Variable>) -> Self {
        variables.sort();
        variables.dedup();
        Self {
            location: location.id(),
            variables,
            mode,
        }
    }

    /// Deterministic string form used as the store key
    #[must_use]
    pub fn as_store_key(&self) -> String {
        let variables: Vec<&str> = self.variables.iter().map(|v| v.as_str()).collect();
        format!(
            "weather:{KEY_VERSION}:{}:{}:{}",
            self.location,
            self.mode.label(),
            variables.join(",")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    records: Vec<WeatherRecord>,
    fetched_at: DateTime<Utc>,
}

/// A series served from the cache or freshly fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedSeries {
    pub records: Vec<WeatherRecord>,
    pub fetched_at: DateTime<Utc>,
    /// True when the entry is past its freshness window
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Miss,
    Hit(CachedSeries),
}

pub struct WeatherCache<S> {
    store: S,
    policy: FreshnessPolicy,
}

impl<S: CacheStore> WeatherCache<S> {
    pub fn new(store: S, policy: FreshnessPolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Look up an entry. Entries that cannot be decoded count as a miss.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self, key), fields(key = %key.as_store_key()))]
    pub async fn get(&self, key: &CacheKey) -> Result<CacheLookup> {
        let Some(bytes) = self.store.load(&key.as_store_key()).await? else {
            tracing::debug!("Key not found");
            return Ok(CacheLookup::Miss);
        };

        let entry: CacheEntry = match postcard::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "Discarding undecodable cache entry");
                return Ok(CacheLookup::Miss);
            }
        };

        let stale = !self.policy.is_fresh(&key.mode, entry.fetched_at, Utc::now());
        if stale {
            tracing::debug!("Key found but stale");
        } else {
            tracing::debug!("Key found and still fresh");
        }
        Ok(CacheLookup::Hit(CachedSeries {
            records: entry.records,
            fetched_at: entry.fetched_at,
            stale,
        }))
    }

    /// Store records fetched now
    pub async fn put(&self, key: &CacheKey, records: Vec<WeatherRecord>) -> Result<()> {
        self.put_at(key, records, Utc::now()).await
    }

    /// Store records with an explicit fetch time
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, key, records), fields(key = %key.as_store_key()))]
    pub async fn put_at(
        &self,
        key: &CacheKey,
        records: Vec<WeatherRecord>,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = CacheEntry {
            records,
            fetched_at,
        };
        let bytes = postcard::to_stdvec(&entry)?;
        self.store.save(&key.as_store_key(), bytes).await
    }

    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.store.remove(&key.as_store_key()).await
    }

    /// Serve a fresh entry, or fetch, normalize and persist a new one.
    ///
    /// When the fetch fails and any entry exists for the key, that entry is
    /// returned flagged stale instead of the error. A failed write is logged
    /// and the freshly fetched records are still returned.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<CachedSeries>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<RawSeries>> + Send,
    {
        let cached = match self.get(key).await {
            Ok(lookup) => lookup,
            Err(err) => {
                tracing::warn!(error = %err, "Cache read failed, fetching instead");
                CacheLookup::Miss
            }
        };

        if let CacheLookup::Hit(series) = &cached {
            if !series.stale {
                return Ok(series.clone());
            }
        }

        match fetch().await {
            Ok(raw) => {
                let records = normalize(raw, &key.variables);
                let fetched_at = Utc::now();
                if let Err(err) = self.put_at(key, records.clone(), fetched_at).await {
                    tracing::warn!(error = %err, "Failed to persist cache entry");
                }
                Ok(CachedSeries {
                    records,
                    fetched_at,
                    stale: false,
                })
            }
            Err(err) => match cached {
                CacheLookup::Hit(mut series) => {
                    tracing::warn!(
                        error = %err,
                        fetched_at = %series.fetched_at,
                        "Fetch failed, serving stale cache entry"
                    );
                    series.stale = true;
                    Ok(series)
                }
                CacheLookup::Miss => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WeatherError;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn danang() -> Location {
        Location::new(16.0471, 108.2068, "Đà Nẵng")
    }

    fn raw_forecast() -> RawSeries {
        let mut raw = RawSeries::new(danang())
            .with_column("temperature_2m_max", "°C", vec![Some(34.0), Some(35.5)])
            .with_column("precipitation_sum", "mm", vec![Some(0.0), None]);
        raw.time = vec!["2024-06-01".to_string(), "2024-06-02".to_string()];
        raw
    }

    fn cache() -> WeatherCache<MemoryStore> {
        WeatherCache::new(MemoryStore::new(), FreshnessPolicy::default())
    }

    #[test]
    fn test_freshness_windows() {
        let policy = FreshnessPolicy::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ten_min_ago = now - chrono::Duration::minutes(10);
        let hour_ago = now - chrono::Duration::hours(1);
        let day_ago = now - chrono::Duration::days(1);

        assert!(policy.is_fresh(&Mode::Current, ten_min_ago, now));
        assert!(!policy.is_fresh(&Mode::Current, hour_ago, now));
        assert!(policy.is_fresh(&Mode::forecast(7), hour_ago, now));
        assert!(!policy.is_fresh(&Mode::forecast(7), day_ago, now));

        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let historical = Mode::Historical { start, end: start };
        assert!(policy.is_fresh(&historical, now - chrono::Duration::days(3650), now));
    }

    #[test]
    fn test_key_identity() {
        let a = CacheKey::new(&danang(), Mode::forecast(7));
        let b = CacheKey::new(&Location::new(16.0489, 108.2071, "Da Nang"), Mode::forecast(7));
        let c = CacheKey::new(&danang(), Mode::forecast(3));
        assert_eq!(a.as_store_key(), b.as_store_key());
        assert_ne!(a.as_store_key(), c.as_store_key());
        assert!(a.as_store_key().starts_with("weather:v1:16.05:108.21:forecast:7:"));
    }

    #[test]
    fn test_key_variable_order_is_irrelevant() {
        let a = CacheKey::with_variables(
            &danang(),
            Mode::Current,
            vec![Variable::Humidity, Variable::Temperature],
        );
        let b = CacheKey::with_variables(
            &danang(),
            Mode::Current,
            vec![Variable::Temperature, Variable::Humidity, Variable::Temperature],
        );
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_get_or_fetch_is_idempotent_while_fresh() {
        let cache = cache();
        let key = CacheKey::new(&danang(), Mode::forecast(2));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, WeatherError>(raw_forecast())
            }
        };

        let first = cache.get_or_fetch(&key, fetch).await.unwrap();
        let second = cache.get_or_fetch(&key, fetch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.records, second.records);
        assert!(!second.stale);
        assert_eq!(first.records.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_entry_served_when_fetch_fails() {
        let cache = cache();
        let key = CacheKey::new(&danang(), Mode::forecast(2));
        let records = normalize(raw_forecast(), &key.variables);
        let long_ago = Utc::now() - chrono::Duration::days(2);
        cache.put_at(&key, records.clone(), long_ago).await.unwrap();

        let served = cache
            .get_or_fetch(&key, || async { Err(WeatherError::network("offline")) })
            .await
            .unwrap();

        assert!(served.stale);
        assert_eq!(served.records, records);
        assert_eq!(served.fetched_at, long_ago);
    }

    #[tokio::test]
    async fn test_miss_propagates_fetch_error() {
        let cache = cache();
        let key = CacheKey::new(&danang(), Mode::Current);

        let err = cache
            .get_or_fetch(&key, || async { Err(WeatherError::rate_limit("429", None)) })
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::RateLimit { .. }));
    }

    #[tokio::test]
    async fn test_stale_entry_is_refreshed_when_fetch_succeeds() {
        let cache = cache();
        let key = CacheKey::new(&danang(), Mode::forecast(2));
        cache
            .put_at(&key, Vec::new(), Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();

        let served = cache
            .get_or_fetch(&key, || async { Ok(raw_forecast()) })
            .await
            .unwrap();
        assert!(!served.stale);
        assert_eq!(served.records.len(), 2);

        match cache.get(&key).await.unwrap() {
            CacheLookup::Hit(series) => assert_eq!(series.records.len(), 2),
            CacheLookup::Miss => panic!("entry should have been replaced"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = MemoryStore::new();
        let key = CacheKey::new(&danang(), Mode::Current);
        store.save(&key.as_store_key(), vec![0xff; 3]).await.unwrap();
        let cache = WeatherCache::new(store, FreshnessPolicy::default());

        assert_eq!(cache.get(&key).await.unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_normalized_records_carry_all_key_variables() {
        let cache = cache();
        let key = CacheKey::new(&danang(), Mode::forecast(2));
        let served = cache
            .get_or_fetch(&key, || async { Ok(raw_forecast()) })
            .await
            .unwrap();
        for record in &served.records {
            assert!(record.values.contains_key(&Variable::WindSpeed));
            assert!(record.is_missing(Variable::WindSpeed));
        }
    }
}
