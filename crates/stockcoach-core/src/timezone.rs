//! Timezone resolution for ChatDate keys.
//!
//! The resolver decides which calendar day "today" is for a user. It prefers
//! a cached geo record, refreshes it through a [`GeoLookup`] when absent or
//! stale, and otherwise falls back to the runtime's local timezone. Lookup
//! failures never reach the caller.

use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset, Local, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use stockcoach_types::error::GeoError;
use stockcoach_types::message::CHAT_DATE_FORMAT;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::storage::kv_store::KvStore;

/// Cache namespace of geo/timezone records.
pub const GEO_NAMESPACE: &str = "geo";

/// What an IP geolocation service tells us about the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: String,
    /// Current UTC offset in `+HHMM` form.
    pub utc_offset: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Trait for the external IP geolocation lookup.
///
/// Implementations live in stockcoach-infra.
pub trait GeoLookup: Send + Sync {
    /// Look up the location of `ip`, or of the requester when `None`.
    fn lookup(
        &self,
        ip: Option<IpAddr>,
    ) -> impl std::future::Future<Output = Result<GeoLocation, GeoError>> + Send;
}

/// Geo record as stored in the local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedGeoRecord {
    #[serde(flatten)]
    location: GeoLocation,
    fetched_at: DateTime<Utc>,
}

/// Where the timezone in effect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimezoneSource {
    Cache,
    Lookup,
    LocalFallback,
}

/// A timezone resolved from a geo record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTimezone {
    pub name: String,
    pub offset: FixedOffset,
}

/// Parse a `+HHMM` / `-HHMM` / `+HH:MM` offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match *raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Resolves and remembers one user's timezone.
pub struct TimezoneResolver<G: GeoLookup, K: KvStore> {
    lookup: Arc<G>,
    cache: Arc<K>,
    clock: Arc<dyn Clock>,
    cache_key: String,
    ttl: TimeDelta,
    resolved: RwLock<Option<ResolvedTimezone>>,
}

impl<G: GeoLookup, K: KvStore> TimezoneResolver<G, K> {
    /// Create a resolver whose geo record is cached under `cache_key`.
    pub fn new(
        lookup: Arc<G>,
        cache: Arc<K>,
        clock: Arc<dyn Clock>,
        cache_key: impl Into<String>,
        ttl_hours: u32,
    ) -> Self {
        Self {
            lookup,
            cache,
            clock,
            cache_key: cache_key.into(),
            ttl: TimeDelta::hours(i64::from(ttl_hours)),
            resolved: RwLock::new(None),
        }
    }

    /// Resolve the timezone, consulting the cache then the lookup service.
    ///
    /// Never fails: on any error the local timezone stays in effect.
    pub async fn resolve(&self, ip: Option<IpAddr>) -> TimezoneSource {
        if let Some(record) = self.cached_record().await {
            if let Some(tz) = Self::to_resolved(&record.location) {
                debug!(key = %self.cache_key, timezone = %tz.name, "using cached timezone");
                self.set_resolved(Some(tz));
                return TimezoneSource::Cache;
            }
        }

        match self.lookup.lookup(ip).await {
            Ok(location) => match Self::to_resolved(&location) {
                Some(tz) => {
                    let record = CachedGeoRecord {
                        location,
                        fetched_at: self.clock.now(),
                    };
                    self.store_record(&record).await;
                    debug!(
                        key = %self.cache_key,
                        timezone = %tz.name,
                        "resolved timezone via lookup"
                    );
                    self.set_resolved(Some(tz));
                    TimezoneSource::Lookup
                }
                None => {
                    warn!(
                        key = %self.cache_key,
                        utc_offset = %location.utc_offset,
                        "geo lookup returned an unusable offset, using local timezone"
                    );
                    TimezoneSource::LocalFallback
                }
            },
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "geo lookup failed, using local timezone");
                TimezoneSource::LocalFallback
            }
        }
    }

    /// Today's ChatDate (`yyyy-MM-dd`) in the user's timezone.
    pub fn current_date(&self) -> String {
        self.date_of(&self.clock.now())
    }

    /// The ChatDate a timestamp falls on.
    pub fn date_of(&self, timestamp: &DateTime<Utc>) -> String {
        match self.resolved() {
            Some(tz) => timestamp
                .with_timezone(&tz.offset)
                .format(CHAT_DATE_FORMAT)
                .to_string(),
            None => timestamp
                .with_timezone(&Local)
                .format(CHAT_DATE_FORMAT)
                .to_string(),
        }
    }

    /// Hour of day (0-23) in the user's timezone.
    pub fn local_hour(&self) -> u32 {
        let now = self.clock.now();
        match self.resolved() {
            Some(tz) => now.with_timezone(&tz.offset).hour(),
            None => now.with_timezone(&Local).hour(),
        }
    }

    /// Name of the timezone in effect.
    pub fn user_timezone(&self) -> String {
        match self.resolved() {
            Some(tz) => tz.name,
            None => format!("local ({})", self.clock.now().with_timezone(&Local).offset()),
        }
    }

    /// The current instant, from the resolver's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn resolved(&self) -> Option<ResolvedTimezone> {
        self.resolved
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_resolved(&self, tz: Option<ResolvedTimezone>) {
        let mut guard = self.resolved.write().unwrap_or_else(|e| e.into_inner());
        *guard = tz;
    }

    fn to_resolved(location: &GeoLocation) -> Option<ResolvedTimezone> {
        parse_utc_offset(&location.utc_offset).map(|offset| ResolvedTimezone {
            name: location.timezone.clone(),
            offset,
        })
    }

    /// The cached record, if present and younger than the TTL.
    async fn cached_record(&self) -> Option<CachedGeoRecord> {
        let value = match self.cache.get(GEO_NAMESPACE, &self.cache_key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "failed to read cached geo record");
                return None;
            }
        };
        let record: CachedGeoRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "discarding unreadable geo record");
                return None;
            }
        };
        if self.clock.now() - record.fetched_at >= self.ttl {
            debug!(key = %self.cache_key, "cached geo record is stale");
            return None;
        }
        Some(record)
    }

    async fn store_record(&self, record: &CachedGeoRecord) {
        let value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to encode geo record");
                return;
            }
        };
        if let Err(e) = self.cache.set(GEO_NAMESPACE, &self.cache_key, &value).await {
            warn!(key = %self.cache_key, error = %e, "failed to cache geo record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testing::{MemoryKvStore, StaticGeoLookup};
    use chrono::TimeZone;

    fn resolver(
        lookup: StaticGeoLookup,
        cache: MemoryKvStore,
        clock: Arc<FixedClock>,
    ) -> TimezoneResolver<StaticGeoLookup, MemoryKvStore> {
        TimezoneResolver::new(Arc::new(lookup), Arc::new(cache), clock, "user-1", 24)
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+0530"), FixedOffset::east_opt(19_800));
        assert_eq!(parse_utc_offset("-0800"), FixedOffset::east_opt(-28_800));
        assert_eq!(parse_utc_offset("+09:00"), FixedOffset::east_opt(32_400));
        assert_eq!(parse_utc_offset("0530"), None);
        assert_eq!(parse_utc_offset("+5"), None);
        assert_eq!(parse_utc_offset("+2500"), None);
    }

    #[tokio::test]
    async fn test_lookup_result_keys_dates_and_is_cached() {
        // 2024-01-01 23:30 UTC is already Jan 2 in Tokyo.
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap(),
        ));
        let cache = MemoryKvStore::default();
        let lookup = StaticGeoLookup::ok("Asia/Tokyo", "+0900");
        let tz = resolver(lookup.clone(), cache.clone(), clock);

        assert_eq!(tz.resolve(None).await, TimezoneSource::Lookup);
        assert_eq!(tz.current_date(), "2024-01-02");
        assert_eq!(tz.user_timezone(), "Asia/Tokyo");
        assert_eq!(tz.local_hour(), 8);
        assert!(cache.contains(GEO_NAMESPACE, "user-1"));
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_lookup() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        ));
        let cache = MemoryKvStore::default();
        let lookup = StaticGeoLookup::ok("America/New_York", "-0500");

        let first = resolver(lookup.clone(), cache.clone(), clock.clone());
        first.resolve(None).await;

        clock.advance(TimeDelta::hours(23));
        let second = resolver(lookup.clone(), cache.clone(), clock.clone());
        assert_eq!(second.resolve(None).await, TimezoneSource::Cache);
        assert_eq!(lookup.calls(), 1);

        // Past the validity window the record is refreshed.
        clock.advance(TimeDelta::hours(2));
        let third = resolver(lookup.clone(), cache, clock);
        assert_eq!(third.resolve(None).await, TimezoneSource::Lookup);
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_back_to_local() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let tz = resolver(StaticGeoLookup::failing(), MemoryKvStore::default(), clock);

        assert_eq!(tz.resolve(None).await, TimezoneSource::LocalFallback);
        let expected = now.with_timezone(&Local).format("%Y-%m-%d").to_string();
        assert_eq!(tz.current_date(), expected);
        assert!(tz.user_timezone().starts_with("local"));
    }

    #[tokio::test]
    async fn test_unusable_offset_falls_back_to_local() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = MemoryKvStore::default();
        let tz = resolver(StaticGeoLookup::ok("Nowhere/Land", "garbage"), cache.clone(), clock);

        assert_eq!(tz.resolve(None).await, TimezoneSource::LocalFallback);
        assert!(!cache.contains(GEO_NAMESPACE, "user-1"));
    }

    #[tokio::test]
    async fn test_corrupt_cache_record_is_refreshed() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = MemoryKvStore::default();
        cache.insert_raw(GEO_NAMESPACE, "user-1", serde_json::json!({"nonsense": true}));
        let lookup = StaticGeoLookup::ok("Europe/Berlin", "+0100");
        let tz = resolver(lookup.clone(), cache, clock);

        assert_eq!(tz.resolve(None).await, TimezoneSource::Lookup);
        assert_eq!(lookup.calls(), 1);
    }
}
