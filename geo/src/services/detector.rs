use std::{future::Future, net::IpAddr};

use chrono::{DateTime, Duration, Utc};
use common::error::Res;
use dashmap::DashMap;

use crate::services::region::{Region, is_private_addr, region_for_country};

/// What a lookup may use to locate a client.
#[derive(Debug, Clone, Default)]
pub struct LookupQuery {
    pub ip: Option<IpAddr>,
    /// Country code set by the CDN in front of the server.
    pub country_header: Option<String>,
}

/// Source of IP geolocation. `Ok(None)` means the source had no answer.
pub trait RegionLookup {
    fn lookup(&self, query: &LookupQuery) -> impl Future<Output = Res<Option<Region>>>;
}

/// Reads the `CF-IPCountry` header set by Cloudflare.
#[derive(Debug, Clone, Default)]
pub struct HeaderLookup;

pub const COUNTRY_HEADER: &str = "CF-IPCountry";

impl RegionLookup for HeaderLookup {
    async fn lookup(&self, query: &LookupQuery) -> Res<Option<Region>> {
        // XX: unknown, T1: Tor
        Ok(query
            .country_header
            .as_deref()
            .map(str::trim)
            .filter(|code| code.len() == 2 && !matches!(*code, "XX" | "T1"))
            .map(region_for_country))
    }
}

struct CachedRegion {
    region: Region,
    cached_at: DateTime<Utc>,
}

/// Default bound on cached addresses.
pub const MAX_CACHED_ADDRS: usize = 10_000;

/// Memoises lookups per IP for `ttl`. Private and unknown addresses get the
/// default region without a lookup. Failed lookups also fall back to the
/// default and are not cached.
///
/// The cache holds at most `capacity` addresses. A full cache drops its
/// expired entries on the next insert, and skips caching while it stays full.
pub struct RegionDetector<L> {
    lookup: L,
    ttl: Duration,
    capacity: usize,
    cache: DashMap<IpAddr, CachedRegion>,
}

impl<L: RegionLookup> RegionDetector<L> {
    pub fn new(lookup: L, ttl: Duration) -> Self {
        Self::with_capacity(lookup, ttl, MAX_CACHED_ADDRS)
    }

    pub fn with_capacity(lookup: L, ttl: Duration, capacity: usize) -> Self {
        Self {
            lookup,
            ttl,
            capacity,
            cache: DashMap::new(),
        }
    }

    pub async fn detect(&self, query: LookupQuery) -> Region {
        self.detect_at(query, Utc::now()).await
    }

    pub async fn detect_at(&self, query: LookupQuery, now: DateTime<Utc>) -> Region {
        let Some(ip) = query.ip else {
            log::debug!("No client address, using default region");
            return Region::default();
        };

        if let Some(cached) = self.cached(&ip, now) {
            return cached;
        }
        if is_private_addr(&ip) {
            log::debug!("Private address {}, using default region", ip);
            return Region::default();
        }

        // concurrent misses for one IP may both look up; the last insert wins
        match self.lookup.lookup(&query).await {
            Ok(Some(region)) => {
                log::info!("Detected region for {}: {} ({})", ip, region.region_name, region.region);
                self.store(ip, region.clone(), now);
                region
            }
            Ok(None) => Region::default(),
            Err(e) => {
                log::error!("Failed to detect region for {}: {}", ip, e);
                Region::default()
            }
        }
    }

    fn store(&self, ip: IpAddr, region: Region, now: DateTime<Utc>) {
        if self.cache.len() >= self.capacity {
            let before = self.cache.len();
            self.cache.retain(|_, entry| now - entry.cached_at < self.ttl);
            log::debug!("Evicted {} expired region(s)", before - self.cache.len());
        }
        if self.cache.len() >= self.capacity && !self.cache.contains_key(&ip) {
            log::warn!("Region cache full, not caching {}", ip);
            return;
        }
        self.cache.insert(ip, CachedRegion { region, cached_at: now });
    }

    fn cached(&self, ip: &IpAddr, now: DateTime<Utc>) -> Option<Region> {
        let fresh = {
            let entry = self.cache.get(ip)?;
            if now - entry.cached_at < self.ttl {
                Some(entry.region.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            self.cache.remove(ip);
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with a fixed country and counts calls.
    struct FixedLookup {
        country: Option<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FixedLookup {
        fn answering(country: &'static str) -> Self {
            Self {
                country: Some(country),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                country: None,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RegionLookup for FixedLookup {
        async fn lookup(&self, _query: &LookupQuery) -> Res<Option<Region>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Internal("provider down".to_string()));
            }
            Ok(self.country.map(region_for_country))
        }
    }

    fn query(ip: &str) -> LookupQuery {
        LookupQuery {
            ip: Some(ip.parse().unwrap()),
            country_header: None,
        }
    }

    #[actix_web::test]
    async fn private_ip_uses_default_without_lookup() {
        let detector = RegionDetector::new(FixedLookup::answering("FR"), Duration::hours(24));
        assert_eq!(detector.detect(query("192.168.1.20")).await, Region::default());
        assert_eq!(detector.detect(LookupQuery::default()).await, Region::default());
        assert_eq!(detector.lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn lookups_are_cached_until_ttl() {
        let detector = RegionDetector::new(FixedLookup::answering("FR"), Duration::hours(24));
        let now = Utc::now();

        let first = detector.detect_at(query("81.2.69.160"), now).await;
        assert_eq!(first.currency, "EUR");
        detector.detect_at(query("81.2.69.160"), now + Duration::hours(23)).await;
        assert_eq!(detector.lookup.calls.load(Ordering::SeqCst), 1);

        detector.detect_at(query("81.2.69.160"), now + Duration::hours(25)).await;
        assert_eq!(detector.lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn full_cache_evicts_expired_addresses() {
        let detector =
            RegionDetector::with_capacity(FixedLookup::answering("FR"), Duration::hours(1), 2);
        let now = Utc::now();

        detector.detect_at(query("81.2.69.160"), now).await;
        detector.detect_at(query("81.2.69.161"), now).await;
        assert_eq!(detector.cache.len(), 2);

        // full of fresh entries: the newcomer is answered but not kept
        detector.detect_at(query("81.2.69.162"), now).await;
        assert_eq!(detector.cache.len(), 2);
        assert!(!detector.cache.contains_key(&"81.2.69.162".parse::<IpAddr>().unwrap()));

        // once the old ones expire, the next insert clears them out
        detector.detect_at(query("81.2.69.163"), now + Duration::hours(2)).await;
        assert_eq!(detector.cache.len(), 1);
        assert!(detector.cache.contains_key(&"81.2.69.163".parse::<IpAddr>().unwrap()));
    }

    #[actix_web::test]
    async fn failed_lookup_falls_back_and_is_retried() {
        let detector = RegionDetector::new(FixedLookup::failing(), Duration::hours(24));
        assert_eq!(detector.detect(query("8.8.8.8")).await, Region::default());
        assert_eq!(detector.detect(query("8.8.8.8")).await, Region::default());
        assert_eq!(detector.lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn header_lookup_ignores_unknown_markers() {
        let lookup = HeaderLookup;
        let mut q = query("8.8.8.8");
        q.country_header = Some("us".to_string());
        assert_eq!(lookup.lookup(&q).await.unwrap().unwrap().currency, "USD");
        q.country_header = Some("XX".to_string());
        assert!(lookup.lookup(&q).await.unwrap().is_none());
    }
}
