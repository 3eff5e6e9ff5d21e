//! Per-(coordinate, service) response cache with TTLs learned from
//! downstream `Cache-Control` directives.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::{coordinate::Coordinate, service::Service};

pub type JsonMap = Map<String, Value>;

type CacheKey = ((u64, u64), String);

static MAX_AGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^\s*max-age\s*=\s*"?(\d+)"?\s*$"#).unwrap());

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: JsonMap,
    pub stored_at: Instant,
}

/// Response cache shared by all in-flight aggregations.
///
/// Entries are never evicted; a refresh supersedes the entry in place.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, coordinate: &Coordinate, service: &Service) -> Option<JsonMap> {
        self.lookup_at(coordinate, service, Instant::now())
    }

    /// Cached body for `service` at `coordinate` if it is still fresh at `now`.
    pub fn lookup_at(
        &self,
        coordinate: &Coordinate,
        service: &Service,
        now: Instant,
    ) -> Option<JsonMap> {
        let max_age = match service.max_age() {
            Some(max_age) if max_age > 0 => Duration::from_secs(max_age),
            _ => {
                trace!("Cache disabled or not yet learned for {}", service.address());
                return None;
            }
        };

        let key = (coordinate.key(), service.address().to_string());
        let Some(entry) = self.entries.get(&key) else {
            debug!("Cache miss for {} at {coordinate}", service.address());
            return None;
        };

        if now.saturating_duration_since(entry.stored_at) < max_age {
            debug!("Cache hit for {} at {coordinate}", service.address());
            Some(entry.body.clone())
        } else {
            debug!(
                "Cache entry for {} at {coordinate} exceeded max-age",
                service.address()
            );
            None
        }
    }

    /// Store a successful response. The first store for a service learns
    /// its TTL from `cache_directive`; later stores reuse the learned TTL.
    pub fn store(
        &self,
        coordinate: &Coordinate,
        service: &Service,
        body: JsonMap,
        cache_directive: Option<&str>,
    ) {
        if service.max_age().is_none() {
            let learned = service.learn_max_age(parse_max_age(cache_directive));
            debug!("Learned max-age={learned} for {}", service.address());
        }

        let key = (coordinate.key(), service.address().to_string());
        self.entries.insert(
            key,
            CacheEntry {
                body,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts `max-age` seconds from a `Cache-Control` value. Anything that
/// does not yield a usable TTL, including `no-store`/`no-cache`, maps to 0.
pub fn parse_max_age(directive: Option<&str>) -> u64 {
    let Some(directive) = directive else {
        return 0;
    };

    let mut max_age = None;
    for part in directive.split(',') {
        let lowered = part.trim().to_ascii_lowercase();
        if lowered == "no-store" || lowered == "no-cache" {
            return 0;
        }
        if let Some(caps) = MAX_AGE_RE.captures(part) {
            max_age = caps[1].parse::<u64>().ok();
        }
    }

    max_age.unwrap_or_else(|| {
        debug!("No usable max-age in cache directive {directive:?}, caching disabled");
        0
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    fn service() -> Service {
        Service::new("127.0.0.1:5001", "weather", "tester", "tile", Vec::new())
    }

    #[test]
    fn test_parse_max_age() {
        let test_cases = [
            (Some("max-age=60"), 60),
            (Some("public, max-age=30"), 30),
            (Some("Max-Age = \"15\""), 15),
            (Some("max-age=0"), 0),
            (Some("max-age=abc"), 0),
            (Some("max-age=60, no-store"), 0),
            (Some("no-cache"), 0),
            (Some("private"), 0),
            (Some(""), 0),
            (None, 0),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_max_age(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_hit_within_max_age() {
        let cache = ResponseCache::new();
        let svc = service();
        let coord = Coordinate::new(40.1, -88.2).unwrap();

        assert!(cache.lookup(&coord, &svc).is_none());
        cache.store(&coord, &svc, body(json!({"temp": 21})), Some("max-age=60"));
        assert_eq!(svc.max_age(), Some(60));

        let now = Instant::now();
        assert_eq!(
            cache.lookup_at(&coord, &svc, now),
            Some(body(json!({"temp": 21})))
        );
        assert!(cache
            .lookup_at(&coord, &svc, now + Duration::from_secs(61))
            .is_none());
    }

    #[test]
    fn test_key_includes_coordinate() {
        let cache = ResponseCache::new();
        let svc = service();
        let here = Coordinate::new(40.1, -88.2).unwrap();
        let there = Coordinate::new(40.2, -88.2).unwrap();

        cache.store(&here, &svc, body(json!({"temp": 21})), Some("max-age=60"));
        assert!(cache.lookup(&here, &svc).is_some());
        assert!(cache.lookup(&there, &svc).is_none());
    }

    #[test]
    fn test_zero_max_age_disables_cache() {
        let cache = ResponseCache::new();
        let svc = service();
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        cache.store(&coord, &svc, body(json!({"a": 1})), Some("garbage"));
        assert_eq!(svc.max_age(), Some(0));
        assert!(cache.lookup(&coord, &svc).is_none());

        // Learned once: a later directive does not re-enable caching.
        cache.store(&coord, &svc, body(json!({"a": 2})), Some("max-age=60"));
        assert_eq!(svc.max_age(), Some(0));
        assert!(cache.lookup(&coord, &svc).is_none());
    }

    #[test]
    fn test_refresh_supersedes_entry() {
        let cache = ResponseCache::new();
        let svc = service();
        let coord = Coordinate::new(1.0, 2.0).unwrap();

        cache.store(&coord, &svc, body(json!({"v": 1})), Some("max-age=60"));
        cache.store(&coord, &svc, body(json!({"v": 2})), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&coord, &svc), Some(body(json!({"v": 2}))));
    }
}
