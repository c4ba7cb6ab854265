/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::stats;
use crate::types::{EventKind, TagMap};

use super::rule::MappingRule;

/// The fully expanded outcome of a successful rule match.
#[derive(Debug)]
pub(crate) struct ResolvedMapping {
    pub(crate) rule: Arc<MappingRule>,
    pub(crate) name: String,
    pub(crate) labels: TagMap,
}

#[derive(Debug, Clone)]
pub(crate) enum MapDecision {
    Match(Arc<ResolvedMapping>),
    Miss,
}

/// Bounded LRU over mapping decisions, keyed by metric name and kind.
///
/// The cache belongs to one compiled mapper state and is discarded with
/// it on reload, so entries can never outlive the ruleset that produced
/// them. A zero capacity disables caching.
#[derive(Debug)]
pub(crate) struct MatchCache {
    inner: Option<Mutex<LruCache<String, MapDecision>>>,
}

fn cache_key(name: &str, kind: EventKind) -> String {
    let mut key = String::with_capacity(name.len() + 8);
    key.push_str(name);
    key.push('|');
    key.push_str(kind.as_str());
    key
}

impl MatchCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c)));
        MatchCache { inner }
    }

    pub(crate) fn get(&self, name: &str, kind: EventKind) -> Option<MapDecision> {
        let cache = self.inner.as_ref()?;
        let mut cache = cache.lock().unwrap();
        cache.get(&cache_key(name, kind)).cloned()
    }

    pub(crate) fn put(&self, name: &str, kind: EventKind, decision: MapDecision) {
        let Some(cache) = self.inner.as_ref() else {
            return;
        };
        let mut cache = cache.lock().unwrap();
        cache.put(cache_key(name, kind), decision);
        stats::global().set_cache_length(cache.len());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        match self.inner.as_ref() {
            Some(cache) => cache.lock().unwrap().len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_oldest() {
        let cache = MatchCache::new(2);
        cache.put("a", EventKind::Counter, MapDecision::Miss);
        cache.put("b", EventKind::Counter, MapDecision::Miss);
        cache.put("c", EventKind::Counter, MapDecision::Miss);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", EventKind::Counter).is_none());
        assert!(cache.get("c", EventKind::Counter).is_some());
    }

    #[test]
    fn kind_is_part_of_the_key() {
        let cache = MatchCache::new(8);
        cache.put("a", EventKind::Counter, MapDecision::Miss);
        assert!(cache.get("a", EventKind::Timer).is_none());
        assert!(cache.get("a", EventKind::Counter).is_some());
    }

    #[test]
    fn zero_capacity_disables() {
        let cache = MatchCache::new(0);
        cache.put("a", EventKind::Counter, MapDecision::Miss);
        assert!(cache.get("a", EventKind::Counter).is_none());
    }
}
