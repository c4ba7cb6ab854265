/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use arc_swap::ArcSwap;

use crate::stats;
use crate::types::EventKind;

pub(crate) mod rule;
use rule::{MappingRule, MatchPattern};

mod fsm;
use fsm::GlobFsm;

mod cache;
pub(crate) use cache::{MapDecision, ResolvedMapping};
use cache::MatchCache;

mod config;
pub(crate) use config::MapperDefaults;
use config::parse_mapping_yaml;

mod watch;
pub(crate) use watch::spawn_watcher;

/// The name-mapping engine.
///
/// The compiled ruleset lives behind a single atomic pointer: readers on
/// the event path load it per event, reloads swap the whole state (and
/// with it the decision cache) in one store. A reader sees the old or the
/// new ruleset in its entirety, never a mixture.
pub struct MetricMapper {
    state: ArcSwap<MapperState>,
    cache_size: usize,
}

pub(crate) struct MapperState {
    defaults: MapperDefaults,
    rules: Vec<Arc<MappingRule>>,
    fsm: GlobFsm,
    regex_rules: Vec<Arc<MappingRule>>,
    cache: MatchCache,
}

impl MapperState {
    fn empty(cache_size: usize) -> Self {
        MapperState {
            defaults: MapperDefaults::default(),
            rules: Vec::new(),
            fsm: GlobFsm::new(),
            regex_rules: Vec::new(),
            cache: MatchCache::new(cache_size),
        }
    }

    fn compile(
        defaults: MapperDefaults,
        rules: Vec<Arc<MappingRule>>,
        cache_size: usize,
    ) -> Self {
        let mut fsm = GlobFsm::new();
        let mut regex_rules = Vec::new();

        for rule in &rules {
            match &rule.pattern {
                MatchPattern::Glob(segments) => fsm.add_rule(segments, rule.index),
                MatchPattern::Regex(_) => regex_rules.push(rule.clone()),
            }
        }

        MapperState {
            defaults,
            rules,
            fsm,
            regex_rules,
            cache: MatchCache::new(cache_size),
        }
    }

    pub(crate) fn defaults(&self) -> &MapperDefaults {
        &self.defaults
    }

    /// Decide how to map `name` of the given kind, consulting the cache.
    pub(crate) fn get_mapping(&self, name: &str, kind: EventKind) -> MapDecision {
        if let Some(decision) = self.cache.get(name, kind) {
            return decision;
        }

        let decision = self.lookup(name, kind);
        self.cache.put(name, kind, decision.clone());
        decision
    }

    fn lookup(&self, name: &str, kind: EventKind) -> MapDecision {
        if let Some((terminals, captures)) = self.fsm.lookup(name) {
            for rule_index in terminals {
                let rule = &self.rules[*rule_index];
                if rule.type_filter.matches(kind) {
                    let (mapped_name, labels) = rule.expand(&captures);
                    return MapDecision::Match(Arc::new(ResolvedMapping {
                        rule: rule.clone(),
                        name: mapped_name,
                        labels,
                    }));
                }
            }
        }

        for rule in &self.regex_rules {
            if !rule.type_filter.matches(kind) {
                continue;
            }
            let MatchPattern::Regex(re) = &rule.pattern else {
                continue;
            };
            if let Some(caps) = re.captures(name) {
                let captures: Vec<&str> = caps
                    .iter()
                    .skip(1)
                    .map(|c| c.map(|m| m.as_str()).unwrap_or(""))
                    .collect();
                let (mapped_name, labels) = rule.expand(&captures);
                return MapDecision::Match(Arc::new(ResolvedMapping {
                    rule: rule.clone(),
                    name: mapped_name,
                    labels,
                }));
            }
        }

        MapDecision::Miss
    }

    pub(crate) fn dump_fsm(&self) -> String {
        self.fsm.dump_graphviz()
    }
}

impl MetricMapper {
    pub fn new(cache_size: usize) -> Self {
        MetricMapper {
            state: ArcSwap::from_pointee(MapperState::empty(cache_size)),
            cache_size,
        }
    }

    /// Parse, validate and compile the mapping file, then swap it in.
    /// Any failure leaves the previous ruleset untouched.
    pub fn load_file(&self, path: &Path) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(path)
            .context(format!("failed to read mapping file {}", path.display()))?;
        self.load_str(&text)
            .context(format!("failed to parse mapping file {}", path.display()))
    }

    pub(crate) fn load_str(&self, text: &str) -> anyhow::Result<()> {
        let (defaults, rules) = parse_mapping_yaml(text)?;

        let mapping_count = rules.len();
        let state = MapperState::compile(defaults, rules, self.cache_size);
        self.state.store(Arc::new(state));

        stats::global().set_loaded_mappings(mapping_count);
        stats::global().set_cache_length(0);
        Ok(())
    }

    /// The current compiled state. Callers hold it for one event at most.
    pub(crate) fn current(&self) -> Arc<MapperState> {
        self.state.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(text: &str, cache_size: usize) -> MapperState {
        let (defaults, rules) = parse_mapping_yaml(text).unwrap();
        MapperState::compile(defaults, rules, cache_size)
    }

    const OVERLAP: &str = r#"
mappings:
  - match: "svc.*"
    name: "first_rule"
  - match: "svc.*"
    name: "second_rule"
"#;

    #[test]
    fn glob_match_with_captures() {
        let state = compile(
            r#"
mappings:
  - match: "client.*.request"
    name: "client_request"
    labels:
      client: "$1"
"#,
            0,
        );
        let decision = state.get_mapping("client.mobile.request", EventKind::Counter);
        let MapDecision::Match(m) = decision else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "client_request");
        assert_eq!(m.labels.get("client").map(String::as_str), Some("mobile"));
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let state = compile(OVERLAP, 0);
        let MapDecision::Match(m) = state.get_mapping("svc.a", EventKind::Counter) else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "first_rule");

        // swapped declarations swap the winner
        let swapped = r#"
mappings:
  - match: "svc.*"
    name: "second_rule"
  - match: "svc.*"
    name: "first_rule"
"#;
        let state = compile(swapped, 0);
        let MapDecision::Match(m) = state.get_mapping("svc.a", EventKind::Counter) else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "second_rule");
    }

    #[test]
    fn type_filter_skips_to_the_next_rule() {
        let state = compile(
            r#"
mappings:
  - match: "job.*"
    match_metric_type: timer
    name: "job_duration"
  - match: "job.*"
    name: "job_metric"
"#,
            0,
        );
        let MapDecision::Match(m) = state.get_mapping("job.cleanup", EventKind::Timer) else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "job_duration");

        let MapDecision::Match(m) = state.get_mapping("job.cleanup", EventKind::Counter) else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "job_metric");
    }

    #[test]
    fn regex_rules_run_after_globs_in_declaration_order() {
        let state = compile(
            r#"
mappings:
  - match: "exact.name"
    name: "from_glob"
  - match: "^exact\\.(.+)$"
    match_type: regex
    name: "from_regex"
    labels:
      rest: "$1"
"#,
            0,
        );
        let MapDecision::Match(m) = state.get_mapping("exact.name", EventKind::Gauge) else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "from_glob");

        let MapDecision::Match(m) = state.get_mapping("exact.other", EventKind::Gauge) else {
            panic!("expected a match");
        };
        assert_eq!(m.name, "from_regex");
        assert_eq!(m.labels.get("rest").map(String::as_str), Some("other"));
    }

    #[test]
    fn unmatched_name_misses() {
        let state = compile(OVERLAP, 0);
        assert!(matches!(
            state.get_mapping("other.name", EventKind::Counter),
            MapDecision::Miss
        ));
    }

    #[test]
    fn cache_is_transparent() {
        let queries = [
            ("svc.a", EventKind::Counter),
            ("svc.b", EventKind::Timer),
            ("miss.me", EventKind::Gauge),
            ("svc.a", EventKind::Counter),
        ];

        let cached = compile(OVERLAP, 16);
        let uncached = compile(OVERLAP, 0);
        for (name, kind) in queries {
            let a = cached.get_mapping(name, kind);
            let b = uncached.get_mapping(name, kind);
            match (a, b) {
                (MapDecision::Match(x), MapDecision::Match(y)) => {
                    assert_eq!(x.name, y.name);
                    assert_eq!(x.labels, y.labels);
                    assert_eq!(x.rule.index, y.rule.index);
                }
                (MapDecision::Miss, MapDecision::Miss) => {}
                _ => panic!("cached and uncached decisions diverge for {name}"),
            }
        }
    }

    #[test]
    fn identical_queries_are_deterministic() {
        let state = compile(OVERLAP, 16);
        for _ in 0..3 {
            let MapDecision::Match(m) = state.get_mapping("svc.a", EventKind::Counter) else {
                panic!("expected a match");
            };
            assert_eq!(m.name, "first_rule");
        }
    }

    #[test]
    fn reload_swaps_the_whole_state() {
        let mapper = MetricMapper::new(16);
        assert!(matches!(
            mapper.current().get_mapping("a.b", EventKind::Counter),
            MapDecision::Miss
        ));

        let dir = std::env::temp_dir().join("statsd-exporter-mapper-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mapping.yml");
        std::fs::write(&path, "mappings:\n  - match: \"a.*\"\n    name: \"a_metric\"\n").unwrap();

        mapper.load_file(&path).unwrap();
        let MapDecision::Match(m) = mapper.current().get_mapping("a.b", EventKind::Counter)
        else {
            panic!("expected a match after reload");
        };
        assert_eq!(m.name, "a_metric");

        // a broken file must leave the previous state in force
        std::fs::write(&path, "mappings:\n  - match: \"[\"\n    match_type: regex\n").unwrap();
        assert!(mapper.load_file(&path).is_err());
        assert!(matches!(
            mapper.current().get_mapping("a.b", EventKind::Counter),
            MapDecision::Match(_)
        ));

        std::fs::remove_file(&path).ok();
    }
}
