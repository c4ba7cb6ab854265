/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader, yaml};

use crate::types::parse_duration;

use super::rule::{
    GlobSegment, MappingRule, MatchKind, MatchPattern, QuantileObjective, RuleAction, Template,
    TimerKind, TypeFilter, parse_glob_pattern,
};

/// Default quantile objectives for summary timer families.
const DEFAULT_QUANTILES: [QuantileObjective; 3] = [
    QuantileObjective {
        quantile: 0.5,
        error: 0.05,
    },
    QuantileObjective {
        quantile: 0.9,
        error: 0.01,
    },
    QuantileObjective {
        quantile: 0.99,
        error: 0.001,
    },
];

/// Default bucket upper bounds (seconds) for histogram timer families.
const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// The `defaults` block of the mapping configuration.
#[derive(Debug, Clone)]
pub(crate) struct MapperDefaults {
    pub(crate) timer_kind: TimerKind,
    pub(crate) quantiles: Vec<QuantileObjective>,
    pub(crate) buckets: Vec<f64>,
    pub(crate) ttl: Duration,
    pub(crate) match_kind: MatchKind,
}

impl Default for MapperDefaults {
    fn default() -> Self {
        MapperDefaults {
            timer_kind: TimerKind::Summary,
            quantiles: DEFAULT_QUANTILES.to_vec(),
            buckets: DEFAULT_BUCKETS.to_vec(),
            ttl: Duration::ZERO,
            match_kind: MatchKind::Glob,
        }
    }
}

fn normalize_key(k: &str) -> String {
    k.to_ascii_lowercase().replace('-', "_")
}

fn foreach_kv<'a, F>(map: &'a yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&'a str, &'a Yaml) -> anyhow::Result<()>,
{
    for (k, v) in map.iter() {
        let Yaml::String(key) = k else {
            return Err(anyhow!("invalid non-string key {k:?}"));
        };
        f(key, v)?;
    }
    Ok(())
}

fn as_str(v: &Yaml) -> anyhow::Result<&str> {
    match v {
        Yaml::String(s) => Ok(s.as_str()),
        _ => Err(anyhow!("yaml value type for string should be 'string'")),
    }
}

fn as_f64(v: &Yaml) -> anyhow::Result<f64> {
    match v {
        Yaml::Real(s) => s
            .parse::<f64>()
            .map_err(|e| anyhow!("invalid f64 value: {e}")),
        Yaml::Integer(i) => Ok(*i as f64),
        _ => Err(anyhow!("yaml value type for f64 should be 'real' or 'integer'")),
    }
}

fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(s) => parse_duration(s),
        Yaml::Integer(i) if *i >= 0 => Ok(Duration::from_secs(*i as u64)),
        _ => Err(anyhow!("invalid yaml value type for duration")),
    }
}

fn as_f64_list(v: &Yaml) -> anyhow::Result<Vec<f64>> {
    let Yaml::Array(seq) = v else {
        return Err(anyhow!("yaml value type should be 'array'"));
    };
    seq.iter().map(as_f64).collect()
}

fn as_buckets(v: &Yaml) -> anyhow::Result<Vec<f64>> {
    let buckets = as_f64_list(v)?;
    if buckets.is_empty() {
        return Err(anyhow!("bucket list may not be empty"));
    }
    if !buckets.is_sorted_by(|a, b| a < b) {
        return Err(anyhow!("bucket bounds must be strictly increasing"));
    }
    Ok(buckets)
}

fn as_quantiles(v: &Yaml) -> anyhow::Result<Vec<QuantileObjective>> {
    let Yaml::Array(seq) = v else {
        return Err(anyhow!("yaml value type for quantiles should be 'array'"));
    };

    let mut quantiles = Vec::with_capacity(seq.len());
    for item in seq {
        let Yaml::Hash(map) = item else {
            return Err(anyhow!("each quantile objective should be a map"));
        };
        let mut objective = QuantileObjective {
            quantile: 0.0,
            error: 0.0,
        };
        foreach_kv(map, |k, v| match normalize_key(k).as_str() {
            "quantile" => {
                objective.quantile = as_f64(v)?;
                Ok(())
            }
            "error" => {
                objective.error = as_f64(v)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k} in quantile objective")),
        })?;
        if !(0.0..=1.0).contains(&objective.quantile) {
            return Err(anyhow!(
                "quantile {} out of range (0.0-1.0)",
                objective.quantile
            ));
        }
        quantiles.push(objective);
    }
    Ok(quantiles)
}

impl MapperDefaults {
    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match normalize_key(k).as_str() {
            "timer_type" => {
                self.timer_kind = TimerKind::parse(as_str(v)?)?;
                Ok(())
            }
            "quantiles" => {
                self.quantiles = as_quantiles(v)?;
                Ok(())
            }
            "buckets" => {
                self.buckets = as_buckets(v)?;
                Ok(())
            }
            "ttl" => {
                self.ttl = as_duration(v).context(format!("invalid duration value for key {k}"))?;
                Ok(())
            }
            "match_type" => {
                self.match_kind = MatchKind::parse(as_str(v)?)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k} in defaults")),
        }
    }
}

#[derive(Default)]
struct RuleBuilder {
    r#match: Option<String>,
    match_kind: Option<MatchKind>,
    type_filter: TypeFilter,
    name: Option<String>,
    labels: Vec<(String, Template)>,
    action: RuleAction,
    help: Option<String>,
    ttl: Option<Duration>,
    timer_kind: Option<TimerKind>,
    quantiles: Option<Vec<QuantileObjective>>,
    buckets: Option<Vec<f64>>,
}

impl RuleBuilder {
    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match normalize_key(k).as_str() {
            "match" => {
                self.r#match = Some(as_str(v)?.to_string());
                Ok(())
            }
            "match_type" => {
                self.match_kind = Some(MatchKind::parse(as_str(v)?)?);
                Ok(())
            }
            "match_metric_type" => {
                self.type_filter = TypeFilter::parse(as_str(v)?)?;
                Ok(())
            }
            "name" => {
                self.name = Some(as_str(v)?.to_string());
                Ok(())
            }
            "labels" => {
                let Yaml::Hash(map) = v else {
                    return Err(anyhow!("yaml value type for labels should be 'map'"));
                };
                foreach_kv(map, |label, value| {
                    self.labels
                        .push((label.to_string(), Template::parse(as_str(value)?)));
                    Ok(())
                })
            }
            "action" => {
                self.action = RuleAction::parse(as_str(v)?)?;
                Ok(())
            }
            "help" => {
                self.help = Some(as_str(v)?.to_string());
                Ok(())
            }
            "ttl" => {
                self.ttl =
                    Some(as_duration(v).context(format!("invalid duration value for key {k}"))?);
                Ok(())
            }
            "timer_type" => {
                self.timer_kind = Some(TimerKind::parse(as_str(v)?)?);
                Ok(())
            }
            "quantiles" => {
                self.quantiles = Some(as_quantiles(v)?);
                Ok(())
            }
            "buckets" => {
                self.buckets = Some(as_buckets(v)?);
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k} in mapping rule")),
        }
    }

    fn build(self, index: usize, defaults: &MapperDefaults) -> anyhow::Result<MappingRule> {
        let Some(expr) = self.r#match else {
            return Err(anyhow!("mapping rule {index} has no match expression"));
        };

        let pattern = match self.match_kind.unwrap_or(defaults.match_kind) {
            MatchKind::Glob => {
                let segments: Vec<GlobSegment> = parse_glob_pattern(&expr)
                    .context(format!("mapping rule {index}: invalid glob pattern"))?;
                MatchPattern::Glob(segments)
            }
            MatchKind::Regex => {
                let re = regex::Regex::new(&expr)
                    .map_err(|e| anyhow!("mapping rule {index}: invalid regex: {e}"))?;
                MatchPattern::Regex(re)
            }
        };

        let rule = MappingRule {
            index,
            pattern,
            type_filter: self.type_filter,
            name: Template::parse(self.name.as_deref().unwrap_or("")),
            labels: self.labels,
            action: self.action,
            help: self.help,
            ttl: self.ttl,
            timer_kind: self.timer_kind,
            quantiles: self.quantiles,
            buckets: self.buckets,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Parse the whole mapping configuration document.
pub(crate) fn parse_mapping_yaml(
    text: &str,
) -> anyhow::Result<(MapperDefaults, Vec<Arc<MappingRule>>)> {
    let mut docs =
        YamlLoader::load_from_str(text).map_err(|e| anyhow!("invalid yaml document: {e}"))?;

    let mut defaults = MapperDefaults::default();
    let mut rules: Vec<Arc<MappingRule>> = Vec::new();

    if docs.is_empty() {
        return Ok((defaults, rules));
    }
    let doc = docs.remove(0);
    if matches!(doc, Yaml::Null) {
        return Ok((defaults, rules));
    }
    let Yaml::Hash(root) = doc else {
        return Err(anyhow!("the root yaml node should be a map"));
    };

    let mut mapping_nodes: Vec<&yaml::Hash> = Vec::new();
    foreach_kv(&root, |k, v| match normalize_key(k).as_str() {
        "defaults" => {
            let Yaml::Hash(map) = v else {
                return Err(anyhow!("yaml value type for defaults should be 'map'"));
            };
            foreach_kv(map, |k, v| defaults.set(k, v))
        }
        "mappings" => {
            let Yaml::Array(seq) = v else {
                return Err(anyhow!("yaml value type for mappings should be 'array'"));
            };
            for item in seq {
                let Yaml::Hash(map) = item else {
                    return Err(anyhow!("each mapping rule should be a map"));
                };
                mapping_nodes.push(map);
            }
            Ok(())
        }
        _ => Err(anyhow!("invalid key {k} in mapping config")),
    })?;

    for (index, map) in mapping_nodes.into_iter().enumerate() {
        let mut builder = RuleBuilder::default();
        foreach_kv(map, |k, v| builder.set(k, v))?;
        rules.push(Arc::new(builder.build(index, &defaults)?));
    }

    Ok((defaults, rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        let (defaults, rules) = parse_mapping_yaml("").unwrap();
        assert_eq!(defaults.timer_kind, TimerKind::Summary);
        assert_eq!(defaults.ttl, Duration::ZERO);
        assert!(rules.is_empty());
    }

    #[test]
    fn defaults_block() {
        let (defaults, _) = parse_mapping_yaml(
            r#"
defaults:
  timer_type: histogram
  ttl: 90s
  buckets: [0.1, 0.5, 1]
  match_type: regex
"#,
        )
        .unwrap();
        assert_eq!(defaults.timer_kind, TimerKind::Histogram);
        assert_eq!(defaults.ttl, Duration::from_secs(90));
        assert_eq!(defaults.buckets, vec![0.1, 0.5, 1.0]);
        assert_eq!(defaults.match_kind, MatchKind::Regex);
    }

    #[test]
    fn glob_rule_with_labels() {
        let (_, rules) = parse_mapping_yaml(
            r#"
mappings:
  - match: "client.*.request"
    name: "client_request"
    labels:
      client: "$1"
"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        let (name, labels) = rules[0].expand(&["mobile"]);
        assert_eq!(name, "client_request");
        assert_eq!(labels.get("client").map(String::as_str), Some("mobile"));
    }

    #[test]
    fn rule_overrides() {
        let (_, rules) = parse_mapping_yaml(
            r#"
mappings:
  - match: "request.*"
    match_metric_type: timer
    name: "request_seconds"
    timer_type: histogram
    buckets: [0.05, 0.1, 1]
    ttl: 2m
"#,
        )
        .unwrap();
        let rule = &rules[0];
        assert_eq!(rule.timer_kind, Some(TimerKind::Histogram));
        assert_eq!(rule.ttl, Some(Duration::from_secs(120)));
        assert_eq!(rule.buckets.as_deref(), Some(&[0.05, 0.1, 1.0][..]));
        assert!(rule.type_filter.matches(crate::types::EventKind::Timer));
        assert!(!rule.type_filter.matches(crate::types::EventKind::Counter));
    }

    #[test]
    fn drop_rule_needs_no_name() {
        let (_, rules) = parse_mapping_yaml(
            r#"
mappings:
  - match: "noisy.*"
    action: drop
"#,
        )
        .unwrap();
        assert_eq!(rules[0].action, RuleAction::Drop);
    }

    #[test]
    fn map_rule_requires_a_name() {
        assert!(
            parse_mapping_yaml(
                r#"
mappings:
  - match: "a.*"
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn template_reference_out_of_range() {
        assert!(
            parse_mapping_yaml(
                r#"
mappings:
  - match: "a.*"
    name: "uses_$2"
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn unsorted_buckets_rejected() {
        assert!(
            parse_mapping_yaml(
                r#"
defaults:
  buckets: [1, 0.5]
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn regex_rule() {
        let (_, rules) = parse_mapping_yaml(
            r#"
mappings:
  - match: "^api\\.(\\w+)\\.latency$"
    match_type: regex
    name: "api_latency"
    labels:
      endpoint: "$1"
"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        match &rules[0].pattern {
            MatchPattern::Regex(re) => assert!(re.is_match("api.users.latency")),
            _ => panic!("expected a regex pattern"),
        }
    }
}
