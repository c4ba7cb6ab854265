/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::time::Duration;

use anyhow::anyhow;

use crate::types::{EventKind, TagMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchKind {
    Glob,
    Regex,
}

impl MatchKind {
    pub(crate) fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "glob" => Ok(MatchKind::Glob),
            "regex" => Ok(MatchKind::Regex),
            _ => Err(anyhow!("invalid match type {s}")),
        }
    }
}

/// Which measurement kinds a rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum TypeFilter {
    #[default]
    Any,
    Counter,
    Gauge,
    Timer,
}

impl TypeFilter {
    pub(crate) fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "" => Ok(TypeFilter::Any),
            "counter" => Ok(TypeFilter::Counter),
            "gauge" => Ok(TypeFilter::Gauge),
            "timer" => Ok(TypeFilter::Timer),
            _ => Err(anyhow!("invalid metric type filter {s}")),
        }
    }

    pub(crate) fn matches(&self, kind: EventKind) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Counter => kind == EventKind::Counter,
            TypeFilter::Gauge => kind == EventKind::Gauge,
            TypeFilter::Timer => kind == EventKind::Timer,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum RuleAction {
    #[default]
    Map,
    Drop,
}

impl RuleAction {
    pub(crate) fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "map" => Ok(RuleAction::Map),
            "drop" => Ok(RuleAction::Drop),
            _ => Err(anyhow!("invalid action {s}")),
        }
    }
}

/// Which family type timer observations of a rule land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Summary,
    Histogram,
}

impl TimerKind {
    pub(crate) fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "summary" => Ok(TimerKind::Summary),
            "histogram" => Ok(TimerKind::Histogram),
            _ => Err(anyhow!("invalid timer type {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct QuantileObjective {
    pub(crate) quantile: f64,
    pub(crate) error: f64,
}

/// One segment of a dot-delimited glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GlobSegment {
    Literal(String),
    Wildcard,
}

pub(crate) fn parse_glob_pattern(pattern: &str) -> anyhow::Result<Vec<GlobSegment>> {
    let mut segments = Vec::new();
    for part in pattern.split('.') {
        if part == "*" {
            segments.push(GlobSegment::Wildcard);
        } else if part.is_empty() {
            return Err(anyhow!("glob pattern {pattern} has an empty segment"));
        } else if part.contains('*') {
            return Err(anyhow!(
                "glob pattern {pattern}: * must stand alone in a segment"
            ));
        } else {
            segments.push(GlobSegment::Literal(part.to_string()));
        }
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq)]
enum TemplatePart {
    Literal(String),
    Capture(usize),
}

/// A name or label-value template with `$1` / `${1}` capture references.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Template {
    parts: Vec<TemplatePart>,
    max_capture: usize,
}

impl Template {
    pub(crate) fn parse(s: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut max_capture = 0usize;

        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            let braced = chars.peek() == Some(&'{');
            if braced {
                chars.next();
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(*d);
                    chars.next();
                } else {
                    break;
                }
            }
            if braced && chars.peek() == Some(&'}') {
                chars.next();
            }

            match digits.parse::<usize>() {
                Ok(n) if n > 0 => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    max_capture = max_capture.max(n);
                    parts.push(TemplatePart::Capture(n));
                }
                _ => {
                    // not a capture reference, keep the text as written
                    literal.push('$');
                    if braced {
                        literal.push('{');
                    }
                    literal.push_str(&digits);
                }
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Template { parts, max_capture }
    }

    pub(crate) fn max_capture(&self) -> usize {
        self.max_capture
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Substitute captures into the template. `captures[0]` is `$1`.
    pub(crate) fn expand(&self, captures: &[&str]) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => out.push_str(s),
                TemplatePart::Capture(n) => {
                    if let Some(v) = captures.get(*n - 1) {
                        out.push_str(v);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug)]
pub(crate) enum MatchPattern {
    Glob(Vec<GlobSegment>),
    Regex(regex::Regex),
}

/// One operator-declared mapping rule, in compiled form.
#[derive(Debug)]
pub(crate) struct MappingRule {
    pub(crate) index: usize,
    pub(crate) pattern: MatchPattern,
    pub(crate) type_filter: TypeFilter,
    pub(crate) name: Template,
    pub(crate) labels: Vec<(String, Template)>,
    pub(crate) action: RuleAction,
    pub(crate) help: Option<String>,
    pub(crate) ttl: Option<Duration>,
    pub(crate) timer_kind: Option<TimerKind>,
    pub(crate) quantiles: Option<Vec<QuantileObjective>>,
    pub(crate) buckets: Option<Vec<f64>>,
}

impl MappingRule {
    fn capture_count(&self) -> usize {
        match &self.pattern {
            MatchPattern::Glob(segments) => segments
                .iter()
                .filter(|s| matches!(s, GlobSegment::Wildcard))
                .count(),
            // group 0 is the whole match
            MatchPattern::Regex(re) => re.captures_len() - 1,
        }
    }

    /// Reject templates referencing captures the pattern cannot bind.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.action == RuleAction::Map && self.name.is_empty() {
            return Err(anyhow!("mapping rule {} has no name", self.index));
        }

        let captures = self.capture_count();
        if self.name.max_capture() > captures {
            return Err(anyhow!(
                "mapping rule {}: name references capture ${} but the pattern binds {captures}",
                self.index,
                self.name.max_capture()
            ));
        }
        for (label, template) in &self.labels {
            if template.max_capture() > captures {
                return Err(anyhow!(
                    "mapping rule {}: label {label} references capture ${} but the pattern binds {captures}",
                    self.index,
                    template.max_capture()
                ));
            }
        }
        Ok(())
    }

    /// Instantiate the rewritten name and static labels from captures.
    pub(crate) fn expand(&self, captures: &[&str]) -> (String, TagMap) {
        let name = self.name.expand(captures);
        let mut labels = TagMap::new();
        for (label, template) in &self.labels {
            labels.insert(label.clone(), template.expand(captures));
        }
        (name, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_patterns() {
        let segments = parse_glob_pattern("client.*.request").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], GlobSegment::Wildcard);

        assert!(parse_glob_pattern("a..b").is_err());
        assert!(parse_glob_pattern("a.b*.c").is_err());
    }

    #[test]
    fn template_expansion() {
        let t = Template::parse("client_${1}_request");
        assert_eq!(t.max_capture(), 1);
        assert_eq!(t.expand(&["mobile"]), "client_mobile_request");

        let t = Template::parse("$2.$1");
        assert_eq!(t.expand(&["a", "b"]), "b.a");
    }

    #[test]
    fn template_without_captures() {
        let t = Template::parse("plain_name");
        assert_eq!(t.max_capture(), 0);
        assert_eq!(t.expand(&[]), "plain_name");
    }

    #[test]
    fn dollar_without_digits_is_literal() {
        let t = Template::parse("cost_$total");
        assert_eq!(t.expand(&[]), "cost_$total");
    }

    #[test]
    fn type_filter() {
        assert!(TypeFilter::Any.matches(crate::types::EventKind::Gauge));
        assert!(TypeFilter::Timer.matches(crate::types::EventKind::Timer));
        assert!(!TypeFilter::Counter.matches(crate::types::EventKind::Timer));
    }
}
