/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::fmt::Write;

use ahash::AHashMap;

use super::rule::GlobSegment;

/// Compiled state machine over the glob rules.
///
/// States correspond to shared pattern prefixes. Each state transitions on
/// literal segments first; the `*` transition is taken only when no
/// literal transition applies. Terminal states carry the indices of the
/// rules whose pattern ends there, in declaration order.
#[derive(Debug)]
pub(crate) struct GlobFsm {
    states: Vec<FsmState>,
}

#[derive(Debug, Default)]
struct FsmState {
    literals: AHashMap<String, usize>,
    wildcard: Option<usize>,
    terminals: Vec<usize>,
}

impl GlobFsm {
    pub(crate) fn new() -> Self {
        GlobFsm {
            states: vec![FsmState::default()],
        }
    }

    fn alloc_state(&mut self) -> usize {
        self.states.push(FsmState::default());
        self.states.len() - 1
    }

    pub(crate) fn add_rule(&mut self, segments: &[GlobSegment], rule_index: usize) {
        let mut cur = 0usize;
        for segment in segments {
            cur = match segment {
                GlobSegment::Literal(s) => {
                    if let Some(next) = self.states[cur].literals.get(s).copied() {
                        next
                    } else {
                        let next = self.alloc_state();
                        self.states[cur].literals.insert(s.clone(), next);
                        next
                    }
                }
                GlobSegment::Wildcard => {
                    if let Some(next) = self.states[cur].wildcard {
                        next
                    } else {
                        let next = self.alloc_state();
                        self.states[cur].wildcard = Some(next);
                        next
                    }
                }
            };
        }
        self.states[cur].terminals.push(rule_index);
    }

    /// Walk the machine over the dot-split name. Returns the terminal
    /// rule indices and the segments bound by wildcard transitions.
    pub(crate) fn lookup<'a>(&self, name: &'a str) -> Option<(&[usize], Vec<&'a str>)> {
        let mut cur = 0usize;
        let mut captures = Vec::new();

        for segment in name.split('.') {
            let state = &self.states[cur];
            if let Some(next) = state.literals.get(segment) {
                cur = *next;
            } else if let Some(next) = state.wildcard {
                captures.push(segment);
                cur = next;
            } else {
                return None;
            }
        }

        let terminals = self.states[cur].terminals.as_slice();
        if terminals.is_empty() {
            None
        } else {
            Some((terminals, captures))
        }
    }

    #[cfg(test)]
    pub(crate) fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Emit the machine as a Graphviz directed graph.
    pub(crate) fn dump_graphviz(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph mapping_fsm {\n");
        out.push_str("  rankdir=LR;\n");
        out.push_str("  node [shape=circle];\n");

        for (id, state) in self.states.iter().enumerate() {
            if state.terminals.is_empty() {
                let _ = writeln!(out, "  s{id} [label=\"{id}\"];");
            } else {
                let rules: Vec<String> =
                    state.terminals.iter().map(|r| r.to_string()).collect();
                let _ = writeln!(
                    out,
                    "  s{id} [shape=doublecircle, label=\"{id}: rule {}\"];",
                    rules.join(",")
                );
            }
        }
        for (id, state) in self.states.iter().enumerate() {
            let mut edges: Vec<(&str, usize)> = state
                .literals
                .iter()
                .map(|(seg, next)| (seg.as_str(), *next))
                .collect();
            edges.sort_by_key(|(_, next)| *next);
            for (seg, next) in edges {
                let _ = writeln!(out, "  s{id} -> s{next} [label=\"{seg}\"];");
            }
            if let Some(next) = state.wildcard {
                let _ = writeln!(out, "  s{id} -> s{next} [label=\"*\"];");
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::rule::parse_glob_pattern;

    fn build(patterns: &[&str]) -> GlobFsm {
        let mut fsm = GlobFsm::new();
        for (i, p) in patterns.iter().enumerate() {
            fsm.add_rule(&parse_glob_pattern(p).unwrap(), i);
        }
        fsm
    }

    #[test]
    fn literal_match() {
        let fsm = build(&["foo.bar"]);
        let (rules, captures) = fsm.lookup("foo.bar").unwrap();
        assert_eq!(rules, &[0]);
        assert!(captures.is_empty());
        assert!(fsm.lookup("foo").is_none());
        assert!(fsm.lookup("foo.bar.baz").is_none());
    }

    #[test]
    fn wildcard_captures() {
        let fsm = build(&["client.*.request.*"]);
        let (rules, captures) = fsm.lookup("client.mobile.request.total").unwrap();
        assert_eq!(rules, &[0]);
        assert_eq!(captures, vec!["mobile", "total"]);
    }

    #[test]
    fn literal_transition_wins_over_wildcard() {
        let fsm = build(&["api.*", "api.special"]);
        let (rules, captures) = fsm.lookup("api.special").unwrap();
        assert_eq!(rules, &[1]);
        assert!(captures.is_empty());

        let (rules, captures) = fsm.lookup("api.other").unwrap();
        assert_eq!(rules, &[0]);
        assert_eq!(captures, vec!["other"]);
    }

    #[test]
    fn shared_prefixes_share_states() {
        let fsm = build(&["a.b.c", "a.b.d"]);
        // root + a + b + c + d
        assert_eq!(fsm.state_count(), 5);
    }

    #[test]
    fn identical_patterns_keep_declaration_order() {
        let fsm = build(&["svc.*", "svc.*"]);
        let (rules, _) = fsm.lookup("svc.x").unwrap();
        assert_eq!(rules, &[0, 1]);
    }

    #[test]
    fn graphviz_dump() {
        let fsm = build(&["client.*"]);
        let dot = fsm.dump_graphviz();
        assert!(dot.starts_with("digraph mapping_fsm {"));
        assert!(dot.contains("[label=\"client\"]"));
        assert!(dot.contains("[label=\"*\"]"));
        assert!(dot.contains("doublecircle"));
        assert!(dot.ends_with("}\n"));
    }
}
