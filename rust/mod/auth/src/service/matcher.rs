use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::model::{PTYPE_GROUP, PTYPE_POLICY, PolicyRule};

/// Subject-inheritance chains longer than this are cut off. Keeps a
/// cyclic or runaway "g" graph from stalling a request.
const MAX_GROUP_DEPTH: usize = 10;

#[derive(Debug, Clone)]
struct PolicyTuple {
    sub: String,
    obj: String,
    act: String,
}

/// In-memory permission index, rebuilt from the policy_rules table on
/// every rule change. Reads work on an immutable snapshot.
#[derive(Debug, Default)]
pub struct Matcher {
    policies: Vec<PolicyTuple>,
    groups: HashMap<String, Vec<String>>,
}

impl Matcher {
    pub fn from_rules(rules: &[PolicyRule]) -> Self {
        let mut policies = Vec::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();

        for rule in rules {
            match rule.ptype.as_str() {
                PTYPE_POLICY => policies.push(PolicyTuple {
                    sub: rule.v0.clone(),
                    obj: rule.v1.clone(),
                    act: rule.v2.clone(),
                }),
                PTYPE_GROUP => groups
                    .entry(rule.v0.clone())
                    .or_default()
                    .push(rule.v1.clone()),
                other => warn!("skipping policy rule {} with unknown ptype {:?}", rule.id, other),
            }
        }

        Self { policies, groups }
    }

    /// Decide whether `sub` (or any subject it inherits from) holds a
    /// rule matching `obj` and `act`. No rule means deny.
    pub fn enforce(&self, sub: &str, obj: &str, act: &str) -> bool {
        let subjects = self.expand_subjects(sub);
        self.policies.iter().any(|p| {
            subjects.contains(&p.sub)
                && (key_match(obj, &p.obj) || key_match3(obj, &p.obj))
                && (p.act == act || p.act == "*")
        })
    }

    /// The subject itself plus everything reachable over "g" edges,
    /// breadth-first, capped at MAX_GROUP_DEPTH hops.
    fn expand_subjects(&self, sub: &str) -> HashSet<String> {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(sub.to_string());
        let mut frontier = vec![sub.to_string()];

        for _ in 0..MAX_GROUP_DEPTH {
            let mut next = Vec::new();
            for s in &frontier {
                if let Some(parents) = self.groups.get(s) {
                    for parent in parents {
                        if seen.insert(parent.clone()) {
                            next.push(parent.clone());
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        seen
    }
}

/// Prefix wildcard match: `*` in the pattern matches the rest of the
/// key. Without `*` the match is exact. `/foo/*` matches `/foo/bar`
/// and `/foo/bar/baz` but not `/foo`.
pub(crate) fn key_match(key1: &str, key2: &str) -> bool {
    match key2.find('*') {
        None => key1 == key2,
        Some(i) => {
            if key1.len() > i {
                key1.as_bytes()[..i] == key2.as_bytes()[..i]
            } else {
                key1.as_bytes() == &key2.as_bytes()[..i]
            }
        }
    }
}

/// Segment-wise match: `{name}` matches exactly one non-empty segment,
/// a trailing `*` matches one or more remaining segments. `/foo/{id}`
/// matches `/foo/42` but not `/foo` or `/foo/42/x`.
pub(crate) fn key_match3(key1: &str, key2: &str) -> bool {
    let req: Vec<&str> = key1.split('/').collect();
    let pat: Vec<&str> = key2.split('/').collect();

    for (i, p) in pat.iter().enumerate() {
        if *p == "*" && i + 1 == pat.len() {
            return req.len() >= pat.len();
        }
        let Some(r) = req.get(i) else {
            return false;
        };
        if p.starts_with('{') && p.ends_with('}') {
            if r.is_empty() {
                return false;
            }
        } else if p != r {
            return false;
        }
    }

    req.len() == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boilerplate_core::now_rfc3339;

    fn p(sub: &str, obj: &str, act: &str) -> PolicyRule {
        PolicyRule {
            id: PolicyRule::rule_id("p", sub, obj, act),
            ptype: "p".to_string(),
            v0: sub.to_string(),
            v1: obj.to_string(),
            v2: act.to_string(),
            created_at: now_rfc3339(),
        }
    }

    fn g(child: &str, parent: &str) -> PolicyRule {
        PolicyRule {
            id: PolicyRule::rule_id("g", child, parent, ""),
            ptype: "g".to_string(),
            v0: child.to_string(),
            v1: parent.to_string(),
            v2: String::new(),
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn test_exact_match() {
        let m = Matcher::from_rules(&[p("r1", "/api/v1/ping", "GET")]);
        assert!(m.enforce("r1", "/api/v1/ping", "GET"));
        assert!(!m.enforce("r1", "/api/v1/ping", "POST"));
        assert!(!m.enforce("r1", "/api/v1/pong", "GET"));
        assert!(!m.enforce("r2", "/api/v1/ping", "GET"));
    }

    #[test]
    fn test_prefix_wildcard() {
        let m = Matcher::from_rules(&[p("r1", "/api/v1/users/*", "GET")]);
        assert!(m.enforce("r1", "/api/v1/users/42", "GET"));
        assert!(m.enforce("r1", "/api/v1/users/42/roles", "GET"));
        // The bare prefix itself is not covered.
        assert!(!m.enforce("r1", "/api/v1/users", "GET"));
        assert!(!m.enforce("r1", "/api/v1/users/42", "DELETE"));
    }

    #[test]
    fn test_template_segment() {
        let m = Matcher::from_rules(&[p("r1", "/files/{id}", "GET")]);
        assert!(m.enforce("r1", "/files/abc", "GET"));
        assert!(!m.enforce("r1", "/files", "GET"));
        assert!(!m.enforce("r1", "/files/", "GET"));
        assert!(!m.enforce("r1", "/files/abc/history", "GET"));
    }

    #[test]
    fn test_template_with_trailing_star() {
        let m = Matcher::from_rules(&[p("r1", "/files/{id}/versions/*", "GET")]);
        assert!(m.enforce("r1", "/files/abc/versions/3", "GET"));
        assert!(m.enforce("r1", "/files/abc/versions/3/diff", "GET"));
        assert!(!m.enforce("r1", "/files/abc/versions", "GET"));
    }

    #[test]
    fn test_any_method() {
        let m = Matcher::from_rules(&[p("r1", "/admin/*", "*")]);
        assert!(m.enforce("r1", "/admin/jobs", "GET"));
        assert!(m.enforce("r1", "/admin/jobs", "DELETE"));
    }

    #[test]
    fn test_group_inheritance() {
        let m = Matcher::from_rules(&[
            g("u1", "editors"),
            g("editors", "readers"),
            p("readers", "/docs/*", "GET"),
            p("editors", "/docs/*", "PUT"),
        ]);
        assert!(m.enforce("u1", "/docs/a", "GET"));
        assert!(m.enforce("u1", "/docs/a", "PUT"));
        assert!(!m.enforce("u1", "/docs/a", "DELETE"));
        // readers do not inherit from editors
        assert!(!m.enforce("readers", "/docs/a", "PUT"));
    }

    #[test]
    fn test_group_cycle_terminates() {
        let m = Matcher::from_rules(&[
            g("a", "b"),
            g("b", "a"),
            p("b", "/x", "GET"),
        ]);
        assert!(m.enforce("a", "/x", "GET"));
        assert!(!m.enforce("a", "/y", "GET"));
    }

    #[test]
    fn test_group_depth_cap() {
        let mut rules = Vec::new();
        for i in 0..11 {
            rules.push(g(&format!("s{}", i), &format!("s{}", i + 1)));
        }
        rules.push(p("s10", "/deep", "GET"));
        rules.push(p("s11", "/deeper", "GET"));

        let m = Matcher::from_rules(&rules);
        // 10 hops away is reachable, 11 is not.
        assert!(m.enforce("s0", "/deep", "GET"));
        assert!(!m.enforce("s0", "/deeper", "GET"));
    }

    #[test]
    fn test_empty_matcher_denies() {
        let m = Matcher::default();
        assert!(!m.enforce("anyone", "/anything", "GET"));
    }

    #[test]
    fn test_key_match_edge_cases() {
        assert!(key_match("/a/b", "/a/b"));
        assert!(!key_match("/a/b", "/a"));
        assert!(key_match("/a/b/c", "/a/*"));
        assert!(key_match("/a/", "/a/*"));
        assert!(!key_match("/a", "/a/*"));
        assert!(key_match("/anything", "*"));
    }

    #[test]
    fn test_key_match3_edge_cases() {
        assert!(key_match3("/a/b", "/a/b"));
        assert!(key_match3("/a/42/c", "/a/{id}/c"));
        assert!(!key_match3("/a//c", "/a/{id}/c"));
        assert!(!key_match3("/a/42", "/a/{id}/c"));
        assert!(key_match3("/a/1/2", "/a/*"));
        assert!(!key_match3("/a", "/a/*"));
    }
}
