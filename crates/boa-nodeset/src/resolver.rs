use std::collections::HashSet;

use boa_domain::{BootSet, NodeId};
use tracing::info;

use crate::error::NodeSetError;
use crate::inventory::Inventory;

enum Term<'a> {
    Union(&'a str),
    Intersect(&'a str),
    Difference(&'a str),
}

fn parse_limit(expr: &str) -> Vec<Term<'_>> {
    expr.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            if let Some(rest) = t.strip_prefix('&') {
                Term::Intersect(rest)
            } else if let Some(rest) = t.strip_prefix('!') {
                Term::Difference(rest)
            } else {
                Term::Union(t)
            }
        })
        .collect()
}

/// The outcome of splitting a resolved node set by hardware state.
pub struct EnabledSplit {
    pub enabled: HashSet<NodeId>,
    pub disabled: HashSet<NodeId>,
}

/// Resolves Boot Sets and limit expressions against the hardware state
/// inventory into concrete, enabled node sets.
pub struct NodeSetResolver<'a> {
    inventory: &'a Inventory,
}

impl<'a> NodeSetResolver<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        NodeSetResolver { inventory }
    }

    /// `node_list ∪ groups(node_groups) ∪ roles(node_roles_groups)`.
    pub async fn resolve_boot_set(&self, boot_set: &BootSet, partition: Option<&str>) -> Result<HashSet<NodeId>, NodeSetError> {
        let mut out: HashSet<NodeId> = boot_set
            .node_list
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|s| NodeId::new(s.clone()))
            .collect();

        if let Some(groups) = &boot_set.node_groups {
            out.extend(self.inventory.resolve_groups(groups).await?);
        }
        if let Some(roles) = &boot_set.node_roles_groups {
            out.extend(self.inventory.resolve_roles(roles, partition).await?);
        }
        Ok(out)
    }

    /// Resolve a single limit token against the hardware state inventory:
    /// `all`/`*` stand for the base set being limited, a name known to the
    /// inventory expands to its members, anything else is a literal node id.
    async fn resolve_token(&self, token: &str, base: &HashSet<NodeId>, partition: Option<&str>) -> Result<HashSet<NodeId>, NodeSetError> {
        if token == "all" || token == "*" {
            return Ok(base.clone());
        }
        if let Some(set) = self.inventory.lookup_named(token, partition).await? {
            return Ok(set);
        }
        Ok(std::iter::once(NodeId::new(token)).collect())
    }

    /// Apply a Session's limit expression to the Boot Set's resolved
    /// candidate set.
    ///
    /// `final := (union over unprefixed tokens) ∩ (intersection of &-tokens,
    /// if any) − (union of !-tokens)`. An empty limit expression is the
    /// identity — it returns `base` unchanged.
    pub async fn apply_limit(&self, base: &HashSet<NodeId>, limit: Option<&str>, partition: Option<&str>) -> Result<HashSet<NodeId>, NodeSetError> {
        let Some(limit) = limit.map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(base.clone());
        };

        let terms = parse_limit(limit);

        let mut union_set: HashSet<NodeId> = HashSet::new();
        let mut intersect_set: Option<HashSet<NodeId>> = None;
        let mut diff_set: HashSet<NodeId> = HashSet::new();
        let mut saw_union = false;

        for term in &terms {
            match term {
                Term::Union(tok) => {
                    saw_union = true;
                    union_set.extend(self.resolve_token(tok, base, partition).await?);
                }
                Term::Intersect(tok) => {
                    let resolved = self.resolve_token(tok, base, partition).await?;
                    intersect_set = Some(match intersect_set {
                        Some(acc) => acc.intersection(&resolved).cloned().collect(),
                        None => resolved,
                    });
                }
                Term::Difference(tok) => {
                    diff_set.extend(self.resolve_token(tok, base, partition).await?);
                }
            }
        }

        // A limit made only of &/! terms still needs a starting point; treat
        // it as if `all` had been unioned in first.
        let mut result = if saw_union { union_set } else { base.clone() };
        if let Some(intersect) = intersect_set {
            result = result.intersection(&intersect).cloned().collect();
        }
        result = result.difference(&diff_set).cloned().collect();
        Ok(result)
    }

    /// Split a resolved node set by hardware-reported enabled state. Nodes
    /// the hardware state service has no record of are treated as disabled.
    pub async fn split_enabled(&self, nodes: &HashSet<NodeId>) -> Result<EnabledSplit, NodeSetError> {
        if nodes.is_empty() {
            return Ok(EnabledSplit {
                enabled: HashSet::new(),
                disabled: HashSet::new(),
            });
        }
        let states = self.inventory.node_states(nodes).await?;
        let mut enabled = HashSet::new();
        let mut disabled = HashSet::new();
        for node in nodes {
            match states.get(node) {
                Some(state) if state.enabled => {
                    enabled.insert(node.clone());
                }
                _ => {
                    disabled.insert(node.clone());
                }
            }
        }
        Ok(EnabledSplit { enabled, disabled })
    }

    /// Full pipeline: resolve, limit, and split a Boot Set into its
    /// enabled node set. Returns `EmptyResolution` when nothing survives —
    /// callers decide whether that's fatal for the whole Session or just this
    /// Boot Set.
    pub async fn resolve(&self, boot_set: &BootSet, limit: Option<&str>, partition: Option<&str>) -> Result<EnabledSplit, NodeSetError> {
        let base = self.resolve_boot_set(boot_set, partition).await?;
        let limited = self.apply_limit(&base, limit, partition).await?;
        if limited.is_empty() {
            info!("boot set resolved to an empty node set");
        }
        self.split_enabled(&limited).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HardwareStateClient, NodeState};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FakeClient {
        groups: HashMap<String, HashSet<NodeId>>,
        states: HashMap<NodeId, NodeState>,
    }

    #[async_trait]
    impl HardwareStateClient for FakeClient {
        async fn groups(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
            Ok(self.groups.clone())
        }
        async fn partitions(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
            Ok(HashMap::new())
        }
        async fn roles(&self, _partition: Option<&str>) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
            Ok(HashMap::new())
        }
        async fn node_states(&self, nodes: &HashSet<NodeId>) -> Result<HashMap<NodeId, NodeState>, NodeSetError> {
            Ok(nodes
                .iter()
                .filter_map(|n| self.states.get(n).map(|s| (n.clone(), s.clone())))
                .collect())
        }
    }

    fn node(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn set(names: &[&str]) -> HashSet<NodeId> {
        names.iter().map(|n| node(n)).collect()
    }

    fn fixture() -> Inventory {
        let mut groups = HashMap::new();
        groups.insert("computes".to_string(), set(&["n1", "n2", "n3"]));
        groups.insert("storage".to_string(), set(&["n4", "n5"]));
        let mut states = HashMap::new();
        for n in ["n1", "n2", "n3", "n4", "n5"] {
            states.insert(node(n), NodeState { state: "on".into(), enabled: true });
        }
        Inventory::new(Arc::new(FakeClient { groups, states }))
    }

    #[tokio::test]
    async fn limit_grammar_union_intersect_difference() {
        let inv = fixture();
        let resolver = NodeSetResolver::new(&inv);
        let base = set(&["n1", "n2", "n3"]);
        let result = resolver.apply_limit(&base, Some("computes,!n2,&computes"), None).await.unwrap();
        assert_eq!(result, set(&["n1", "n3"]));
    }

    #[tokio::test]
    async fn limit_all_is_identity() {
        let inv = fixture();
        let resolver = NodeSetResolver::new(&inv);
        let base = set(&["n1", "n2"]);
        let result = resolver.apply_limit(&base, Some("all"), None).await.unwrap();
        assert_eq!(result, base);
    }

    #[tokio::test]
    async fn no_limit_is_identity() {
        let inv = fixture();
        let resolver = NodeSetResolver::new(&inv);
        let base = set(&["n1"]);
        let result = resolver.apply_limit(&base, None, None).await.unwrap();
        assert_eq!(result, base);
    }

    #[tokio::test]
    async fn unknown_token_is_literal_node() {
        let inv = fixture();
        let resolver = NodeSetResolver::new(&inv);
        let base = HashSet::new();
        let result = resolver.apply_limit(&base, Some("n9"), None).await.unwrap();
        assert_eq!(result, set(&["n9"]));
    }

    #[tokio::test]
    async fn full_pipeline_resolves_boot_set_and_splits_enabled() {
        let inv = fixture();
        let resolver = NodeSetResolver::new(&inv);
        let boot_set = BootSet {
            node_groups: Some(vec!["computes".to_string()]),
            ..Default::default()
        };
        let split = resolver.resolve(&boot_set, Some("!n2"), None).await.unwrap();
        assert_eq!(split.enabled, set(&["n1", "n3"]));
        assert!(split.disabled.is_empty());
    }
}
