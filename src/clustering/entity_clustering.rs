// src/clustering/entity_clustering.rs - Transitive closure over positive judgements
use log::{debug, info};
use petgraph::unionfind::UnionFind;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::canonical::canonical_id;
use crate::ledger::JudgementLedger;

/// Uids that are connected through positive judgements. Members are sorted
/// and distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Cluster {
    members: Vec<String>,
}

impl Cluster {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        Self {
            members: members.into_iter().collect(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.members
            .binary_search_by(|m| m.as_str().cmp(uid))
            .is_ok()
    }

    pub fn canonical_id(&self) -> String {
        canonical_id(&self.members)
    }
}

/// Clusters of every uid that appears in at least one positive judgement,
/// sorted by first member.
pub fn compute_clusters(ledger: &JudgementLedger) -> Vec<Cluster> {
    let uids: BTreeSet<&str> = ledger
        .positive_pairs()
        .flat_map(|k| [k.left(), k.right()])
        .collect();
    let index: BTreeMap<&str, usize> = uids.iter().enumerate().map(|(i, u)| (*u, i)).collect();
    let nodes: Vec<&str> = uids.into_iter().collect();

    let mut union_find: UnionFind<usize> = UnionFind::new(nodes.len());
    let mut edges = 0usize;
    for key in ledger.positive_pairs() {
        if let (Some(&a), Some(&b)) = (index.get(key.left()), index.get(key.right())) {
            union_find.union(a, b);
            edges += 1;
        }
    }

    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (node, root) in union_find.into_labeling().into_iter().enumerate() {
        groups.entry(root).or_default().push(nodes[node].to_string());
    }
    let mut clusters: Vec<Cluster> = groups.into_values().map(Cluster::new).collect();
    clusters.sort();

    info!(
        "Built {} clusters from {} positive judgements over {} entities",
        clusters.len(),
        edges,
        nodes.len()
    );
    clusters
}

/// As `compute_clusters`, plus a singleton for every uid in `all_uids` that
/// is in no cluster.
pub fn compute_clusters_with_singletons<'a, I>(ledger: &JudgementLedger, all_uids: I) -> Vec<Cluster>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut clusters = compute_clusters(ledger);
    let clustered: BTreeSet<String> = clusters
        .iter()
        .flat_map(|c| c.members().iter().cloned())
        .collect();
    let singletons: BTreeSet<&str> = all_uids
        .into_iter()
        .filter(|u| !clustered.contains(*u))
        .collect();
    debug!("Adding {} singleton clusters", singletons.len());
    clusters.extend(singletons.into_iter().map(|u| Cluster::new([u])));
    clusters.sort();
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Judgement;

    fn ledger(pairs: &[(&str, &str, Judgement)]) -> JudgementLedger {
        let mut ledger = JudgementLedger::new();
        for (a, b, j) in pairs {
            ledger.emit(a, b, *j, None).unwrap();
        }
        ledger
    }

    #[test]
    fn test_transitive_closure() {
        let ledger = ledger(&[
            ("c", "b", Judgement::Positive),
            ("a", "b", Judgement::Positive),
            ("x", "y", Judgement::Positive),
        ]);
        let clusters = compute_clusters(&ledger);
        assert_eq!(clusters, vec![Cluster::new(["a", "b", "c"]), Cluster::new(["x", "y"])]);
    }

    #[test]
    fn test_negative_and_undecided_do_not_join() {
        let ledger = ledger(&[
            ("a", "b", Judgement::Positive),
            ("b", "c", Judgement::Negative),
            ("c", "d", Judgement::Undecided),
        ]);
        let clusters = compute_clusters(&ledger);
        assert_eq!(clusters, vec![Cluster::new(["a", "b"])]);
        assert!(!clusters[0].contains("c"));
    }

    #[test]
    fn test_empty_ledger_has_no_clusters() {
        assert!(compute_clusters(&JudgementLedger::new()).is_empty());
    }

    #[test]
    fn test_singletons_are_added_and_sorted() {
        let ledger = ledger(&[("b", "c", Judgement::Positive)]);
        let clusters = compute_clusters_with_singletons(&ledger, ["d", "a", "b", "c"]);
        assert_eq!(
            clusters,
            vec![Cluster::new(["a"]), Cluster::new(["b", "c"]), Cluster::new(["d"])]
        );
    }

    #[test]
    fn test_cluster_members_are_sorted_and_distinct() {
        let cluster = Cluster::new(["b", "a", "b"]);
        assert_eq!(cluster.members(), &["a".to_string(), "b".to_string()]);
        assert_eq!(cluster.len(), 2);
    }
}
