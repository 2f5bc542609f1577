// src/merge/mod.rs - Collapse entities and links onto their canonical identities
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

use crate::canonical::CanonicalMap;
use crate::models::{Entity, Link, MergedEntity, MergedLink};

/// Longest non-empty name; ties go to the lexically smallest.
fn pick_name<'a, I>(names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .min_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        })
        .map(|n| n.to_string())
}

/// Per key, the most frequent non-empty value; ties go to the lexically smallest.
fn reconcile_attributes<'a, I>(maps: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a BTreeMap<String, String>>,
{
    let mut counts: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for map in maps {
        for (key, value) in map {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            *counts.entry(key).or_default().entry(value).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .filter_map(|(key, values)| {
            if values.len() > 1 {
                debug!("Attribute '{}' has {} competing values", key, values.len());
            }
            // BTreeMap order makes the first maximum the smallest value.
            let mut best: Option<(&str, usize)> = None;
            for (value, count) in values {
                if best.map(|(_, c)| count > c).unwrap_or(true) {
                    best = Some((value, count));
                }
            }
            best.map(|(value, _)| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// One merged record per canonical id, singletons included, sorted by canonical id.
pub fn merge_entities(entities: &[Entity], canonical_map: &CanonicalMap) -> Vec<MergedEntity> {
    let mut groups: BTreeMap<&str, Vec<&Entity>> = BTreeMap::new();
    for entity in entities {
        groups
            .entry(canonical_map.resolve(&entity.uid))
            .or_default()
            .push(entity);
    }

    let merged: Vec<MergedEntity> = groups
        .into_iter()
        .map(|(canonical, members)| {
            let member_uids: BTreeSet<&str> = members.iter().map(|e| e.uid.as_str()).collect();
            MergedEntity {
                canonical_uid: canonical.to_string(),
                name: pick_name(members.iter().filter_map(|e| e.name.as_deref())),
                origins: members.iter().map(|e| e.origin.clone()).collect(),
                member_uids: member_uids.into_iter().map(|u| u.to_string()).collect(),
                attributes: reconcile_attributes(members.iter().map(|e| &e.attributes)),
            }
        })
        .collect();

    info!(
        "Merged {} entities into {} canonical entities",
        entities.len(),
        merged.len()
    );
    merged
}

/// Links rewritten onto canonical endpoints, collapsed per (source, target,
/// type). Links that become self-links are dropped.
pub fn merge_links(links: &[Link], canonical_map: &CanonicalMap) -> Vec<MergedLink> {
    let mut groups: BTreeMap<(&str, &str, &str), Vec<&Link>> = BTreeMap::new();
    let mut self_links = 0usize;
    for link in links {
        let source = canonical_map.resolve(&link.source);
        let target = canonical_map.resolve(&link.target);
        if source == target {
            self_links += 1;
            continue;
        }
        groups
            .entry((source, target, link.link_type.as_str()))
            .or_default()
            .push(link);
    }

    let merged: Vec<MergedLink> = groups
        .into_iter()
        .map(|((source, target, link_type), members)| MergedLink {
            source_canonical: source.to_string(),
            target_canonical: target.to_string(),
            link_type: link_type.to_string(),
            link_count: members.len(),
            attributes: reconcile_attributes(members.iter().map(|l| &l.attributes)),
        })
        .collect();

    info!(
        "Merged {} links into {} canonical links ({} self-links dropped)",
        links.len(),
        merged.len(),
        self_links
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::Cluster;

    fn map(groups: &[&[&str]]) -> CanonicalMap {
        let clusters: Vec<Cluster> = groups.iter().map(|g| Cluster::new(g.iter().copied())).collect();
        CanonicalMap::from_clusters(&clusters)
    }

    #[test]
    fn test_pick_name() {
        assert_eq!(pick_name(["Acme", "ACME Ltd", "Acme Co."]), Some("ACME Ltd".to_string()));
        assert_eq!(pick_name(["Zeta", "Beta"]), Some("Beta".to_string()));
        assert_eq!(pick_name(["  ", ""]), None);
    }

    #[test]
    fn test_merge_entities_reconciles_fields() {
        let entities = vec![
            Entity::new("a", Some("Acme"), "registry").with_attribute("country", "GB"),
            Entity::new("b", Some("Acme Holdings"), "leaks")
                .with_attribute("country", "US")
                .with_attribute("city", ""),
            Entity::new("c", None, "registry").with_attribute("country", "US"),
            Entity::new("d", Some("Zenith"), "press"),
        ];
        let canonical_map = map(&[&["a", "b", "c"]]);
        let merged = merge_entities(&entities, &canonical_map);

        assert_eq!(merged.len(), 2);
        let acme = merged
            .iter()
            .find(|m| m.member_uids.len() == 3)
            .unwrap();
        assert_eq!(acme.canonical_uid, canonical_map.resolve("a"));
        assert_eq!(acme.name.as_deref(), Some("Acme Holdings"));
        assert_eq!(
            acme.origins.iter().cloned().collect::<Vec<_>>(),
            vec!["leaks", "registry"]
        );
        assert_eq!(acme.attributes.get("country").map(String::as_str), Some("US"));
        assert!(!acme.attributes.contains_key("city"));

        let zenith = merged.iter().find(|m| m.canonical_uid == "d").unwrap();
        assert_eq!(zenith.member_uids, vec!["d"]);
    }

    #[test]
    fn test_attribute_ties_go_to_smallest_value() {
        let a = BTreeMap::from([("country".to_string(), "US".to_string())]);
        let b = BTreeMap::from([("country".to_string(), "GB".to_string())]);
        let reconciled = reconcile_attributes([&a, &b]);
        assert_eq!(reconciled.get("country").map(String::as_str), Some("GB"));
    }

    #[test]
    fn test_merge_links_collapses_and_drops_self_links() {
        let links = vec![
            Link::new("a", "x", "owns").with_attribute("share", "50"),
            Link::new("b", "x", "owns").with_attribute("share", "50"),
            Link::new("b", "x", "supplies"),
            Link::new("a", "b", "owns"),
        ];
        let canonical_map = map(&[&["a", "b"]]);
        let merged = merge_links(&links, &canonical_map);
        let acme = canonical_map.resolve("a");

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source_canonical, acme);
        assert_eq!(merged[0].target_canonical, "x");
        assert_eq!(merged[0].link_type, "owns");
        assert_eq!(merged[0].link_count, 2);
        assert_eq!(merged[0].attributes.get("share").map(String::as_str), Some("50"));
        assert_eq!(merged[1].link_type, "supplies");
        assert_eq!(merged[1].link_count, 1);
    }
}
