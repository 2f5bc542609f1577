// src/canonical/mod.rs - Deterministic canonical ids and their propagation to dependent tables
use anyhow::{Context, Result};
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::clustering::Cluster;
use crate::store::{ColumnType, ProjectStore, Table};

/// `hex(sha256(join("\0", sorted_unique(uids))))`.
pub fn canonical_id<S: AsRef<str>>(uids: &[S]) -> String {
    let unique: BTreeSet<&str> = uids.iter().map(|u| u.as_ref()).collect();
    let mut hasher = Sha256::new();
    for (i, uid) in unique.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(uid.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// In-memory uid -> canonical id lookup. Uids outside every cluster map to themselves.
#[derive(Debug, Clone, Default)]
pub struct CanonicalMap {
    by_uid: BTreeMap<String, String>,
}

impl CanonicalMap {
    pub fn from_clusters(clusters: &[Cluster]) -> Self {
        let mut by_uid = BTreeMap::new();
        for cluster in clusters {
            let canonical = cluster.canonical_id();
            for uid in cluster.members() {
                by_uid.insert(uid.clone(), canonical.clone());
            }
        }
        Self { by_uid }
    }

    pub fn resolve<'a>(&'a self, uid: &'a str) -> &'a str {
        self.by_uid.get(uid).map(|c| c.as_str()).unwrap_or(uid)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

/// One `(table, source column, destination column)` rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUpdate {
    pub table: Table,
    pub source: String,
    pub dest: String,
}

impl CanonicalUpdate {
    pub fn new(table: Table, source: &str, dest: &str) -> Self {
        Self {
            table,
            source: source.to_string(),
            dest: dest.to_string(),
        }
    }
}

pub fn default_updates() -> Vec<CanonicalUpdate> {
    vec![
        CanonicalUpdate::new(Table::Entities, "uid", "canonical_uid"),
        CanonicalUpdate::new(Table::Aliases, "uid", "canonical_uid"),
        CanonicalUpdate::new(Table::Links, "source", "source_canonical"),
        CanonicalUpdate::new(Table::Links, "target", "target_canonical"),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalisationSummary {
    pub clusters: usize,
    pub rows_initialised: u64,
    pub rows_assigned: u64,
}

/// Prepares each destination column, resets it to the source value and then
/// overwrites cluster members with their canonical id. Safe to re-run.
pub async fn canonicalise<S: ProjectStore>(
    store: &S,
    clusters: &[Cluster],
    updates: &[CanonicalUpdate],
) -> Result<CanonicalisationSummary> {
    info!("Canonicalising {} clusters across {} column updates", clusters.len(), updates.len());
    let mut summary = CanonicalisationSummary {
        clusters: clusters.len(),
        ..Default::default()
    };

    for update in updates {
        let (table, src, dest) = (update.table, update.source.as_str(), update.dest.as_str());
        store
            .create_index(table, &[src])
            .await
            .with_context(|| format!("Failed to index {}.{}", table, src))?;
        store
            .ensure_column(table, dest, ColumnType::Text)
            .await
            .with_context(|| format!("Failed to add column {}.{}", table, dest))?;
        store
            .create_index(table, &[dest])
            .await
            .with_context(|| format!("Failed to index {}.{}", table, dest))?;
        let copied = store
            .copy_column(table, src, dest)
            .await
            .with_context(|| format!("Failed to copy {}.{} into {}", table, src, dest))?;
        debug!("Initialised {} rows of {}.{}", copied, table, dest);
        summary.rows_initialised += copied;
    }

    for cluster in clusters {
        let canonical = cluster.canonical_id();
        for update in updates {
            summary.rows_assigned += store
                .assign_canonical(
                    update.table,
                    &update.source,
                    &update.dest,
                    &canonical,
                    cluster.members(),
                )
                .await
                .with_context(|| {
                    format!(
                        "Failed to assign canonical id {} on {}.{}",
                        canonical, update.table, update.dest
                    )
                })?;
        }
    }

    info!(
        "Canonicalisation done: {} clusters, {} rows initialised, {} rows assigned",
        summary.clusters, summary.rows_initialised, summary.rows_assigned
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alias, Entity, Link};
    use crate::store::MemoryStore;

    #[test]
    fn test_canonical_id_is_order_independent() {
        let id = canonical_id(&["b", "a", "c"]);
        assert_eq!(id, canonical_id(&["c", "b", "a", "a"]));
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_canonical_id_known_value() {
        // sha256("a\0b")
        let mut hasher = Sha256::new();
        hasher.update(b"a\0b");
        assert_eq!(canonical_id(&["b", "a"]), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_canonical_id_changes_with_membership() {
        assert_ne!(canonical_id(&["a", "b"]), canonical_id(&["a", "b", "c"]));
        assert_ne!(canonical_id(&["ab"]), canonical_id(&["a", "b"]));
    }

    #[test]
    fn test_canonical_map_resolves_members_and_passes_through_others() {
        let cluster = Cluster::new(["a", "b"]);
        let map = CanonicalMap::from_clusters(&[cluster.clone()]);
        assert_eq!(map.resolve("a"), cluster.canonical_id());
        assert_eq!(map.resolve("b"), cluster.canonical_id());
        assert_eq!(map.resolve("z"), "z");
    }

    #[tokio::test]
    async fn test_canonicalise_rewrites_every_table() {
        let store = MemoryStore::with_data(
            vec![
                Entity::new("a", Some("Acme"), "x"),
                Entity::new("b", Some("ACME"), "y"),
                Entity::new("c", Some("Zenith"), "x"),
            ],
            vec![Alias::new("b", Some("Acme Co"))],
            vec![Link::new("a", "c", "owns"), Link::new("c", "b", "supplies")],
        );
        let clusters = vec![Cluster::new(["a", "b"])];
        let canonical = clusters[0].canonical_id();

        let summary = canonicalise(&store, &clusters, &default_updates()).await.unwrap();
        assert_eq!(summary.clusters, 1);

        let entities = store.entities(&[]).await.unwrap();
        assert_eq!(entities[0].canonical_uid.as_deref(), Some(canonical.as_str()));
        assert_eq!(entities[1].canonical_uid.as_deref(), Some(canonical.as_str()));
        assert_eq!(entities[2].canonical_uid.as_deref(), Some("c"));

        let aliases = store.aliases().await.unwrap();
        assert_eq!(aliases[0].canonical_uid.as_deref(), Some(canonical.as_str()));

        let links = store.links().await.unwrap();
        assert_eq!(links[0].source_canonical.as_deref(), Some(canonical.as_str()));
        assert_eq!(links[0].target_canonical.as_deref(), Some("c"));
        assert_eq!(links[1].target_canonical.as_deref(), Some(canonical.as_str()));

        assert!(store
            .indexes()
            .await
            .contains(&(Table::Links, vec!["target_canonical".to_string()])));
    }

    #[tokio::test]
    async fn test_canonicalise_is_idempotent_and_resets_stale_ids() {
        let store = MemoryStore::with_data(
            vec![Entity::new("a", Some("Acme"), "x"), Entity::new("b", Some("Acme"), "y")],
            vec![],
            vec![],
        );
        let joined = vec![Cluster::new(["a", "b"])];
        canonicalise(&store, &joined, &default_updates()).await.unwrap();
        let first = store.entities(&[]).await.unwrap();
        canonicalise(&store, &joined, &default_updates()).await.unwrap();
        assert_eq!(store.entities(&[]).await.unwrap(), first);

        // Splitting the cluster restores self-canonical ids.
        canonicalise(&store, &[], &default_updates()).await.unwrap();
        let split = store.entities(&[]).await.unwrap();
        assert_eq!(split[0].canonical_uid.as_deref(), Some("a"));
        assert_eq!(split[1].canonical_uid.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_growing_one_cluster_leaves_other_ids_alone() {
        let store = MemoryStore::with_data(
            ["a", "b", "c", "x", "y"]
                .iter()
                .map(|uid| Entity::new(*uid, Some("Acme"), "src"))
                .collect(),
            vec![Alias::new("x", Some("Xylo"))],
            vec![Link::new("a", "x", "owns")],
        );
        let canonical_of = |entities: &[Entity], uid: &str| {
            entities
                .iter()
                .find(|e| e.uid == uid)
                .and_then(|e| e.canonical_uid.clone())
        };

        let before = vec![Cluster::new(["a", "b"]), Cluster::new(["x", "y"])];
        canonicalise(&store, &before, &default_updates()).await.unwrap();
        let first = store.entities(&[]).await.unwrap();
        let first_links = store.links().await.unwrap();

        let after = vec![Cluster::new(["a", "b", "c"]), Cluster::new(["x", "y"])];
        canonicalise(&store, &after, &default_updates()).await.unwrap();
        let second = store.entities(&[]).await.unwrap();

        let grown = canonical_id(&["a", "b", "c"]);
        for uid in ["a", "b", "c"] {
            assert_eq!(canonical_of(&second, uid), Some(grown.clone()));
        }
        assert_ne!(canonical_of(&first, "a"), canonical_of(&second, "a"));
        for uid in ["x", "y"] {
            assert_eq!(canonical_of(&second, uid), canonical_of(&first, uid));
        }
        assert_eq!(
            store.aliases().await.unwrap()[0].canonical_uid,
            canonical_of(&first, "x")
        );
        let links = store.links().await.unwrap();
        assert_eq!(links[0].target_canonical, first_links[0].target_canonical);
        assert_eq!(links[0].source_canonical.as_deref(), Some(grown.as_str()));
    }
}
