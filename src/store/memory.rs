// src/store/memory.rs - In-process ProjectStore used by tests and embedding callers
use anyhow::Result;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::RwLock;

use super::{ColumnType, ProjectStore, Table};
use crate::error::ResolveError;
use crate::models::{
    Alias, Entity, Judgement, JudgementRecord, Link, MergedEntity, MergedLink, PairKey,
    StoredJudgement,
};

/// Column access for the typed rows held in memory.
trait Row {
    fn get(&self, column: &str) -> Option<Option<&str>>;
    fn set(&mut self, column: &str, value: Option<String>) -> bool;
}

impl Row for Entity {
    fn get(&self, column: &str) -> Option<Option<&str>> {
        match column {
            "uid" => Some(Some(self.uid.as_str())),
            "name" => Some(self.name.as_deref()),
            "origin" => Some(Some(self.origin.as_str())),
            "canonical_uid" => Some(self.canonical_uid.as_deref()),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Option<String>) -> bool {
        match column {
            "canonical_uid" => {
                self.canonical_uid = value;
                true
            }
            _ => false,
        }
    }
}

impl Row for Alias {
    fn get(&self, column: &str) -> Option<Option<&str>> {
        match column {
            "uid" => Some(Some(self.uid.as_str())),
            "name" => Some(self.name.as_deref()),
            "canonical_uid" => Some(self.canonical_uid.as_deref()),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Option<String>) -> bool {
        match column {
            "canonical_uid" => {
                self.canonical_uid = value;
                true
            }
            _ => false,
        }
    }
}

impl Row for Link {
    fn get(&self, column: &str) -> Option<Option<&str>> {
        match column {
            "source" => Some(Some(self.source.as_str())),
            "target" => Some(Some(self.target.as_str())),
            "link_type" => Some(Some(self.link_type.as_str())),
            "source_canonical" => Some(self.source_canonical.as_deref()),
            "target_canonical" => Some(self.target_canonical.as_deref()),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Option<String>) -> bool {
        match column {
            "source_canonical" => {
                self.source_canonical = value;
                true
            }
            "target_canonical" => {
                self.target_canonical = value;
                true
            }
            _ => false,
        }
    }
}

fn writable_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Entities | Table::Aliases => &["canonical_uid"],
        Table::Links => &["source_canonical", "target_canonical"],
    }
}

fn unknown_column(table: Table, column: &str) -> ResolveError {
    ResolveError::UnknownColumn {
        table: table.name().to_string(),
        column: column.to_string(),
    }
}

fn copy_rows<R: Row>(rows: &mut [R], table: Table, source: &str, dest: &str) -> Result<u64> {
    let mut updated = 0;
    for row in rows.iter_mut() {
        let value = row
            .get(source)
            .ok_or_else(|| unknown_column(table, source))?
            .map(|v| v.to_string());
        if !row.set(dest, value) {
            return Err(unknown_column(table, dest).into());
        }
        updated += 1;
    }
    Ok(updated)
}

fn assign_rows<R: Row>(
    rows: &mut [R],
    table: Table,
    source: &str,
    dest: &str,
    canonical: &str,
    members: &HashSet<&str>,
) -> Result<u64> {
    let mut updated = 0;
    for row in rows.iter_mut() {
        let is_member = row
            .get(source)
            .ok_or_else(|| unknown_column(table, source))?
            .map(|v| members.contains(v))
            .unwrap_or(false);
        if is_member {
            if !row.set(dest, Some(canonical.to_string())) {
                return Err(unknown_column(table, dest).into());
            }
            updated += 1;
        }
    }
    Ok(updated)
}

#[derive(Debug, Default)]
struct MemoryTables {
    entities: Vec<Entity>,
    aliases: Vec<Alias>,
    links: Vec<Link>,
    judgements: Vec<StoredJudgement>,
    ensured_columns: BTreeSet<(Table, String)>,
    indexes: BTreeSet<(Table, Vec<String>)>,
    models: BTreeMap<String, JsonValue>,
    merged_entities: Vec<MergedEntity>,
    merged_links: Vec<MergedLink>,
}

impl MemoryTables {
    fn has_column(&self, table: Table, column: &str) -> bool {
        table.base_columns().contains(&column)
            || self.ensured_columns.contains(&(table, column.to_string()))
    }

    fn require_column(&self, table: Table, column: &str) -> Result<(), ResolveError> {
        if self.has_column(table, column) {
            Ok(())
        } else {
            Err(unknown_column(table, column))
        }
    }
}

/// A `ProjectStore` over plain vectors. Canonical columns behave like
/// undeclared SQL columns until `ensure_column` has been called for them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(entities: Vec<Entity>, aliases: Vec<Alias>, links: Vec<Link>) -> Self {
        Self {
            tables: RwLock::new(MemoryTables {
                entities,
                aliases,
                links,
                ..Default::default()
            }),
        }
    }

    /// Inserts a judgement row verbatim, without normalising pair order.
    pub async fn insert_raw_judgement(&self, row: StoredJudgement) {
        self.tables.write().await.judgements.push(row);
    }

    pub async fn merged_entities(&self) -> Vec<MergedEntity> {
        self.tables.read().await.merged_entities.clone()
    }

    pub async fn merged_links(&self) -> Vec<MergedLink> {
        self.tables.read().await.merged_links.clone()
    }

    pub async fn indexes(&self) -> Vec<(Table, Vec<String>)> {
        self.tables.read().await.indexes.iter().cloned().collect()
    }
}

impl ProjectStore for MemoryStore {
    async fn entities(&self, origins: &[String]) -> Result<Vec<Entity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entities
            .iter()
            .filter(|e| origins.is_empty() || origins.contains(&e.origin))
            .cloned()
            .collect())
    }

    async fn aliases(&self) -> Result<Vec<Alias>> {
        Ok(self.tables.read().await.aliases.clone())
    }

    async fn links(&self) -> Result<Vec<Link>> {
        Ok(self.tables.read().await.links.clone())
    }

    async fn judgements(&self) -> Result<Vec<StoredJudgement>> {
        Ok(self.tables.read().await.judgements.clone())
    }

    async fn emit_judgement(&self, record: &JudgementRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = StoredJudgement {
            left_uid: record.key.left().to_string(),
            right_uid: record.key.right().to_string(),
            judgement: record.judgement,
            score: record.score,
        };
        let position = tables
            .judgements
            .iter()
            .position(|j| PairKey::new(&j.left_uid, &j.right_uid) == record.key);
        match position {
            Some(index) => tables.judgements[index] = row,
            None => tables.judgements.push(row),
        }
        Ok(())
    }

    async fn delete_judgements(&self, judgement: Judgement) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.judgements.len();
        tables.judgements.retain(|j| j.judgement != judgement);
        Ok((before - tables.judgements.len()) as u64)
    }

    async fn ensure_column(&self, table: Table, column: &str, _column_type: ColumnType) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.has_column(table, column) {
            return Ok(());
        }
        if !writable_columns(table).contains(&column) {
            return Err(unknown_column(table, column).into());
        }
        tables.ensured_columns.insert((table, column.to_string()));
        Ok(())
    }

    async fn create_index(&self, table: Table, columns: &[&str]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for column in columns {
            tables.require_column(table, column)?;
        }
        tables
            .indexes
            .insert((table, columns.iter().map(|c| c.to_string()).collect()));
        Ok(())
    }

    async fn copy_column(&self, table: Table, source: &str, dest: &str) -> Result<u64> {
        let mut guard = self.tables.write().await;
        guard.require_column(table, source)?;
        guard.require_column(table, dest)?;
        let tables = &mut *guard;
        match table {
            Table::Entities => copy_rows(&mut tables.entities, table, source, dest),
            Table::Aliases => copy_rows(&mut tables.aliases, table, source, dest),
            Table::Links => copy_rows(&mut tables.links, table, source, dest),
        }
    }

    async fn assign_canonical(
        &self,
        table: Table,
        source: &str,
        dest: &str,
        canonical: &str,
        members: &[String],
    ) -> Result<u64> {
        let mut guard = self.tables.write().await;
        guard.require_column(table, source)?;
        guard.require_column(table, dest)?;
        let members: HashSet<&str> = members.iter().map(|m| m.as_str()).collect();
        let tables = &mut *guard;
        match table {
            Table::Entities => assign_rows(&mut tables.entities, table, source, dest, canonical, &members),
            Table::Aliases => assign_rows(&mut tables.aliases, table, source, dest, canonical, &members),
            Table::Links => assign_rows(&mut tables.links, table, source, dest, canonical, &members),
        }
    }

    async fn load_model(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.tables.read().await.models.get(name).cloned())
    }

    async fn save_model(&self, name: &str, model: &JsonValue) -> Result<()> {
        self.tables
            .write()
            .await
            .models
            .insert(name.to_string(), model.clone());
        Ok(())
    }

    async fn replace_merged(&self, entities: &[MergedEntity], links: &[MergedLink]) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.merged_entities = entities.to_vec();
        tables.merged_links = links.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_column_requires_ensured_destination() {
        let store = MemoryStore::with_data(
            vec![Entity::new("e1", Some("Acme"), "registry")],
            vec![],
            vec![],
        );
        assert!(store
            .copy_column(Table::Entities, "uid", "canonical_uid")
            .await
            .is_err());

        store
            .ensure_column(Table::Entities, "canonical_uid", ColumnType::Text)
            .await
            .unwrap();
        assert_eq!(
            store
                .copy_column(Table::Entities, "uid", "canonical_uid")
                .await
                .unwrap(),
            1
        );
        let entities = store.entities(&[]).await.unwrap();
        assert_eq!(entities[0].canonical_uid.as_deref(), Some("e1"));
    }

    #[tokio::test]
    async fn test_ensure_column_rejects_unknown_columns() {
        let store = MemoryStore::new();
        let err = store
            .ensure_column(Table::Links, "weight", ColumnType::Text)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ResolveError>(),
            Some(&ResolveError::UnknownColumn {
                table: "link".to_string(),
                column: "weight".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_emit_judgement_upserts_by_pair_key() {
        let store = MemoryStore::new();
        store
            .insert_raw_judgement(StoredJudgement {
                left_uid: "b".to_string(),
                right_uid: "a".to_string(),
                judgement: Judgement::Undecided,
                score: Some(0.6),
            })
            .await;
        store
            .emit_judgement(&JudgementRecord {
                key: PairKey::new("a", "b"),
                judgement: Judgement::Positive,
                score: None,
            })
            .await
            .unwrap();
        let rows = store.judgements().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].judgement, Judgement::Positive);
        assert_eq!(rows[0].left_uid, "a");
    }

    #[tokio::test]
    async fn test_entities_filter_by_origin() {
        let store = MemoryStore::with_data(
            vec![
                Entity::new("e1", Some("Acme"), "registry"),
                Entity::new("e2", Some("Acme"), "leaks"),
            ],
            vec![],
            vec![],
        );
        let filtered = store.entities(&["leaks".to_string()]).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].uid, "e2");
        assert_eq!(store.entities(&[]).await.unwrap().len(), 2);
    }
}
