// src/store/mod.rs - Storage collaborator seen by the matching and canonicalisation core
pub mod memory;
pub mod postgres;

use anyhow::Result;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::models::{Alias, Entity, Judgement, JudgementRecord, Link, MergedEntity, MergedLink, StoredJudgement};

pub use memory::MemoryStore;
pub use postgres::PgProjectStore;

/// Tables that carry canonical-id columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Entities,
    Aliases,
    Links,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Entities => "entity",
            Table::Aliases => "alias",
            Table::Links => "link",
        }
    }

    /// Columns that exist before any schema evolution.
    pub fn base_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Entities => &["uid", "name", "origin", "attributes"],
            Table::Aliases => &["uid", "name"],
            Table::Links => &["source", "target", "link_type", "attributes"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
        }
    }
}

/// Everything the core reads from and writes to a project's record store.
///
/// Each write must be visible to later reads through the same store.
#[allow(async_fn_in_trait)]
pub trait ProjectStore {
    /// Entities, restricted to the given origins unless the slice is empty.
    async fn entities(&self, origins: &[String]) -> Result<Vec<Entity>>;
    async fn aliases(&self) -> Result<Vec<Alias>>;
    async fn links(&self) -> Result<Vec<Link>>;

    /// Raw judgement rows; pair order is whatever the store holds.
    async fn judgements(&self) -> Result<Vec<StoredJudgement>>;
    /// Upsert by pair key. The only write path into the judgement table.
    async fn emit_judgement(&self, record: &JudgementRecord) -> Result<()>;
    async fn delete_judgements(&self, judgement: Judgement) -> Result<u64>;

    async fn ensure_column(&self, table: Table, column: &str, column_type: ColumnType) -> Result<()>;
    async fn create_index(&self, table: Table, columns: &[&str]) -> Result<()>;
    /// `UPDATE table SET dest = source` for every row.
    async fn copy_column(&self, table: Table, source: &str, dest: &str) -> Result<u64>;
    /// Sets `dest = canonical` on every row whose `source` value is in `members`.
    async fn assign_canonical(
        &self,
        table: Table,
        source: &str,
        dest: &str,
        canonical: &str,
        members: &[String],
    ) -> Result<u64>;

    async fn load_model(&self, name: &str) -> Result<Option<JsonValue>>;
    async fn save_model(&self, name: &str, model: &JsonValue) -> Result<()>;

    /// Replaces the merged entity and link tables wholesale.
    async fn replace_merged(&self, entities: &[MergedEntity], links: &[MergedLink]) -> Result<()>;
}
