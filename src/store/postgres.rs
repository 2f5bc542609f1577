// src/store/postgres.rs - ProjectStore over a bb8 pool of tokio-postgres connections
use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tokio_postgres::Row;

use super::{ColumnType, ProjectStore, Table};
use crate::error::ResolveError;
use crate::models::{
    Alias, Entity, Judgement, JudgementRecord, Link, MergedEntity, MergedLink, StoredJudgement,
};
use crate::utils::db_connect::PgPool;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const JUDGEMENT_TABLE: &str = "mapping";
const MODEL_TABLE: &str = "resolution_model";
const MERGED_ENTITY_TABLE: &str = "merged_entity";
const MERGED_LINK_TABLE: &str = "merged_link";

/// Rejects anything that is not a plain SQL identifier, since table and
/// column names are interpolated into statements.
pub fn validate_identifier(name: &str) -> Result<&str, ResolveError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(ResolveError::InvalidIdentifier(name.to_string()))
    }
}

/// Turns a JSONB object into string attributes; non-string values keep their JSON text.
fn attributes_from_json(value: Option<JsonValue>) -> BTreeMap<String, String> {
    match value {
        Some(JsonValue::Object(map)) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let text = match v {
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                };
                (k, text)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn attributes_to_json(attributes: &BTreeMap<String, String>) -> Result<JsonValue> {
    serde_json::to_value(attributes).context("Failed to serialize attributes")
}

pub struct PgProjectStore {
    pool: PgPool,
    schema: String,
}

impl PgProjectStore {
    pub fn new(pool: PgPool, schema: &str) -> Result<Self, ResolveError> {
        validate_identifier(schema)?;
        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    /// Uses `PROJECT_SCHEMA`, defaulting to `public`.
    pub fn from_env(pool: PgPool) -> Result<Self, ResolveError> {
        let schema = std::env::var("PROJECT_SCHEMA").unwrap_or_else(|_| "public".to_string());
        Self::new(pool, &schema)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    /// Creates the schema and every table the pipeline touches, if missing.
    pub async fn ensure_tables(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for ensure_tables")?;
        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    uid TEXT PRIMARY KEY,
                    name TEXT NULL,
                    origin TEXT NOT NULL,
                    attributes JSONB NOT NULL DEFAULT '{{}}'::jsonb
                )",
                self.qualified(Table::Entities.name())
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (uid TEXT NOT NULL, name TEXT NULL)",
                self.qualified(Table::Aliases.name())
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    source TEXT NOT NULL,
                    target TEXT NOT NULL,
                    link_type TEXT NOT NULL,
                    attributes JSONB NOT NULL DEFAULT '{{}}'::jsonb
                )",
                self.qualified(Table::Links.name())
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    left_uid TEXT NOT NULL,
                    right_uid TEXT NOT NULL,
                    judgement BOOLEAN NULL,
                    score DOUBLE PRECISION NULL,
                    PRIMARY KEY (left_uid, right_uid)
                )",
                self.qualified(JUDGEMENT_TABLE)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    name TEXT PRIMARY KEY,
                    model JSONB NOT NULL,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
                self.qualified(MODEL_TABLE)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    canonical_uid TEXT PRIMARY KEY,
                    name TEXT NULL,
                    origins TEXT[] NOT NULL,
                    member_uids TEXT[] NOT NULL,
                    attributes JSONB NOT NULL
                )",
                self.qualified(MERGED_ENTITY_TABLE)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    source_canonical TEXT NOT NULL,
                    target_canonical TEXT NOT NULL,
                    link_type TEXT NOT NULL,
                    link_count BIGINT NOT NULL,
                    attributes JSONB NOT NULL,
                    PRIMARY KEY (source_canonical, target_canonical, link_type)
                )",
                self.qualified(MERGED_LINK_TABLE)
            ),
        ];
        for statement in &statements {
            conn.batch_execute(statement)
                .await
                .with_context(|| format!("Failed to run DDL: {}", statement))?;
        }
        info!("Ensured pipeline tables in schema {}", self.schema);
        Ok(())
    }
}

fn entity_from_row(row: &Row) -> Entity {
    Entity {
        uid: row.get("uid"),
        name: row.get("name"),
        origin: row.get("origin"),
        attributes: attributes_from_json(row.get("attributes")),
        canonical_uid: row.get("canonical_uid"),
    }
}

fn link_from_row(row: &Row) -> Link {
    Link {
        source: row.get("source"),
        target: row.get("target"),
        link_type: row.get("link_type"),
        attributes: attributes_from_json(row.get("attributes")),
        source_canonical: row.get("source_canonical"),
        target_canonical: row.get("target_canonical"),
    }
}

impl ProjectStore for PgProjectStore {
    async fn entities(&self, origins: &[String]) -> Result<Vec<Entity>> {
        let conn = self.pool.get().await.context("Failed to get DB connection for entities")?;
        // Canonical columns are read through to_jsonb so the query works before they exist.
        let query = format!(
            "SELECT e.uid, e.name, e.origin, e.attributes,
                    to_jsonb(e) ->> 'canonical_uid' AS canonical_uid
             FROM {} e
             WHERE cardinality($1::text[]) = 0 OR e.origin = ANY($1::text[])
             ORDER BY e.uid",
            self.qualified(Table::Entities.name())
        );
        let rows = conn
            .query(query.as_str(), &[&origins])
            .await
            .context("Failed to query entities")?;
        debug!("Loaded {} entities", rows.len());
        Ok(rows.iter().map(entity_from_row).collect())
    }

    async fn aliases(&self) -> Result<Vec<Alias>> {
        let conn = self.pool.get().await.context("Failed to get DB connection for aliases")?;
        let query = format!(
            "SELECT a.uid, a.name, to_jsonb(a) ->> 'canonical_uid' AS canonical_uid
             FROM {} a ORDER BY a.uid",
            self.qualified(Table::Aliases.name())
        );
        let rows = conn
            .query(query.as_str(), &[])
            .await
            .context("Failed to query aliases")?;
        Ok(rows
            .iter()
            .map(|row| Alias {
                uid: row.get("uid"),
                name: row.get("name"),
                canonical_uid: row.get("canonical_uid"),
            })
            .collect())
    }

    async fn links(&self) -> Result<Vec<Link>> {
        let conn = self.pool.get().await.context("Failed to get DB connection for links")?;
        let query = format!(
            "SELECT l.source, l.target, l.link_type, l.attributes,
                    to_jsonb(l) ->> 'source_canonical' AS source_canonical,
                    to_jsonb(l) ->> 'target_canonical' AS target_canonical
             FROM {} l ORDER BY l.source, l.target, l.link_type",
            self.qualified(Table::Links.name())
        );
        let rows = conn
            .query(query.as_str(), &[])
            .await
            .context("Failed to query links")?;
        Ok(rows.iter().map(link_from_row).collect())
    }

    async fn judgements(&self) -> Result<Vec<StoredJudgement>> {
        let conn = self.pool.get().await.context("Failed to get DB connection for judgements")?;
        let query = format!(
            "SELECT left_uid, right_uid, judgement, score FROM {}",
            self.qualified(JUDGEMENT_TABLE)
        );
        let rows = conn
            .query(query.as_str(), &[])
            .await
            .context("Failed to query judgements")?;
        Ok(rows
            .iter()
            .map(|row| StoredJudgement {
                left_uid: row.get("left_uid"),
                right_uid: row.get("right_uid"),
                judgement: Judgement::from_option(row.get("judgement")),
                score: row.get("score"),
            })
            .collect())
    }

    async fn emit_judgement(&self, record: &JudgementRecord) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for emit_judgement")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start transaction for emit_judgement")?;
        let table = self.qualified(JUDGEMENT_TABLE);
        let (left, right) = (record.key.left(), record.key.right());

        // A row stored in reverse order is the same pair.
        transaction
            .execute(
                format!("DELETE FROM {} WHERE left_uid = $1 AND right_uid = $2", table).as_str(),
                &[&right, &left],
            )
            .await
            .context("Failed to remove reversed judgement row")?;
        transaction
            .execute(
                format!(
                    "INSERT INTO {} (left_uid, right_uid, judgement, score)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (left_uid, right_uid) DO UPDATE SET
                        judgement = EXCLUDED.judgement,
                        score = EXCLUDED.score",
                    table
                )
                .as_str(),
                &[&left, &right, &record.judgement.as_option(), &record.score],
            )
            .await
            .with_context(|| format!("Failed to upsert judgement for {}", record.key))?;
        transaction
            .commit()
            .await
            .context("Failed to commit judgement upsert")?;
        Ok(())
    }

    async fn delete_judgements(&self, judgement: Judgement) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for delete_judgements")?;
        let table = self.qualified(JUDGEMENT_TABLE);
        let deleted = match judgement.as_option() {
            None => {
                conn.execute(
                    format!("DELETE FROM {} WHERE judgement IS NULL", table).as_str(),
                    &[],
                )
                .await
            }
            Some(value) => {
                conn.execute(
                    format!("DELETE FROM {} WHERE judgement = $1", table).as_str(),
                    &[&value],
                )
                .await
            }
        }
        .with_context(|| format!("Failed to delete {} judgements", judgement))?;
        debug!("Deleted {} {} judgements", deleted, judgement);
        Ok(deleted)
    }

    async fn ensure_column(&self, table: Table, column: &str, column_type: ColumnType) -> Result<()> {
        validate_identifier(column)?;
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for ensure_column")?;
        let statement = format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            self.qualified(table.name()),
            column,
            column_type.sql_type()
        );
        conn.batch_execute(&statement)
            .await
            .with_context(|| format!("Failed to add column {}.{}", table, column))?;
        Ok(())
    }

    async fn create_index(&self, table: Table, columns: &[&str]) -> Result<()> {
        for column in columns {
            validate_identifier(column)?;
        }
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for create_index")?;
        let statement = format!(
            "CREATE INDEX IF NOT EXISTS ix_{}_{} ON {} ({})",
            table.name(),
            columns.join("_"),
            self.qualified(table.name()),
            columns.join(", ")
        );
        conn.batch_execute(&statement)
            .await
            .with_context(|| format!("Failed to index {} on {:?}", table, columns))?;
        Ok(())
    }

    async fn copy_column(&self, table: Table, source: &str, dest: &str) -> Result<u64> {
        validate_identifier(source)?;
        validate_identifier(dest)?;
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for copy_column")?;
        let statement = format!(
            "UPDATE {} SET {} = {}",
            self.qualified(table.name()),
            dest,
            source
        );
        conn.execute(statement.as_str(), &[])
            .await
            .with_context(|| format!("Failed to copy {}.{} into {}", table, source, dest))
    }

    async fn assign_canonical(
        &self,
        table: Table,
        source: &str,
        dest: &str,
        canonical: &str,
        members: &[String],
    ) -> Result<u64> {
        validate_identifier(source)?;
        validate_identifier(dest)?;
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for assign_canonical")?;
        let statement = format!(
            "UPDATE {} SET {} = $1 WHERE {} = ANY($2::text[])",
            self.qualified(table.name()),
            dest,
            source
        );
        conn.execute(statement.as_str(), &[&canonical, &members])
            .await
            .with_context(|| format!("Failed to assign {} on {}.{}", canonical, table, dest))
    }

    async fn load_model(&self, name: &str) -> Result<Option<JsonValue>> {
        let conn = self.pool.get().await.context("Failed to get DB connection for load_model")?;
        let row = conn
            .query_opt(
                format!("SELECT model FROM {} WHERE name = $1", self.qualified(MODEL_TABLE)).as_str(),
                &[&name],
            )
            .await
            .with_context(|| format!("Failed to load model {}", name))?;
        Ok(row.map(|r| r.get("model")))
    }

    async fn save_model(&self, name: &str, model: &JsonValue) -> Result<()> {
        let conn = self.pool.get().await.context("Failed to get DB connection for save_model")?;
        conn.execute(
            format!(
                "INSERT INTO {} (name, model, updated_at) VALUES ($1, $2, CURRENT_TIMESTAMP)
                 ON CONFLICT (name) DO UPDATE SET model = EXCLUDED.model, updated_at = CURRENT_TIMESTAMP",
                self.qualified(MODEL_TABLE)
            )
            .as_str(),
            &[&name, model],
        )
        .await
        .with_context(|| format!("Failed to save model {}", name))?;
        Ok(())
    }

    async fn replace_merged(&self, entities: &[MergedEntity], links: &[MergedLink]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for replace_merged")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start transaction for replace_merged")?;
        let entity_table = self.qualified(MERGED_ENTITY_TABLE);
        let link_table = self.qualified(MERGED_LINK_TABLE);

        transaction
            .batch_execute(&format!("DELETE FROM {}; DELETE FROM {};", link_table, entity_table))
            .await
            .context("Failed to clear merged tables")?;

        let insert_entity = transaction
            .prepare(&format!(
                "INSERT INTO {} (canonical_uid, name, origins, member_uids, attributes)
                 VALUES ($1, $2, $3, $4, $5)",
                entity_table
            ))
            .await
            .context("Failed to prepare merged entity insert")?;
        for entity in entities {
            let origins: Vec<&str> = entity.origins.iter().map(|o| o.as_str()).collect();
            let attributes = attributes_to_json(&entity.attributes)?;
            transaction
                .execute(
                    &insert_entity,
                    &[
                        &entity.canonical_uid,
                        &entity.name,
                        &origins,
                        &entity.member_uids,
                        &attributes,
                    ],
                )
                .await
                .with_context(|| format!("Failed to insert merged entity {}", entity.canonical_uid))?;
        }

        let insert_link = transaction
            .prepare(&format!(
                "INSERT INTO {} (source_canonical, target_canonical, link_type, link_count, attributes)
                 VALUES ($1, $2, $3, $4, $5)",
                link_table
            ))
            .await
            .context("Failed to prepare merged link insert")?;
        for link in links {
            let attributes = attributes_to_json(&link.attributes)?;
            let link_count = link.link_count as i64;
            transaction
                .execute(
                    &insert_link,
                    &[
                        &link.source_canonical,
                        &link.target_canonical,
                        &link.link_type,
                        &link_count,
                        &attributes,
                    ],
                )
                .await
                .with_context(|| {
                    format!(
                        "Failed to insert merged link {} -> {}",
                        link.source_canonical, link.target_canonical
                    )
                })?;
        }

        transaction
            .commit()
            .await
            .context("Failed to commit merged tables")?;
        info!(
            "Replaced merged tables: {} entities, {} links",
            entities.len(),
            links.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("canonical_uid").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());
        assert_eq!(
            validate_identifier("uid; DROP TABLE entity"),
            Err(ResolveError::InvalidIdentifier("uid; DROP TABLE entity".to_string()))
        );
        assert!(validate_identifier("1col").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_attributes_from_json() {
        let value = serde_json::json!({"country": "GB", "employees": 12, "note": null});
        let attributes = attributes_from_json(Some(value));
        assert_eq!(attributes.get("country").map(String::as_str), Some("GB"));
        assert_eq!(attributes.get("employees").map(String::as_str), Some("12"));
        assert!(!attributes.contains_key("note"));
        assert!(attributes_from_json(None).is_empty());
    }
}
