// src/ledger.rs - In-memory judgement ledger with a write journal flushed to the ProjectStore
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolveError;
use crate::models::{Judgement, JudgementRecord, PairKey, StoredJudgement};
use crate::store::ProjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The record was inserted or replaced an undecided entry.
    Written,
    /// An identical record already existed; nothing was journalled.
    Unchanged,
    /// A decided entry with a different value exists and was kept.
    PreservedDecision,
}

#[derive(Debug, Clone, PartialEq)]
enum LedgerOp {
    Upsert(JudgementRecord),
    DeleteUndecided,
}

/// Pairwise decisions for one pipeline run.
///
/// Reads are served from memory, so every write is visible to the next read
/// immediately. Mutations are also journalled and reach the store on `flush`,
/// in the order they were made.
#[derive(Debug, Default)]
pub struct JudgementLedger {
    records: BTreeMap<PairKey, JudgementRecord>,
    journal: Vec<LedgerOp>,
}

impl JudgementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from raw store rows, normalising pair order.
    pub fn from_stored(rows: Vec<StoredJudgement>) -> Result<Self, ResolveError> {
        let mut records: BTreeMap<PairKey, JudgementRecord> = BTreeMap::new();
        for row in rows {
            let key = PairKey::new(&row.left_uid, &row.right_uid);
            if key.is_self_pair() {
                return Err(ResolveError::SelfPair(row.left_uid));
            }
            if let Some(existing) = records.get(&key) {
                if existing.judgement != row.judgement {
                    return Err(ResolveError::AmbiguousPairKey {
                        left: key.left().to_string(),
                        right: key.right().to_string(),
                    });
                }
                debug!("Duplicate stored judgement for {} collapsed", key);
                continue;
            }
            records.insert(
                key.clone(),
                JudgementRecord {
                    key,
                    judgement: row.judgement,
                    score: row.score,
                },
            );
        }
        Ok(Self {
            records,
            journal: Vec::new(),
        })
    }

    /// Loads the current judgement table from the store.
    pub async fn load<S: ProjectStore>(store: &S) -> Result<Self> {
        let rows = store
            .judgements()
            .await
            .context("Failed to load judgements from store")?;
        let ledger = Self::from_stored(rows)?;
        info!("Loaded judgement ledger with {} entries", ledger.len());
        Ok(ledger)
    }

    /// Upserts a judgement at the normalised pair key. Undecided entries are
    /// overwritten; decided entries are never replaced by a different value.
    pub fn emit(
        &mut self,
        uid_a: &str,
        uid_b: &str,
        judgement: Judgement,
        score: Option<f64>,
    ) -> Result<EmitOutcome, ResolveError> {
        let key = PairKey::new(uid_a, uid_b);
        if key.is_self_pair() {
            return Err(ResolveError::SelfPair(uid_a.to_string()));
        }
        let record = JudgementRecord {
            key: key.clone(),
            judgement,
            score,
        };
        match self.records.get(&key) {
            Some(existing) if *existing == record => Ok(EmitOutcome::Unchanged),
            Some(existing) if existing.judgement.is_decided() => {
                debug!(
                    "Kept decided judgement {} for {} (proposed {})",
                    existing.judgement, key, judgement
                );
                Ok(EmitOutcome::PreservedDecision)
            }
            _ => {
                self.write(record);
                Ok(EmitOutcome::Written)
            }
        }
    }

    /// Explicit decision change, e.g. a reviewer promoting or rejecting a
    /// candidate. Returns the record it replaced.
    pub fn override_decision(
        &mut self,
        uid_a: &str,
        uid_b: &str,
        judgement: Judgement,
    ) -> Result<Option<JudgementRecord>, ResolveError> {
        let key = PairKey::new(uid_a, uid_b);
        if key.is_self_pair() {
            return Err(ResolveError::SelfPair(uid_a.to_string()));
        }
        let previous = self.records.get(&key).cloned();
        let score = previous.as_ref().and_then(|p| p.score);
        self.write(JudgementRecord {
            key,
            judgement,
            score,
        });
        Ok(previous)
    }

    fn write(&mut self, record: JudgementRecord) {
        self.records.insert(record.key.clone(), record.clone());
        self.journal.push(LedgerOp::Upsert(record));
    }

    pub fn get(&self, uid_a: &str, uid_b: &str) -> Option<&JudgementRecord> {
        self.records.get(&PairKey::new(uid_a, uid_b))
    }

    pub fn is_decided(&self, key: &PairKey) -> bool {
        self.records
            .get(key)
            .map(|r| r.judgement.is_decided())
            .unwrap_or(false)
    }

    pub fn decided_pairs(&self) -> BTreeSet<PairKey> {
        self.records
            .values()
            .filter(|r| r.judgement.is_decided())
            .map(|r| r.key.clone())
            .collect()
    }

    pub fn positive_pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.records
            .values()
            .filter(|r| r.judgement == Judgement::Positive)
            .map(|r| &r.key)
    }

    pub fn undecided(&self) -> impl Iterator<Item = &JudgementRecord> {
        self.records
            .values()
            .filter(|r| r.judgement == Judgement::Undecided)
    }

    /// Removes every undecided entry and returns how many were dropped.
    pub fn delete_undecided(&mut self) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, r| r.judgement != Judgement::Undecided);
        self.journal.push(LedgerOp::DeleteUndecided);
        before - self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JudgementRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn pending_writes(&self) -> usize {
        self.journal.len()
    }

    /// Persists journalled mutations through `emit_judgement` and
    /// `delete_judgements`. Operations leave the journal only once written, so
    /// after a failed flush the unwritten tail is retried by the next one.
    pub async fn flush<S: ProjectStore>(&mut self, store: &S) -> Result<usize> {
        let mut written = 0;
        let result = loop {
            let Some(op) = self.journal.get(written) else {
                break Ok(());
            };
            if let Err(e) = write_op(store, op).await {
                break Err(e);
            }
            written += 1;
        };
        self.journal.drain(..written);
        result?;
        if written > 0 {
            debug!("Flushed {} ledger operations", written);
        }
        Ok(written)
    }
}

async fn write_op<S: ProjectStore>(store: &S, op: &LedgerOp) -> Result<()> {
    match op {
        LedgerOp::Upsert(record) => store
            .emit_judgement(record)
            .await
            .with_context(|| format!("Failed to write judgement for {}", record.key)),
        LedgerOp::DeleteUndecided => {
            let removed = store
                .delete_judgements(Judgement::Undecided)
                .await
                .context("Failed to delete undecided judgements")?;
            debug!("Store removed {} undecided judgements", removed);
            Ok(())
        }
    }
}
