//! Record operations as seen by a front end.
//!
//! Every write goes through the validator first; a rejected record never
//! reaches storage. Selection is explicit: callers pass the ids they want to
//! change.

use anyhow::Context;
use paragon_tracker_core::{
    analyze, Analysis, MatchRecord, RecordField, RecordFields, RecordInput, Roster,
};
use paragon_tracker_store_sqlite::SqliteRecordStore;

use crate::config::{ensure_parent_dir, TrackerConfig};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid input: please check your input")]
    InvalidInput,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

pub struct Tracker {
    store: SqliteRecordStore,
    roster: Roster,
}

impl Tracker {
    /// Opens (creating if needed) the database named by `config`.
    ///
    /// # Errors
    /// Returns [`TrackerError::Storage`] when the data directory or database
    /// cannot be prepared.
    pub fn open(config: TrackerConfig) -> Result<Self, TrackerError> {
        ensure_parent_dir(&config.db_path)?;
        let store = SqliteRecordStore::open(&config.db_path)?;
        store.ensure_schema()?;
        Ok(Self::with_store(store, config.roster))
    }

    #[must_use]
    pub fn with_store(store: SqliteRecordStore, roster: Roster) -> Self {
        Self { store, roster }
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn store(&self) -> &SqliteRecordStore {
        &self.store
    }

    /// # Errors
    /// Returns [`TrackerError::Storage`] when the records cannot be read.
    pub fn list_all(&self) -> Result<Vec<MatchRecord>, TrackerError> {
        Ok(self.store.get_all()?)
    }

    /// Records whose `field` contains `pattern`; an empty pattern lists all.
    ///
    /// # Errors
    /// Returns [`TrackerError::Storage`] when the query fails.
    pub fn search(
        &self,
        field: RecordField,
        pattern: &str,
    ) -> Result<Vec<MatchRecord>, TrackerError> {
        if pattern.is_empty() {
            return self.list_all();
        }
        Ok(self.store.find_by(field, pattern)?)
    }

    /// Validates and stores a new record, returning its id.
    ///
    /// # Errors
    /// Returns [`TrackerError::InvalidInput`] for a malformed record and
    /// [`TrackerError::Storage`] when the insert fails.
    pub fn add(&mut self, fields: &RecordFields) -> Result<i64, TrackerError> {
        let input = self.checked(fields)?;
        let id = self.store.insert(&input).context("add failed")?;
        tracing::info!(id, "record added");
        Ok(id)
    }

    /// Validates and writes all six fields of the record with `id`.
    ///
    /// # Errors
    /// Returns [`TrackerError::InvalidInput`] for a malformed record and
    /// [`TrackerError::Storage`] when the update fails.
    pub fn update(
        &mut self,
        id: i64,
        fields: &RecordFields,
    ) -> Result<UpdateOutcome, TrackerError> {
        let input = self.checked(fields)?;
        let updated = self
            .store
            .update_by_id(id, &input)
            .with_context(|| format!("update of record {id} failed"))?;

        Ok(if updated {
            UpdateOutcome::Updated
        } else {
            UpdateOutcome::NotFound
        })
    }

    /// Deletes the given ids, skipping any that do not exist.
    ///
    /// # Errors
    /// Returns [`TrackerError::Storage`] when the delete fails; in that case
    /// no row is removed.
    pub fn remove(&mut self, ids: &[i64]) -> Result<usize, TrackerError> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self.store.delete_by_ids(ids).context("delete failed")?)
    }

    /// Win-rate tables and rating series over every stored record.
    ///
    /// # Errors
    /// Returns [`TrackerError::Storage`] when the records cannot be read.
    pub fn analyze(&self) -> Result<Analysis, TrackerError> {
        let records = self.store.get_all()?;
        Ok(analyze(&records))
    }

    fn checked(&self, fields: &RecordFields) -> Result<RecordInput, TrackerError> {
        fields.parse(&self.roster).map_err(|err| {
            tracing::warn!(reason = %err, "record rejected");
            TrackerError::InvalidInput
        })
    }
}
