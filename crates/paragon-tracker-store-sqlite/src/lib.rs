#![allow(clippy::missing_errors_doc)]

use std::path::Path;

use anyhow::{Context, Result};
use paragon_tracker_core::{
    MatchDate, MatchRecord, MatchResult, RecordField, RecordInput, TurnOrder,
};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_RECORDS: &str = r"
CREATE TABLE IF NOT EXISTS records (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  my_paragon TEXT NOT NULL,
  opp_paragon TEXT NOT NULL,
  turn_order TEXT NOT NULL,
  result TEXT NOT NULL,
  my_mmr INT NOT NULL,
  date TEXT NOT NULL
);
";

const SELECT_RECORDS: &str =
    "SELECT id, my_paragon, opp_paragon, turn_order, result, my_mmr, date FROM records";

pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self::open(Path::new(":memory:"))?;
        store.ensure_schema()?;
        Ok(store)
    }

    /// Creates the `records` table when it does not exist yet.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_RECORDS)
            .context("failed to apply records schema")
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert(&mut self, input: &RecordInput) -> Result<i64> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start insert transaction")?;

        tx.execute(
            "INSERT INTO records(my_paragon, opp_paragon, turn_order, result, my_mmr, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                input.my_paragon,
                input.opp_paragon,
                input.turn_order.as_str(),
                input.result.as_str(),
                i64::from(input.my_mmr),
                input.date.to_string(),
            ],
        )
        .context("failed to insert record")?;

        let id = tx.last_insert_rowid();
        tx.commit().context("failed to commit insert transaction")?;

        tracing::debug!(
            id,
            my_paragon = %input.my_paragon,
            opp_paragon = %input.opp_paragon,
            "record inserted"
        );
        Ok(id)
    }

    /// Replaces every field of the row with `id`.
    ///
    /// Returns `false` without writing anything when no such row exists.
    pub fn update_by_id(&mut self, id: i64, input: &RecordInput) -> Result<bool> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start update transaction")?;

        let changed = tx
            .execute(
                "UPDATE records
                 SET my_paragon = ?1, opp_paragon = ?2, turn_order = ?3,
                     result = ?4, my_mmr = ?5, date = ?6
                 WHERE id = ?7",
                params![
                    input.my_paragon,
                    input.opp_paragon,
                    input.turn_order.as_str(),
                    input.result.as_str(),
                    i64::from(input.my_mmr),
                    input.date.to_string(),
                    id,
                ],
            )
            .with_context(|| format!("failed to update record {id}"))?;

        tx.commit().context("failed to commit update transaction")?;

        if changed == 0 {
            tracing::warn!(id, "update skipped: record not found");
            return Ok(false);
        }

        tracing::debug!(id, "record updated");
        Ok(true)
    }

    /// Deletes every listed id in one transaction and returns how many rows
    /// went away. Ids that are not present are skipped.
    pub fn delete_by_ids(&mut self, ids: &[i64]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start delete transaction")?;

        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare("DELETE FROM records WHERE id = ?1")
                .context("failed to prepare delete statement")?;
            for id in ids {
                removed += stmt
                    .execute(params![id])
                    .with_context(|| format!("failed to delete record {id}"))?;
            }
        }

        tx.commit().context("failed to commit delete transaction")?;

        tracing::debug!(requested = ids.len(), removed, "records deleted");
        Ok(removed)
    }

    pub fn get_all(&self) -> Result<Vec<MatchRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_RECORDS} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], parse_record_row)?;
        collect_rows(rows)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<MatchRecord>> {
        self.conn
            .query_row(
                &format!("{SELECT_RECORDS} WHERE id = ?1"),
                params![id],
                parse_record_row,
            )
            .optional()
            .with_context(|| format!("failed to load record {id}"))
    }

    /// Rows whose rendered `field` contains `pattern`, compared case-sensitively.
    ///
    /// The pattern is matched with `GLOB`, so `*`, `?` and `[...]` inside it act
    /// as wildcards.
    pub fn find_by(&self, field: RecordField, pattern: &str) -> Result<Vec<MatchRecord>> {
        let query = format!(
            "{SELECT_RECORDS} WHERE CAST({column} AS TEXT) GLOB '*' || ?1 || '*' ORDER BY id ASC",
            column = field.column()
        );

        let mut stmt = self
            .conn
            .prepare(&query)
            .with_context(|| format!("failed to prepare search on {}", field.column()))?;
        let rows = stmt.query_map(params![pattern], parse_record_row)?;
        collect_rows(rows)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .context("failed to count records")?;
        usize::try_from(count).with_context(|| format!("invalid record count: {count}"))
    }
}

fn parse_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRecord> {
    let turn_order_raw: String = row.get(3)?;
    let result_raw: String = row.get(4)?;
    let date_raw: String = row.get(6)?;

    let turn_order = TurnOrder::parse(&turn_order_raw).ok_or_else(|| {
        invalid_column(
            3,
            Type::Text,
            format!("invalid turn_order: {turn_order_raw}"),
        )
    })?;
    let result = MatchResult::parse(&result_raw)
        .ok_or_else(|| invalid_column(4, Type::Text, format!("invalid result: {result_raw}")))?;
    let date = MatchDate::parse(&date_raw)
        .map_err(|err| invalid_column(6, Type::Text, err.to_string()))?;

    Ok(MatchRecord {
        id: row.get(0)?,
        my_paragon: row.get(1)?,
        opp_paragon: row.get(2)?,
        turn_order,
        result,
        my_mmr: rating_cell(row.get_ref(5)?),
        date,
    })
}

/// Reads the rating column leniently. Reals are truncated toward zero;
/// anything that is not a non-negative number in `u32` range comes back as
/// `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rating_cell(value: ValueRef<'_>) -> Option<u32> {
    match value {
        ValueRef::Integer(raw) => u32::try_from(raw).ok(),
        ValueRef::Real(raw) if raw.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&raw) => {
            Some(raw.trunc() as u32)
        }
        ValueRef::Text(raw) => std::str::from_utf8(raw).ok()?.trim().parse::<u32>().ok(),
        ValueRef::Null | ValueRef::Real(_) | ValueRef::Blob(_) => None,
    }
}

fn invalid_column(index: usize, kind: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        kind,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn collect_rows<T>(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for row in rows {
        values.push(row.context("failed to decode record row")?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::too_many_lines)]

    use super::*;
    use paragon_tracker_core::{RecordFields, Roster};
    use proptest::prelude::*;

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err}"),
        }
    }

    fn fixture_store() -> SqliteRecordStore {
        must(SqliteRecordStore::open_in_memory())
    }

    fn fixture_input(
        my_paragon: &str,
        opp_paragon: &str,
        turn_order: &str,
        result: &str,
        my_mmr: &str,
        date: &str,
    ) -> RecordInput {
        let fields = RecordFields {
            my_paragon: my_paragon.to_string(),
            opp_paragon: opp_paragon.to_string(),
            turn_order: turn_order.to_string(),
            result: result.to_string(),
            my_mmr: my_mmr.to_string(),
            date: date.to_string(),
        };
        match fields.parse(&Roster::unrestricted()) {
            Ok(value) => value,
            Err(err) => panic!("invalid fixture record: {err}"),
        }
    }

    fn default_input() -> RecordInput {
        fixture_input("Arak", "Jahn", "OTP", "WIN", "1200", "01/01/2024")
    }

    fn ids(records: &[MatchRecord]) -> Vec<i64> {
        records.iter().map(|record| record.id).collect()
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let mut store = fixture_store();

        let first = must(store.insert(&default_input()));
        let second = must(store.insert(&fixture_input(
            "Niamh", "Brand", "OTD", "LOSE", "1180", "02/01/2024",
        )));
        assert!(second > first);

        let all = must(store.get_all());
        assert_eq!(ids(&all), vec![first, second]);
        assert_eq!(all[1].my_paragon, "Niamh");
        assert_eq!(all[1].turn_order, TurnOrder::Second);
        assert_eq!(all[1].result, MatchResult::Lose);
        assert_eq!(all[1].my_mmr, Some(1180));
        assert_eq!(all[1].date.to_string(), "02/01/2024");
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let mut store = fixture_store();

        let first = must(store.insert(&default_input()));
        let second = must(store.insert(&default_input()));
        assert_eq!(must(store.delete_by_ids(&[second])), 1);

        let third = must(store.insert(&default_input()));
        assert!(third > second);
        assert_eq!(ids(&must(store.get_all())), vec![first, third]);
    }

    #[test]
    fn delete_is_idempotent_and_skips_missing_ids() {
        let mut store = fixture_store();

        let first = must(store.insert(&default_input()));
        let second = must(store.insert(&default_input()));

        assert_eq!(must(store.delete_by_ids(&[first, 999])), 1);
        assert_eq!(must(store.delete_by_ids(&[first])), 0);
        assert_eq!(ids(&must(store.get_all())), vec![second]);
        assert_eq!(must(store.delete_by_ids(&[])), 0);
    }

    #[test]
    fn update_replaces_only_the_target_row() {
        let mut store = fixture_store();

        let first = must(store.insert(&default_input()));
        let second = must(store.insert(&default_input()));
        let before = must(store.get_by_id(first));

        let replacement = fixture_input("Gaffar", "Aetio", "OTD", "LOSE", "1333", "29/02/2024");
        assert!(must(store.update_by_id(second, &replacement)));

        assert_eq!(must(store.get_by_id(first)), before);
        assert_eq!(
            must(store.get_by_id(second)),
            Some(MatchRecord::from_input(second, &replacement))
        );
    }

    #[test]
    fn update_of_missing_id_is_a_no_op() {
        let mut store = fixture_store();
        let first = must(store.insert(&default_input()));

        let replacement = fixture_input("Gaffar", "Aetio", "OTD", "LOSE", "1333", "29/02/2024");
        assert!(!must(store.update_by_id(first + 1, &replacement)));
        assert_eq!(must(store.count()), 1);
        assert_eq!(
            must(store.get_by_id(first)),
            Some(MatchRecord::from_input(first, &default_input()))
        );
    }

    #[test]
    fn find_by_matches_case_sensitive_substrings() {
        let mut store = fixture_store();

        let arak = must(store.insert(&default_input()));
        let niamh = must(store.insert(&fixture_input(
            "Niamh", "Brand", "OTD", "LOSE", "980", "02/01/2024",
        )));
        let nehemiah = must(store.insert(&fixture_input(
            "Nehemiah", "Arak", "OTP", "WIN", "1250", "03/02/2024",
        )));

        assert_eq!(ids(&must(store.find_by(RecordField::MyParagon, "ra"))), vec![arak]);
        assert!(must(store.find_by(RecordField::MyParagon, "ARAK")).is_empty());
        assert_eq!(
            ids(&must(store.find_by(RecordField::OppParagon, "Arak"))),
            vec![nehemiah]
        );
        assert_eq!(
            ids(&must(store.find_by(RecordField::MyMmr, "12"))),
            vec![arak, nehemiah]
        );
        assert_eq!(
            ids(&must(store.find_by(RecordField::Date, "/01/"))),
            vec![arak, niamh]
        );
        assert_eq!(must(store.find_by(RecordField::Result, "")).len(), 3);
    }

    #[test]
    fn find_by_treats_pattern_as_glob() {
        let mut store = fixture_store();
        let arak = must(store.insert(&default_input()));
        let _ = must(store.insert(&fixture_input(
            "Aetio", "Brand", "OTD", "LOSE", "980", "02/01/2024",
        )));

        assert_eq!(ids(&must(store.find_by(RecordField::MyParagon, "A?a"))), vec![arak]);
    }

    #[test]
    fn find_by_binds_pattern_as_data() {
        let mut store = fixture_store();
        let _ = must(store.insert(&default_input()));

        let hits = must(store.find_by(RecordField::MyParagon, "'; DROP TABLE records; --"));
        assert!(hits.is_empty());
        assert_eq!(must(store.count()), 1);
    }

    #[test]
    fn legacy_text_ratings_are_read_leniently() {
        let store = fixture_store();
        let insert = store.connection().execute(
            "INSERT INTO records(my_paragon, opp_paragon, turn_order, result, my_mmr, date)
             VALUES ('Arak', 'Jahn', 'OTP', 'WIN', 'unknown', '1/1/2024'),
                    ('Arak', 'Jahn', 'OTD', 'LOSE', '1250', '2/1/2024')",
            [],
        );
        if let Err(err) = insert {
            panic!("test failure: {err}");
        }

        let all = must(store.get_all());
        assert_eq!(all[0].my_mmr, None);
        assert_eq!(all[1].my_mmr, Some(1250));
        assert_eq!(all[0].date.to_string(), "01/01/2024");
    }

    #[test]
    fn real_ratings_are_truncated() {
        let store = fixture_store();
        let insert = store.connection().execute(
            "INSERT INTO records(my_paragon, opp_paragon, turn_order, result, my_mmr, date)
             VALUES ('Arak', 'Jahn', 'OTP', 'WIN', 1200.5, '01/01/2024'),
                    ('Arak', 'Jahn', 'OTD', 'LOSE', -3.5, '02/01/2024')",
            [],
        );
        if let Err(err) = insert {
            panic!("test failure: {err}");
        }

        let all = must(store.get_all());
        assert_eq!(all[0].my_mmr, Some(1200));
        assert_eq!(all[1].my_mmr, None);
    }

    #[test]
    fn failed_batch_delete_removes_nothing() {
        let mut store = fixture_store();
        let first = must(store.insert(&default_input()));
        let second = must(store.insert(&default_input()));

        let trigger = store.connection().execute_batch(&format!(
            "CREATE TRIGGER guard_record BEFORE DELETE ON records
             WHEN OLD.id = {second}
             BEGIN SELECT RAISE(ABORT, 'record is locked'); END;"
        ));
        if let Err(err) = trigger {
            panic!("test failure: {err}");
        }

        assert!(store.delete_by_ids(&[first, second]).is_err());
        assert_eq!(must(store.count()), 2);
        assert!(must(store.get_by_id(first)).is_some());
    }

    #[test]
    fn corrupt_turn_order_is_a_decode_error() {
        let store = fixture_store();
        let insert = store.connection().execute(
            "INSERT INTO records(my_paragon, opp_paragon, turn_order, result, my_mmr, date)
             VALUES ('Arak', 'Jahn', 'FIRST', 'WIN', 1200, '01/01/2024')",
            [],
        );
        if let Err(err) = insert {
            panic!("test failure: {err}");
        }

        assert!(store.get_all().is_err());
    }

    #[test]
    fn reopening_a_file_keeps_records() {
        let path = std::env::temp_dir()
            .join(format!("paragon-store-reopen-{}.sqlite3", ulid::Ulid::new()));

        {
            let mut store = must(SqliteRecordStore::open(&path));
            must(store.ensure_schema());
            let _ = must(store.insert(&default_input()));
        }

        let store = must(SqliteRecordStore::open(&path));
        must(store.ensure_schema());
        assert_eq!(must(store.count()), 1);

        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_get_all_is_sorted_after_mixed_mutations(
            ops in prop::collection::vec((0u8..3, 0usize..8), 1..40)
        ) {
            let mut store = fixture_store();
            let mut live: Vec<i64> = Vec::new();
            let mut max_id = 0;

            for (op, pick) in ops {
                match op {
                    0 => {
                        let id = must(store.insert(&default_input()));
                        prop_assert!(id > max_id);
                        max_id = id;
                        live.push(id);
                    }
                    1 if !live.is_empty() => {
                        let id = live.remove(pick % live.len());
                        prop_assert_eq!(must(store.delete_by_ids(&[id])), 1);
                    }
                    _ => {
                        let target = live.get(pick % live.len().max(1)).copied().unwrap_or(-1);
                        let replacement = fixture_input(
                            "Brand", "Scipius", "OTD", "LOSE", "1010", "05/05/2025",
                        );
                        prop_assert_eq!(must(store.update_by_id(target, &replacement)), target > 0);
                    }
                }
            }

            prop_assert_eq!(ids(&must(store.get_all())), live);
        }
    }
}
