use anyhow::Result;

use crate::db::Warehouse;
use crate::models::JobRecord;

pub const BRONZE_SCHEMA: &str = "zen_bronze";

/// Bronze-layer destination tables. Both share the nine-column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkTable {
    /// Rows from the historical CSV export.
    History,
    /// Rows from the live job-board API.
    Current,
}

impl SinkTable {
    pub const ALL: [SinkTable; 2] = [SinkTable::History, SinkTable::Current];

    pub fn qualified_name(self) -> &'static str {
        match self {
            SinkTable::History => "zen_bronze.raw_history",
            SinkTable::Current => "zen_bronze.raw_current",
        }
    }

    fn create_table_sql(self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
              job_id           BIGINT,
              internal_job_id  BIGINT,
              absolute_url     TEXT,
              title            TEXT,
              department       TEXT,
              location         TEXT,
              company_name     TEXT,
              open_date        DATE,
              close_date       DATE
            )",
            self.qualified_name()
        )
    }

    /// Idempotent DDL followed by the truncate, run as one transaction.
    pub fn prepare_statements(self) -> Vec<String> {
        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", BRONZE_SCHEMA),
            self.create_table_sql(),
            format!("TRUNCATE {}", self.qualified_name()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: SinkTable,
    pub rows: u64,
}

/// Replace the full contents of `table` with `records`.
///
/// The truncate commits before the insert starts and the insert runs in its
/// own transaction: a failure in between, or partway through the insert,
/// leaves the table empty rather than restored or half loaded. Re-running
/// the load is the recovery path.
pub fn replace_contents(
    wh: &mut dyn Warehouse,
    table: SinkTable,
    records: &[JobRecord],
) -> Result<LoadSummary> {
    wh.execute_transaction(&table.prepare_statements())?;
    let rows = wh.insert_records(table.qualified_name(), records)?;

    Ok(LoadSummary { table, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryWarehouse;

    fn record(id: i64) -> JobRecord {
        JobRecord {
            job_id: Some(id),
            internal_job_id: None,
            absolute_url: None,
            title: Some(format!("Job {id}")),
            department: None,
            location: None,
            company_name: "OfferZen".to_string(),
            open_date: None,
            close_date: None,
        }
    }

    #[test]
    fn test_prepare_statements_shape() {
        let stmts = SinkTable::Current.prepare_statements();
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0], "CREATE SCHEMA IF NOT EXISTS zen_bronze");
        assert!(stmts[1].starts_with("CREATE TABLE IF NOT EXISTS zen_bronze.raw_current ("));
        assert!(stmts[1].contains("close_date       DATE"));
        assert_eq!(stmts[2], "TRUNCATE zen_bronze.raw_current");
    }

    #[test]
    fn test_creates_schema_and_table_on_empty_database() {
        let mut wh = MemoryWarehouse::default();
        let summary =
            replace_contents(&mut wh, SinkTable::History, &[record(1), record(2)]).unwrap();

        assert_eq!(summary.rows, 2);
        assert!(wh.has_schema(BRONZE_SCHEMA));
        assert_eq!(wh.count_rows("zen_bronze.raw_history").unwrap(), 2);
    }

    #[test]
    fn test_rerun_does_not_duplicate_rows() {
        let mut wh = MemoryWarehouse::default();
        let records: Vec<JobRecord> = (1..=3).map(record).collect();

        replace_contents(&mut wh, SinkTable::Current, &records).unwrap();
        replace_contents(&mut wh, SinkTable::Current, &records).unwrap();

        assert_eq!(wh.count_rows("zen_bronze.raw_current").unwrap(), 3);
        assert_eq!(wh.insert_calls, 2);
        assert_eq!(wh.rows("zen_bronze.raw_current").unwrap(), &records);
    }

    #[test]
    fn test_tables_are_independent() {
        let mut wh = MemoryWarehouse::default();
        replace_contents(&mut wh, SinkTable::History, &[record(1)]).unwrap();
        replace_contents(&mut wh, SinkTable::Current, &[record(2), record(3)]).unwrap();

        assert_eq!(wh.count_rows("zen_bronze.raw_history").unwrap(), 1);
        assert_eq!(wh.count_rows("zen_bronze.raw_current").unwrap(), 2);
    }

    #[test]
    fn test_truncate_and_insert_are_separate_steps() {
        // Known inconsistency window: the truncate is committed on its own,
        // so a failed insert leaves the table empty.
        struct FailingInsert(MemoryWarehouse);

        impl Warehouse for FailingInsert {
            fn schema_exists(&mut self, schema: &str) -> Result<bool> {
                self.0.schema_exists(schema)
            }
            fn table_exists(&mut self, table: &str) -> Result<bool> {
                self.0.table_exists(table)
            }
            fn execute_transaction(&mut self, statements: &[String]) -> Result<()> {
                self.0.execute_transaction(statements)
            }
            fn insert_records(&mut self, _table: &str, _records: &[JobRecord]) -> Result<u64> {
                Err(anyhow::anyhow!("connection reset"))
            }
            fn count_rows(&mut self, table: &str) -> Result<i64> {
                self.0.count_rows(table)
            }
        }

        let mut wh = MemoryWarehouse::default();
        replace_contents(&mut wh, SinkTable::History, &[record(1), record(2)]).unwrap();

        let mut failing = FailingInsert(wh);
        assert!(replace_contents(&mut failing, SinkTable::History, &[record(3)]).is_err());
        assert_eq!(failing.count_rows("zen_bronze.raw_history").unwrap(), 0);
    }

    #[test]
    fn test_failed_multi_chunk_insert_leaves_table_empty() {
        let mut wh = MemoryWarehouse::default();
        replace_contents(&mut wh, SinkTable::History, &[record(1), record(2)]).unwrap();

        let records: Vec<JobRecord> = (1..=1500).map(record).collect();
        wh.fail_after_rows = Some(1200);
        assert!(replace_contents(&mut wh, SinkTable::History, &records).is_err());
        assert_eq!(wh.count_rows("zen_bronze.raw_history").unwrap(), 0);

        wh.fail_after_rows = None;
        let summary = replace_contents(&mut wh, SinkTable::History, &records).unwrap();
        assert_eq!(summary.rows, 1500);
        assert_eq!(wh.count_rows("zen_bronze.raw_history").unwrap(), 1500);
    }

    #[test]
    fn test_empty_record_set_clears_table() {
        let mut wh = MemoryWarehouse::default();
        replace_contents(&mut wh, SinkTable::History, &[record(1)]).unwrap();
        let summary = replace_contents(&mut wh, SinkTable::History, &[]).unwrap();

        assert_eq!(summary.rows, 0);
        assert_eq!(wh.count_rows("zen_bronze.raw_history").unwrap(), 0);
    }
}
