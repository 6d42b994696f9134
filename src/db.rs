use anyhow::{Context, Result};
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use tracing::debug;

use crate::config::DbConfig;
use crate::models::{COLUMNS, JobRecord};

/// Rows per multi-row INSERT statement.
pub const INSERT_CHUNK_SIZE: usize = 1000;

/// The operations the pipeline needs from the warehouse database.
pub trait Warehouse {
    fn schema_exists(&mut self, schema: &str) -> Result<bool>;

    /// Check for a table given as `schema.table`.
    fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Run every statement inside one transaction: all commit or none do.
    fn execute_transaction(&mut self, statements: &[String]) -> Result<()>;

    /// Append records to `table` (schema-qualified) in chunks of
    /// `INSERT_CHUNK_SIZE`. All chunks share one transaction of their own,
    /// separate from any earlier truncate: a failed chunk rolls back the
    /// whole insert.
    fn insert_records(&mut self, table: &str, records: &[JobRecord]) -> Result<u64>;

    fn count_rows(&mut self, table: &str) -> Result<i64>;
}

macro_rules! forward_warehouse {
    ($ty:ty) => {
        impl<W: Warehouse + ?Sized> Warehouse for $ty {
            fn schema_exists(&mut self, schema: &str) -> Result<bool> {
                (**self).schema_exists(schema)
            }

            fn table_exists(&mut self, table: &str) -> Result<bool> {
                (**self).table_exists(table)
            }

            fn execute_transaction(&mut self, statements: &[String]) -> Result<()> {
                (**self).execute_transaction(statements)
            }

            fn insert_records(&mut self, table: &str, records: &[JobRecord]) -> Result<u64> {
                (**self).insert_records(table, records)
            }

            fn count_rows(&mut self, table: &str) -> Result<i64> {
                (**self).count_rows(table)
            }
        }
    };
}

forward_warehouse!(&mut W);
forward_warehouse!(Box<W>);

pub struct PgWarehouse {
    client: Client,
}

impl PgWarehouse {
    pub fn connect(config: &DbConfig) -> Result<Self> {
        debug!(db = %config, "connecting to warehouse");
        let client = config
            .pg_config()
            .connect(NoTls)
            .with_context(|| format!("Failed to connect to {}", config))?;
        Ok(Self { client })
    }
}

impl Warehouse for PgWarehouse {
    fn schema_exists(&mut self, schema: &str) -> Result<bool> {
        let row = self
            .client
            .query_opt(
                "SELECT 1 FROM information_schema.schemata WHERE schema_name = $1 LIMIT 1",
                &[&schema],
            )
            .with_context(|| format!("Failed to check for schema {}", schema))?;
        Ok(row.is_some())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let (schema, name) = table.split_once('.').unwrap_or(("public", table));
        let row = self
            .client
            .query_opt(
                "SELECT 1 FROM information_schema.tables
                 WHERE table_schema = $1 AND table_name = $2 LIMIT 1",
                &[&schema, &name],
            )
            .with_context(|| format!("Failed to check for table {}", table))?;
        Ok(row.is_some())
    }

    fn execute_transaction(&mut self, statements: &[String]) -> Result<()> {
        let mut tx = self.client.transaction()?;
        for stmt in statements {
            tx.batch_execute(stmt)
                .with_context(|| format!("Failed to execute statement: {}", stmt))?;
        }
        tx.commit().context("Failed to commit transaction")?;
        Ok(())
    }

    fn insert_records(&mut self, table: &str, records: &[JobRecord]) -> Result<u64> {
        let mut tx = self.client.transaction()?;
        let mut inserted = 0;
        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let sql = insert_statement(table, chunk.len());
            let mut params: Vec<&(dyn ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLUMNS.len());
            for record in chunk {
                params.push(&record.job_id);
                params.push(&record.internal_job_id);
                params.push(&record.absolute_url);
                params.push(&record.title);
                params.push(&record.department);
                params.push(&record.location);
                params.push(&record.company_name);
                params.push(&record.open_date);
                params.push(&record.close_date);
            }
            inserted += tx
                .execute(sql.as_str(), &params)
                .with_context(|| format!("Failed to insert {} rows into {}", chunk.len(), table))?;
        }
        tx.commit()
            .with_context(|| format!("Failed to commit insert into {}", table))?;
        Ok(inserted)
    }

    fn count_rows(&mut self, table: &str) -> Result<i64> {
        let row = self
            .client
            .query_one(format!("SELECT COUNT(*) FROM {}", table).as_str(), &[])
            .with_context(|| format!("Failed to count rows in {}", table))?;
        Ok(row.get(0))
    }
}

/// Build `INSERT INTO table (...) VALUES ($1, ..., $9), ($10, ...)`.
pub fn insert_statement(table: &str, rows: usize) -> String {
    let width = COLUMNS.len();
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        COLUMNS.join(", "),
        tuples.join(", ")
    )
}
