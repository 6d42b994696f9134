use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::config::ProjectLayout;
use crate::db::Warehouse;

pub const WAREHOUSE_SCHEMAS: [&str; 3] = ["zen_bronze", "zen_silver", "zen_gold"];

/// Setup scripts, applied in this order.
pub const SETUP_SCRIPTS: [&str; 4] = [
    "01_schema_setup.sql",
    "02_bronze_layer_setup.sql",
    "03_silver_layer_setup.sql",
    "04_gold_layer_setup.sql",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    AlreadyInitialized,
    Applied { scripts: usize, statements: usize },
}

/// Create the bronze/silver/gold structure unless all three schemas exist.
///
/// Every script path is resolved before the first one runs. Each script is
/// its own transaction, so a failure in script N leaves 1..N-1 committed.
pub fn ensure_structure(wh: &mut dyn Warehouse, layout: &ProjectLayout) -> Result<SetupOutcome> {
    let mut all_present = true;
    for schema in WAREHOUSE_SCHEMAS {
        all_present &= wh.schema_exists(schema)?;
    }

    if all_present {
        info!("ZenHarmony schemas initialized: DB structure creation not required");
        return Ok(SetupOutcome::AlreadyInitialized);
    }

    info!("Running ZenHarmony DB setup scripts");
    let preferred = layout.sql_dir();
    let fallback = layout.sql_fallback_dir();
    let scripts = SETUP_SCRIPTS
        .iter()
        .map(|name| resolve_script(&preferred, &fallback, name))
        .collect::<Result<Vec<_>>>()?;

    let mut statements = 0;
    for path in &scripts {
        statements += apply_script(wh, path)?;
    }

    info!(scripts = scripts.len(), statements, "ZenHarmony database structure initialized");
    Ok(SetupOutcome::Applied {
        scripts: scripts.len(),
        statements,
    })
}

/// Prefer `preferred/name`, else `fallback/name`; error if neither exists.
pub fn resolve_script(preferred: &Path, fallback: &Path, name: &str) -> Result<PathBuf> {
    [preferred.join(name), fallback.join(name)]
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| {
            anyhow!(
                "Missing SQL file: {} (looked in {} and {})",
                name,
                preferred.display(),
                fallback.display()
            )
        })
}

/// Split on `;`, dropping blank fragments. Semicolons inside literals or
/// function bodies are not special-cased.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run one script as a single transaction; returns the statement count.
pub fn apply_script(wh: &mut dyn Warehouse, path: &Path) -> Result<usize> {
    let sql = fs::read_to_string(path)
        .with_context(|| format!("Failed to read SQL file: {}", path.display()))?;

    let statements = split_statements(&sql);
    if statements.is_empty() {
        return Ok(0);
    }

    let name = path.file_name().unwrap_or_default().to_string_lossy();
    info!(script = %name, statements = statements.len(), "Applying SQL");
    wh.execute_transaction(&statements)
        .with_context(|| format!("Failed to apply SQL file: {}", path.display()))?;
    Ok(statements.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    pub schema: &'static str,
    pub present: bool,
}

pub fn schema_status(wh: &mut dyn Warehouse) -> Result<Vec<SchemaStatus>> {
    WAREHOUSE_SCHEMAS
        .into_iter()
        .map(|schema| {
            Ok(SchemaStatus {
                schema,
                present: wh.schema_exists(schema)?,
            })
        })
        .collect()
}
