use anyhow::Result;
use tracing::info;

use crate::bootstrap::{self, BootstrapOutcome, Toolchain};
use crate::config::Settings;
use crate::current::{self, BoardClient};
use crate::db::{PgWarehouse, Warehouse};
use crate::history;
use crate::loader::{LoadSummary, SinkTable};
use crate::schema::{self, SchemaStatus, SetupOutcome};

/// Opens a fresh warehouse connection for each component.
pub type Connector<'a> = Box<dyn Fn() -> Result<Box<dyn Warehouse>> + 'a>;

/// Sequences the pipeline components over one immutable `Settings`.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    connector: Connector<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub bootstrap: Option<BootstrapOutcome>,
    pub setup: SetupOutcome,
    pub history: LoadSummary,
    pub current: Option<LoadSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub schemas: Vec<SchemaStatus>,
    /// Row count per sink table, `None` when the table does not exist.
    pub tables: Vec<(SinkTable, Option<i64>)>,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        let connector: Connector<'a> = Box::new(move || {
            let wh = PgWarehouse::connect(&settings.db)?;
            Ok(Box::new(wh) as Box<dyn Warehouse>)
        });
        Self::with_connector(settings, connector)
    }

    pub fn with_connector(settings: &'a Settings, connector: Connector<'a>) -> Self {
        Self {
            settings,
            connector,
        }
    }

    fn connect(&self) -> Result<Box<dyn Warehouse>> {
        (self.connector)()
    }

    pub fn bootstrap(&self, toolchain: &dyn Toolchain) -> Result<BootstrapOutcome> {
        bootstrap::ensure_requirements(toolchain, &self.settings.layout.tools_manifest())
    }

    pub fn setup(&self) -> Result<SetupOutcome> {
        let mut wh = self.connect()?;
        schema::ensure_structure(&mut *wh, &self.settings.layout)
    }

    pub fn load_history(&self) -> Result<LoadSummary> {
        history::run(
            &self.settings.layout.history_csv(),
            &self.settings.company_name,
            || self.connect(),
        )
    }

    pub fn load_current(&self) -> Result<Option<LoadSummary>> {
        let board = BoardClient::new(self.settings.api_url.as_str())?;
        current::run(&board, &self.settings.company_name, || self.connect())
    }

    pub fn status(&self) -> Result<StatusReport> {
        let mut wh = self.connect()?;
        let schemas = schema::schema_status(&mut *wh)?;

        let mut tables = Vec::new();
        for table in SinkTable::ALL {
            let rows = if wh.table_exists(table.qualified_name())? {
                Some(wh.count_rows(table.qualified_name())?)
            } else {
                None
            };
            tables.push((table, rows));
        }

        Ok(StatusReport { schemas, tables })
    }

    /// Bootstrap, schema setup, history load, current load; the first
    /// failure aborts the run. Pass no toolchain to skip the bootstrap.
    pub fn run(&self, toolchain: Option<&dyn Toolchain>) -> Result<RunReport> {
        info!(db = %self.settings.db, "Starting ZenHarmony orchestration");

        let bootstrap = match toolchain {
            Some(toolchain) => Some(self.bootstrap(toolchain)?),
            None => None,
        };
        let setup = self.setup()?;
        let history = self.load_history()?;
        let current = self.load_current()?;

        info!("ZenHarmony environment orchestration successful");
        Ok(RunReport {
            bootstrap,
            setup,
            history,
            current,
        })
    }
}
