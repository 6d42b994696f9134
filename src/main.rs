mod bootstrap;
mod config;
mod current;
mod db;
mod history;
mod loader;
mod logging;
mod models;
mod pipeline;
mod schema;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bootstrap::{BootstrapError, BootstrapOutcome, SystemToolchain, Toolchain};
use config::{ProjectLayout, Settings};
use loader::LoadSummary;
use pipeline::Pipeline;
use schema::SetupOutcome;

#[derive(Parser)]
#[command(name = "zenharmony")]
#[command(
    about = "Provision the recruitment warehouse and load job postings into its bronze layer"
)]
struct Cli {
    /// Directory holding the env file, tools manifest and pipeline tree
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Env file with the PG_* connection keys [default: <project-root>/.env.zenharmony]
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap, create the schemas, then load history and current jobs
    Run {
        /// Do not check for or install companion tools
        #[arg(long)]
        skip_bootstrap: bool,
    },

    /// Check companion tools and install any that are missing
    Bootstrap,

    /// Create the warehouse schemas unless they already exist
    Setup,

    /// Load the historical CSV export into zen_bronze.raw_history
    History,

    /// Load the live job board into zen_bronze.raw_current
    Current,

    /// Show which schemas and sink tables exist
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<BootstrapError>()
                .map(BootstrapError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let layout = ProjectLayout::new(cli.project_root);
    let env_file = cli.env_file;
    let load_settings = || Settings::load(layout.clone(), env_file.clone());

    let command = cli.command.unwrap_or(Commands::Run {
        skip_bootstrap: false,
    });

    match command {
        Commands::Run { skip_bootstrap } => {
            let settings = load_settings()?;
            let pipeline = Pipeline::new(&settings);

            let toolchain = SystemToolchain::default();
            let toolchain: Option<&dyn Toolchain> = if skip_bootstrap {
                None
            } else {
                Some(&toolchain)
            };
            let report = pipeline.run(toolchain)?;

            if let Some(outcome) = &report.bootstrap {
                print_bootstrap(outcome);
            }
            print_setup(&report.setup);
            print_load(Some(&report.history));
            print_load(report.current.as_ref());
        }

        // Needs no database, so no env file either
        Commands::Bootstrap => {
            let toolchain = SystemToolchain::default();
            let outcome = bootstrap::ensure_requirements(&toolchain, &layout.tools_manifest())?;
            print_bootstrap(&outcome);
        }

        Commands::Setup => {
            let settings = load_settings()?;
            let outcome = Pipeline::new(&settings).setup()?;
            print_setup(&outcome);
        }

        Commands::History => {
            let settings = load_settings()?;
            let summary = Pipeline::new(&settings).load_history()?;
            print_load(Some(&summary));
        }

        Commands::Current => {
            let settings = load_settings()?;
            let summary = Pipeline::new(&settings).load_current()?;
            print_load(summary.as_ref());
        }

        Commands::Status => {
            let settings = load_settings()?;
            let report = Pipeline::new(&settings).status()?;

            println!("Warehouse: {}", settings.db);
            println!();
            println!("{:<28} {:>10}", "SCHEMA", "STATE");
            println!("{}", "-".repeat(39));
            for status in &report.schemas {
                let state = if status.present { "present" } else { "missing" };
                println!("{:<28} {:>10}", status.schema, state);
            }
            println!();
            println!("{:<28} {:>10}", "TABLE", "ROWS");
            println!("{}", "-".repeat(39));
            for (table, rows) in &report.tables {
                let rows = rows.map_or_else(|| "-".to_string(), |n| n.to_string());
                println!("{:<28} {:>10}", table.qualified_name(), rows);
            }
        }
    }

    Ok(())
}

fn print_load(summary: Option<&LoadSummary>) {
    match summary {
        Some(summary) => println!(
            "Loaded {} rows into {}",
            summary.rows,
            summary.table.qualified_name()
        ),
        None => println!("No current jobs found."),
    }
}

fn print_bootstrap(outcome: &BootstrapOutcome) {
    match outcome {
        BootstrapOutcome::NothingToDo => println!("All companion tools present."),
        BootstrapOutcome::Installed { packages } => {
            let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
            println!("Installed: {}", names.join(", "))
        }
    }
}

fn print_setup(outcome: &SetupOutcome) {
    match outcome {
        SetupOutcome::AlreadyInitialized => {
            println!("Warehouse schemas already present, nothing to create.")
        }
        SetupOutcome::Applied {
            scripts,
            statements,
        } => println!("Applied {} SQL scripts ({} statements).", scripts, statements),
    }
}
