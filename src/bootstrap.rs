use std::fmt;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::info;

/// A companion tool the warehouse workflow expects on `PATH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub capability: &'static str,
    pub program: &'static str,
    pub package: &'static str,
    /// Extra `cargo install` flags, e.g. to build a single database backend.
    pub install_args: &'static [&'static str],
}

impl Requirement {
    pub fn to_package(&self) -> Package {
        Package {
            name: self.package.to_string(),
            args: self.install_args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

pub static REQUIREMENTS: [Requirement; 4] = [
    Requirement {
        capability: "tabular data",
        program: "xsv",
        package: "xsv",
        install_args: &[],
    },
    Requirement {
        capability: "sql toolkit",
        program: "sqlx",
        package: "sqlx-cli",
        install_args: &["--no-default-features", "--features", "rustls,postgres"],
    },
    // Default features also link libmysqlclient and sqlite
    Requirement {
        capability: "database driver",
        program: "diesel",
        package: "diesel_cli",
        install_args: &["--no-default-features", "--features", "postgres"],
    },
    Requirement {
        capability: "env loader",
        program: "dotenv-linter",
        package: "dotenv-linter",
        install_args: &[],
    },
];

/// One installable crate plus the flags it is installed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub args: Vec<String>,
}

impl Package {
    /// Parse a manifest line: crate name first, install flags after it.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?.to_string();
        Some(Self {
            name,
            args: words.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Installer command `{command}` exited with code {code}")]
    InstallFailed { command: String, code: i32 },

    #[error("Required tools still unavailable after installation: {}", .0.join(", "))]
    StillMissing(Vec<String>),
}

impl BootstrapError {
    /// Process exit code the orchestrator should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::InstallFailed { code, .. } => *code,
            BootstrapError::StillMissing(_) => 1,
        }
    }
}

pub trait Toolchain {
    fn is_available(&self, program: &str) -> bool;

    /// Install one package; a non-zero exit must come back as
    /// `BootstrapError::InstallFailed`.
    fn install(&self, package: &Package) -> Result<()>;
}

/// Checks with `<program> --version`; installs each package with its own
/// `cargo install --locked <flags> <crate>` so flags never leak across crates.
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    installer: String,
    installer_args: Vec<String>,
}

impl Default for SystemToolchain {
    fn default() -> Self {
        Self {
            installer: "cargo".to_string(),
            installer_args: vec!["install".to_string(), "--locked".to_string()],
        }
    }
}

impl SystemToolchain {
    /// Arguments passed to the installer for `package`.
    pub fn install_args(&self, package: &Package) -> Vec<String> {
        let mut args = self.installer_args.clone();
        args.extend(package.args.iter().cloned());
        args.push(package.name.clone());
        args
    }
}

impl Toolchain for SystemToolchain {
    fn is_available(&self, program: &str) -> bool {
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn install(&self, package: &Package) -> Result<()> {
        let args = self.install_args(package);
        let command = format!("{} {}", self.installer, args.join(" "));
        info!("$ {}", command);

        let status = Command::new(&self.installer)
            .args(&args)
            .status()
            .with_context(|| format!("Failed to run `{}`", command))?;

        if !status.success() {
            // Killed by a signal: no code to forward
            let code = status.code().unwrap_or(1);
            return Err(BootstrapError::InstallFailed { command, code }.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    NothingToDo,
    Installed { packages: Vec<Package> },
}

/// Read packages from a manifest: one per line, crate name then optional
/// install flags; `#` starts a comment.
pub fn read_manifest(path: &Path) -> Result<Vec<Package>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tools manifest: {}", path.display()))?;

    Ok(content
        .lines()
        .filter_map(|line| Package::parse(line.split('#').next().unwrap_or("")))
        .collect())
}

fn missing_programs(toolchain: &dyn Toolchain) -> Vec<&'static Requirement> {
    REQUIREMENTS
        .iter()
        .filter(|req| !toolchain.is_available(req.program))
        .collect()
}

/// Make sure every required tool is present, installing if needed.
///
/// A manifest at `manifest` is preferred over the built-in package list.
/// Packages install one at a time; the first failure stops the bootstrap.
pub fn ensure_requirements(
    toolchain: &dyn Toolchain,
    manifest: &Path,
) -> Result<BootstrapOutcome> {
    let missing = missing_programs(toolchain);
    if missing.is_empty() {
        info!("ZenHarmony packages initialized: installation not required");
        return Ok(BootstrapOutcome::NothingToDo);
    }

    let names: Vec<String> = missing
        .iter()
        .map(|req| format!("{} ({})", req.program, req.capability))
        .collect();
    info!("ZenHarmony packages missing: {}", names.join(", "));

    let packages = if manifest.is_file() {
        info!("Installing from {}", manifest.display());
        read_manifest(manifest)?
    } else {
        info!("{} not found: installing minimal ZenHarmony package set", manifest.display());
        REQUIREMENTS.iter().map(Requirement::to_package).collect()
    };

    for package in &packages {
        toolchain.install(package)?;
    }

    let still_missing: Vec<String> = missing_programs(toolchain)
        .iter()
        .map(|req| req.program.to_string())
        .collect();
    if !still_missing.is_empty() {
        return Err(BootstrapError::StillMissing(still_missing).into());
    }

    Ok(BootstrapOutcome::Installed { packages })
}
