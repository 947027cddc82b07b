//! st7 CLI: resolve levels and timing setups and cost pattern labels of a
//! test program.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::levels::LevelsQuery;
use commands::timing::TimingQuery;
use manifest::St7Manifest;

#[derive(Parser)]
#[command(name = "st7", version, about = "Levels, timing and pattern resolver for test programs")]
struct Cli {
    /// Log resolution steps to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an st7.toml for a device
    Init {
        /// Device name (default: the current directory's name)
        name: Option<String>,
    },
    /// Resolve a levels setup into supply and pin settings
    Levels {
        #[arg(long)]
        eqnset: u32,
        /// Spec set number within the equation set
        #[arg(long)]
        specset: u32,
        #[arg(long)]
        levelset: u32,
        /// Levels file or levels master file (default: [setup] levels)
        #[arg(long)]
        file: Option<String>,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Resolve a timing set into a period and edge times
    Timing {
        #[arg(long)]
        eqnset: u32,
        /// Spec set number within the equation set
        #[arg(long)]
        specset: u32,
        #[arg(long)]
        timingset: u32,
        /// Timing file or timing master file (default: [setup] timing)
        #[arg(long)]
        file: Option<String>,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Resolve every port of a multi-port specification
    Multiport {
        #[arg(long)]
        specification: String,
        /// One timing set for every port, or one per port in declaration order
        #[arg(long = "timingset", required = true, num_args = 1..)]
        timingsets: Vec<u32>,
        /// Timing file or timing master file (default: [setup] timing)
        #[arg(long)]
        file: Option<String>,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Count vectors and cycles of a pattern label
    Label {
        /// Label name
        name: String,
        /// Pattern master file (default: [setup] patterns)
        #[arg(long)]
        pmf: Option<String>,
        /// Also report rows per pin, using [topology] from st7.toml
        #[arg(long)]
        per_pin: bool,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Log to stderr; `ST7_LOG` holds the filter, `--verbose` forces debug.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("ST7_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => {
            let name = match name {
                Some(name) => name,
                None => cwd
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "device".to_string()),
            };
            commands::init::run(&cwd, &name)
        }

        Commands::Levels {
            eqnset,
            specset,
            levelset,
            file,
            format,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let file = commands::setup_file(
                &cwd,
                project_dir.as_deref(),
                file.as_deref(),
                manifest.as_ref().and_then(|m| m.setup.levels.as_deref()),
                "levels",
            )?;
            let format = commands::resolve_format(format.as_deref(), manifest.as_ref())?;
            let query = LevelsQuery {
                eqnset,
                specset,
                levelset,
            };
            commands::levels::run(&file, query, format)
        }

        Commands::Timing {
            eqnset,
            specset,
            timingset,
            file,
            format,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let file = commands::setup_file(
                &cwd,
                project_dir.as_deref(),
                file.as_deref(),
                manifest.as_ref().and_then(|m| m.setup.timing.as_deref()),
                "timing",
            )?;
            let format = commands::resolve_format(format.as_deref(), manifest.as_ref())?;
            let query = TimingQuery {
                eqnset,
                specset,
                timingset,
            };
            commands::timing::run(&file, query, format)
        }

        Commands::Multiport {
            specification,
            timingsets,
            file,
            format,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let file = commands::setup_file(
                &cwd,
                project_dir.as_deref(),
                file.as_deref(),
                manifest.as_ref().and_then(|m| m.setup.timing.as_deref()),
                "timing",
            )?;
            let format = commands::resolve_format(format.as_deref(), manifest.as_ref())?;
            commands::multiport::run(&file, &specification, &timingsets, format)
        }

        Commands::Label {
            name,
            pmf,
            per_pin,
            format,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let pmf = commands::setup_file(
                &cwd,
                project_dir.as_deref(),
                pmf.as_deref(),
                manifest.as_ref().and_then(|m| m.setup.patterns.as_deref()),
                "patterns",
            )?;
            let format = commands::resolve_format(format.as_deref(), manifest.as_ref())?;
            let device_dir = match (&manifest, &project_dir) {
                (Some(m), Some(dir)) => Some(m.device_dir(dir)),
                _ => None,
            };
            let topology = if per_pin {
                let (manifest, _) = load_manifest_required(&cwd)?;
                Some(manifest.topology()?)
            } else {
                None
            };
            let source = commands::label::PmfSource::load(&pmf, device_dir.as_deref())?;
            commands::label::run(&source, &name, topology.as_ref(), format)
        }
    }
}

/// Load manifest, returning error if not found.
fn load_manifest_required(cwd: &Path) -> anyhow::Result<(St7Manifest, PathBuf)> {
    match St7Manifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((manifest, dir)),
        None => anyhow::bail!("no st7.toml found (run `st7 init` first)"),
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<St7Manifest>, Option<PathBuf>)> {
    match St7Manifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}
