//! depgraph CLI - import and reference resolution for repository dependency graphs
//!
//! Reads a JSON analysis input (compilation units plus an optional layout),
//! builds the dependency graph and prints the requested view of it.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depgraph::report::{self, OutputFormat};
use depgraph::AnalysisInput;
use depgraph_core::config::Config;
use depgraph_core::{DiagnosticKind, RepositoryLayout};
use depgraph_graph::{analyze_units, Analysis};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "depgraph")]
#[command(about = "Resolve imports and references into a repository dependency graph")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Analysis input (JSON compilation units)
    #[arg(short, long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze all units and print a graph summary
    Analyze,
    /// Packages a unit depends on
    Deps {
        unit_id: String,
        /// Follow local packages through their member units
        #[arg(long)]
        transitive: bool,
    },
    /// Units that depend on a package
    Dependents { canonical_id: String },
    /// Recorded diagnostics, ordered by unit and line
    Diagnostics {
        /// Only show one kind (e.g. unresolved_import)
        #[arg(long, value_parser = parse_diagnostic_kind)]
        kind: Option<DiagnosticKind>,
    },
    /// Imports no use was resolved through
    Unused {
        /// Restrict to one unit
        unit_id: Option<String>,
    },
}

fn parse_diagnostic_kind(value: &str) -> std::result::Result<DiagnosticKind, String> {
    DiagnosticKind::from_str(value).map_err(|_| format!("unknown diagnostic kind '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let Some(command) = cli.command else {
        println!("Run 'depgraph analyze --input <FILE>' to build a graph, or --help for more options");
        return Ok(());
    };

    let input_path = cli
        .input
        .as_deref()
        .context("An analysis input is required (--input <FILE>)")?;
    let analysis = run_analysis(input_path, cli.config.as_deref()).await?;
    let graph = &analysis.graph;

    let output = match command {
        Commands::Analyze => report::analysis_report(&analysis, cli.format)?,
        Commands::Deps {
            unit_id,
            transitive,
        } => report::dependencies_report(graph, &unit_id, transitive, cli.format)?,
        Commands::Dependents { canonical_id } => {
            report::dependents_report(graph, &canonical_id, cli.format)?
        }
        Commands::Diagnostics { kind } => report::diagnostics_report(graph, kind, cli.format)?,
        Commands::Unused { unit_id } => {
            report::unused_report(graph, unit_id.as_deref(), cli.format)?
        }
    };

    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Initialize logging system
///
/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "depgraph_core={level},depgraph_graph={level},{}={level}",
            env!("CARGO_PKG_NAME")
        ))
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Load configuration and input, then analyze every unit
async fn run_analysis(input_path: &Path, config_path: Option<&Path>) -> Result<Analysis> {
    let input = AnalysisInput::load(input_path)?;
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let config = input.apply_to(config)?;

    let layout =
        RepositoryLayout::from_config(&config.layout).context("Failed to build repository layout")?;
    info!(
        "Resolving against module root '{}' ({})",
        layout.module_root(),
        layout.language()
    );

    let analysis = analyze_units(layout, input.units, &config).await?;
    if !analysis.rejected_units.is_empty() {
        warn!(
            "{} compilation units were rejected",
            analysis.rejected_units.len()
        );
    }
    Ok(analysis)
}
