//! Text and JSON rendering of analysis results

use anyhow::{Context, Result};
use clap::ValueEnum;
use depgraph_core::{Diagnostic, DiagnosticKind};
use depgraph_graph::{Analysis, DependencyGraph, EdgeRelation};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct RejectedUnitReport<'a> {
    unit_id: &'a str,
    error: String,
}

#[derive(Debug, Serialize)]
struct AnalysisReport<'a> {
    summary: depgraph_graph::GraphSummary,
    rejected_units: Vec<RejectedUnitReport<'a>>,
}

#[derive(Debug, Serialize)]
struct RelationReport<'a> {
    subject: &'a str,
    relation: EdgeRelation,
    related: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UnusedImportReport<'a> {
    unit_id: &'a str,
    line: usize,
    raw_path: &'a str,
    canonical_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_name: Option<&'a str>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize report")
}

pub fn analysis_report(analysis: &Analysis, format: OutputFormat) -> Result<String> {
    let graph = &analysis.graph;
    match format {
        OutputFormat::Json => to_json(&AnalysisReport {
            summary: graph.summary(),
            rejected_units: analysis
                .rejected_units
                .iter()
                .map(|r| RejectedUnitReport {
                    unit_id: &r.unit_id,
                    error: r.error.to_string(),
                })
                .collect(),
        }),
        OutputFormat::Text => {
            let stats = graph.stats();
            let mut out = String::new();
            writeln!(out, "Dependency Graph")?;
            writeln!(out, "================")?;
            writeln!(out, "Units:        {}", stats.units)?;
            writeln!(
                out,
                "Packages:     {} ({} unresolved)",
                stats.packages, stats.unresolved_packages
            )?;
            writeln!(out, "Edges:        {}", stats.edges)?;
            writeln!(out, "Bindings:     {}", stats.bindings)?;
            writeln!(out, "Diagnostics:  {}", stats.diagnostics)?;

            for unit_id in graph.units() {
                writeln!(out)?;
                writeln!(out, "{unit_id}")?;
                for canonical_id in graph.dependencies_of(unit_id) {
                    let origin = graph
                        .package(&canonical_id)
                        .map(|p| p.origin().to_string())
                        .unwrap_or_default();
                    writeln!(out, "  {} {canonical_id} [{origin}]", EdgeRelation::Imports)?;
                }
            }

            if !analysis.rejected_units.is_empty() {
                writeln!(out)?;
                writeln!(out, "Rejected units:")?;
                for rejected in &analysis.rejected_units {
                    writeln!(out, "  {}: {}", rejected.unit_id, rejected.error)?;
                }
            }
            Ok(out)
        }
    }
}

pub fn dependencies_report(
    graph: &DependencyGraph,
    unit_id: &str,
    transitive: bool,
    format: OutputFormat,
) -> Result<String> {
    let related = if transitive {
        graph.transitive_dependencies(unit_id)
    } else {
        graph.dependencies_of(unit_id)
    };
    relation_report(unit_id, EdgeRelation::Imports, related.into_iter().collect(), format)
}

pub fn dependents_report(
    graph: &DependencyGraph,
    canonical_id: &str,
    format: OutputFormat,
) -> Result<String> {
    let related = graph.dependents_of(canonical_id).into_iter().collect();
    relation_report(canonical_id, EdgeRelation::ImportedBy, related, format)
}

fn relation_report(
    subject: &str,
    relation: EdgeRelation,
    related: Vec<String>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(&RelationReport {
            subject,
            relation,
            related,
        }),
        OutputFormat::Text => {
            let mut out = String::new();
            if related.is_empty() {
                writeln!(out, "{subject}: no {relation} relations")?;
            }
            for item in related {
                writeln!(out, "{subject} {relation} {item}")?;
            }
            Ok(out)
        }
    }
}

pub fn diagnostics_report(
    graph: &DependencyGraph,
    kind: Option<DiagnosticKind>,
    format: OutputFormat,
) -> Result<String> {
    let diagnostics: Vec<&Diagnostic> = match kind {
        Some(kind) => graph.diagnostics_of_kind(kind),
        None => graph.diagnostics().iter().collect(),
    };

    match format {
        OutputFormat::Json => to_json(&diagnostics),
        OutputFormat::Text => {
            let mut out = String::new();
            for diagnostic in diagnostics {
                writeln!(out, "{diagnostic}")?;
                if !diagnostic.candidates.is_empty() {
                    writeln!(out, "    candidates: {}", diagnostic.candidates.join(", "))?;
                }
            }
            Ok(out)
        }
    }
}

/// Unused imports of one unit, or of every unit when `unit_id` is `None`
pub fn unused_report(
    graph: &DependencyGraph,
    unit_id: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    let units: Vec<&str> = match unit_id {
        Some(unit_id) => vec![unit_id],
        None => graph.units().collect(),
    };

    let unused: Vec<UnusedImportReport<'_>> = units
        .into_iter()
        .flat_map(|unit_id| graph.unused_imports(unit_id))
        .map(|import| UnusedImportReport {
            unit_id: &import.position.unit_id,
            line: import.position.line,
            raw_path: &import.raw_path,
            canonical_id: import.package.canonical_id(),
            local_name: import.local_name.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => to_json(&unused),
        OutputFormat::Text => {
            let mut out = String::new();
            for import in unused {
                writeln!(
                    out,
                    "{}:{} unused import '{}'",
                    import.unit_id, import.line, import.raw_path
                )?;
            }
            Ok(out)
        }
    }
}
