//! Analysis pipeline over a set of compilation units
//!
//! Each unit is processed independently: its declarations are folded into a
//! namespace table, its uses resolved and the result committed. Units run
//! concurrently, bounded by `max_concurrent_units`, and the builder is frozen
//! once every commit has returned.

use crate::builder::GraphBuilder;
use crate::namespace::NamespaceTable;
use crate::query::DependencyGraph;
use crate::resolver::PackageResolver;
use depgraph_core::{CompilationUnit, Config, Error, RepositoryLayout, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A unit the pipeline could not commit, with the reason
#[derive(Debug)]
pub struct RejectedUnit {
    pub unit_id: String,
    pub error: Error,
}

/// Outcome of one analysis run
#[derive(Debug)]
pub struct Analysis {
    pub graph: DependencyGraph,
    /// Units dropped before commit (duplicate ids, foreign records, language mismatch)
    pub rejected_units: Vec<RejectedUnit>,
}

/// Build the unit's namespace table, resolve its uses and commit it
pub fn analyze_unit(
    resolver: &PackageResolver,
    builder: &GraphBuilder,
    unit: &CompilationUnit,
) -> Result<()> {
    unit.validate()?;
    let layout_language = resolver.layout().language();
    if let Some(language) = unit.language.filter(|l| *l != layout_language) {
        return Err(Error::parse(
            &unit.unit_id,
            format!("{language} unit cannot be resolved against a {layout_language} layout"),
        ));
    }
    let table = NamespaceTable::from_declarations(
        resolver,
        &unit.unit_id,
        unit.package_path.as_deref(),
        &unit.imports,
    )?;
    builder.commit_unit(&unit.unit_id, table, &unit.uses)?;
    Ok(())
}

/// Analyze `units` one after another on the current thread
pub fn analyze_units_blocking(
    layout: RepositoryLayout,
    units: &[CompilationUnit],
    check_member_exports: bool,
) -> Result<Analysis> {
    let builder = GraphBuilder::for_layout(&layout).check_member_exports(check_member_exports);
    let resolver = PackageResolver::new(layout);

    let mut rejected_units = Vec::new();
    for unit in units {
        if let Err(error) = analyze_unit(&resolver, &builder, unit) {
            warn!(unit = %unit.unit_id, %error, "Rejected compilation unit");
            rejected_units.push(RejectedUnit {
                unit_id: unit.unit_id.clone(),
                error,
            });
        }
    }

    let graph = builder.freeze()?;
    Ok(Analysis {
        graph,
        rejected_units,
    })
}

/// Analyze `units` concurrently on the blocking thread pool
pub async fn analyze_units(
    layout: RepositoryLayout,
    units: Vec<CompilationUnit>,
    config: &Config,
) -> Result<Analysis> {
    let max_concurrent = config.analysis.max_concurrent_units.max(1);
    let builder = Arc::new(GraphBuilder::from_config(&layout, config));
    let resolver = Arc::new(PackageResolver::new(layout));
    let total = units.len();

    info!(
        "Analyzing {} compilation units with concurrency {}",
        total, max_concurrent
    );

    let results = stream::iter(units)
        .map(|unit| {
            let resolver = Arc::clone(&resolver);
            let builder = Arc::clone(&builder);
            async move {
                let unit_id = unit.unit_id.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    analyze_unit(&resolver, &builder, &unit)
                })
                .await
                .map_err(|e| Error::internal(format!("unit task failed: {e}")))
                .and_then(|result| result);
                (unit_id, outcome)
            }
        })
        .buffer_unordered(max_concurrent)
        .collect::<Vec<_>>()
        .await;

    let mut rejected_units = Vec::new();
    for (unit_id, outcome) in results {
        match outcome {
            Ok(()) => debug!(unit = %unit_id, "Unit analyzed"),
            Err(error) => {
                warn!(unit = %unit_id, %error, "Rejected compilation unit");
                rejected_units.push(RejectedUnit { unit_id, error });
            }
        }
    }
    rejected_units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

    let graph = builder.freeze()?;
    info!(
        "Analysis complete: {} units committed, {} rejected, {} packages, {} diagnostics",
        total - rejected_units.len(),
        rejected_units.len(),
        resolver.snapshot().len(),
        graph.diagnostics().len()
    );

    Ok(Analysis {
        graph,
        rejected_units,
    })
}
