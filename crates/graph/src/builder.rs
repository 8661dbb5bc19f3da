//! Concurrent accumulation of per-unit results into one graph
//!
//! Units are committed independently and in any order. Each commit holds a
//! read lock on the builder state for its whole duration; [`GraphBuilder::freeze`]
//! takes the write lock, so it waits for in-flight commits and no commit can
//! start once it has begun.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use crate::namespace::{Lookup, NamespaceTable};
use crate::query::DependencyGraph;
use crate::types::{BindingTarget, DeclaredImport, DependencyEdge, NamespaceBinding};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use depgraph_core::{
    BindingKind, Config, Diagnostic, DiagnosticKind, Error, RepositoryLayout, Result, SymbolUse,
};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    Open,
    Frozen,
}

/// Everything one committed unit contributed
#[derive(Debug)]
pub(crate) struct UnitRecord {
    pub package_path: Option<String>,
    pub bindings: Vec<NamespaceBinding>,
    pub imports: Vec<DeclaredImport>,
    pub edges: Vec<DependencyEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

/// What a successful commit added
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub unit_id: String,
    pub edges: usize,
    pub diagnostics: usize,
}

#[derive(Debug)]
pub struct GraphBuilder {
    state: RwLock<BuilderState>,
    units: DashMap<String, UnitRecord>,
    qualifier_separator: String,
    check_member_exports: bool,
}

impl GraphBuilder {
    pub fn new(qualifier_separator: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(BuilderState::Open),
            units: DashMap::new(),
            qualifier_separator: qualifier_separator.into(),
            check_member_exports: false,
        }
    }

    pub fn for_layout(layout: &RepositoryLayout) -> Self {
        Self::new(layout.qualifier_separator())
    }

    pub fn from_config(layout: &RepositoryLayout, config: &Config) -> Self {
        Self::for_layout(layout).check_member_exports(config.analysis.check_member_exports)
    }

    /// Report qualified uses of members missing from a known export list.
    /// Off by default: a bound head always yields an edge.
    pub fn check_member_exports(mut self, enabled: bool) -> Self {
        self.check_member_exports = enabled;
        self
    }

    /// Resolve `uses` against `table` and record the unit's edges
    ///
    /// A table still accumulating is frozen here. Committing the same unit
    /// twice fails with `DuplicateUnit` and keeps the first commit.
    pub fn commit_unit(
        &self,
        unit_id: &str,
        mut table: NamespaceTable,
        uses: &[SymbolUse],
    ) -> Result<CommitSummary> {
        let state = self
            .state
            .read()
            .map_err(|_| Error::internal("graph builder state lock poisoned"))?;
        if *state == BuilderState::Frozen {
            return Err(Error::graph_frozen("commit_unit"));
        }

        if table.unit_id() != unit_id {
            return Err(Error::unit_mismatch(unit_id, table.unit_id()));
        }
        if let Some(stray) = uses.iter().find(|u| u.unit_id != unit_id) {
            return Err(Error::unit_mismatch(unit_id, &stray.unit_id));
        }
        if self.units.contains_key(unit_id) {
            return Err(Error::DuplicateUnit(unit_id.to_string()));
        }

        table.freeze();
        let mut edges = Vec::new();
        let mut diagnostics = Vec::new();

        for import in table.imports() {
            if import.kind == BindingKind::Blank {
                edges.push(DependencyEdge {
                    from_unit: unit_id.to_string(),
                    to_package: Arc::clone(&import.package),
                    via_binding: None,
                    symbol: None,
                    use_position: import.position.clone(),
                });
            }
        }

        for symbol_use in uses {
            match self.resolve_use(&table, symbol_use)? {
                Ok(edge) => edges.push(edge),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let parts = table.into_parts();
        let mut all_diagnostics = parts.diagnostics;
        all_diagnostics.append(&mut diagnostics);

        let summary = CommitSummary {
            unit_id: unit_id.to_string(),
            edges: edges.len(),
            diagnostics: all_diagnostics.len(),
        };

        let record = UnitRecord {
            package_path: parts.package_path,
            bindings: parts.bindings,
            imports: parts.imports,
            edges,
            diagnostics: all_diagnostics,
        };

        match self.units.entry(unit_id.to_string()) {
            Entry::Occupied(_) => return Err(Error::DuplicateUnit(unit_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        drop(state);

        debug!(
            unit = %summary.unit_id,
            edges = summary.edges,
            diagnostics = summary.diagnostics,
            "Committed unit"
        );
        Ok(summary)
    }

    /// Resolve one use site to an edge, or to the diagnostic explaining why not
    fn resolve_use(
        &self,
        table: &NamespaceTable,
        symbol_use: &SymbolUse,
    ) -> Result<std::result::Result<DependencyEdge, Diagnostic>> {
        let identifier = symbol_use.identifier.trim();
        let (head, member) = match identifier.split_once(self.qualifier_separator.as_str()) {
            Some((head, rest)) => (
                head,
                rest.split(self.qualifier_separator.as_str())
                    .next()
                    .filter(|m| !m.is_empty()),
            ),
            None => (identifier, None),
        };

        let unresolved = |message: String| {
            Diagnostic::new(
                DiagnosticKind::UnresolvedSymbol,
                symbol_use.position(),
                identifier,
                message,
            )
        };

        if head.is_empty() {
            return Ok(Err(unresolved(format!(
                "'{}' does not name a binding",
                symbol_use.identifier
            ))));
        }

        let binding = match table.lookup(head)? {
            Lookup::Bound(binding) => binding,
            Lookup::Ambiguous(candidates) => {
                return Ok(Err(unresolved(format!(
                    "'{head}' is ambiguous between {} wildcard imports",
                    candidates.len()
                ))
                .with_candidates(candidates.iter().map(|c| c.canonical_id().to_string()))));
            }
            Lookup::Missing => {
                return Ok(Err(unresolved(format!("'{head}' is not bound in this unit"))));
            }
        };

        let symbol = match &binding.target {
            BindingTarget::Package(package) => {
                if let Some(member) = member {
                    if self.check_member_exports
                        && package.exports().contains(member) == Some(false)
                    {
                        return Ok(Err(unresolved(format!(
                            "'{member}' is not exported by '{}'",
                            package.canonical_id()
                        ))
                        .with_candidates([package.canonical_id()])));
                    }
                }
                member.map(str::to_string)
            }
            BindingTarget::Symbol(_, name) => Some(name.clone()),
        };

        Ok(Ok(DependencyEdge {
            from_unit: table.unit_id().to_string(),
            to_package: Arc::clone(binding.target.package()),
            via_binding: Some(binding.clone()),
            symbol,
            use_position: symbol_use.position(),
        }))
    }

    /// Close the builder and hand over the immutable graph
    pub fn freeze(&self) -> Result<DependencyGraph> {
        let mut state = self
            .state
            .write()
            .map_err(|_| Error::internal("graph builder state lock poisoned"))?;
        if *state == BuilderState::Frozen {
            return Err(Error::graph_frozen("freeze"));
        }
        *state = BuilderState::Frozen;

        let unit_ids: Vec<String> = self.units.iter().map(|e| e.key().clone()).collect();
        let units: Vec<(String, UnitRecord)> = unit_ids
            .iter()
            .filter_map(|unit_id| self.units.remove(unit_id))
            .collect();

        let graph = DependencyGraph::from_units(units);
        let stats = graph.stats();
        info!(
            units = stats.units,
            packages = stats.packages,
            edges = stats.edges,
            diagnostics = stats.diagnostics,
            "Froze dependency graph"
        );
        Ok(graph)
    }

    pub fn is_frozen(&self) -> bool {
        self.state
            .read()
            .map(|state| *state == BuilderState::Frozen)
            .unwrap_or(true)
    }

    /// Units committed so far
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PackageResolver;
    use depgraph_core::{ImportDeclaration, Language, SourcePosition};

    fn resolver() -> PackageResolver {
        let layout = match RepositoryLayout::new(Language::Go, "myproject") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        PackageResolver::new(
            layout
                .with_local_package("myproject/utils", ["PrintMessage", "AnotherMessage"])
                .with_local_package("myproject/p", ["X"])
                .with_local_package("myproject/q", ["X"]),
        )
    }

    fn table(unit: &str, declarations: &[ImportDeclaration]) -> NamespaceTable {
        match NamespaceTable::from_declarations(&resolver(), unit, None, declarations) {
            Ok(table) => table,
            Err(e) => panic!("table: {e}"),
        }
    }

    fn commit(
        builder: &GraphBuilder,
        unit: &str,
        declarations: &[ImportDeclaration],
        uses: &[(&str, usize)],
    ) -> Result<CommitSummary> {
        let uses: Vec<SymbolUse> = uses
            .iter()
            .map(|(identifier, line)| SymbolUse::new(unit, *identifier, *line))
            .collect();
        builder.commit_unit(unit, table(unit, declarations), &uses)
    }

    fn pos(line: usize) -> SourcePosition {
        SourcePosition::new("main.go", line)
    }

    #[test]
    fn test_qualified_use_creates_edge() {
        let builder = GraphBuilder::new(".");
        let summary = commit(
            &builder,
            "main.go",
            &[ImportDeclaration::aliased("myproject/utils", "u", pos(3))],
            &[("u.AnotherMessage", 10)],
        );
        assert!(matches!(summary, Ok(CommitSummary { edges: 1, diagnostics: 0, .. })));

        let graph = match builder.freeze() {
            Ok(graph) => graph,
            Err(e) => panic!("freeze: {e}"),
        };
        let edges = graph.edges_from("main.go");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].canonical_id(), "myproject/utils");
        assert_eq!(edges[0].symbol.as_deref(), Some("AnotherMessage"));
    }

    #[test]
    fn test_missing_member_is_unresolved_symbol_when_checked() {
        let strict = GraphBuilder::new(".").check_member_exports(true);
        let summary = commit(
            &strict,
            "main.go",
            &[ImportDeclaration::plain("myproject/utils", pos(3))],
            &[("utils.Nope", 10), ("fmt.Println", 11)],
        );
        assert!(matches!(summary, Ok(CommitSummary { edges: 0, diagnostics: 2, .. })));

        let builder = GraphBuilder::new(".");
        let summary = commit(
            &builder,
            "main.go",
            &[ImportDeclaration::plain("myproject/utils", pos(3))],
            &[("utils.Nope", 10)],
        );
        assert!(matches!(summary, Ok(CommitSummary { edges: 1, diagnostics: 0, .. })));
    }

    #[test]
    fn test_ambiguous_use_produces_no_edge() {
        let builder = GraphBuilder::new(".");
        let summary = commit(
            &builder,
            "main.go",
            &[
                ImportDeclaration::wildcard("myproject/p", pos(3)),
                ImportDeclaration::wildcard("myproject/q", pos(4)),
            ],
            &[("X", 10)],
        );
        // AmbiguousBinding at declaration plus UnresolvedSymbol at use
        assert!(matches!(summary, Ok(CommitSummary { edges: 0, diagnostics: 2, .. })));
    }

    #[test]
    fn test_blank_import_is_side_effect_edge() {
        let builder = GraphBuilder::new(".");
        let summary = commit(
            &builder,
            "main.go",
            &[ImportDeclaration::blank("image/png", pos(3))],
            &[],
        );
        assert!(matches!(summary, Ok(CommitSummary { edges: 1, .. })));
        let graph = match builder.freeze() {
            Ok(graph) => graph,
            Err(e) => panic!("freeze: {e}"),
        };
        assert!(graph.edges_from("main.go")[0].is_side_effect());
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let builder = GraphBuilder::new(".");
        let decl = [ImportDeclaration::plain("fmt", pos(3))];
        assert!(commit(&builder, "main.go", &decl, &[("fmt.Println", 5)]).is_ok());
        let second = commit(&builder, "main.go", &decl, &[]);
        assert!(matches!(second, Err(Error::DuplicateUnit(_))));
        assert_eq!(builder.unit_count(), 1);
    }

    #[test]
    fn test_foreign_use_rejected() {
        let builder = GraphBuilder::new(".");
        let uses = [SymbolUse::new("other.go", "fmt.Println", 4)];
        let result = builder.commit_unit("main.go", table("main.go", &[]), &uses);
        assert!(matches!(result, Err(Error::UnitMismatch { .. })));
        let result = builder.commit_unit("other.go", table("main.go", &[]), &[]);
        assert!(matches!(result, Err(Error::UnitMismatch { .. })));
        assert_eq!(builder.unit_count(), 0);
    }

    #[test]
    fn test_freeze_rejects_later_mutation() {
        let builder = GraphBuilder::new(".");
        assert!(commit(&builder, "a.go", &[], &[]).is_ok());
        assert!(builder.freeze().is_ok());
        assert!(builder.is_frozen());

        let late = commit(&builder, "b.go", &[], &[]);
        assert!(matches!(late, Err(Error::GraphFrozen { .. })));
        assert!(matches!(builder.freeze(), Err(Error::GraphFrozen { .. })));
    }

    #[test]
    fn test_accumulating_table_is_frozen_on_commit() {
        let resolver = resolver();
        let mut table = NamespaceTable::new("main.go", None);
        let declared = table.declare(&resolver, &ImportDeclaration::plain("fmt", pos(3)));
        assert!(declared.is_ok());

        let builder = GraphBuilder::new(".");
        let uses = [SymbolUse::new("main.go", "fmt.Println", 5)];
        let summary = builder.commit_unit("main.go", table, &uses);
        assert!(matches!(summary, Ok(CommitSummary { edges: 1, .. })));
    }
}
