//! Read-only queries over a frozen dependency graph
//!
//! The graph owns every package node and edge. Units point at packages; the
//! package-to-unit direction is a derived index built once at freeze time.

use crate::builder::UnitRecord;
use crate::types::{
    DeclaredImport, DependencyEdge, EdgeRelation, NamespaceBinding, PackageOrigin,
    ResolvedPackage,
};
use depgraph_core::{sort_diagnostics, BindingKind, Diagnostic, DiagnosticKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Per-unit view retained in the frozen graph
#[derive(Debug)]
struct UnitView {
    package_path: Option<String>,
    bindings: Vec<NamespaceBinding>,
    imports: Vec<DeclaredImport>,
    edges: Vec<DependencyEdge>,
}

/// Aggregate counts over a frozen graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub units: usize,
    pub packages: usize,
    pub unresolved_packages: usize,
    pub edges: usize,
    pub bindings: usize,
    pub diagnostics: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub canonical_id: String,
    pub origin: PackageOrigin,
    pub relation: EdgeRelation,
    pub units: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub unit_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
    pub relation: EdgeRelation,
    pub packages: Vec<String>,
}

/// Serializable snapshot of a frozen graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub stats: GraphStats,
    pub units: Vec<UnitSummary>,
    pub packages: Vec<PackageSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Immutable result of an analysis run
#[derive(Debug, Default)]
pub struct DependencyGraph {
    packages: BTreeMap<String, Arc<ResolvedPackage>>,
    units: BTreeMap<String, UnitView>,
    diagnostics: Vec<Diagnostic>,
    dependents: BTreeMap<String, BTreeSet<String>>,
    package_members: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub(crate) fn from_units(records: Vec<(String, UnitRecord)>) -> Self {
        let mut graph = Self::default();

        for (unit_id, record) in records {
            for import in &record.imports {
                graph
                    .packages
                    .entry(import.package.canonical_id().to_string())
                    .or_insert_with(|| Arc::clone(&import.package));
            }
            for edge in &record.edges {
                graph
                    .packages
                    .entry(edge.canonical_id().to_string())
                    .or_insert_with(|| Arc::clone(&edge.to_package));
                graph
                    .dependents
                    .entry(edge.canonical_id().to_string())
                    .or_default()
                    .insert(unit_id.clone());
            }
            if let Some(package_path) = &record.package_path {
                graph
                    .package_members
                    .entry(package_path.clone())
                    .or_default()
                    .insert(unit_id.clone());
            }

            graph.diagnostics.extend(record.diagnostics);
            graph.units.insert(
                unit_id,
                UnitView {
                    package_path: record.package_path,
                    bindings: record.bindings,
                    imports: record.imports,
                    edges: record.edges,
                },
            );
        }

        // Units arrive in commit order; within a unit, recording order is kept
        sort_diagnostics(&mut graph.diagnostics);
        graph
    }

    /// Canonical ids of the packages `unit_id` depends on
    pub fn dependencies_of(&self, unit_id: &str) -> BTreeSet<String> {
        self.edges_from(unit_id)
            .iter()
            .map(|edge| edge.canonical_id().to_string())
            .collect()
    }

    /// Units with at least one edge into `canonical_id`
    pub fn dependents_of(&self, canonical_id: &str) -> BTreeSet<String> {
        self.dependents
            .get(canonical_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Same answer as [`Self::dependents_of`], computed from the edge list
    pub fn dependents_of_by_scan(&self, canonical_id: &str) -> BTreeSet<String> {
        self.edges()
            .filter(|edge| edge.canonical_id() == canonical_id)
            .map(|edge| edge.from_unit.clone())
            .collect()
    }

    /// How `from` relates to `to`, read from `from`'s side
    ///
    /// A unit `Imports` a package; a package is `ImportedBy` a unit.
    pub fn relation_between(&self, from: &str, to: &str) -> Option<EdgeRelation> {
        let edge_between = |unit_id: &str, canonical_id: &str| {
            self.edges_from(unit_id)
                .iter()
                .find(|edge| edge.canonical_id() == canonical_id)
                .map(DependencyEdge::relation)
        };
        edge_between(from, to).or_else(|| edge_between(to, from).map(EdgeRelation::inverse))
    }

    /// All diagnostics ordered by (unit_id, line)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    pub fn diagnostics_for_unit(&self, unit_id: &str) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.unit_id() == unit_id)
            .collect()
    }

    pub fn package(&self, canonical_id: &str) -> Option<&Arc<ResolvedPackage>> {
        self.packages.get(canonical_id)
    }

    /// Package nodes sorted by canonical id
    pub fn packages(&self) -> impl Iterator<Item = &Arc<ResolvedPackage>> {
        self.packages.values()
    }

    pub fn packages_by_origin(&self, origin: PackageOrigin) -> Vec<&Arc<ResolvedPackage>> {
        self.packages
            .values()
            .filter(|package| package.origin() == origin)
            .collect()
    }

    /// Every edge, grouped by unit in unit id order
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.units.values().flat_map(|unit| unit.edges.iter())
    }

    pub fn edges_from(&self, unit_id: &str) -> &[DependencyEdge] {
        self.units
            .get(unit_id)
            .map(|unit| unit.edges.as_slice())
            .unwrap_or_default()
    }

    pub fn edges_into(&self, canonical_id: &str) -> Vec<&DependencyEdge> {
        self.dependents
            .get(canonical_id)
            .into_iter()
            .flatten()
            .flat_map(|unit_id| self.edges_from(unit_id))
            .filter(|edge| edge.canonical_id() == canonical_id)
            .collect()
    }

    pub fn bindings_of(&self, unit_id: &str) -> &[NamespaceBinding] {
        self.units
            .get(unit_id)
            .map(|unit| unit.bindings.as_slice())
            .unwrap_or_default()
    }

    pub fn imports_of(&self, unit_id: &str) -> &[DeclaredImport] {
        self.units
            .get(unit_id)
            .map(|unit| unit.imports.as_slice())
            .unwrap_or_default()
    }

    /// Imports of `unit_id` that no edge was resolved through
    ///
    /// Blank imports are never reported; their edge is the import itself.
    pub fn unused_imports(&self, unit_id: &str) -> Vec<&DeclaredImport> {
        let Some(unit) = self.units.get(unit_id) else {
            return Vec::new();
        };

        unit.imports
            .iter()
            .filter(|import| import.kind != BindingKind::Blank)
            .filter(|import| {
                !unit.edges.iter().any(|edge| {
                    edge.via_binding.as_ref().is_some_and(|binding| {
                        binding.position == import.position
                            && Arc::ptr_eq(binding.target.package(), &import.package)
                    })
                })
            })
            .collect()
    }

    /// Committed unit ids in order
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn package_path_of(&self, unit_id: &str) -> Option<&str> {
        self.units
            .get(unit_id)
            .and_then(|unit| unit.package_path.as_deref())
    }

    pub fn units_in_package(&self, package_path: &str) -> BTreeSet<String> {
        self.package_members
            .get(package_path)
            .cloned()
            .unwrap_or_default()
    }

    /// Packages reachable from `unit_id` through local packages' member units
    pub fn transitive_dependencies(&self, unit_id: &str) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut visited_units = BTreeSet::from([unit_id.to_string()]);
        let mut queue = VecDeque::from([unit_id.to_string()]);

        while let Some(current) = queue.pop_front() {
            for canonical_id in self.dependencies_of(&current) {
                if !reached.insert(canonical_id.clone()) {
                    continue;
                }
                let is_local = self
                    .package(&canonical_id)
                    .is_some_and(|p| p.origin() == PackageOrigin::LocalRepository);
                if !is_local {
                    continue;
                }
                for member in self.units_in_package(&canonical_id) {
                    if visited_units.insert(member.clone()) {
                        queue.push_back(member);
                    }
                }
            }
        }

        reached
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            units: self.units.len(),
            packages: self.packages.len(),
            unresolved_packages: self
                .packages
                .values()
                .filter(|p| p.is_placeholder())
                .count(),
            edges: self.units.values().map(|u| u.edges.len()).sum(),
            bindings: self.units.values().map(|u| u.bindings.len()).sum(),
            diagnostics: self.diagnostics.len(),
        }
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            stats: self.stats(),
            units: self
                .units
                .iter()
                .map(|(unit_id, unit)| UnitSummary {
                    unit_id: unit_id.clone(),
                    package_path: unit.package_path.clone(),
                    relation: EdgeRelation::Imports,
                    packages: self.dependencies_of(unit_id).into_iter().collect(),
                })
                .collect(),
            packages: self
                .packages
                .values()
                .map(|package| PackageSummary {
                    canonical_id: package.canonical_id().to_string(),
                    origin: package.origin(),
                    relation: EdgeRelation::ImportedBy,
                    units: self
                        .dependents_of(package.canonical_id())
                        .into_iter()
                        .collect(),
                })
                .collect(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}
