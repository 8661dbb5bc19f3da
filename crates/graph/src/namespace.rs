//! Per-unit namespace table
//!
//! Built by folding a unit's import declarations in source order. Each
//! declaration contributes at most one explicit binding, or, for wildcard
//! imports, one binding per exported name of the target package, computed
//! eagerly so that collisions are detected statically.
//!
//! Collision rules:
//! - explicit vs. earlier explicit (different target): `DuplicateBinding`,
//!   the first declaration wins
//! - wildcard vs. existing explicit: the explicit binding wins silently
//! - explicit vs. existing wildcard or ambiguous name: the explicit binding
//!   shadows it
//! - wildcard vs. wildcard from a different package: `AmbiguousBinding`,
//!   neither wins
//!
//! The table moves Empty -> Accumulating -> Frozen. Inserts are rejected once
//! frozen and lookups are rejected until then.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use crate::resolver::PackageResolver;
use crate::types::{BindingTarget, DeclaredImport, Exports, NamespaceBinding, PackageOrigin};
use depgraph_core::{
    last_segment, BindingKind, Diagnostic, DiagnosticKind, Error, ImportDeclaration, Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum_macros::Display;
use tracing::{debug, warn};

/// Lifecycle state of a namespace table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TableState {
    Empty,
    Accumulating,
    Frozen,
}

#[derive(Debug, Clone)]
enum Slot {
    Bound(NamespaceBinding),
    /// Wildcard-injected from two or more packages; unusable until shadowed
    Ambiguous(Vec<NamespaceBinding>),
}

/// Result of looking up a local name in a frozen table
#[derive(Debug)]
pub enum Lookup<'a> {
    Bound(&'a NamespaceBinding),
    Ambiguous(&'a [NamespaceBinding]),
    Missing,
}

/// Identifier-to-binding map of one compilation unit
#[derive(Debug)]
pub struct NamespaceTable {
    unit_id: String,
    package_path: Option<String>,
    state: TableState,
    slots: BTreeMap<String, Slot>,
    bindings: Vec<NamespaceBinding>,
    imports: Vec<DeclaredImport>,
    diagnostics: Vec<Diagnostic>,
}

/// Owned contents of a frozen table, handed to the graph builder
#[derive(Debug)]
pub(crate) struct TableParts {
    pub package_path: Option<String>,
    pub bindings: Vec<NamespaceBinding>,
    pub imports: Vec<DeclaredImport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl NamespaceTable {
    pub fn new(unit_id: impl Into<String>, package_path: Option<&str>) -> Self {
        Self {
            unit_id: unit_id.into(),
            package_path: package_path.map(str::to_string),
            state: TableState::Empty,
            slots: BTreeMap::new(),
            bindings: Vec::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Fold `declarations` in order and freeze the result
    pub fn from_declarations(
        resolver: &PackageResolver,
        unit_id: &str,
        package_path: Option<&str>,
        declarations: &[ImportDeclaration],
    ) -> Result<Self> {
        let mut table = Self::new(unit_id, package_path);
        for declaration in declarations {
            table.declare(resolver, declaration)?;
        }
        table.freeze();
        Ok(table)
    }

    /// Process one import declaration
    ///
    /// Only protocol misuse is an error (frozen table, foreign declaration).
    /// Everything else is recorded as a diagnostic on the table.
    pub fn declare(
        &mut self,
        resolver: &PackageResolver,
        declaration: &ImportDeclaration,
    ) -> Result<()> {
        if self.state == TableState::Frozen {
            return Err(Error::TableFrozen(self.unit_id.clone()));
        }
        if declaration.position.unit_id != self.unit_id {
            return Err(Error::unit_mismatch(
                &self.unit_id,
                &declaration.position.unit_id,
            ));
        }
        self.state = TableState::Accumulating;

        if !declaration.well_formed() {
            warn!(
                unit = %self.unit_id,
                line = declaration.position.line,
                raw_path = %declaration.raw_path,
                "Skipping malformed import declaration"
            );
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedDeclaration,
                declaration.position.clone(),
                &declaration.raw_path,
                format!(
                    "{} import of '{}' must carry an alias iff it is aliased",
                    declaration.binding_kind, declaration.raw_path
                ),
            ));
            return Ok(());
        }

        let package = match resolver.resolve(&declaration.raw_path, self.package_path.as_deref())
        {
            Ok(package) => package,
            Err(unresolved) => {
                debug!(unit = %self.unit_id, %unresolved, "Import did not resolve");
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedImport,
                    declaration.position.clone(),
                    &declaration.raw_path,
                    unresolved.to_string(),
                ));
                resolver.placeholder(&declaration.raw_path, self.package_path.as_deref())
            }
        };

        let separator = resolver.layout().path_separator();
        let local_name = match declaration.local_name(separator) {
            // `import "."`: name the binding after the resolved package
            Some("." | "..") if declaration.binding_kind == BindingKind::Plain => {
                Some(last_segment(package.canonical_id(), separator))
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            }
            name => name.map(str::to_string),
        };

        self.imports.push(DeclaredImport {
            raw_path: declaration.raw_path.clone(),
            package: package.clone(),
            kind: declaration.binding_kind,
            local_name: local_name.clone(),
            position: declaration.position.clone(),
        });

        match declaration.binding_kind {
            BindingKind::Plain | BindingKind::Aliased => {
                let Some(local_name) = local_name else {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MalformedDeclaration,
                        declaration.position.clone(),
                        &declaration.raw_path,
                        format!("import of '{}' binds no usable name", declaration.raw_path),
                    ));
                    return Ok(());
                };
                self.insert_explicit(NamespaceBinding {
                    local_name,
                    target: BindingTarget::Package(package),
                    kind: declaration.binding_kind,
                    position: declaration.position.clone(),
                });
            }
            BindingKind::Wildcard => match package.exports() {
                Exports::Known(names) => {
                    for name in names {
                        self.inject_wildcard(NamespaceBinding {
                            local_name: name.clone(),
                            target: BindingTarget::Symbol(package.clone(), name.clone()),
                            kind: BindingKind::Wildcard,
                            position: declaration.position.clone(),
                        });
                    }
                }
                // An unresolved placeholder already carries its own diagnostic
                Exports::Opaque if package.origin() == PackageOrigin::Unresolved => {}
                Exports::Opaque => {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::OpaqueWildcard,
                        declaration.position.clone(),
                        &declaration.raw_path,
                        format!(
                            "wildcard import of '{}' injects nothing: its exports are not enumerable",
                            package.canonical_id()
                        ),
                    ));
                }
            },
            // Side-effect import: dependency without a binding
            BindingKind::Blank => {}
        }

        Ok(())
    }

    fn insert_explicit(&mut self, binding: NamespaceBinding) {
        match self.slots.get(&binding.local_name) {
            Some(Slot::Bound(existing)) if existing.is_explicit() => {
                if existing.target.same_as(&binding.target) {
                    debug!(
                        unit = %self.unit_id,
                        name = %binding.local_name,
                        "Redundant import of an already bound name"
                    );
                    return;
                }
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::DuplicateBinding,
                    binding.position.clone(),
                    &binding.local_name,
                    format!(
                        "'{}' is already bound to '{}' on line {}",
                        binding.local_name,
                        existing.canonical_id(),
                        existing.position.line
                    ),
                )
                .with_candidates([existing.canonical_id(), binding.canonical_id()]);
                self.diagnostics.push(diagnostic);
            }
            shadowed => {
                if shadowed.is_some() {
                    debug!(
                        unit = %self.unit_id,
                        name = %binding.local_name,
                        "Explicit import shadows wildcard-injected name"
                    );
                }
                self.bindings.push(binding.clone());
                self.slots
                    .insert(binding.local_name.clone(), Slot::Bound(binding));
            }
        }
    }

    fn inject_wildcard(&mut self, binding: NamespaceBinding) {
        let name = binding.local_name.clone();
        let package = Arc::clone(binding.target.package());
        let from_same_package =
            |other: &NamespaceBinding| Arc::ptr_eq(other.target.package(), &package);

        let mut candidates = match self.slots.remove(&name) {
            None => {
                self.bindings.push(binding.clone());
                self.slots.insert(name, Slot::Bound(binding));
                return;
            }
            Some(Slot::Bound(existing)) if existing.is_explicit() => {
                debug!(unit = %self.unit_id, %name, "Explicit binding wins over wildcard");
                self.slots.insert(name, Slot::Bound(existing));
                return;
            }
            Some(Slot::Bound(existing)) if from_same_package(&existing) => {
                self.slots.insert(name, Slot::Bound(existing));
                return;
            }
            Some(Slot::Ambiguous(existing)) if existing.iter().any(from_same_package) => {
                self.slots.insert(name, Slot::Ambiguous(existing));
                return;
            }
            Some(Slot::Bound(existing)) => vec![existing],
            Some(Slot::Ambiguous(existing)) => existing,
        };

        candidates.push(binding.clone());
        self.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::AmbiguousBinding,
                binding.position.clone(),
                &name,
                format!("'{name}' is injected by more than one wildcard import"),
            )
            .with_candidates(candidates.iter().map(|c| c.canonical_id().to_string())),
        );
        self.bindings.push(binding);
        self.slots.insert(name, Slot::Ambiguous(candidates));
    }

    /// Stop accepting declarations
    pub fn freeze(&mut self) {
        self.state = TableState::Frozen;
    }

    /// Look up a local name; the table must be frozen
    pub fn lookup(&self, name: &str) -> Result<Lookup<'_>> {
        if self.state != TableState::Frozen {
            return Err(Error::TableNotFrozen(self.unit_id.clone()));
        }
        Ok(match self.slots.get(name) {
            Some(Slot::Bound(binding)) => Lookup::Bound(binding),
            Some(Slot::Ambiguous(candidates)) => Lookup::Ambiguous(candidates),
            None => Lookup::Missing,
        })
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn package_path(&self) -> Option<&str> {
        self.package_path.as_deref()
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == TableState::Frozen
    }

    /// Every binding that entered the table, in declaration order
    pub fn bindings(&self) -> &[NamespaceBinding] {
        &self.bindings
    }

    pub fn imports(&self) -> &[DeclaredImport] {
        &self.imports
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of usable local names
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn into_parts(self) -> TableParts {
        TableParts {
            package_path: self.package_path,
            bindings: self.bindings,
            imports: self.imports,
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depgraph_core::{Language, RepositoryLayout, SourcePosition};

    fn resolver() -> PackageResolver {
        let layout = match RepositoryLayout::new(Language::Go, "myproject") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        PackageResolver::new(
            layout
                .with_local_package("myproject/utils", ["PrintMessage", "AnotherMessage"])
                .with_local_package("myproject/p", ["X", "OnlyP"])
                .with_local_package("myproject/q", ["X", "OnlyQ"])
                .with_local_package("myproject/r", ["X"]),
        )
    }

    fn pos(line: usize) -> SourcePosition {
        SourcePosition::new("main.go", line)
    }

    fn build(declarations: &[ImportDeclaration]) -> NamespaceTable {
        match NamespaceTable::from_declarations(&resolver(), "main.go", None, declarations) {
            Ok(table) => table,
            Err(e) => panic!("table: {e}"),
        }
    }

    fn bound<'a>(table: &'a NamespaceTable, name: &str) -> &'a NamespaceBinding {
        match table.lookup(name) {
            Ok(Lookup::Bound(binding)) => binding,
            other => panic!("{name} not bound: {other:?}"),
        }
    }

    fn kinds(table: &NamespaceTable) -> Vec<DiagnosticKind> {
        table.diagnostics().iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_state_machine() {
        let resolver = resolver();
        let mut table = NamespaceTable::new("main.go", None);
        assert_eq!(table.state(), TableState::Empty);
        assert!(matches!(table.lookup("fmt"), Err(Error::TableNotFrozen(_))));

        let declared = table.declare(&resolver, &ImportDeclaration::plain("fmt", pos(3)));
        assert!(declared.is_ok());
        assert_eq!(table.state(), TableState::Accumulating);

        table.freeze();
        assert!(table.is_frozen());
        let late = table.declare(&resolver, &ImportDeclaration::plain("time", pos(4)));
        assert!(matches!(late, Err(Error::TableFrozen(_))));
        assert!(matches!(table.lookup("time"), Ok(Lookup::Missing)));
        assert!(matches!(table.lookup("fmt"), Ok(Lookup::Bound(_))));
    }

    #[test]
    fn test_foreign_declaration_rejected() {
        let resolver = resolver();
        let mut table = NamespaceTable::new("main.go", None);
        let foreign = ImportDeclaration::plain("fmt", SourcePosition::new("other.go", 1));
        assert!(matches!(
            table.declare(&resolver, &foreign),
            Err(Error::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_plain_aliased_and_wildcard_share_package() {
        let table = build(&[
            ImportDeclaration::aliased("myproject/utils", "u", pos(8)),
            ImportDeclaration::wildcard("myproject/utils", pos(9)),
            ImportDeclaration::plain("myproject/utils", pos(12)),
        ]);

        let u = bound(&table, "u");
        let utils = bound(&table, "utils");
        let injected = bound(&table, "PrintMessage");

        assert!(Arc::ptr_eq(u.target.package(), utils.target.package()));
        assert!(Arc::ptr_eq(u.target.package(), injected.target.package()));
        assert_eq!(injected.target.symbol(), Some("PrintMessage"));
        assert_eq!(injected.kind, BindingKind::Wildcard);
        assert!(table.diagnostics().is_empty());
        assert_eq!(table.imports().len(), 3);
    }

    #[test]
    fn test_explicit_collision_first_wins() {
        let table = build(&[
            ImportDeclaration::aliased("myproject/p", "x", pos(3)),
            ImportDeclaration::aliased("myproject/q", "x", pos(4)),
        ]);

        assert_eq!(bound(&table, "x").canonical_id(), "myproject/p");
        assert_eq!(kinds(&table), vec![DiagnosticKind::DuplicateBinding]);
        assert_eq!(
            table.diagnostics()[0].candidates,
            vec!["myproject/p".to_string(), "myproject/q".to_string()]
        );
    }

    #[test]
    fn test_redundant_import_is_not_a_collision() {
        let table = build(&[
            ImportDeclaration::plain("myproject/utils", pos(3)),
            ImportDeclaration::plain("myproject/utils", pos(4)),
        ]);
        assert!(table.diagnostics().is_empty());
        assert_eq!(table.bindings().len(), 1);
        assert_eq!(table.imports().len(), 2);
    }

    #[test]
    fn test_wildcard_collision_is_ambiguous() {
        let table = build(&[
            ImportDeclaration::wildcard("myproject/p", pos(3)),
            ImportDeclaration::wildcard("myproject/q", pos(4)),
            ImportDeclaration::wildcard("myproject/r", pos(5)),
        ]);

        match table.lookup("X") {
            Ok(Lookup::Ambiguous(candidates)) => assert_eq!(candidates.len(), 3),
            other => panic!("X should be ambiguous: {other:?}"),
        }
        assert_eq!(bound(&table, "OnlyP").canonical_id(), "myproject/p");
        assert_eq!(
            kinds(&table),
            vec![
                DiagnosticKind::AmbiguousBinding,
                DiagnosticKind::AmbiguousBinding
            ]
        );
    }

    #[test]
    fn test_repeated_wildcard_of_same_package_is_not_ambiguous() {
        let table = build(&[
            ImportDeclaration::wildcard("myproject/p", pos(3)),
            ImportDeclaration::wildcard("myproject/p/", pos(4)),
        ]);
        assert!(table.diagnostics().is_empty());
        assert_eq!(bound(&table, "X").canonical_id(), "myproject/p");
    }

    #[test]
    fn test_explicit_declared_first_beats_wildcard() {
        let table = build(&[
            ImportDeclaration::aliased("myproject/utils", "X", pos(3)),
            ImportDeclaration::wildcard("myproject/p", pos(4)),
        ]);
        let x = bound(&table, "X");
        assert_eq!(x.canonical_id(), "myproject/utils");
        assert!(x.target.symbol().is_none());
        assert!(table.diagnostics().is_empty());
    }

    #[test]
    fn test_explicit_declared_after_wildcard_shadows_it() {
        let table = build(&[
            ImportDeclaration::wildcard("myproject/p", pos(3)),
            ImportDeclaration::aliased("myproject/utils", "OnlyP", pos(4)),
        ]);
        let shadowed = bound(&table, "OnlyP");
        assert_eq!(shadowed.canonical_id(), "myproject/utils");
        assert!(shadowed.is_explicit());
        assert_eq!(bound(&table, "X").canonical_id(), "myproject/p");
        assert!(table.diagnostics().is_empty());
    }

    #[test]
    fn test_explicit_disambiguates_wildcards() {
        let table = build(&[
            ImportDeclaration::wildcard("myproject/p", pos(3)),
            ImportDeclaration::wildcard("myproject/q", pos(4)),
            ImportDeclaration::aliased("myproject/r", "X", pos(5)),
        ]);
        let x = bound(&table, "X");
        assert_eq!(x.canonical_id(), "myproject/r");
        assert_eq!(kinds(&table), vec![DiagnosticKind::AmbiguousBinding]);
    }

    #[test]
    fn test_blank_import_binds_nothing() {
        let table = build(&[ImportDeclaration::blank("image/png", pos(3))]);
        assert!(table.is_empty());
        assert_eq!(table.imports().len(), 1);
        assert_eq!(table.imports()[0].kind, BindingKind::Blank);
    }

    #[test]
    fn test_opaque_wildcard_injects_nothing() {
        let table = build(&[ImportDeclaration::wildcard("strings", pos(3))]);
        assert!(table.is_empty());
        assert_eq!(kinds(&table), vec![DiagnosticKind::OpaqueWildcard]);
    }

    #[test]
    fn test_unresolved_import_binds_placeholder() {
        let table = build(&[
            ImportDeclaration::plain("myproject/missing", pos(3)),
            ImportDeclaration::wildcard("myproject/gone", pos(4)),
        ]);
        let missing = bound(&table, "missing");
        assert!(missing.target.package().is_placeholder());
        assert_eq!(
            kinds(&table),
            vec![
                DiagnosticKind::UnresolvedImport,
                DiagnosticKind::UnresolvedImport
            ]
        );
    }

    #[test]
    fn test_malformed_declaration_skipped() {
        let mut malformed = ImportDeclaration::plain("myproject/utils", pos(3));
        malformed.binding_kind = BindingKind::Aliased;
        let table = build(&[malformed, ImportDeclaration::plain("fmt", pos(4))]);

        assert_eq!(kinds(&table), vec![DiagnosticKind::MalformedDeclaration]);
        assert!(matches!(table.lookup("utils"), Ok(Lookup::Missing)));
        assert!(matches!(table.lookup("fmt"), Ok(Lookup::Bound(_))));
        assert_eq!(table.imports().len(), 1);
    }
}
