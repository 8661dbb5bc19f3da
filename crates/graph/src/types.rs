//! Graph node, binding and edge types

use depgraph_core::{BindingKind, SourcePosition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use strum_macros::Display;

/// Where a resolved package comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PackageOrigin {
    StandardLibrary,
    ExternalDependency,
    LocalRepository,
    /// Opaque placeholder for an import that could not be resolved
    Unresolved,
}

/// Exported symbol names of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exports {
    Known(BTreeSet<String>),
    /// Not statically enumerable (most stdlib and external packages)
    Opaque,
}

impl Exports {
    /// `Some(true/false)` for known export lists, `None` when opaque
    pub fn contains(&self, name: &str) -> Option<bool> {
        match self {
            Exports::Known(names) => Some(names.contains(name)),
            Exports::Opaque => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Exports::Known(names) => Some(names.len()),
            Exports::Opaque => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Exports::Opaque)
    }
}

/// A package node, deduplicated by canonical id
///
/// Within one analysis run every reference to a package shares a single
/// `Arc<ResolvedPackage>`, so pointer equality implies package equality.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedPackage {
    canonical_id: String,
    origin: PackageOrigin,
    exports: Exports,
}

impl ResolvedPackage {
    pub fn new(canonical_id: impl Into<String>, origin: PackageOrigin, exports: Exports) -> Self {
        Self {
            canonical_id: canonical_id.into(),
            origin,
            exports,
        }
    }

    pub fn canonical_id(&self) -> &str {
        &self.canonical_id
    }

    pub fn origin(&self) -> PackageOrigin {
        self.origin
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == PackageOrigin::Unresolved
    }
}

/// What a local name refers to
#[derive(Debug, Clone)]
pub enum BindingTarget {
    /// The name denotes the package itself (`utils`, `u`)
    Package(Arc<ResolvedPackage>),
    /// The name denotes one exported symbol of a package (wildcard injection)
    Symbol(Arc<ResolvedPackage>, String),
}

impl BindingTarget {
    pub fn package(&self) -> &Arc<ResolvedPackage> {
        match self {
            BindingTarget::Package(pkg) | BindingTarget::Symbol(pkg, _) => pkg,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            BindingTarget::Package(_) => None,
            BindingTarget::Symbol(_, name) => Some(name),
        }
    }

    /// Same package instance and same symbol
    pub fn same_as(&self, other: &BindingTarget) -> bool {
        Arc::ptr_eq(self.package(), other.package()) && self.symbol() == other.symbol()
    }
}

/// Association of a local identifier with a resolved target in one unit
#[derive(Debug, Clone)]
pub struct NamespaceBinding {
    pub local_name: String,
    pub target: BindingTarget,
    /// Kind of the declaration that created this binding
    pub kind: BindingKind,
    /// Position of that declaration
    pub position: SourcePosition,
}

impl NamespaceBinding {
    pub fn unit_id(&self) -> &str {
        &self.position.unit_id
    }

    pub fn is_explicit(&self) -> bool {
        self.kind.is_explicit()
    }

    pub fn canonical_id(&self) -> &str {
        self.target.package().canonical_id()
    }
}

/// A resolved import declaration, retained for reporting
#[derive(Debug, Clone)]
pub struct DeclaredImport {
    pub raw_path: String,
    pub package: Arc<ResolvedPackage>,
    pub kind: BindingKind,
    pub local_name: Option<String>,
    pub position: SourcePosition,
}

/// Relation carried by an edge, read from either endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    Imports,
    ImportedBy,
}

impl EdgeRelation {
    pub fn inverse(self) -> Self {
        match self {
            EdgeRelation::Imports => EdgeRelation::ImportedBy,
            EdgeRelation::ImportedBy => EdgeRelation::Imports,
        }
    }
}

/// A recorded dependency of one compilation unit on one package
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub from_unit: String,
    pub to_package: Arc<ResolvedPackage>,
    /// Binding the use resolved through; `None` for blank (side-effect) imports
    pub via_binding: Option<NamespaceBinding>,
    /// Member of the package referenced at the use site, when known
    pub symbol: Option<String>,
    pub use_position: SourcePosition,
}

impl DependencyEdge {
    pub fn canonical_id(&self) -> &str {
        self.to_package.canonical_id()
    }

    /// Relation read from the importing unit
    pub fn relation(&self) -> EdgeRelation {
        EdgeRelation::Imports
    }

    pub fn is_side_effect(&self) -> bool {
        self.via_binding.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(id: &str) -> Arc<ResolvedPackage> {
        Arc::new(ResolvedPackage::new(
            id,
            PackageOrigin::LocalRepository,
            Exports::Known(["PrintMessage".to_string()].into_iter().collect()),
        ))
    }

    #[test]
    fn test_same_as_requires_identity() {
        let utils = package("myproject/utils");
        let copy = package("myproject/utils");

        let a = BindingTarget::Package(Arc::clone(&utils));
        let b = BindingTarget::Package(Arc::clone(&utils));
        let c = BindingTarget::Package(copy);
        let d = BindingTarget::Symbol(Arc::clone(&utils), "PrintMessage".to_string());

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert!(!a.same_as(&d));
    }

    #[test]
    fn test_exports_contains() {
        let utils = package("myproject/utils");
        assert_eq!(utils.exports().contains("PrintMessage"), Some(true));
        assert_eq!(utils.exports().contains("Missing"), Some(false));
        assert_eq!(Exports::Opaque.contains("Println"), None);
    }

    #[test]
    fn test_relation_inverse() {
        assert_eq!(EdgeRelation::Imports.inverse(), EdgeRelation::ImportedBy);
        assert_eq!(EdgeRelation::ImportedBy.inverse(), EdgeRelation::Imports);
    }

    #[test]
    fn test_origin_display_matches_serde_names() {
        for origin in [
            PackageOrigin::StandardLibrary,
            PackageOrigin::ExternalDependency,
            PackageOrigin::LocalRepository,
            PackageOrigin::Unresolved,
        ] {
            let json = serde_json::to_value(origin).unwrap_or_default();
            assert_eq!(json.as_str(), Some(origin.to_string().as_str()));
        }
        assert_eq!(PackageOrigin::StandardLibrary.to_string(), "standard_library");
    }
}
