//! Package resolution and canonicalization
//!
//! Converts raw import paths, as spelled at an import site, into canonical
//! package nodes:
//!
//! 1. Relative spellings (`./utils`, `..models`, `super::net`) are resolved
//!    against the importing unit's package path
//! 2. Repeated and trailing separators are collapsed
//! 3. Configured path aliases rewrite the longest matching prefix
//! 4. The result is classified as standard library, local repository or
//!    external dependency, in that priority order
//!
//! Every distinct canonical id maps to exactly one shared
//! `Arc<ResolvedPackage>` for the lifetime of the resolver.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use crate::types::{Exports, PackageOrigin, ResolvedPackage};
use dashmap::DashMap;
use depgraph_core::RepositoryLayout;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// An import path that could not be classified or located
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved import '{raw_path}': {reason}")]
pub struct UnresolvedImport {
    pub raw_path: String,
    pub reason: String,
}

impl UnresolvedImport {
    fn new(raw_path: &str, reason: impl Into<String>) -> Self {
        Self {
            raw_path: raw_path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Per-run package resolver with a shared canonicalization cache
///
/// Construct one per analysis run and hand it (behind an `Arc`) to every unit
/// processor. Concurrent first resolutions of the same package create a single
/// node; resolutions of different packages do not contend beyond their map
/// shard.
#[derive(Debug)]
pub struct PackageResolver {
    layout: Arc<RepositoryLayout>,
    packages: DashMap<String, Arc<ResolvedPackage>>,
    placeholders: DashMap<String, Arc<ResolvedPackage>>,
}

impl PackageResolver {
    pub fn new(layout: RepositoryLayout) -> Self {
        Self::with_shared_layout(Arc::new(layout))
    }

    pub fn with_shared_layout(layout: Arc<RepositoryLayout>) -> Self {
        Self {
            layout,
            packages: DashMap::new(),
            placeholders: DashMap::new(),
        }
    }

    pub fn layout(&self) -> &RepositoryLayout {
        &self.layout
    }

    /// Resolve `raw_path` as imported from a unit of `importer_package`
    ///
    /// Pure in (raw_path, importer_package, layout): the same inputs always
    /// yield the same canonical id and the same shared instance.
    pub fn resolve(
        &self,
        raw_path: &str,
        importer_package: Option<&str>,
    ) -> Result<Arc<ResolvedPackage>, UnresolvedImport> {
        let canonical_id = self.canonicalize(raw_path, importer_package)?;

        if let Some(existing) = self.packages.get(&canonical_id) {
            return Ok(Arc::clone(existing.value()));
        }

        let (origin, exports) = self
            .classify(&canonical_id)
            .map_err(|reason| UnresolvedImport::new(raw_path, reason))?;

        // The entry guard holds the shard lock, so racing first resolutions
        // of the same id observe a single node.
        let entry = self.packages.entry(canonical_id.clone()).or_insert_with(|| {
            debug!(%canonical_id, %origin, "Created package node");
            Arc::new(ResolvedPackage::new(canonical_id.clone(), origin, exports))
        });
        Ok(Arc::clone(entry.value()))
    }

    /// Opaque node standing in for an import that failed to resolve
    ///
    /// Keyed by the canonical id when the path canonicalizes, so every
    /// spelling of one missing package shares a node; malformed paths fall
    /// back to their trimmed spelling.
    pub fn placeholder(
        &self,
        raw_path: &str,
        importer_package: Option<&str>,
    ) -> Arc<ResolvedPackage> {
        let key = self
            .canonicalize(raw_path, importer_package)
            .unwrap_or_else(|_| raw_path.trim().to_string());
        let entry = self.placeholders.entry(key.clone()).or_insert_with(|| {
            debug!(canonical_id = %key, "Created unresolved placeholder node");
            Arc::new(ResolvedPackage::new(
                key.clone(),
                PackageOrigin::Unresolved,
                Exports::Opaque,
            ))
        });
        Arc::clone(entry.value())
    }

    /// Spelling-independent id for `raw_path`
    pub fn canonicalize(
        &self,
        raw_path: &str,
        importer_package: Option<&str>,
    ) -> Result<String, UnresolvedImport> {
        let sep = self.layout.path_separator();
        let trimmed = raw_path.trim();

        if trimmed.is_empty() {
            return Err(UnresolvedImport::new(raw_path, "empty import path"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(UnresolvedImport::new(
                raw_path,
                "import path contains whitespace",
            ));
        }

        let absolute = match sep {
            "/" => resolve_slash_relative(trimmed, importer_package),
            "::" => normalize_rust_path(trimmed, self.layout.module_root(), importer_package),
            _ => resolve_leading_separators(trimmed, sep, importer_package),
        }
        .map_err(|reason| UnresolvedImport::new(raw_path, reason))?;

        let normalized = absolute
            .split(sep)
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(sep);
        if normalized.is_empty() {
            return Err(UnresolvedImport::new(raw_path, "import path has no segments"));
        }

        Ok(self
            .layout
            .apply_path_alias(&normalized)
            .unwrap_or(normalized))
    }

    fn classify(&self, canonical_id: &str) -> Result<(PackageOrigin, Exports), String> {
        let layout = &self.layout;

        if layout.is_stdlib(canonical_id) {
            return Ok((PackageOrigin::StandardLibrary, known_or_opaque(layout, canonical_id)));
        }

        if layout.is_within_module_root(canonical_id) {
            return match layout.local_exports(canonical_id) {
                Some(exports) => Ok((
                    PackageOrigin::LocalRepository,
                    Exports::Known(exports.clone()),
                )),
                None => Err(format!(
                    "no local package '{canonical_id}' under module root '{}'",
                    layout.module_root()
                )),
            };
        }

        if layout.accepts_external(canonical_id) {
            return Ok((
                PackageOrigin::ExternalDependency,
                known_or_opaque(layout, canonical_id),
            ));
        }

        Err(format!(
            "'{canonical_id}' is not a declared external dependency"
        ))
    }

    /// Number of distinct resolved packages (placeholders excluded)
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All nodes created so far, placeholders included, sorted by canonical id
    pub fn snapshot(&self) -> Vec<Arc<ResolvedPackage>> {
        let mut nodes: Vec<Arc<ResolvedPackage>> = self
            .packages
            .iter()
            .chain(self.placeholders.iter())
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        nodes.sort_by(|a, b| a.canonical_id().cmp(b.canonical_id()));
        nodes
    }
}

fn known_or_opaque(layout: &RepositoryLayout, canonical_id: &str) -> Exports {
    layout
        .known_exports(canonical_id)
        .map(|exports| Exports::Known(exports.clone()))
        .unwrap_or(Exports::Opaque)
}

/// Resolve `./` and `../` spellings against the importer's package path
fn resolve_slash_relative(path: &str, importer_package: Option<&str>) -> Result<String, String> {
    let is_relative =
        path == "." || path == ".." || path.starts_with("./") || path.starts_with("../");
    if !is_relative {
        return Ok(path.to_string());
    }

    let base = importer_package
        .ok_or_else(|| "relative import without an importing package".to_string())?;
    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err("relative import escapes the module root".to_string());
                }
            }
            name => parts.push(name),
        }
    }

    Ok(parts.join("/"))
}

/// Resolve leading-separator spellings (`.models`, `..core`): one leading
/// separator is the importer's package, each extra one goes up a level
fn resolve_leading_separators(
    path: &str,
    sep: &str,
    importer_package: Option<&str>,
) -> Result<String, String> {
    let rest = path.trim_start_matches(sep);
    let levels = (path.len() - rest.len()) / sep.len();
    if levels == 0 {
        return Ok(path.to_string());
    }

    let base = importer_package
        .ok_or_else(|| "relative import without an importing package".to_string())?;
    let mut parts: Vec<&str> = base.split(sep).filter(|s| !s.is_empty()).collect();
    for _ in 1..levels {
        if parts.pop().is_none() {
            return Err("relative import escapes the module root".to_string());
        }
    }
    parts.extend(rest.split(sep).filter(|s| !s.is_empty()));

    Ok(parts.join(sep))
}

/// Normalize `crate::`, `self::` and (chained) `super::` prefixes
fn normalize_rust_path(
    path: &str,
    module_root: &str,
    importer_package: Option<&str>,
) -> Result<String, String> {
    if path == "crate" {
        return Ok(module_root.to_string());
    }
    if let Some(rest) = path.strip_prefix("crate::") {
        return Ok(format!("{module_root}::{rest}"));
    }

    if path == "self" || path.starts_with("self::") {
        let module = importer_package
            .ok_or_else(|| "self:: import without an importing module".to_string())?;
        let rest = path.strip_prefix("self").unwrap_or(path);
        return Ok(format!("{module}{rest}"));
    }

    if path.starts_with("super::") {
        let module = importer_package
            .ok_or_else(|| "super:: import without an importing module".to_string())?;

        let mut remaining = path;
        let mut levels_up = 0;
        while let Some(rest) = remaining.strip_prefix("super::") {
            levels_up += 1;
            remaining = rest;
        }

        let parts: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
        if parts.len() <= levels_up {
            return Err("super:: escapes the crate root".to_string());
        }
        let parent = parts[..parts.len() - levels_up].join("::");
        return Ok(format!("{parent}::{remaining}"));
    }

    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use depgraph_core::Language;

    fn go_resolver() -> PackageResolver {
        let layout = match RepositoryLayout::new(Language::Go, "myproject") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        PackageResolver::new(
            layout
                .with_local_package("myproject/utils", ["PrintMessage", "AnotherMessage"])
                .with_local_package("myproject/anotherpackage", ["AnotherFunction"])
                .with_path_alias("example.com/legacy/utils", "myproject/utils"),
        )
    }

    fn resolve_ok(resolver: &PackageResolver, path: &str) -> Arc<ResolvedPackage> {
        match resolver.resolve(path, Some("myproject")) {
            Ok(pkg) => pkg,
            Err(e) => panic!("{path} should resolve: {e}"),
        }
    }

    #[test]
    fn test_classification_priority() {
        let resolver = go_resolver();
        assert_eq!(
            resolve_ok(&resolver, "fmt").origin(),
            PackageOrigin::StandardLibrary
        );
        assert_eq!(
            resolve_ok(&resolver, "math/rand").origin(),
            PackageOrigin::StandardLibrary
        );
        assert_eq!(
            resolve_ok(&resolver, "myproject/utils").origin(),
            PackageOrigin::LocalRepository
        );
        assert_eq!(
            resolve_ok(&resolver, "github.com/google/uuid").origin(),
            PackageOrigin::ExternalDependency
        );
    }

    #[test]
    fn test_equivalent_spellings_share_one_instance() {
        let resolver = go_resolver();
        let plain = resolve_ok(&resolver, "myproject/utils");
        let trailing = resolve_ok(&resolver, "myproject//utils/");
        let relative = resolve_ok(&resolver, "./utils");
        let aliased = resolve_ok(&resolver, "example.com/legacy/utils");

        assert!(Arc::ptr_eq(&plain, &trailing));
        assert!(Arc::ptr_eq(&plain, &relative));
        assert!(Arc::ptr_eq(&plain, &aliased));
        assert_eq!(plain.canonical_id(), "myproject/utils");
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_missing_local_package_is_unresolved() {
        let resolver = go_resolver();
        let err = match resolver.resolve("myproject/missing", None) {
            Ok(pkg) => panic!("unexpected package {}", pkg.canonical_id()),
            Err(e) => e,
        };
        assert_eq!(err.raw_path, "myproject/missing");
        assert!(err.reason.contains("no local package"));
    }

    #[test]
    fn test_undeclared_external_rejected_when_strict() {
        let layout = match RepositoryLayout::new(Language::Go, "myproject") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        let resolver = PackageResolver::new(
            layout
                .allow_undeclared_external(false)
                .with_external_dependency("github.com/stretchr/testify"),
        );
        assert!(resolver
            .resolve("github.com/stretchr/testify/assert", None)
            .is_ok());
        assert!(resolver.resolve("github.com/unknown/lib", None).is_err());
    }

    #[test]
    fn test_malformed_paths() {
        let resolver = go_resolver();
        assert!(resolver.resolve("   ", None).is_err());
        assert!(resolver.resolve("my project", None).is_err());
        assert!(resolver.resolve("./utils", None).is_err());
        assert!(resolver.resolve("../../x", Some("myproject")).is_err());
    }

    #[test]
    fn test_placeholders_are_interned() {
        let resolver = go_resolver();
        let a = resolver.placeholder("myproject/missing", None);
        let b = resolver.placeholder(" myproject//missing/ ", None);
        let c = resolver.placeholder("./missing", Some("myproject"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(a.canonical_id(), "myproject/missing");
        assert!(a.is_placeholder());
        assert!(a.exports().is_opaque());
        assert!(resolver.is_empty());
        assert_eq!(resolver.snapshot().len(), 1);

        let malformed = resolver.placeholder(" my project ", None);
        assert_eq!(malformed.canonical_id(), "my project");
    }

    #[test]
    fn test_known_exports_for_stdlib() {
        let layout = match RepositoryLayout::new(Language::Go, "myproject") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        let resolver = PackageResolver::new(layout.with_known_exports("fmt", ["Println"]));
        let fmt = resolve_ok(&resolver, "fmt");
        assert_eq!(fmt.exports().contains("Println"), Some(true));
        let time = resolve_ok(&resolver, "time");
        assert!(time.exports().is_opaque());
    }

    #[test]
    fn test_python_relative_imports() {
        let layout = match RepositoryLayout::new(Language::Python, "acme") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        let resolver = PackageResolver::new(
            layout
                .with_local_package("acme.models.user", ["User"])
                .with_local_package("acme.core", ["run"]),
        );
        assert_eq!(
            resolver.canonicalize(".user", Some("acme.models")).ok(),
            Some("acme.models.user".to_string())
        );
        assert_eq!(
            resolver.canonicalize("..core", Some("acme.models")).ok(),
            Some("acme.core".to_string())
        );
        assert!(resolver.canonicalize("....core", Some("acme.models")).is_err());
        assert_eq!(
            resolver.resolve("os.path", None).map(|p| p.origin()).ok(),
            Some(PackageOrigin::StandardLibrary)
        );
    }

    #[test]
    fn test_rust_relative_imports() {
        let layout = match RepositoryLayout::new(Language::Rust, "mycrate") {
            Ok(layout) => layout,
            Err(e) => panic!("layout: {e}"),
        };
        let resolver = PackageResolver::new(layout);
        assert_eq!(
            resolver.canonicalize("crate::net::tcp", None).ok(),
            Some("mycrate::net::tcp".to_string())
        );
        assert_eq!(
            resolver.canonicalize("self::codec", Some("mycrate::net")).ok(),
            Some("mycrate::net::codec".to_string())
        );
        assert_eq!(
            resolver
                .canonicalize("super::super::util", Some("mycrate::net::tcp"))
                .ok(),
            Some("mycrate::util".to_string())
        );
        assert!(resolver.canonicalize("super::x", Some("mycrate")).is_err());
        assert_eq!(
            resolver.resolve("std::collections", None).map(|p| p.origin()).ok(),
            Some(PackageOrigin::StandardLibrary)
        );
    }

    #[test]
    fn test_concurrent_first_resolution_creates_one_node() {
        let resolver = Arc::new(go_resolver());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || {
                    let spelling = if i % 2 == 0 {
                        "myproject/utils"
                    } else {
                        "myproject/utils/"
                    };
                    resolver.resolve(spelling, None).ok()
                })
            })
            .collect();

        let nodes: Vec<Arc<ResolvedPackage>> = handles
            .into_iter()
            .filter_map(|h| h.join().ok().flatten())
            .collect();
        assert_eq!(nodes.len(), 8);
        assert!(nodes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(resolver.len(), 1);
    }
}
