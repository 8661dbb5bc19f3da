//! Repository layout an analysis run resolves imports against
//!
//! The layout is supplied once per run: the module root, the standard-library
//! prefix set, and the local package registry produced by the crawler.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use crate::config::LayoutConfig;
use crate::error::{Error, Result};
use crate::language::Language;
use std::collections::{BTreeMap, BTreeSet};

/// `path` equals `prefix` or continues it at a segment boundary
pub fn has_path_prefix(path: &str, prefix: &str, separator: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(separator),
        None => false,
    }
}

/// Strip surrounding whitespace and trailing separators
fn trim_path<'a>(path: &'a str, separator: &str) -> &'a str {
    let mut trimmed = path.trim();
    while let Some(rest) = trimmed.strip_suffix(separator) {
        trimmed = rest;
    }
    trimmed
}

#[derive(Debug, Clone)]
pub struct RepositoryLayout {
    language: Language,
    module_root: String,
    path_separator: String,
    qualifier_separator: String,
    stdlib_prefixes: BTreeSet<String>,
    path_aliases: BTreeMap<String, String>,
    external_dependencies: BTreeSet<String>,
    allow_undeclared_external: bool,
    local_packages: BTreeMap<String, BTreeSet<String>>,
    known_exports: BTreeMap<String, BTreeSet<String>>,
}

impl RepositoryLayout {
    /// Layout with the language's separators and stdlib defaults
    ///
    /// Fails when `module_root` is empty; there is no meaningful analysis
    /// without it.
    pub fn new(language: Language, module_root: impl Into<String>) -> Result<Self> {
        let path_separator = language.path_separator().to_string();
        let module_root = trim_path(&module_root.into(), &path_separator).to_string();
        if module_root.is_empty() {
            return Err(Error::config("module root must not be empty"));
        }

        Ok(Self {
            language,
            module_root,
            qualifier_separator: language.qualifier_separator().to_string(),
            stdlib_prefixes: language
                .default_stdlib_prefixes()
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            path_separator,
            path_aliases: BTreeMap::new(),
            external_dependencies: BTreeSet::new(),
            allow_undeclared_external: true,
            local_packages: BTreeMap::new(),
            known_exports: BTreeMap::new(),
        })
    }

    /// Build a layout from validated configuration
    pub fn from_config(config: &LayoutConfig) -> Result<Self> {
        let mut layout = Self::new(config.language, config.module_root.as_str())?
            .with_separators(config.path_separator(), config.qualifier_separator())?;

        layout.stdlib_prefixes = config
            .stdlib_prefixes()
            .iter()
            .map(|p| trim_path(p, &layout.path_separator).to_string())
            .filter(|p| !p.is_empty())
            .collect();
        layout.allow_undeclared_external = config.allow_undeclared_external;

        for alias in &config.path_aliases {
            layout = layout.with_path_alias(&alias.from, &alias.to);
        }
        for dependency in &config.external_dependencies {
            layout = layout.with_external_dependency(dependency);
        }
        for package in &config.local_packages {
            layout = layout.with_local_package(&package.path, package.exports.iter().cloned());
        }
        for package in &config.known_exports {
            layout = layout.with_known_exports(&package.path, package.exports.iter().cloned());
        }

        Ok(layout)
    }

    pub fn with_separators(
        mut self,
        path_separator: impl Into<String>,
        qualifier_separator: impl Into<String>,
    ) -> Result<Self> {
        let path_separator = path_separator.into();
        let qualifier_separator = qualifier_separator.into();
        if path_separator.is_empty() || qualifier_separator.is_empty() {
            return Err(Error::config("separators must not be empty"));
        }
        self.path_separator = path_separator;
        self.qualifier_separator = qualifier_separator;
        Ok(self)
    }

    /// Replace the stdlib prefix set
    pub fn with_stdlib_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stdlib_prefixes = prefixes
            .into_iter()
            .map(|p| trim_path(p.as_ref(), &self.path_separator).to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn with_path_alias(mut self, from: &str, to: &str) -> Self {
        let from = trim_path(from, &self.path_separator).to_string();
        let to = trim_path(to, &self.path_separator).to_string();
        self.path_aliases.insert(from, to);
        self
    }

    pub fn with_external_dependency(mut self, prefix: &str) -> Self {
        let prefix = trim_path(prefix, &self.path_separator).to_string();
        self.external_dependencies.insert(prefix);
        self
    }

    pub fn allow_undeclared_external(mut self, allow: bool) -> Self {
        self.allow_undeclared_external = allow;
        self
    }

    /// Register a package found inside the repository with its exported names
    pub fn with_local_package<I, S>(mut self, path: &str, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = trim_path(path, &self.path_separator).to_string();
        self.local_packages
            .entry(path)
            .or_default()
            .extend(exports.into_iter().map(Into::into));
        self
    }

    /// Register the export list of a stdlib or external package
    pub fn with_known_exports<I, S>(mut self, path: &str, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = trim_path(path, &self.path_separator).to_string();
        self.known_exports
            .entry(path)
            .or_default()
            .extend(exports.into_iter().map(Into::into));
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn module_root(&self) -> &str {
        &self.module_root
    }

    pub fn path_separator(&self) -> &str {
        &self.path_separator
    }

    pub fn qualifier_separator(&self) -> &str {
        &self.qualifier_separator
    }

    pub fn stdlib_prefixes(&self) -> &BTreeSet<String> {
        &self.stdlib_prefixes
    }

    pub fn local_packages(&self) -> impl Iterator<Item = &str> {
        self.local_packages.keys().map(String::as_str)
    }

    pub fn is_stdlib(&self, path: &str) -> bool {
        self.stdlib_prefixes
            .iter()
            .any(|prefix| has_path_prefix(path, prefix, &self.path_separator))
    }

    pub fn is_within_module_root(&self, path: &str) -> bool {
        has_path_prefix(path, &self.module_root, &self.path_separator)
    }

    /// External paths are accepted when declared, or when undeclared ones are allowed
    pub fn accepts_external(&self, path: &str) -> bool {
        self.allow_undeclared_external
            || self
                .external_dependencies
                .iter()
                .any(|prefix| has_path_prefix(path, prefix, &self.path_separator))
    }

    pub fn local_exports(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.local_packages.get(path)
    }

    pub fn known_exports(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.known_exports.get(path)
    }

    /// Rewrite `path` through the longest matching alias prefix
    pub fn apply_path_alias(&self, path: &str) -> Option<String> {
        self.path_aliases
            .iter()
            .filter(|(from, _)| has_path_prefix(path, from, &self.path_separator))
            .max_by_key(|(from, _)| from.len())
            .map(|(from, to)| format!("{to}{}", &path[from.len()..]))
    }
}
