//! Configuration module for depgraph
//!
//! Describes the repository layout an analysis run resolves against and the
//! knobs of the analysis pipeline. Configuration can be loaded from a TOML
//! file and/or `DEPGRAPH_` environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use crate::language::Language;
use crate::layout::has_path_prefix;
use serde::{Deserialize, Serialize};

// Re-export the default config file name for the CLI
pub use defaults::DEFAULT_CONFIG_FILE;

use defaults::*;

/// A package path paired with the symbol names it exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageExportsConfig {
    pub path: String,
    #[serde(default)]
    pub exports: Vec<String>,
}

/// Rewrite rule applied to canonical import paths (go.mod `replace`,
/// tsconfig `paths`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAliasConfig {
    pub from: String,
    pub to: String,
}

/// Repository layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Language of the repository; picks separators and stdlib defaults
    #[serde(default)]
    pub language: Language,

    /// Module path of the repository root (e.g. `myproject`, `github.com/acme/app`)
    #[serde(default)]
    pub module_root: String,

    /// Standard-library prefixes; the language defaults apply when unset
    #[serde(default)]
    pub stdlib_prefixes: Option<Vec<String>>,

    /// Override for the import path separator
    #[serde(default)]
    pub path_separator: Option<String>,

    /// Override for the use-site qualifier separator
    #[serde(default)]
    pub qualifier_separator: Option<String>,

    #[serde(default)]
    pub path_aliases: Vec<PathAliasConfig>,

    /// Declared third-party module prefixes
    #[serde(default)]
    pub external_dependencies: Vec<String>,

    /// Accept external paths that match no declared dependency
    #[serde(default = "default_allow_undeclared_external")]
    pub allow_undeclared_external: bool,

    /// Packages discovered inside the repository, with their exports
    #[serde(default)]
    pub local_packages: Vec<PackageExportsConfig>,

    /// Export lists for standard-library or external packages, when known
    #[serde(default)]
    pub known_exports: Vec<PackageExportsConfig>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            module_root: String::new(),
            stdlib_prefixes: None,
            path_separator: None,
            qualifier_separator: None,
            path_aliases: Vec::new(),
            external_dependencies: Vec::new(),
            allow_undeclared_external: default_allow_undeclared_external(),
            local_packages: Vec::new(),
            known_exports: Vec::new(),
        }
    }
}

impl LayoutConfig {
    pub fn path_separator(&self) -> &str {
        self.path_separator
            .as_deref()
            .unwrap_or_else(|| self.language.path_separator())
    }

    pub fn qualifier_separator(&self) -> &str {
        self.qualifier_separator
            .as_deref()
            .unwrap_or_else(|| self.language.qualifier_separator())
    }

    /// Configured stdlib prefixes, or the language defaults
    pub fn stdlib_prefixes(&self) -> Vec<String> {
        match &self.stdlib_prefixes {
            Some(prefixes) => prefixes.clone(),
            None => self
                .language
                .default_stdlib_prefixes()
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

/// Analysis pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum compilation units processed concurrently
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Reject qualified uses (`pkg.Name`) whose member is missing from a
    /// package with a known export list. Off unless set.
    #[serde(default = "default_check_member_exports")]
    pub check_member_exports: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: default_max_concurrent_units(),
            check_member_exports: default_check_member_exports(),
        }
    }
}

/// Main configuration structure for depgraph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// Malformed configuration is the only condition that stops an analysis
    /// run before it starts.
    pub fn validate(&self) -> Result<()> {
        let layout = &self.layout;

        if layout.module_root.trim().is_empty() {
            return Err(Error::config(
                "layout.module_root is required".to_string(),
            ));
        }

        if layout.path_separator().is_empty() {
            return Err(Error::config(
                "layout.path_separator must not be empty".to_string(),
            ));
        }
        if layout.qualifier_separator().is_empty() {
            return Err(Error::config(
                "layout.qualifier_separator must not be empty".to_string(),
            ));
        }

        if let Some(prefix) = layout
            .stdlib_prefixes
            .iter()
            .flatten()
            .find(|p| p.trim().is_empty())
        {
            return Err(Error::config(format!(
                "Invalid stdlib prefix '{prefix}': prefixes must not be empty"
            )));
        }

        for alias in &layout.path_aliases {
            if alias.from.trim().is_empty() || alias.to.trim().is_empty() {
                return Err(Error::config(format!(
                    "Invalid path alias '{}' -> '{}': both sides are required",
                    alias.from, alias.to
                )));
            }
        }

        let sep = layout.path_separator();
        let root = layout.module_root.trim();
        for package in &layout.local_packages {
            if !has_path_prefix(package.path.trim(), root, sep) {
                return Err(Error::config(format!(
                    "Local package '{}' is outside module root '{root}'",
                    package.path
                )));
            }
        }

        if self.analysis.max_concurrent_units == 0 {
            return Err(Error::config(
                "analysis.max_concurrent_units must be greater than 0".to_string(),
            ));
        }
        if self.analysis.max_concurrent_units > MAX_CONCURRENT_UNITS_LIMIT {
            return Err(Error::config(format!(
                "analysis.max_concurrent_units too large (max {MAX_CONCURRENT_UNITS_LIMIT}, got {})",
                self.analysis.max_concurrent_units
            )));
        }

        Ok(())
    }
}
