//! Core types for the depgraph repository dependency graph
//!
//! This crate provides the foundational abstractions shared by the
//! resolution engine and its collaborators:
//!
//! - **Declarations**: import declarations, symbol uses and compilation units
//!   as emitted by a language-specific parser
//! - **Layout**: the repository layout imports are resolved against
//! - **Diagnostics**: recoverable conditions recorded during analysis
//! - **Configuration**: layout and pipeline configuration loading
//! - **Error handling**: unified error types

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod declarations;
pub mod diagnostics;
pub mod error;
pub mod language;
pub mod layout;

// Re-export main types for convenience
pub use config::{AnalysisConfig, Config, LayoutConfig, PackageExportsConfig, PathAliasConfig};
pub use declarations::{
    last_segment, BindingKind, CompilationUnit, ImportDeclaration, SourcePosition, SymbolUse,
};
pub use diagnostics::{sort_diagnostics, Diagnostic, DiagnosticKind};
pub use error::{Error, Result};
pub use language::Language;
pub use layout::{has_path_prefix, RepositoryLayout};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::declarations::{CompilationUnit, ImportDeclaration, SourcePosition, SymbolUse};
    pub use crate::error::Result;
    pub use crate::layout::RepositoryLayout;
}
