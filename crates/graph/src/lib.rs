//! Import and reference resolution for a repository dependency graph
//!
//! Turns per-unit import declarations and symbol uses into a deduplicated
//! graph of compilation units and the packages they depend on:
//!
//! - [`resolver`]: raw import path to canonical, shared package node
//! - [`namespace`]: per-unit identifier bindings with collision detection
//! - [`builder`]: concurrent commit of resolved units, freeze barrier
//! - [`query`]: read-only queries over the frozen graph
//! - [`pipeline`]: bounded concurrent analysis of a unit set

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod builder;
pub mod namespace;
pub mod pipeline;
pub mod query;
pub mod resolver;
pub mod types;

pub use builder::{CommitSummary, GraphBuilder};
pub use namespace::{Lookup, NamespaceTable, TableState};
pub use pipeline::{analyze_unit, analyze_units, analyze_units_blocking, Analysis, RejectedUnit};
pub use query::{DependencyGraph, GraphStats, GraphSummary, PackageSummary, UnitSummary};
pub use resolver::{PackageResolver, UnresolvedImport};
pub use types::{
    BindingTarget, DeclaredImport, DependencyEdge, EdgeRelation, Exports, NamespaceBinding,
    PackageOrigin, ResolvedPackage,
};
