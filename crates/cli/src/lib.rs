//! Library interface for the depgraph CLI
//!
//! Input loading and report rendering live here so integration tests can
//! drive them without spawning the binary.

pub mod input;
pub mod report;

pub use anyhow::Result;
pub use input::AnalysisInput;
pub use report::OutputFormat;
