//! Analysis input files
//!
//! A JSON document carrying the compilation units emitted by a parser and,
//! optionally, the repository layout produced by the crawler:
//!
//! ```json
//! {
//!   "layout": { "language": "go", "module_root": "myproject", "local_packages": [...] },
//!   "units": [{ "unit_id": "main.go", "imports": [...], "uses": [...] }]
//! }
//! ```

use anyhow::{Context, Result};
use depgraph_core::{CompilationUnit, Config, LayoutConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisInput {
    /// Overrides the `[layout]` section of the configuration file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutConfig>,
    #[serde(default)]
    pub units: Vec<CompilationUnit>,
}

impl AnalysisInput {
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse analysis input")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis input {}", path.display()))?;
        let input = Self::from_json_str(&content)
            .with_context(|| format!("Invalid analysis input {}", path.display()))?;
        debug!(
            "Loaded {} compilation units from {}",
            input.units.len(),
            path.display()
        );
        Ok(input)
    }

    /// Merge the input's layout into `config` and validate the result
    pub fn apply_to(&self, mut config: Config) -> Result<Config> {
        if let Some(layout) = &self.layout {
            config.layout = layout.clone();
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
