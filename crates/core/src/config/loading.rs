//! Layered loading: built-in defaults, then `depgraph.toml`, then `DEPGRAPH_*` variables

use crate::error::{Error, Result};
use config::builder::DefaultState;
use config::{Config as Layered, ConfigBuilder, Environment, File, Value};
use std::path::Path;

use super::defaults::*;
use super::Config;

type Builder = ConfigBuilder<DefaultState>;

/// Seeds every key the file may omit; the config crate ignores serde defaults
/// for sections that are absent altogether.
fn seed_defaults(mut builder: Builder) -> Result<Builder> {
    let seeds: [(&str, Value); 5] = [
        ("layout.language", DEFAULT_LANGUAGE.into()),
        ("layout.module_root", "".into()),
        (
            "layout.allow_undeclared_external",
            default_allow_undeclared_external().into(),
        ),
        (
            "analysis.max_concurrent_units",
            (default_max_concurrent_units() as i64).into(),
        ),
        (
            "analysis.check_member_exports",
            default_check_member_exports().into(),
        ),
    ];
    for (key, value) in seeds {
        builder = builder
            .set_default(key, value)
            .map_err(|e| Error::config(format!("cannot seed default for {key}: {e}")))?;
    }
    Ok(builder)
}

impl Config {
    /// Reads `path` (skipped when missing) on top of the defaults, then applies
    /// environment overrides. Nested keys use a double underscore, e.g.
    /// `DEPGRAPH_LAYOUT__MODULE_ROOT=github.com/acme/app` or
    /// `DEPGRAPH_ANALYSIS__MAX_CONCURRENT_UNITS=16`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = seed_defaults(Layered::builder())?;
        if path.is_file() {
            builder = builder.add_source(File::from(path));
        }
        // Without an explicit prefix separator the crate expects `DEPGRAPH__`.
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);

        builder
            .add_source(env)
            .build()
            .map_err(|e| Error::config(format!("cannot assemble configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))
    }

    /// Parses TOML directly, without defaults seeding or environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("invalid TOML: {e}")))
    }

    /// Loads from `config_path`, or `./depgraph.toml` when none is given.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::from_file(config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE)))
    }
}
