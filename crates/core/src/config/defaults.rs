//! Default values and functions for configuration

pub const DEFAULT_CONFIG_FILE: &str = "depgraph.toml";
pub(crate) const DEFAULT_LANGUAGE: &str = "go";
pub(crate) const ENV_PREFIX: &str = "DEPGRAPH";

pub(crate) fn default_allow_undeclared_external() -> bool {
    true
}

pub(crate) fn default_max_concurrent_units() -> usize {
    8
}

pub(crate) fn default_check_member_exports() -> bool {
    false
}

/// Upper bound accepted for `analysis.max_concurrent_units`
pub(crate) const MAX_CONCURRENT_UNITS_LIMIT: usize = 1024;
