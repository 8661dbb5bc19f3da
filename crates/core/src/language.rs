//! Source language conventions relevant to import resolution
//!
//! The engine itself is language-agnostic; a [`Language`] only supplies the
//! separators used in import paths and qualified references, plus the default
//! standard-library prefix set used when the configuration does not name one.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Programming language of the analyzed repository
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[default]
    Go,
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Java,
    Unknown,
}

const GO_STDLIB: &[&str] = &[
    "archive", "bufio", "bytes", "cmp", "compress", "container", "context", "crypto",
    "database", "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash",
    "html", "image", "index", "io", "iter", "log", "maps", "math", "mime", "net", "os", "path",
    "plugin", "reflect", "regexp", "runtime", "slices", "sort", "strconv", "strings", "sync",
    "syscall", "testing", "text", "time", "unicode", "unique", "unsafe",
];

const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "asyncio", "base64", "collections", "contextlib", "copy", "csv",
    "dataclasses", "datetime", "enum", "functools", "glob", "hashlib", "heapq", "http", "io",
    "itertools", "json", "logging", "math", "os", "pathlib", "pickle", "random", "re", "shutil",
    "socket", "sqlite3", "string", "struct", "subprocess", "sys", "tempfile", "threading",
    "time", "typing", "unittest", "urllib", "uuid",
];

const RUST_STDLIB: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

const NODE_STDLIB: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net",
    "os", "path", "process", "stream", "url", "util", "zlib",
];

const JAVA_STDLIB: &[&str] = &["java", "javax", "jdk", "sun"];

impl Language {
    /// Separator between segments of an import path
    pub fn path_separator(self) -> &'static str {
        match self {
            Language::Go | Language::JavaScript | Language::TypeScript | Language::Unknown => "/",
            Language::Python | Language::Java => ".",
            Language::Rust => "::",
        }
    }

    /// Separator between a binding and the member it qualifies at a use site
    pub fn qualifier_separator(self) -> &'static str {
        match self {
            Language::Rust => "::",
            _ => ".",
        }
    }

    /// Default standard-library prefixes
    pub fn default_stdlib_prefixes(self) -> &'static [&'static str] {
        match self {
            Language::Go => GO_STDLIB,
            Language::Python => PYTHON_STDLIB,
            Language::Rust => RUST_STDLIB,
            Language::JavaScript | Language::TypeScript => NODE_STDLIB,
            Language::Java => JAVA_STDLIB,
            Language::Unknown => &[],
        }
    }
}
