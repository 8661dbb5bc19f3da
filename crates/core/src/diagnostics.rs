//! Recoverable conditions recorded during an analysis run
//!
//! Nothing in here aborts analysis. A declaration or use that cannot be fully
//! honored leaves a [`Diagnostic`] behind and processing carries on with the
//! rest of the unit and the rest of the repository.

use crate::declarations::SourcePosition;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Category of a recorded diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
    /// An import path could not be classified or located
    UnresolvedImport,
    /// Two explicit imports claimed the same local name for different targets
    DuplicateBinding,
    /// Two wildcard imports injected the same name from different packages
    AmbiguousBinding,
    /// A use site referenced a name with no usable binding
    UnresolvedSymbol,
    /// A wildcard import targeted a package whose exports are not enumerable
    OpaqueWildcard,
    /// A declaration violated the alias invariant and was skipped
    MalformedDeclaration,
}

/// One recorded condition, positioned at the declaration or use that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub position: SourcePosition,
    /// The import path or identifier the diagnostic is about
    pub subject: String,
    pub message: String,
    /// Canonical ids of the packages involved in a collision
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        position: SourcePosition,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            position,
            subject: subject.into(),
            message: message.into(),
            candidates: Vec::new(),
        }
    }

    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn unit_id(&self) -> &str {
        &self.position.unit_id
    }

    pub fn line(&self) -> usize {
        self.position.line
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.position, self.kind, self.message)
    }
}

/// Order diagnostics by (unit_id, line); ties keep recording order
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        a.position
            .unit_id
            .cmp(&b.position.unit_id)
            .then(a.position.line.cmp(&b.position.line))
    });
}
