//! Declaration model consumed from the language-specific parser
//!
//! A parser emits, per compilation unit, an ordered sequence of
//! [`ImportDeclaration`]s and an ordered sequence of [`SymbolUse`]s. These are
//! plain records; turning source text into them happens outside this crate.

use crate::error::{Error, Result};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Location of a declaration or use: the unit it appears in and its 1-based line
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    pub unit_id: String,
    pub line: usize,
}

impl SourcePosition {
    pub fn new(unit_id: impl Into<String>, line: usize) -> Self {
        Self {
            unit_id: unit_id.into(),
            line,
        }
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.unit_id, self.line)
    }
}

/// How an import makes its package available to the importing unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BindingKind {
    /// `import "a/b"` binds `b`
    Plain,
    /// `import x "a/b"` binds `x`
    Aliased,
    /// `import . "a/b"` injects every exported name of `a/b`
    Wildcard,
    /// `import _ "a/b"` binds nothing; imported for load-time effects
    Blank,
}

impl BindingKind {
    /// Explicit kinds bind exactly one name chosen at the import site
    pub fn is_explicit(self) -> bool {
        matches!(self, BindingKind::Plain | BindingKind::Aliased)
    }
}

/// One import/use statement, as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDeclaration {
    pub raw_path: String,
    pub binding_kind: BindingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub position: SourcePosition,
}

impl ImportDeclaration {
    pub fn plain(raw_path: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            raw_path: raw_path.into(),
            binding_kind: BindingKind::Plain,
            alias: None,
            position,
        }
    }

    pub fn aliased(
        raw_path: impl Into<String>,
        alias: impl Into<String>,
        position: SourcePosition,
    ) -> Self {
        Self {
            raw_path: raw_path.into(),
            binding_kind: BindingKind::Aliased,
            alias: Some(alias.into()),
            position,
        }
    }

    pub fn wildcard(raw_path: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            raw_path: raw_path.into(),
            binding_kind: BindingKind::Wildcard,
            alias: None,
            position,
        }
    }

    pub fn blank(raw_path: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            raw_path: raw_path.into(),
            binding_kind: BindingKind::Blank,
            alias: None,
            position,
        }
    }

    /// `alias` is present (and non-empty) iff the kind is `Aliased`
    pub fn well_formed(&self) -> bool {
        match (&self.binding_kind, &self.alias) {
            (BindingKind::Aliased, Some(alias)) => !alias.trim().is_empty(),
            (BindingKind::Aliased, None) => false,
            (_, Some(_)) => false,
            (_, None) => true,
        }
    }

    /// The single local name this declaration binds, if any
    ///
    /// Plain imports bind the last path segment, aliased imports bind the
    /// alias; wildcard and blank imports bind no single name.
    pub fn local_name(&self, path_separator: &str) -> Option<&str> {
        match self.binding_kind {
            BindingKind::Plain => {
                let segment = last_segment(&self.raw_path, path_separator);
                (!segment.is_empty()).then_some(segment)
            }
            BindingKind::Aliased => self.alias.as_deref(),
            BindingKind::Wildcard | BindingKind::Blank => None,
        }
    }
}

/// Last non-empty segment of a path, ignoring trailing separators
pub fn last_segment<'a>(path: &'a str, separator: &str) -> &'a str {
    path.trim()
        .rsplit(separator)
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}

/// A reference to an identifier at a use site, e.g. `u.AnotherMessage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolUse {
    pub unit_id: String,
    pub identifier: String,
    pub line: usize,
}

impl SymbolUse {
    pub fn new(unit_id: impl Into<String>, identifier: impl Into<String>, line: usize) -> Self {
        Self {
            unit_id: unit_id.into(),
            identifier: identifier.into(),
            line,
        }
    }

    pub fn position(&self) -> SourcePosition {
        SourcePosition::new(self.unit_id.clone(), self.line)
    }
}

/// The declaration and use streams of one compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub unit_id: String,
    /// Module path of the package this unit belongs to; relative imports
    /// resolve against it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
    /// Source language, when the parser reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default)]
    pub imports: Vec<ImportDeclaration>,
    #[serde(default)]
    pub uses: Vec<SymbolUse>,
}

impl CompilationUnit {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            package_path: None,
            language: None,
            imports: Vec::new(),
            uses: Vec::new(),
        }
    }

    pub fn with_package(mut self, package_path: impl Into<String>) -> Self {
        self.package_path = Some(package_path.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_import(mut self, declaration: ImportDeclaration) -> Self {
        self.imports.push(declaration);
        self
    }

    /// Record a use of `identifier` on `line` of this unit
    pub fn with_use(mut self, identifier: impl Into<String>, line: usize) -> Self {
        let record = SymbolUse::new(self.unit_id.clone(), identifier, line);
        self.uses.push(record);
        self
    }

    /// Every declaration and use must belong to this unit
    pub fn validate(&self) -> Result<()> {
        if self.unit_id.trim().is_empty() {
            return Err(Error::parse("<unit>", "compilation unit has an empty unit_id"));
        }
        if let Some(stray) = self
            .imports
            .iter()
            .find(|decl| decl.position.unit_id != self.unit_id)
        {
            return Err(Error::unit_mismatch(
                &self.unit_id,
                &stray.position.unit_id,
            ));
        }
        if let Some(stray) = self.uses.iter().find(|u| u.unit_id != self.unit_id) {
            return Err(Error::unit_mismatch(&self.unit_id, &stray.unit_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize) -> SourcePosition {
        SourcePosition::new("main.go", line)
    }

    #[test]
    fn test_well_formed_alias_invariant() {
        assert!(ImportDeclaration::plain("fmt", pos(1)).well_formed());
        assert!(ImportDeclaration::aliased("myproject/utils", "u", pos(2)).well_formed());
        assert!(ImportDeclaration::wildcard("myproject/utils", pos(3)).well_formed());
        assert!(ImportDeclaration::blank("image/png", pos(4)).well_formed());

        let mut missing_alias = ImportDeclaration::plain("myproject/utils", pos(5));
        missing_alias.binding_kind = BindingKind::Aliased;
        assert!(!missing_alias.well_formed());

        let mut stray_alias = ImportDeclaration::wildcard("myproject/utils", pos(6));
        stray_alias.alias = Some("u".to_string());
        assert!(!stray_alias.well_formed());

        let empty_alias = ImportDeclaration::aliased("myproject/utils", "  ", pos(7));
        assert!(!empty_alias.well_formed());
    }

    #[test]
    fn test_local_name_by_kind() {
        assert_eq!(
            ImportDeclaration::plain("math/rand", pos(1)).local_name("/"),
            Some("rand")
        );
        assert_eq!(
            ImportDeclaration::plain("myproject/utils/", pos(1)).local_name("/"),
            Some("utils")
        );
        assert_eq!(
            ImportDeclaration::aliased("myproject/utils", "u", pos(1)).local_name("/"),
            Some("u")
        );
        assert_eq!(
            ImportDeclaration::wildcard("myproject/utils", pos(1)).local_name("/"),
            None
        );
        assert_eq!(
            ImportDeclaration::blank("image/png", pos(1)).local_name("/"),
            None
        );
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("std::collections::HashMap", "::"), "HashMap");
        assert_eq!(last_segment("os.path", "."), "path");
        assert_eq!(last_segment("fmt", "/"), "fmt");
        assert_eq!(last_segment("", "/"), "");
    }

    #[test]
    fn test_validate_rejects_foreign_records() {
        let unit = CompilationUnit::new("main.go")
            .with_import(ImportDeclaration::plain("fmt", pos(3)))
            .with_use("fmt.Println", 10);
        assert!(unit.validate().is_ok());

        let foreign = unit
            .clone()
            .with_import(ImportDeclaration::plain("time", SourcePosition::new("other.go", 4)));
        assert!(matches!(
            foreign.validate(),
            Err(Error::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_unit_deserializes_with_defaults() {
        let json = r#"{
            "unit_id": "main.go",
            "imports": [
                {"raw_path": "myproject/utils", "binding_kind": "aliased", "alias": "u",
                 "position": {"unit_id": "main.go", "line": 8}}
            ]
        }"#;
        let unit: CompilationUnit = serde_json::from_str(json).unwrap();
        assert_eq!(unit.package_path, None);
        assert!(unit.uses.is_empty());
        assert_eq!(unit.imports[0].binding_kind, BindingKind::Aliased);
        assert_eq!(unit.imports[0].alias.as_deref(), Some("u"));
    }
}
