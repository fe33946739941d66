//! Fatal build errors.

use std::path::PathBuf;
use thiserror::Error;

/// Which kind of name collided for a duplicate-definition error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    Message,
    Enum,
    Options,
    Compound,
    Field,
    EnumValueName,
    EnumValueNumber,
}

impl std::fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DuplicateKind::Message => "message",
            DuplicateKind::Enum => "enum",
            DuplicateKind::Options => "options",
            DuplicateKind::Compound => "compound",
            DuplicateKind::Field => "field",
            DuplicateKind::EnumValueName => "enum value name",
            DuplicateKind::EnumValueNumber => "enum value number",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: {message}")]
    Syntax { file: PathBuf, message: String },

    #[error("circular import: {cycle}")]
    CircularImport { cycle: String },

    #[error("{entity}: cannot resolve parent '{token}'")]
    UnresolvedParent { entity: String, token: String },

    #[error("{file}:{line}: duplicate {kind} '{name}'")]
    DuplicateDefinition {
        file: PathBuf,
        line: usize,
        kind: DuplicateKind,
        name: String,
    },

    #[error("{file}:{line}: field '{field}' references unknown type '{token}'")]
    UnresolvedReference {
        file: PathBuf,
        line: usize,
        field: String,
        token: String,
    },
}
