//! Non-fatal diagnostics collected during a build.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Note,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Note => f.write_str("note"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.file.display(),
            self.line,
            self.severity,
            self.message
        )
    }
}

/// Ordered collector; a build carries one of these through every phase.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, file: &std::path::Path, line: usize, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            file: file.to_path_buf(),
            line,
            message: message.into(),
        });
    }

    pub fn note(&mut self, file: &std::path::Path, line: usize, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Note,
            file: file.to_path_buf(),
            line,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn display_format() {
        let mut d = Diagnostics::new();
        d.warn(Path::new("robot.def"), 7, "duplicate import alias 'Base'");
        let rendered = d.iter().next().map(|x| x.to_string());
        assert_eq!(
            rendered.as_deref(),
            Some("robot.def:7: warning: duplicate import alias 'Base'")
        );
    }
}
