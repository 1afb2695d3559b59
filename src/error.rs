//! Error taxonomy for the decode/validate/codegen pipeline (spec.md §7).

use std::fmt;

/// A failure while decoding a WebAssembly binary module.
///
/// Carries the byte offset into the module at which the problem was
/// detected, so a caller can render a diagnostic without re-parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at offset 0x{offset:x}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            offset,
            message: message.into(),
        }
    }
}

/// Severity of a structural validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Where in the module a validation [`Issue`] was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub func_idx: Option<u32>,
    pub offset: Option<usize>,
}

impl Location {
    pub const fn module() -> Self {
        Location {
            func_idx: None,
            offset: None,
        }
    }

    pub const fn in_func(func_idx: u32, offset: usize) -> Self {
        Location {
            func_idx: Some(func_idx),
            offset: Some(offset),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.func_idx, self.offset) {
            (Some(func), Some(off)) => write!(f, "func {func} @0x{off:x}"),
            (Some(func), None) => write!(f, "func {func}"),
            (None, _) => write!(f, "module"),
        }
    }
}

/// A single structural finding accumulated by the validator.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl Issue {
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Issue {
            severity: Severity::Error,
            message: message.into(),
            location,
        }
    }

    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Issue {
            severity: Severity::Warning,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{kind}: {} ({})", self.message, self.location)
    }
}

/// The accumulated result of validating a whole module: every distinct
/// structural problem found in a single pass, not just the first one.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// True when no issue has [`Severity::Error`]; warnings never fail
    /// compilation.
    pub fn is_ok(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
    }
}

/// A failure in the code generator: an opcode the core doesn't implement,
/// or an internal invariant break (stack underflow outside an unreachable
/// region, double-terminated block). Compilation cannot continue once SSA
/// construction is inconsistent, so only the first such error is surfaced.
#[derive(Debug, Clone, thiserror::Error)]
#[error("compile error in function {func_idx}{}: {message} (@0x{instr_offset:x})",
    .func_name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
pub struct CompileError {
    pub func_idx: u32,
    pub instr_offset: usize,
    pub func_name: Option<String>,
    pub message: String,
}

impl CompileError {
    pub fn new(
        func_idx: u32,
        instr_offset: usize,
        func_name: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        CompileError {
            func_idx,
            instr_offset,
            func_name,
            message: message.into(),
        }
    }
}

/// Top-level error returned by the crate's pipeline convenience function.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("module failed validation with {} error(s)", .0.errors().count())]
    Validation(ValidationResult),
    #[error(transparent)]
    Compile(#[from] CompileError),
}
