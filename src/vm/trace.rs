use std::fmt;

/// What kind of runtime error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    /// Wrong value kind for an operation.
    Type,
    /// Stack overflow or an index out of bounds.
    Range,
}

/// Represents a runtime error. All runtime errors are fatal to the
/// run: the VM halts, the first error wins, and the stack is left in
/// place for a post-mortem peek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub kind: TraceKind,
    pub message: String,
}

impl Trace {
    pub fn error(kind: TraceKind, message: impl Into<String>) -> Trace {
        Trace {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Trace {}
