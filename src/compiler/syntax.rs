use std::fmt;

/// What kind of compile-time error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    /// Malformed input at the character level.
    Lexical,
    /// An unexpected token or end of file.
    Syntax,
    /// Name resolution failures and table overflows.
    Semantic,
    /// A value where a reference was required, and friends.
    Type,
    /// The emitter ran out of room.
    Range,
}

/// Represents a static error found at compile time.
/// Just a kind, a reason, and the line/column it was found at;
/// the first error wins and aborts the compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub kind: SyntaxKind,
    pub reason: String,
    pub ln: usize,
    pub col: usize,
}

impl Syntax {
    /// Creates a new static error at a position.
    pub fn error(kind: SyntaxKind, reason: impl Into<String>, ln: usize, col: usize) -> Syntax {
        Syntax {
            kind,
            reason: reason.into(),
            ln,
            col,
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {},{}", self.reason, self.ln, self.col)
    }
}

impl std::error::Error for Syntax {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting() {
        let error = Syntax::error(SyntaxKind::Semantic, "symbol 'x' already defined", 1, 8);
        assert_eq!(format!("{}", error), "symbol 'x' already defined in 1,8");
    }
}
