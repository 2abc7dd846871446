//! This module turns source text into bytecode in a single pass:
//! the lexer produces one token at a time, and the compiler parses,
//! resolves names, and emits instructions as it goes — there is no
//! intermediate syntax tree.

pub mod gen;
pub mod lex;
pub mod syntax;
pub mod token;
