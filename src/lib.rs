//! # Tanager
//! This crate contains the core of the Tanager scripting language:
//! a single-pass bytecode compiler and the virtual machine that runs
//! its output.
//!
//! ## Overview of the pipeline
//! Source code is represented as a [`Source`] object — a string with
//! an associated path, shared behind an `Rc`. Regions of source can
//! be marked with [`Span`]s, which are like `&str`s but carry a
//! reference-counted handle on the original `Source`; tokens use
//! them to recover their lexemes without copying text around.
//!
//! ### Compilation
//! Compilation can raise [`Syntax`], a compile-time error carrying a
//! kind (lexical, syntax, semantic, type, or range), a reason, and a
//! position.
//!
//! The [`Lexer`](compiler::lex::Lexer) is a pull lexer: it holds the
//! *current* token and advances on demand. On top of it sits the
//! [`Compiler`] — a recursive-descent parser that resolves variables
//! to stack slots and emits bytecode while parsing. There is no AST:
//! one pass over the tokens produces a finished [`Chunk`], a byte
//! stream of instructions plus the constant pool they index into.
//! Every chunk ends with a `Nil; Return` epilogue, so every program
//! yields a value. Compiling with [`CompileFlags::CHECK_ONLY`]
//! exercises the full parse and resolution path without emitting a
//! single byte or constant.
//!
//! ### Execution
//! The [`VM`] interprets a chunk over a fixed-size operand stack.
//! Named variables live in the same storage as intermediate values:
//! a `let` binding's slot *is* the stack slot its initializer landed
//! in. Heap values (strings, ranges, arrays) are reference-counted;
//! the VM retains on every read and releases on every pop, so when
//! the run is over, everything it allocated is gone. Runtime errors
//! are [`Trace`]s and halt the run.
//!
//! To compile and run some source:
//!
//! ```
//! use tanager::common::source::Source;
//! use tanager::common::value::Value;
//!
//! let source = Source::source("let x = 10; let y = 20; return x + y;");
//! let result = tanager::run_source(source).unwrap();
//! assert_eq!(result, Value::Number(30.0));
//! ```

pub mod common;
pub mod compiler;
pub mod dump;
pub mod vm;

use std::rc::Rc;

pub use common::chunk::Chunk;
pub use common::opcode::Opcode;
pub use common::source::Source;
pub use common::span::Span;
pub use common::value::Value;
pub use compiler::gen::{CompileFlags, Compiler};
pub use compiler::syntax::Syntax;
pub use vm::trace::Trace;
pub use vm::vm::VM;

/// Any error the pipeline can produce, for embedders that don't care
/// which stage failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] Syntax),
    #[error(transparent)]
    Trace(#[from] Trace),
}

/// Compiles a [`Source`] to a bytecode [`Chunk`].
pub fn compile(source: Rc<Source>) -> Result<Chunk, Syntax> {
    compile_with_flags(CompileFlags::empty(), source)
}

/// Compiles a [`Source`] with specific [`CompileFlags`].
pub fn compile_with_flags(flags: CompileFlags, source: Rc<Source>) -> Result<Chunk, Syntax> {
    Compiler::init(flags, &source)?.compile()
}

/// Runs a compiled [`Chunk`] on a fresh VM and hands back the result.
pub fn run(chunk: &Chunk) -> Result<Value, Trace> {
    let mut vm = VM::init(vm::vm::DEFAULT_STACK_SIZE);
    vm.run(chunk)?;
    // after Return the stack holds exactly the program's result
    Ok(vm.pop().unwrap_or(Value::Nil))
}

/// Compiles and runs a [`Source`] in one go.
pub fn run_source(source: Rc<Source>) -> Result<Value, Error> {
    let chunk = compile(source)?;
    Ok(run(&chunk)?)
}
