//! Snippet tests for the tanager pipeline as a whole:
//! each test feeds a little program through the public API and
//! checks the value (or error) that comes out the other end.

use std::rc::Rc;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use tanager::common::value::{Range, Value};
use tanager::compiler::syntax::SyntaxKind;
use tanager::vm::trace::TraceKind;
use tanager::{CompileFlags, Source};

fn run(source: &str) -> Result<Value, tanager::Error> {
    tanager::run_source(Source::source(source))
}

#[test]
fn adds_two_bindings() {
    let result = run("let x = 10; let y = 20; return x + y;").unwrap();
    assert_eq!(result, Value::Number(30.0));
}

#[test]
fn indexes_an_array() {
    let result = run("let a = [1, 2, 3]; return a[2];").unwrap();
    assert_eq!(result, Value::Number(3.0));
}

#[test]
fn writes_through_an_inout_binding() {
    let result = run("let a = [10, 20, 30]; inout r = &a[1]; r = 99; return a[1];").unwrap();
    assert_eq!(result, Value::Number(99.0));
}

#[test]
fn block_local_shadow_does_not_escape() {
    let result = run("let x = 1; { let x = 2; } return x;").unwrap();
    assert_eq!(result, Value::Number(1.0));
}

#[test]
fn adding_a_string_fails_at_runtime_not_compile_time() {
    // no static type check for `+`: this compiles...
    let chunk = tanager::compile(Source::source("return 1 + \"a\";")).unwrap();
    // ...and blows up when run
    let error = tanager::run(&chunk).unwrap_err();
    assert_eq!(error.kind, TraceKind::Type);
    assert_eq!(error.message, "cannot add Number and String");
}

#[test]
fn duplicate_binding_fails_at_compile_time() {
    let error = tanager::compile(Source::source("let x = 1; let x = 2;")).unwrap_err();
    assert_eq!(error.kind, SyntaxKind::Semantic);
    assert_eq!(format!("{}", error), "symbol 'x' already defined in 1,16");
}

#[test]
fn empty_program_yields_nil() {
    assert_eq!(run("").unwrap(), Value::Nil);
    assert_eq!(run("return;").unwrap(), Value::Nil);
}

#[test]
fn ranges_are_values() {
    let result = run("return 1..10;").unwrap();
    assert_eq!(result, Value::Range(Rc::new(Range::new(1, 10))));
    assert_eq!(format!("{}", result), "1..10");
}

#[test]
fn prints_containers_with_quoted_strings() {
    let result = run("let a = [1, \"two\", nil, 3..4]; return a;").unwrap();
    assert_eq!(format!("{}", result), "[1, \"two\", nil, 3..4]");
}

#[test]
fn prints_strings_bare_at_top_level() {
    let result = run("return \"hello\";").unwrap();
    assert_eq!(format!("{}", result), "hello");
}

#[test]
fn arithmetic_has_sensible_precedence() {
    assert_eq!(run("return 2 + 3 * 4 - 6 / 3;").unwrap(), Value::Number(12.0));
    assert_eq!(run("return -2 * 3;").unwrap(), Value::Number(-6.0));
}

#[test]
fn refs_alias_plain_slots_too() {
    let result = run("let x = 1; inout r = &x; r = r + 41; return x;").unwrap();
    assert_eq!(result, Value::Number(42.0));
}

#[test]
fn check_only_compiles_produce_no_code() {
    let chunk = tanager::compile_with_flags(
        CompileFlags::CHECK_ONLY,
        Source::source("let a = [1, 2.5, \"s\"]; return a[0];"),
    )
    .unwrap();
    assert!(chunk.code.is_empty());
    assert!(chunk.constants.is_empty());
}

#[test]
fn check_only_still_reports_errors() {
    let error = tanager::compile_with_flags(
        CompileFlags::CHECK_ONLY,
        Source::source("inout r = 5;"),
    )
    .unwrap_err();
    assert_eq!(error.kind, SyntaxKind::Type);
}

#[test]
fn lexical_errors_carry_positions() {
    let error = tanager::compile(Source::source("let s = \"oops")).unwrap_err();
    assert_eq!(error.kind, SyntaxKind::Lexical);
    assert_eq!(format!("{}", error), "unterminated string in 1,9");
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    fn token(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Mod => a % b,
        }
    }
}

proptest! {
    /// Arithmetic on numbers mirrors IEEE-754 double arithmetic.
    #[test]
    fn arithmetic_mirrors_f64(op: BinOp, a in 0.0f64..1e9, b in 0.5f64..1e9) {
        let source = format!("return {} {} {};", a, op.token(), b);
        let result = run(&source).unwrap();
        prop_assert_eq!(result, Value::Number(op.apply(a, b)));
    }

    /// `len(a..b) = max(0, b - a)` and `(a..b)[i] = a + i`.
    #[test]
    fn range_laws(a in 0i64..200, b in 0i64..200) {
        let len = (b - a).max(0);
        if len > 0 {
            let i = len - 1;
            let source = format!("let r = {}..{}; return r[{}];", a, b, i);
            prop_assert_eq!(run(&source).unwrap(), Value::Number((a + i) as f64));
        } else {
            let source = format!("let r = {}..{}; return r[0];", a, b);
            prop_assert!(run(&source).is_err());
        }
    }
}
