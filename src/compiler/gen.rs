use std::rc::Rc;

use bitflags::bitflags;

use crate::common::chunk::{Chunk, MAX_CAPACITY};
use crate::common::opcode::Opcode;
use crate::common::source::Source;
use crate::common::value::Value;
use crate::compiler::lex::Lexer;
use crate::compiler::syntax::{Syntax, SyntaxKind};
use crate::compiler::token::{Token, TokenKind};

/// Symbol and constant indices must fit in an immediate byte.
pub const MAX_SYMBOLS: usize = u8::MAX as usize + 1;
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

bitflags! {
    /// Flags recognized by [`Compiler::init`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompileFlags: u8 {
        /// Parse and resolve everything, but emit no bytes and
        /// materialize no constants. A failing check-only compile
        /// cannot leave partial code behind.
        const CHECK_ONLY = 1 << 0;
    }
}

/// A compile-time record of one `let` or `inout` binding.
/// The slot index of a new symbol equals the symbol count at the
/// point of declaration, which is exactly where its initializer
/// landed on the operand stack.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Token,
    pub depth: usize,
    pub is_ref: bool,
    pub index: u8,
}

/*
chunk      := stmt* EOF

stmt       := "let" NAME ( "=" expr )? ";"
            | "inout" NAME "=" expr ";"
            | NAME "=" expr ";"
            | "return" expr? ";"
            | "{" stmt* "}"
            | expr ";"

expr       := add_expr ( ".." add_expr )?
add_expr   := mul_expr ( ( "+" | "-" ) mul_expr )*
mul_expr   := unary_expr ( ( "*" | "/" | "%" ) unary_expr )*
unary_expr := "-" unary_expr | prim_expr
prim_expr  := "nil" | "false" | "true" | INT | NUMBER | STRING
            | "[" ( expr ( "," expr )* )? "]"
            | "&" NAME ( "[" expr "]" )*
            | NAME ( "[" expr "]" )*
            | "(" expr ")"
*/

/// A single-pass compiler: it drives the lexer, resolves names
/// against a scope-aware symbol stack, and emits bytecode straight
/// into a chunk — no syntax tree is ever built. Expression methods
/// report whether they compiled a reference-producing expression,
/// which is what `inout` bindings require on their right-hand side.
#[derive(Debug)]
pub struct Compiler {
    flags: CompileFlags,
    lex: Lexer,
    scope_depth: usize,
    symbols: Vec<Symbol>,
    chunk: Chunk,
}

impl Compiler {
    /// Builds a compiler over `source`, lexing the first token.
    pub fn init(flags: CompileFlags, source: &Rc<Source>) -> Result<Compiler, Syntax> {
        Ok(Compiler {
            flags,
            lex: Lexer::init(source)?,
            scope_depth: 0,
            symbols: vec![],
            chunk: Chunk::new(),
        })
    }

    /// Parses a statement list up to EOF and returns the finished
    /// chunk. Every chunk ends with a `Nil; Return` epilogue so that
    /// every program yields a value.
    pub fn compile(mut self) -> Result<Chunk, Syntax> {
        while !self.matches(TokenKind::Eof) {
            self.stmt()?;
        }
        self.emit(Opcode::Nil)?;
        self.emit(Opcode::Return)?;

        log::debug!(
            "compiled {} code byte(s), {} constant(s)",
            self.chunk.code.len(),
            self.chunk.constants.len()
        );
        Ok(self.chunk)
    }

    // cursor plumbing

    fn matches(&self, kind: TokenKind) -> bool {
        self.lex.token.kind == kind
    }

    fn advance(&mut self) -> Result<(), Syntax> {
        self.lex.next()
    }

    fn consume(&mut self, kind: TokenKind) -> Result<(), Syntax> {
        if !self.matches(kind) {
            return Err(self.unexpected_token());
        }
        self.advance()
    }

    fn unexpected_token(&self) -> Syntax {
        let token = &self.lex.token;
        if token.kind == TokenKind::Eof {
            return Syntax::error(
                SyntaxKind::Syntax,
                "unexpected end of file",
                token.ln,
                token.col,
            );
        }
        Syntax::error(
            SyntaxKind::Syntax,
            format!("unexpected token '{}'", token.lexeme()),
            token.ln,
            token.col,
        )
    }

    // emission

    fn is_check_only(&self) -> bool {
        self.flags.contains(CompileFlags::CHECK_ONLY)
    }

    fn emit(&mut self, op: Opcode) -> Result<(), Syntax> {
        self.emit_raw(op.into())
    }

    fn emit_byte(&mut self, byte: u8) -> Result<(), Syntax> {
        self.emit_raw(byte)
    }

    fn emit_raw(&mut self, byte: u8) -> Result<(), Syntax> {
        if self.is_check_only() {
            return Ok(());
        }
        if self.chunk.code.len() >= MAX_CAPACITY {
            let token = &self.lex.token;
            return Err(Syntax::error(
                SyntaxKind::Range,
                "code too large",
                token.ln,
                token.col,
            ));
        }
        self.chunk.emit_byte(byte);
        Ok(())
    }

    /// Appends a constant and emits the instruction loading it.
    /// Never called in check-only mode: nothing materialized means
    /// nothing to release when a later error aborts the compile.
    fn emit_constant(&mut self, val: Value, token: &Token) -> Result<(), Syntax> {
        if self.chunk.constants.len() >= MAX_CONSTANTS {
            return Err(Syntax::error(
                SyntaxKind::Semantic,
                "too many constants",
                token.ln,
                token.col,
            ));
        }
        let index = self.chunk.add_constant(val);
        self.emit(Opcode::Const)?;
        self.emit_byte(index as u8)
    }

    // scopes and symbols

    fn push_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Emits one `Pop` per symbol declared at the closing depth,
    /// removes those symbols, and steps back out.
    fn pop_scope(&mut self) -> Result<(), Syntax> {
        let mut keep = self.symbols.len();
        while keep > 0 {
            let depth = self.symbols[keep - 1].depth;
            if depth > self.scope_depth {
                keep -= 1;
                continue;
            }
            if depth < self.scope_depth {
                break;
            }
            self.emit(Opcode::Pop)?;
            keep -= 1;
        }
        self.symbols.truncate(keep);
        self.scope_depth -= 1;
        Ok(())
    }

    fn define_symbol(&mut self, name: Token, is_ref: bool) -> Result<(), Syntax> {
        for symb in self.symbols.iter().rev() {
            if symb.depth < self.scope_depth {
                break;
            }
            if symb.name.lexeme() == name.lexeme() {
                return Err(Syntax::error(
                    SyntaxKind::Semantic,
                    format!("symbol '{}' already defined", name.lexeme()),
                    name.ln,
                    name.col,
                ));
            }
        }
        if self.symbols.len() >= MAX_SYMBOLS {
            return Err(Syntax::error(
                SyntaxKind::Semantic,
                "too many symbols defined",
                name.ln,
                name.col,
            ));
        }
        let index = self.symbols.len() as u8;
        self.symbols.push(Symbol {
            name,
            depth: self.scope_depth,
            is_ref,
            index,
        });
        Ok(())
    }

    /// Scans the symbol stack from the top; only symbols at the
    /// current depth resolve — reaching a shallower symbol ends the
    /// walk. Returns the slot index and the is-ref flag.
    fn find_symbol(&self, name: &Token) -> Result<(u8, bool), Syntax> {
        for symb in self.symbols.iter().rev() {
            if symb.depth > self.scope_depth {
                continue;
            }
            if symb.depth < self.scope_depth {
                break;
            }
            if symb.name.lexeme() == name.lexeme() {
                return Ok((symb.index, symb.is_ref));
            }
        }
        Err(Syntax::error(
            SyntaxKind::Semantic,
            format!("symbol '{}' referenced but not defined", name.lexeme()),
            name.ln,
            name.col,
        ))
    }

    // statements

    fn stmt(&mut self) -> Result<(), Syntax> {
        match self.lex.token.kind {
            TokenKind::Let => self.let_stmt(),
            TokenKind::Inout => self.inout_stmt(),
            TokenKind::Name => self.assign_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::LBrace => self.block_stmt(),
            _ => {
                self.expr()?;
                self.consume(TokenKind::Semicolon)?;
                self.emit(Opcode::Pop)
            }
        }
    }

    /// `let NAME ( = expr )? ;` — the initializer (or nil) stays on
    /// the stack; that stack slot *is* the variable.
    fn let_stmt(&mut self) -> Result<(), Syntax> {
        self.advance()?;
        if !self.matches(TokenKind::Name) {
            return Err(self.unexpected_token());
        }
        let name = self.lex.token.clone();
        self.advance()?;
        if self.matches(TokenKind::Eq) {
            self.advance()?;
            self.expr()?;
        } else {
            self.emit(Opcode::Nil)?;
        }
        self.consume(TokenKind::Semicolon)?;
        self.define_symbol(name, false)
    }

    /// `inout NAME = expr ;` — the right-hand side must produce a
    /// reference; handing a plain value to `inout` is a type error.
    fn inout_stmt(&mut self) -> Result<(), Syntax> {
        self.advance()?;
        if !self.matches(TokenKind::Name) {
            return Err(self.unexpected_token());
        }
        let name = self.lex.token.clone();
        self.advance()?;
        self.consume(TokenKind::Eq)?;
        let is_ref = self.expr()?;
        if !is_ref {
            return Err(Syntax::error(
                SyntaxKind::Type,
                format!("cannot pass a value to inout symbol '{}'", name.lexeme()),
                name.ln,
                name.col,
            ));
        }
        self.consume(TokenKind::Semicolon)?;
        self.define_symbol(name, true)
    }

    fn assign_stmt(&mut self) -> Result<(), Syntax> {
        let name = self.lex.token.clone();
        self.advance()?;
        if !self.matches(TokenKind::Eq) {
            return Err(self.unexpected_token());
        }
        self.advance()?;
        self.expr()?;
        self.consume(TokenKind::Semicolon)?;
        let (index, is_ref) = self.find_symbol(&name)?;
        if is_ref {
            self.emit(Opcode::SetLocalByRef)?;
        } else {
            self.emit(Opcode::SetLocal)?;
        }
        self.emit_byte(index)
    }

    /// A bare `return;` emits nothing — control falls through to the
    /// chunk's `Nil; Return` epilogue.
    fn return_stmt(&mut self) -> Result<(), Syntax> {
        self.advance()?;
        if self.matches(TokenKind::Semicolon) {
            return self.advance();
        }
        self.expr()?;
        self.consume(TokenKind::Semicolon)?;
        self.emit(Opcode::Return)
    }

    fn block_stmt(&mut self) -> Result<(), Syntax> {
        self.advance()?;
        self.push_scope();
        while !self.matches(TokenKind::RBrace) {
            self.stmt()?;
        }
        self.advance()?;
        self.pop_scope()
    }

    // expressions; each returns whether it produced a reference

    fn expr(&mut self) -> Result<bool, Syntax> {
        let is_ref = self.add_expr()?;
        if self.matches(TokenKind::DotDot) {
            self.advance()?;
            self.add_expr()?;
            self.emit(Opcode::Range)?;
            return Ok(false);
        }
        Ok(is_ref)
    }

    fn add_expr(&mut self) -> Result<bool, Syntax> {
        let mut is_ref = self.mul_expr()?;
        loop {
            let op = match self.lex.token.kind {
                TokenKind::Plus => Opcode::Add,
                TokenKind::Minus => Opcode::Sub,
                _ => break,
            };
            self.advance()?;
            self.mul_expr()?;
            self.emit(op)?;
            is_ref = false;
        }
        Ok(is_ref)
    }

    fn mul_expr(&mut self) -> Result<bool, Syntax> {
        let mut is_ref = self.unary_expr()?;
        loop {
            let op = match self.lex.token.kind {
                TokenKind::Star => Opcode::Mul,
                TokenKind::Slash => Opcode::Div,
                TokenKind::Percent => Opcode::Mod,
                _ => break,
            };
            self.advance()?;
            self.unary_expr()?;
            self.emit(op)?;
            is_ref = false;
        }
        Ok(is_ref)
    }

    fn unary_expr(&mut self) -> Result<bool, Syntax> {
        if self.matches(TokenKind::Minus) {
            self.advance()?;
            self.unary_expr()?;
            self.emit(Opcode::Neg)?;
            return Ok(false);
        }
        self.prim_expr()
    }

    fn prim_expr(&mut self) -> Result<bool, Syntax> {
        match self.lex.token.kind {
            TokenKind::Nil => {
                self.advance()?;
                self.emit(Opcode::Nil)?;
                Ok(false)
            }
            TokenKind::False => {
                self.advance()?;
                self.emit(Opcode::False)?;
                Ok(false)
            }
            TokenKind::True => {
                self.advance()?;
                self.emit(Opcode::True)?;
                Ok(false)
            }
            TokenKind::Int => {
                self.int()?;
                Ok(false)
            }
            TokenKind::Number => {
                self.number()?;
                Ok(false)
            }
            TokenKind::String => {
                self.string()?;
                Ok(false)
            }
            TokenKind::LBracket => {
                self.array()?;
                Ok(false)
            }
            TokenKind::Amp => {
                self.ref_expr()?;
                Ok(true)
            }
            TokenKind::Name => {
                self.symbol()?;
                Ok(false)
            }
            TokenKind::LParen => {
                self.advance()?;
                let is_ref = self.expr()?;
                self.consume(TokenKind::RParen)?;
                Ok(is_ref)
            }
            _ => Err(self.unexpected_token()),
        }
    }

    /// Small integers ride in the immediate byte; anything wider is
    /// promoted to a number constant.
    fn int(&mut self) -> Result<(), Syntax> {
        let token = self.lex.token.clone();
        self.advance()?;
        if self.is_check_only() {
            return Ok(());
        }
        let lexeme = token.lexeme();
        if let Ok(num) = lexeme.parse::<i64>() {
            if num <= u8::MAX as i64 {
                self.emit(Opcode::Int)?;
                return self.emit_byte(num as u8);
            }
            return self.emit_constant(Value::Number(num as f64), &token);
        }
        // wider than i64: the f64 parse of a digit string cannot fail
        let num: f64 = lexeme.parse().unwrap_or(f64::INFINITY);
        self.emit_constant(Value::Number(num), &token)
    }

    fn number(&mut self) -> Result<(), Syntax> {
        let token = self.lex.token.clone();
        self.advance()?;
        if self.is_check_only() {
            return Ok(());
        }
        let num: f64 = token.lexeme().parse().unwrap_or(f64::INFINITY);
        self.emit_constant(Value::Number(num), &token)
    }

    /// The token includes its quotes; the constant does not.
    fn string(&mut self) -> Result<(), Syntax> {
        let token = self.lex.token.clone();
        self.advance()?;
        if self.is_check_only() {
            return Ok(());
        }
        let lexeme = token.lexeme();
        let contents: Rc<str> = Rc::from(&lexeme[1..lexeme.len() - 1]);
        self.emit_constant(Value::String(contents), &token)
    }

    fn array(&mut self) -> Result<(), Syntax> {
        let open = self.lex.token.clone();
        self.advance()?;
        if self.matches(TokenKind::RBracket) {
            self.advance()?;
            self.emit(Opcode::Array)?;
            return self.emit_byte(0);
        }
        self.expr()?;
        let mut n: usize = 1;
        while self.matches(TokenKind::Comma) {
            self.advance()?;
            self.expr()?;
            n += 1;
            if n > u8::MAX as usize {
                return Err(Syntax::error(
                    SyntaxKind::Semantic,
                    "too many elements in array literal",
                    open.ln,
                    open.col,
                ));
            }
        }
        self.consume(TokenKind::RBracket)?;
        self.emit(Opcode::Array)?;
        self.emit_byte(n as u8)
    }

    /// A plain name loads the slot (through the ref when the symbol
    /// is an `inout` binding), then applies any index chain.
    fn symbol(&mut self) -> Result<(), Syntax> {
        let name = self.lex.token.clone();
        self.advance()?;
        let (index, is_ref) = self.find_symbol(&name)?;
        if is_ref {
            self.emit(Opcode::GetLocalByRef)?;
        } else {
            self.emit(Opcode::GetLocal)?;
        }
        self.emit_byte(index)?;
        while self.matches(TokenKind::LBracket) {
            self.advance()?;
            self.expr()?;
            self.consume(TokenKind::RBracket)?;
            self.emit(Opcode::GetElement)?;
        }
        Ok(())
    }

    /// `&NAME` produces a reference to the named slot. With an index
    /// chain, every bracket pair but the last indexes inward and the
    /// last becomes a reference into the innermost array cell.
    fn ref_expr(&mut self) -> Result<(), Syntax> {
        self.advance()?;
        if !self.matches(TokenKind::Name) {
            return Err(self.unexpected_token());
        }
        let name = self.lex.token.clone();
        self.advance()?;
        let (index, is_ref) = self.find_symbol(&name)?;

        if !self.matches(TokenKind::LBracket) {
            self.emit(Opcode::LocalRef)?;
            return self.emit_byte(index);
        }

        if is_ref {
            self.emit(Opcode::GetLocalByRef)?;
        } else {
            self.emit(Opcode::GetLocal)?;
        }
        self.emit_byte(index)?;
        loop {
            self.advance()?;
            self.expr()?;
            self.consume(TokenKind::RBracket)?;
            if self.matches(TokenKind::LBracket) {
                self.emit(Opcode::GetElement)?;
            } else {
                return self.emit(Opcode::ElementRef);
            }
        }
    }
}
