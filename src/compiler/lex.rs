use std::rc::Rc;

use crate::common::source::Source;
use crate::common::span::Span;
use crate::compiler::syntax::{Syntax, SyntaxKind};
use crate::compiler::token::{Token, TokenKind};

fn is_name_start(byte: u8) -> bool {
    byte == b'_' || byte.is_ascii_alphabetic()
}

fn is_name_continue(byte: u8) -> bool {
    byte == b'_' || byte.is_ascii_alphanumeric()
}

/// A pull lexer: it holds the *current* token and produces the next
/// one on demand. `init` positions at line 1, column 1 and pre-lexes
/// the first token; consumers read `token` and call `next` to
/// advance. The greedy longest-match rules live in the `scan_*`
/// methods below.
#[derive(Debug)]
pub struct Lexer {
    source: Rc<Source>,
    offset: usize,
    ln: usize,
    col: usize,
    pub token: Token,
}

impl Lexer {
    /// Creates a lexer over `source` and pre-produces the first token.
    pub fn init(source: &Rc<Source>) -> Result<Lexer, Syntax> {
        let mut lexer = Lexer {
            source: Rc::clone(source),
            offset: 0,
            ln: 1,
            col: 1,
            token: Token::new(TokenKind::Eof, 1, 1, Span::new(source, 0, 0)),
        };
        lexer.next()?;
        Ok(lexer)
    }

    /// Advances to the following token.
    pub fn next(&mut self) -> Result<(), Syntax> {
        self.token = self.scan()?;
        Ok(())
    }

    /// The byte `i` positions ahead of the cursor, or 0 past the end.
    fn byte_at(&self, i: usize) -> u8 {
        *self
            .source
            .contents
            .as_bytes()
            .get(self.offset + i)
            .unwrap_or(&0)
    }

    /// Steps the cursor over `length` bytes, tracking line and column.
    fn advance(&mut self, length: usize) {
        for _ in 0..length {
            if self.byte_at(0) == b'\n' {
                self.ln += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.offset += 1;
        }
    }

    /// Builds a token of `length` bytes at the cursor, then steps past it.
    fn make(&mut self, kind: TokenKind, length: usize) -> Token {
        let token = Token::new(
            kind,
            self.ln,
            self.col,
            Span::new(&self.source, self.offset, length),
        );
        self.advance(length);
        token
    }

    fn skip_space(&mut self) {
        while self.byte_at(0).is_ascii_whitespace() {
            self.advance(1);
        }
    }

    fn scan(&mut self) -> Result<Token, Syntax> {
        self.skip_space();

        if self.offset >= self.source.contents.len() {
            return Ok(self.make(TokenKind::Eof, 0));
        }

        // two-character punctuation comes before its one-character prefix
        if self.byte_at(0) == b'.' && self.byte_at(1) == b'.' {
            return Ok(self.make(TokenKind::DotDot, 2));
        }

        let kind = match self.byte_at(0) {
            b',' => Some(TokenKind::Comma),
            b';' => Some(TokenKind::Semicolon),
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            b'=' => Some(TokenKind::Eq),
            b'&' => Some(TokenKind::Amp),
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'*' => Some(TokenKind::Star),
            b'/' => Some(TokenKind::Slash),
            b'%' => Some(TokenKind::Percent),
            _ => None,
        };
        if let Some(kind) = kind {
            return Ok(self.make(kind, 1));
        }

        if let Some(token) = self.scan_number() {
            return Ok(token);
        }
        if self.byte_at(0) == b'"' {
            return self.scan_string();
        }

        for (kw, kind) in [
            ("false", TokenKind::False),
            ("inout", TokenKind::Inout),
            ("let", TokenKind::Let),
            ("nil", TokenKind::Nil),
            ("return", TokenKind::Return),
            ("true", TokenKind::True),
        ] {
            if let Some(token) = self.scan_keyword(kw, kind) {
                return Ok(token);
            }
        }

        if let Some(token) = self.scan_name() {
            return Ok(token);
        }

        let c = self.byte_at(0);
        let c = if c.is_ascii_graphic() { c as char } else { '?' };
        Err(Syntax::error(
            SyntaxKind::Lexical,
            format!("unexpected character '{}'", c),
            self.ln,
            self.col,
        ))
    }

    /// An integer is `0` or a non-zero digit followed by digits; a
    /// number extends an integer with `.digits` or an exponent. If a
    /// decimal point is not followed by a digit it is left unconsumed
    /// so that `1..10` lexes as `1`, `..`, `10`. A numeric token
    /// running into an identifier character matches nothing, which
    /// surfaces as an unexpected-character error.
    fn scan_number(&mut self) -> Option<Token> {
        let mut length = 0;
        if self.byte_at(0) == b'0' {
            length += 1;
        } else {
            if !(b'1'..=b'9').contains(&self.byte_at(0)) {
                return None;
            }
            length += 1;
            while self.byte_at(length).is_ascii_digit() {
                length += 1;
            }
        }

        let mut kind = TokenKind::Int;
        if self.byte_at(length) == b'.' {
            if !self.byte_at(length + 1).is_ascii_digit() {
                return Some(self.make(kind, length));
            }
            length += 2;
            while self.byte_at(length).is_ascii_digit() {
                length += 1;
            }
            kind = TokenKind::Number;
        }
        if self.byte_at(length) == b'e' || self.byte_at(length) == b'E' {
            length += 1;
            if self.byte_at(length) == b'+' || self.byte_at(length) == b'-' {
                length += 1;
            }
            if !self.byte_at(length).is_ascii_digit() {
                return None;
            }
            while self.byte_at(length).is_ascii_digit() {
                length += 1;
            }
            kind = TokenKind::Number;
        }
        if is_name_continue(self.byte_at(length)) {
            return None;
        }

        Some(self.make(kind, length))
    }

    /// Characters are taken literally up to the closing quote;
    /// no escape processing happens in the core.
    fn scan_string(&mut self) -> Result<Token, Syntax> {
        let mut length = 1;
        loop {
            if self.offset + length >= self.source.contents.len() {
                return Err(Syntax::error(
                    SyntaxKind::Lexical,
                    "unterminated string",
                    self.ln,
                    self.col,
                ));
            }
            if self.byte_at(length) == b'"' {
                return Ok(self.make(TokenKind::String, length + 1));
            }
            length += 1;
        }
    }

    /// A keyword only matches when the following character could not
    /// continue an identifier; otherwise it's a name (`lettuce`).
    fn scan_keyword(&mut self, kw: &str, kind: TokenKind) -> Option<Token> {
        let rest = &self.source.contents.as_bytes()[self.offset..];
        if !rest.starts_with(kw.as_bytes()) {
            return None;
        }
        if is_name_continue(self.byte_at(kw.len())) {
            return None;
        }
        Some(self.make(kind, kw.len()))
    }

    fn scan_name(&mut self) -> Option<Token> {
        if !is_name_start(self.byte_at(0)) {
            return None;
        }
        let mut length = 1;
        while is_name_continue(self.byte_at(length)) {
            length += 1;
        }
        Some(self.make(TokenKind::Name, length))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn lex_kinds(source: &str) -> Result<Vec<(TokenKind, String)>, Syntax> {
        let source = Source::source(source);
        let mut lexer = Lexer::init(&source)?;
        let mut tokens = vec![];
        while lexer.token.kind != TokenKind::Eof {
            tokens.push((lexer.token.kind, lexer.token.lexeme()));
            lexer.next()?;
        }
        Ok(tokens)
    }

    #[test]
    fn empty_source() {
        let source = Source::source("");
        let lexer = Lexer::init(&source).unwrap();
        assert_eq!(lexer.token.kind, TokenKind::Eof);
    }

    #[test]
    fn punctuation() {
        let kinds: Vec<TokenKind> = lex_kinds(", ; ( ) [ ] { } = & + - * / % ..")
            .unwrap()
            .into_iter()
            .map(|(kind, _)| kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eq,
                TokenKind::Amp,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::DotDot,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_kinds("0 42 3.14 1e5 2.5e-3").unwrap(),
            vec![
                (TokenKind::Int, "0".to_string()),
                (TokenKind::Int, "42".to_string()),
                (TokenKind::Number, "3.14".to_string()),
                (TokenKind::Number, "1e5".to_string()),
                (TokenKind::Number, "2.5e-3".to_string()),
            ]
        );
    }

    #[test]
    fn range_dots_are_not_eaten() {
        assert_eq!(
            lex_kinds("1..10").unwrap(),
            vec![
                (TokenKind::Int, "1".to_string()),
                (TokenKind::DotDot, "..".to_string()),
                (TokenKind::Int, "10".to_string()),
            ]
        );
    }

    #[test]
    fn number_running_into_name_is_an_error() {
        let error = lex_kinds("123abc").unwrap_err();
        assert_eq!(error.kind, SyntaxKind::Lexical);
    }

    #[test]
    fn zero_padded_numbers_are_rejected() {
        // an integer is `0` or a non-zero digit followed by digits
        let error = lex_kinds("01").unwrap_err();
        assert_eq!(error.kind, SyntaxKind::Lexical);
    }

    #[test]
    fn strings() {
        assert_eq!(
            lex_kinds("\"heck\"").unwrap(),
            vec![(TokenKind::String, "\"heck\"".to_string())]
        );
    }

    #[test]
    fn unterminated_string() {
        let error = lex_kinds("\"oops").unwrap_err();
        assert_eq!(error.kind, SyntaxKind::Lexical);
        assert_eq!(error.reason, "unterminated string");
    }

    #[test]
    fn keywords_and_names() {
        assert_eq!(
            lex_kinds("let lettuce inout _x nil0").unwrap(),
            vec![
                (TokenKind::Let, "let".to_string()),
                (TokenKind::Name, "lettuce".to_string()),
                (TokenKind::Inout, "inout".to_string()),
                (TokenKind::Name, "_x".to_string()),
                (TokenKind::Name, "nil0".to_string()),
            ]
        );
    }

    #[test]
    fn lines_and_columns() {
        let source = Source::source("let x;\n  x = 1;");
        let mut lexer = Lexer::init(&source).unwrap();
        assert_eq!((lexer.token.ln, lexer.token.col), (1, 1));
        lexer.next().unwrap(); // x
        assert_eq!((lexer.token.ln, lexer.token.col), (1, 5));
        lexer.next().unwrap(); // ;
        lexer.next().unwrap(); // x on the next line
        assert_eq!((lexer.token.ln, lexer.token.col), (2, 3));
    }

    #[test]
    fn unexpected_character() {
        let error = lex_kinds("let @").unwrap_err();
        assert_eq!(error.kind, SyntaxKind::Lexical);
        assert_eq!(error.reason, "unexpected character '@'");
    }

    proptest! {
        /// Every accepted token's span reads back as exactly its lexeme.
        #[test]
        fn round_trip(words in proptest::collection::vec("[a-z_][a-z0-9_]{0,8}|[1-9][0-9]{0,6}|0", 0..12)) {
            let text = words.join(" ");
            let source = Source::source(&text);
            let mut lexer = Lexer::init(&source).unwrap();
            let mut collected = vec![];
            while lexer.token.kind != TokenKind::Eof {
                let token = lexer.token.clone();
                prop_assert_eq!(
                    &source.contents[token.span.offset..token.span.offset + token.span.length],
                    token.lexeme()
                );
                collected.push(token.lexeme());
                lexer.next().unwrap();
            }
            // nothing dropped, nothing invented
            prop_assert_eq!(collected.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }
}
