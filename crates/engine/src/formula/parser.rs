//! Formula lexer and recursive-descent parser.
//!
//! `parse` turns formula text into an [`Ast`] with every reference
//! normalized against the entering cell: absolute axes keep their
//! coordinate, relative axes store the offset from the base. Grammar:
//!
//! ```text
//! expr    : term     (('+'|'-') term)*
//! term    : factor   (('*'|'/') factor)*
//! factor  : NUM | '-' factor | FN '(' expr (',' expr)* ')'
//!         | REF | '(' expr ')'
//! cellRef : '$'? LETTER '$'? DIGITS
//! ```

use std::iter::Peekable;
use std::str::Chars;

use crate::cell_id::CellId;
use crate::coord;
use crate::error::{EngineError, Result};

use super::ast::{Ast, Axis, CellRef, FnId};

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num { lexeme: String, value: f64 },
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    End,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Num { lexeme, .. } => format!("number `{lexeme}`"),
            Tok::Ident(s) => format!("`{s}`"),
            Tok::Plus => "`+`".to_string(),
            Tok::Minus => "`-`".to_string(),
            Tok::Star => "`*`".to_string(),
            Tok::Slash => "`/`".to_string(),
            Tok::LParen => "`(`".to_string(),
            Tok::RParen => "`)`".to_string(),
            Tok::Comma => "`,`".to_string(),
            Tok::End => "end of formula".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Tok>> {
    let mut toks = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_ascii_whitespace() => {
                chars.next();
            }
            '+' => {
                toks.push(Tok::Plus);
                chars.next();
            }
            '-' => {
                toks.push(Tok::Minus);
                chars.next();
            }
            '*' => {
                toks.push(Tok::Star);
                chars.next();
            }
            '/' => {
                toks.push(Tok::Slash);
                chars.next();
            }
            '(' => {
                toks.push(Tok::LParen);
                chars.next();
            }
            ')' => {
                toks.push(Tok::RParen);
                chars.next();
            }
            ',' => {
                toks.push(Tok::Comma);
                chars.next();
            }
            '0'..='9' => toks.push(lex_number(&mut chars)?),
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut lexeme = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                        lexeme.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Ident(lexeme));
            }
            _ => {
                return Err(EngineError::Syntax(format!("unrecognized character `{c}`")));
            }
        }
    }

    toks.push(Tok::End);
    Ok(toks)
}

/// `digits ('.' digits)? ([eE] [+-]? digits)?`. An exponent marker is
/// consumed only when digits actually follow, so `2e` lexes as the number
/// `2` and the identifier `e`.
fn lex_number(chars: &mut Peekable<Chars<'_>>) -> Result<Tok> {
    let mut lexeme = String::new();

    while let Some(&d) = chars.peek() {
        if d.is_ascii_digit() {
            lexeme.push(d);
            chars.next();
        } else {
            break;
        }
    }

    if chars.peek() == Some(&'.') {
        chars.next();
        lexeme.push('.');
        let before = lexeme.len();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                lexeme.push(d);
                chars.next();
            } else {
                break;
            }
        }
        if lexeme.len() == before {
            return Err(EngineError::Syntax(format!(
                "malformed number `{lexeme}`: digits required after `.`"
            )));
        }
    }

    if let Some(&e) = chars.peek() {
        if e == 'e' || e == 'E' {
            let mut lookahead = chars.clone();
            lookahead.next();
            let sign = match lookahead.peek() {
                Some(&s @ ('+' | '-')) => {
                    lookahead.next();
                    Some(s)
                }
                _ => None,
            };
            if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                chars.next();
                lexeme.push(e);
                if let Some(s) = sign {
                    chars.next();
                    lexeme.push(s);
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        lexeme.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    let value: f64 = lexeme
        .parse()
        .map_err(|_| EngineError::Syntax(format!("malformed number `{lexeme}`")))?;
    // f64 parsing saturates out-of-range literals to infinity instead of
    // failing; literals must stay finite.
    if !value.is_finite() {
        return Err(EngineError::Syntax(format!(
            "number `{lexeme}` out of range"
        )));
    }
    Ok(Tok::Num { lexeme, value })
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    base: CellId,
}

/// Parse `formula` with every reference normalized against `base` (the
/// cell the formula is entered into). Callers with no real base pass
/// [`CellId::ORIGIN`].
pub fn parse(formula: &str, base: CellId) -> Result<Ast> {
    let toks = tokenize(formula)?;
    let mut parser = Parser { toks, pos: 0, base };
    let ast = parser.expr()?;
    parser.expect_end()?;
    Ok(ast)
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn bump(&mut self) -> Tok {
        let tok = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: &Tok) -> Result<()> {
        if self.peek() == want {
            self.bump();
            Ok(())
        } else {
            Err(EngineError::Syntax(format!(
                "expected {}, found {}",
                want.describe(),
                self.peek().describe()
            )))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.expect(&Tok::End)
    }

    fn expr(&mut self) -> Result<Ast> {
        let mut node = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => FnId::Add,
                Tok::Minus => FnId::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.term()?;
            node = Ast::App { op, args: vec![node, rhs] };
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<Ast> {
        let mut node = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => FnId::Mul,
                Tok::Slash => FnId::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.factor()?;
            node = Ast::App { op, args: vec![node, rhs] };
        }
        Ok(node)
    }

    fn factor(&mut self) -> Result<Ast> {
        match self.bump() {
            Tok::Num { value, .. } => Ok(Ast::Num(value)),
            Tok::Minus => {
                let arg = self.factor()?;
                Ok(Ast::App { op: FnId::Neg, args: vec![arg] })
            }
            Tok::LParen => {
                let node = self.expr()?;
                self.expect(&Tok::RParen)?;
                Ok(node)
            }
            Tok::Ident(lexeme) => {
                if let Some(op) = FnId::from_name(&lexeme) {
                    self.expect(&Tok::LParen)?;
                    let mut args = vec![self.expr()?];
                    while self.peek() == &Tok::Comma {
                        self.bump();
                        args.push(self.expr()?);
                    }
                    self.expect(&Tok::RParen)?;
                    Ok(Ast::App { op, args })
                } else {
                    Ok(Ast::Ref(self.cell_ref(&lexeme)?))
                }
            }
            other => Err(EngineError::Syntax(format!(
                "expected a number, cell reference, function, or `(`, found {}",
                other.describe()
            ))),
        }
    }

    /// `'$'? LETTER '$'? DIGITS`, letters case-insensitive, no inner
    /// whitespace (the lexer never splits a reference). Normalized
    /// against the entering cell.
    ///
    /// A leading `$` pins the whole reference (`$a1` never moves under
    /// copy); a `$` before the digits pins the row alone (`a$1`).
    fn cell_ref(&self, lexeme: &str) -> Result<CellRef> {
        let bad = || EngineError::Syntax(format!("`{lexeme}` is not a function or cell reference"));

        let mut chars = lexeme.chars().peekable();
        let col_abs = chars.next_if_eq(&'$').is_some();
        let col = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .and_then(|c| coord::col_spec_to_index(c.to_ascii_lowercase()))
            .ok_or_else(bad)?;
        let row_abs = chars.next_if_eq(&'$').is_some() || col_abs;
        let digits: String = chars.collect();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let row = coord::row_spec_to_index(&digits)?;

        Ok(CellRef {
            col: if col_abs {
                Axis::absolute(col)
            } else {
                Axis::relative(col - self.base.col)
            },
            row: if row_abs {
                Axis::absolute(row)
            } else {
                Axis::relative(row - self.base.row)
            },
        })
    }
}
