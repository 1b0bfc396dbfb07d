//! Formula Lexer
//!
//! Lexical analysis for reward formulas.

use crate::error::{FormulaError, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Formula token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Identifier(String),

    // Operators
    Plus,           // +
    Minus,          // -
    Star,           // *
    Slash,          // /

    // Delimiters
    LParen,         // (
    RParen,         // )

    // End of formula
    Eof,
}

impl Token {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Identifier(name) => format!("identifier `{}`", name),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Eof => "end of formula".into(),
        }
    }
}

/// Token with its starting character position
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Formula lexer
pub struct Lexer<'a> {
    formula: &'a str,
    input: Peekable<Chars<'a>>,
    position: usize,
    ch: Option<char>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer
    pub fn new(formula: &'a str) -> Self {
        let mut chars = formula.chars().peekable();
        let ch = chars.next();
        Self {
            formula,
            input: chars,
            position: 0,
            ch,
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace();

        let position = self.position;
        let token = match self.ch {
            None => Token::Eof,

            Some(ch) => match ch {
                '0'..='9' => self.read_number()?,

                'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),

                '+' => { self.advance(); Token::Plus }
                '-' => { self.advance(); Token::Minus }
                '*' => { self.advance(); Token::Star }
                '/' => { self.advance(); Token::Slash }
                '(' => { self.advance(); Token::LParen }
                ')' => { self.advance(); Token::RParen }

                _ => return Err(self.error(position, format!("Unexpected character '{}'", ch))),
            },
        };

        Ok(Spanned { token, position })
    }

    /// Tokenize the whole formula, ending with `Token::Eof`
    pub fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Read a decimal literal: `digits ('.' digits)?`
    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut num_str = String::new();

        // Swallow everything that could belong to the literal so that
        // `1.2.3` or `3kills` is reported as one malformed literal.
        while let Some(ch) = self.ch {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let well_formed = match num_str.split_once('.') {
            Some((int, frac)) => is_digits(int) && is_digits(frac),
            None => is_digits(&num_str),
        };
        if !well_formed {
            return Err(self.error(start, format!("Malformed numeric literal '{}'", num_str)));
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(start, format!("Malformed numeric literal '{}'", num_str)))
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(ch) = self.ch {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(ident)
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.ch = self.input.next();
        self.position += 1;
    }

    /// Skip whitespace
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.ch {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, position: usize, message: String) -> FormulaError {
        FormulaError::Parse {
            formula: self.formula.to_string(),
            position,
            message,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
