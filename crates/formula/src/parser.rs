//! Formula Parser
//!
//! Recursive descent parser for reward formulas.
//!
//! ```text
//! expression := term
//! term       := factor (('+' | '-') factor)*
//! factor     := unary (('*' | '/') unary)*
//! unary      := '-' unary | primary
//! primary    := NUMBER | IDENTIFIER | '(' expression ')'
//! ```

use crate::ast::{BinaryOp, Expr};
use crate::error::{FormulaError, Result};
use crate::lexer::{Lexer, Spanned, Token};

/// Parse a formula into an expression tree
pub fn parse(formula: &str) -> Result<Expr> {
    Parser::new(formula).parse()
}

/// Formula parser
pub struct Parser<'a> {
    formula: &'a str,
    tokens: Vec<Spanned>,
    current: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(formula: &'a str) -> Self {
        Self {
            formula,
            tokens: Vec::new(),
            current: 0,
        }
    }

    /// Parse the whole formula
    pub fn parse(mut self) -> Result<Expr> {
        self.tokens = Lexer::new(self.formula).tokenize()?;

        if self.check(&Token::Eof) {
            return Err(self.error_at(0, "Empty formula".into()));
        }

        let expr = self.expression()?;

        if !self.check(&Token::Eof) {
            let token = self.peek();
            let message = match token.token {
                Token::RParen => "Unbalanced ')'".to_string(),
                _ => format!("Unexpected {} after expression", token.token.describe()),
            };
            return Err(self.error_at(token.position, message));
        }

        Ok(expr)
    }

    /// Parse an expression
    fn expression(&mut self) -> Result<Expr> {
        self.term()
    }

    /// Parse addition and subtraction
    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while let Some(op) = self.match_ops(&[BinaryOp::Add, BinaryOp::Sub]) {
            let right = self.factor()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Parse multiplication and division
    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while let Some(op) = self.match_ops(&[BinaryOp::Mul, BinaryOp::Div]) {
            let right = self.unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Parse unary minus
    fn unary(&mut self) -> Result<Expr> {
        if self.check(&Token::Minus) {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }

        self.primary()
    }

    /// Parse primary expression
    fn primary(&mut self) -> Result<Expr> {
        let Spanned { token, position } = self.advance();

        match token {
            Token::Number(n) => Ok(Expr::Literal(n)),

            Token::Identifier(name) => Ok(Expr::Variable { name, position }),

            Token::LParen => {
                let expr = self.expression()?;
                self.consume(Token::RParen, position)?;
                Ok(expr)
            }

            Token::Eof => Err(self.error_at(position, "Expected expression, found end of formula".into())),

            other => Err(self.error_at(position, format!("Expected expression, found {}", other.describe()))),
        }
    }

    /// Check if the current token matches
    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.peek().token) == std::mem::discriminant(token)
    }

    /// Match any of the given operators and advance
    fn match_ops(&mut self, ops: &[BinaryOp]) -> Option<BinaryOp> {
        let op = BinaryOp::from_token(&self.peek().token)?;
        if ops.contains(&op) {
            self.advance();
            Some(op)
        } else {
            None
        }
    }

    /// Consume the closing parenthesis opened at `open`
    fn consume(&mut self, token: Token, open: usize) -> Result<()> {
        if self.check(&token) {
            self.advance();
            return Ok(());
        }

        let found = self.peek().clone();
        let message = match found.token {
            Token::Eof => format!("Unbalanced '(' opened at position {}", open),
            other => format!("Expected ')' to close '(' at position {}, found {}", open, other.describe()),
        };
        Err(self.error_at(found.position, message))
    }

    fn peek(&self) -> &Spanned {
        // The token stream always ends with Eof and we never advance past it.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    /// Advance to the next token, returning the consumed one
    fn advance(&mut self) -> Spanned {
        let token = self.peek().clone();
        if token.token != Token::Eof {
            self.current += 1;
        }
        token
    }

    fn error_at(&self, position: usize, message: String) -> FormulaError {
        FormulaError::Parse {
            formula: self.formula.to_string(),
            position,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(formula: &str) -> (usize, String) {
        match parse(formula) {
            Err(FormulaError::Parse { position, message, formula: f }) => {
                assert_eq!(f, formula);
                (position, message)
            }
            other => panic!("expected parse error for {:?}, got {:?}", formula, other),
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Literal(42.0));
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse("10 + kills * 2").unwrap();
        assert_eq!(expr.to_string(), "(10 + (kills * 2))");
    }

    #[test]
    fn test_parse_left_associativity() {
        assert_eq!(parse("a - b - c").unwrap().to_string(), "((a - b) - c)");
        assert_eq!(parse("a / b * c").unwrap().to_string(), "((a / b) * c)");
    }

    #[test]
    fn test_parse_parentheses_override() {
        assert_eq!(parse("(10 + kills) * 2").unwrap().to_string(), "((10 + kills) * 2)");
        assert_eq!(parse("((x))").unwrap().to_string(), "x");
    }

    #[test]
    fn test_parse_unary_minus() {
        assert_eq!(parse("-kills + 3").unwrap().to_string(), "(-kills + 3)");
        assert_eq!(parse("2 * -(a - 1)").unwrap().to_string(), "(2 * -(a - 1))");
        assert_eq!(parse("--1").unwrap().constant_value(), Some(1.0));
    }

    #[test]
    fn test_variable_positions() {
        match parse("1 + kills").unwrap() {
            Expr::Binary { right, .. } => {
                assert_eq!(*right, Expr::Variable { name: "kills".into(), position: 4 });
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_display_round_trips() {
        for formula in ["10 + kills * 2", "-(a - b) / (c + 0.25)", "x * -y - 3"] {
            let printed = parse(formula).unwrap().to_string();
            assert_eq!(parse(&printed).unwrap().to_string(), printed);
        }
    }

    #[test]
    fn test_empty_formula() {
        assert_eq!(parse_err(""), (0, "Empty formula".into()));
        assert_eq!(parse_err("   ").0, 0);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let (position, message) = parse_err("(1 + 2");
        assert_eq!(position, 6);
        assert!(message.contains("Unbalanced '('"), "{}", message);

        let (position, message) = parse_err("1 + 2)");
        assert_eq!(position, 5);
        assert_eq!(message, "Unbalanced ')'");
    }

    #[test]
    fn test_trailing_tokens() {
        let (position, message) = parse_err("kills 2");
        assert_eq!(position, 6);
        assert!(message.contains("Unexpected number"), "{}", message);
    }

    #[test]
    fn test_missing_operand() {
        let (position, message) = parse_err("1 +");
        assert_eq!(position, 3);
        assert!(message.contains("end of formula"), "{}", message);

        let (position, _) = parse_err("* 2");
        assert_eq!(position, 0);
    }

    #[test]
    fn test_malformed_literal() {
        let (position, message) = parse_err("10 + 1.2.3");
        assert_eq!(position, 5);
        assert!(message.contains("Malformed numeric literal"), "{}", message);
    }
}
