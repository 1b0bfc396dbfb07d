//! Formula Abstract Syntax Tree

use crate::lexer::Token;
use std::fmt;

/// Formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number literal
    Literal(f64),

    /// Variable reference
    Variable { name: String, position: usize },

    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary minus
    Negate(Box<Expr>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Convert an operator token, if it is one
    pub fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            _ => None,
        }
    }

    /// Apply with IEEE-754 double semantics
    #[inline]
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

impl Expr {
    /// Distinct variable names in first-occurrence order
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Variable { name, .. } => {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Negate(operand) => operand.collect_variables(names),
        }
    }

    /// Value of the expression if it references no variables
    pub fn constant_value(&self) -> Option<f64> {
        match self {
            Expr::Literal(n) => Some(*n),
            Expr::Variable { .. } => None,
            Expr::Binary { op, left, right } => {
                Some(op.apply(left.constant_value()?, right.constant_value()?))
            }
            Expr::Negate(operand) => operand.constant_value().map(|n| -n),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Literal(n) => write!(f, "{}", n),
            Expr::Variable { name, .. } => write!(f, "{}", name),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Negate(operand) => write!(f, "-{}", operand),
        }
    }
}
