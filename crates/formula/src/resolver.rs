//! Symbol resolver
//!
//! Binds every variable of a parsed formula to exactly one catalog member.

use crate::ast::{BinaryOp, Expr};
use crate::catalog::{OutputKind, VariableBinding, VariableCatalog};
use crate::error::{FormulaError, Result};
use std::sync::Arc;

/// Expression whose variables were replaced by binding slots
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Literal(f64),

    /// Index into [`BoundFormula::bindings`]
    Slot(usize),

    Binary {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },

    Negate(Box<BoundExpr>),
}

/// Resolved formula, ready for code generation
pub struct BoundFormula<S> {
    formula: String,
    expr: BoundExpr,
    bindings: Vec<Arc<VariableBinding<S>>>,
}

impl<S> BoundFormula<S> {
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn expr(&self) -> &BoundExpr {
        &self.expr
    }

    /// Distinct referenced bindings, in first-reference order
    pub fn bindings(&self) -> &[Arc<VariableBinding<S>>] {
        &self.bindings
    }
}

/// Resolve `expr` (parsed from `formula`) against `catalog`
pub fn resolve<S>(expr: &Expr, catalog: &VariableCatalog<S>, formula: &str) -> Result<BoundFormula<S>> {
    let mut resolver = Resolver {
        catalog,
        formula,
        bindings: Vec::new(),
    };
    let expr = resolver.bind(expr)?;

    Ok(BoundFormula {
        formula: formula.to_string(),
        expr,
        bindings: resolver.bindings,
    })
}

struct Resolver<'a, S> {
    catalog: &'a VariableCatalog<S>,
    formula: &'a str,
    bindings: Vec<Arc<VariableBinding<S>>>,
}

impl<'a, S> Resolver<'a, S> {
    fn bind(&mut self, expr: &Expr) -> Result<BoundExpr> {
        Ok(match expr {
            Expr::Literal(n) => BoundExpr::Literal(*n),
            Expr::Variable { name, .. } => BoundExpr::Slot(self.slot_for(name)?),
            Expr::Binary { op, left, right } => BoundExpr::Binary {
                op: *op,
                left: Box::new(self.bind(left)?),
                right: Box::new(self.bind(right)?),
            },
            Expr::Negate(operand) => BoundExpr::Negate(Box::new(self.bind(operand)?)),
        })
    }

    /// Slot of the binding for `name`, allocating one on first reference
    fn slot_for(&mut self, name: &str) -> Result<usize> {
        let binding = self.lookup(name)?;

        if let Some(slot) = self.bindings.iter().position(|b| Arc::ptr_eq(b, &binding)) {
            return Ok(slot);
        }
        self.bindings.push(binding);
        Ok(self.bindings.len() - 1)
    }

    fn lookup(&self, name: &str) -> Result<Arc<VariableBinding<S>>> {
        let candidates = self.catalog.candidates(name);
        if candidates.is_empty() {
            return Err(FormulaError::UnknownVariable {
                formula: self.formula.to_string(),
                name: name.to_string(),
                state_type: self.catalog.state_type(),
            });
        }

        // A candidate shadowed by a more-derived one drops out; whatever
        // remains is pairwise unrelated.
        let winners: Vec<&Arc<VariableBinding<S>>> = candidates
            .iter()
            .copied()
            .filter(|candidate| !candidates.iter().any(|other| other.is_more_derived_than(candidate)))
            .collect();

        if winners.len() > 1 {
            return Err(FormulaError::AmbiguousVariable {
                formula: self.formula.to_string(),
                name: name.to_string(),
                candidates: winners.iter().map(|b| b.qualified_name()).collect(),
            });
        }

        let winner = winners[0];
        if winner.output_kind() == OutputKind::NotNumeric {
            return Err(FormulaError::NonNumericVariable {
                formula: self.formula.to_string(),
                name: name.to_string(),
                type_name: winner.type_name(),
            });
        }

        Ok(Arc::clone(winner))
    }
}
