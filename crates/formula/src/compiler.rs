//! Formula compiler
//!
//! Turns a [`BoundFormula`] into a [`CompiledEvaluator`]: a tree of
//! specialized closures over a flat slot array, plus the reward type's single
//! construction path. Each referenced member is read once per evaluation, no
//! matter how often the formula mentions it.

use crate::ast::BinaryOp;
use crate::catalog::{ProgressState, Reader};
use crate::error::{FormulaError, Result};
use crate::resolver::{BoundExpr, BoundFormula};
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// Slots read on the stack before falling back to a heap buffer
const INLINE_SLOTS: usize = 8;

type Op = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Reward type constructible from a formula result
pub trait RewardType: Sized + 'static {
    /// Declare the single-argument constructors of the reward
    ///
    /// Exactly one must be declared for formulas to compile.
    fn constructors(table: &mut ConstructorTable<Self>);
}

/// Category of a constructor parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Float,
    Text,
}

/// Constructor parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamType {
    pub kind: ParamKind,
    pub name: &'static str,
}

/// Numeric constructor parameter
pub trait NumericParam: Sized + 'static {
    const KIND: ParamKind;

    /// Materialize a formula result
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_integer_param {
    ($($t:ty),*) => {
        $(
            impl NumericParam for $t {
                const KIND: ParamKind = ParamKind::Integer;

                /// Round half away from zero, then saturate (NaN becomes 0)
                #[inline]
                fn from_f64(value: f64) -> Self {
                    value.round() as $t
                }
            }
        )*
    };
}

impl_integer_param!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl NumericParam for f32 {
    const KIND: ParamKind = ParamKind::Float;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl NumericParam for f64 {
    const KIND: ParamKind = ParamKind::Float;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Locale-invariant text form of a formula result
///
/// Shortest round-trip decimal without exponent; `NaN`, `Infinity` and
/// `-Infinity` for the special values. Negative zero prints as `0`.
pub fn format_invariant(value: f64) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if value == 0.0 {
        "0".into()
    } else {
        value.to_string()
    }
}

/// One way of building a reward from a single value
pub struct ConstructionPath<R> {
    param: ParamType,
    build: Arc<dyn Fn(f64) -> R + Send + Sync>,
}

impl<R> ConstructionPath<R> {
    pub fn param(&self) -> ParamType {
        self.param
    }

    pub fn build(&self, value: f64) -> R {
        (self.build)(value)
    }
}

/// Constructor declarations of one reward type
pub struct ConstructorTable<R> {
    paths: Vec<ConstructionPath<R>>,
}

impl<R: 'static> ConstructorTable<R> {
    /// Constructor taking one numeric primitive
    pub fn number<T: NumericParam>(&mut self, ctor: fn(T) -> R) -> &mut Self {
        self.paths.push(ConstructionPath {
            param: ParamType {
                kind: T::KIND,
                name: type_name::<T>(),
            },
            build: Arc::new(move |value| ctor(T::from_f64(value))),
        });
        self
    }

    /// Constructor taking one string
    pub fn string(&mut self, ctor: fn(String) -> R) -> &mut Self {
        self.paths.push(ConstructionPath {
            param: ParamType {
                kind: ParamKind::Text,
                name: "String",
            },
            build: Arc::new(move |value| ctor(format_invariant(value))),
        });
        self
    }
}

/// Locate the single usable construction path of `R`
pub fn construction_path<R: RewardType>() -> Result<ConstructionPath<R>> {
    let mut table = ConstructorTable { paths: Vec::new() };
    R::constructors(&mut table);

    match table.paths.len() {
        0 => Err(FormulaError::NoConstructionPath {
            reward_type: type_name::<R>(),
        }),
        1 => Ok(table.paths.remove(0)),
        _ => Err(FormulaError::AmbiguousConstructionPath {
            reward_type: type_name::<R>(),
            params: table.paths.iter().map(|path| path.param.name).collect(),
        }),
    }
}

/// Compiled `state -> reward` function
///
/// Immutable and safe to call from any number of threads at once.
pub struct CompiledEvaluator<S, R> {
    formula: String,
    readers: Vec<Reader<S>>,
    body: Op,
    path: ConstructionPath<R>,
}

impl<S, R> CompiledEvaluator<S, R> {
    /// Evaluate against a state and construct the reward
    #[inline]
    pub fn evaluate(&self, state: &S) -> R {
        self.materialize(self.evaluate_raw(state))
    }

    /// Construct the reward from an already computed result
    #[inline]
    pub fn materialize(&self, value: f64) -> R {
        self.path.build(value)
    }

    /// Formula result before it is materialized into the reward parameter
    pub fn evaluate_raw(&self, state: &S) -> f64 {
        let count = self.readers.len();
        if count <= INLINE_SLOTS {
            let mut slots = [0.0; INLINE_SLOTS];
            for (slot, read) in slots.iter_mut().zip(&self.readers) {
                *slot = read(state);
            }
            (self.body)(&slots[..count])
        } else {
            let slots: Vec<f64> = self.readers.iter().map(|read| read(state)).collect();
            (self.body)(&slots)
        }
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Parameter type of the reward constructor in use
    pub fn parameter(&self) -> ParamType {
        self.path.param
    }

    /// Number of members read per evaluation
    pub fn variable_count(&self) -> usize {
        self.readers.len()
    }
}

impl<S, R> fmt::Debug for CompiledEvaluator<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEvaluator")
            .field("formula", &self.formula)
            .field("variables", &self.readers.len())
            .field("parameter", &self.path.param)
            .finish()
    }
}

/// Compile a resolved formula for reward type `R`
pub fn compile<S: ProgressState, R: RewardType>(bound: &BoundFormula<S>) -> Result<CompiledEvaluator<S, R>> {
    let path = construction_path::<R>()?;

    let readers = bound
        .bindings()
        .iter()
        .map(|binding| {
            binding.reader().cloned().ok_or_else(|| FormulaError::NonNumericVariable {
                formula: bound.formula().to_string(),
                name: binding.name().to_string(),
                type_name: binding.type_name(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut compiler = Compiler::new();
    let body = compiler.compile_expression(bound.expr());

    tracing::debug!(
        "Compiled `{}` for {} -> {} ({} slots, {} folded, {} specialized)",
        bound.formula(),
        type_name::<S>(),
        type_name::<R>(),
        readers.len(),
        compiler.folded,
        compiler.specialized
    );

    Ok(CompiledEvaluator {
        formula: bound.formula().to_string(),
        readers,
        body,
        path,
    })
}

/// Operand of a binary node after folding
enum Operand {
    Slot(usize),
    Const(f64),
    Op(Op),
}

macro_rules! specialize {
    ($compiler:expr, $left:expr, $right:expr, $op:tt) => {
        match ($left, $right) {
            (Operand::Slot(a), Operand::Slot(b)) => {
                $compiler.specialized += 1;
                Box::new(move |s: &[f64]| s[a] $op s[b]) as Op
            }
            (Operand::Slot(a), Operand::Const(c)) => {
                $compiler.specialized += 1;
                Box::new(move |s: &[f64]| s[a] $op c) as Op
            }
            (Operand::Const(c), Operand::Slot(b)) => {
                $compiler.specialized += 1;
                Box::new(move |s: &[f64]| c $op s[b]) as Op
            }
            (left, right) => {
                let left = left.into_op();
                let right = right.into_op();
                Box::new(move |s: &[f64]| left(s) $op right(s)) as Op
            }
        }
    };
}

impl Operand {
    fn into_op(self) -> Op {
        match self {
            Operand::Slot(slot) => Box::new(move |s: &[f64]| s[slot]),
            Operand::Const(value) => Box::new(move |_: &[f64]| value),
            Operand::Op(op) => op,
        }
    }
}

/// Closure code generator
struct Compiler {
    folded: usize,
    specialized: usize,
}

impl Compiler {
    fn new() -> Self {
        Self {
            folded: 0,
            specialized: 0,
        }
    }

    fn compile_expression(&mut self, expr: &BoundExpr) -> Op {
        self.operand(expr).into_op()
    }

    fn operand(&mut self, expr: &BoundExpr) -> Operand {
        match expr {
            BoundExpr::Literal(n) => Operand::Const(*n),

            BoundExpr::Slot(slot) => Operand::Slot(*slot),

            BoundExpr::Binary { op, left, right } => {
                let left = self.operand(left);
                let right = self.operand(right);

                if let (Operand::Const(a), Operand::Const(b)) = (&left, &right) {
                    self.folded += 1;
                    return Operand::Const(op.apply(*a, *b));
                }

                Operand::Op(match op {
                    BinaryOp::Add => specialize!(self, left, right, +),
                    BinaryOp::Sub => specialize!(self, left, right, -),
                    BinaryOp::Mul => specialize!(self, left, right, *),
                    BinaryOp::Div => specialize!(self, left, right, /),
                })
            }

            BoundExpr::Negate(operand) => match self.operand(operand) {
                Operand::Const(value) => {
                    self.folded += 1;
                    Operand::Const(-value)
                }
                Operand::Slot(slot) => Operand::Op(Box::new(move |s: &[f64]| -s[slot])),
                Operand::Op(inner) => Operand::Op(Box::new(move |s: &[f64]| -inner(s))),
            },
        }
    }
}
