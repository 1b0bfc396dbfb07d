//! # QReward Formula Compiler
//!
//! Compiles quest reward formulas such as `10 + kills * 2` into fast,
//! thread-safe `state -> reward` evaluators.
//!
//! ## Pipeline
//! - [`lexer`]: formula text to tokens
//! - [`parser`]: tokens to an expression tree
//! - [`catalog`]: formula-visible members of a quest state type
//! - [`resolver`]: variables bound to catalog members
//! - [`compiler`]: bound tree to a closure-compiled evaluator
//! - [`factory`]: evaluators memoized per `(state, reward, formula)`
//!
//! ## Example
//!
//! ```
//! use qreward_formula::{ConstructorTable, MemberTable, ProgressState, RewardFactory, RewardType};
//!
//! struct Hunt {
//!     kills: i32,
//! }
//!
//! impl ProgressState for Hunt {
//!     fn declare(members: &mut MemberTable<Self>) {
//!         members.field("kills", |s| &s.kills);
//!     }
//! }
//!
//! #[derive(Debug, PartialEq)]
//! struct Xp(i32);
//!
//! impl RewardType for Xp {
//!     fn constructors(table: &mut ConstructorTable<Self>) {
//!         table.number(Xp);
//!     }
//! }
//!
//! let factory = RewardFactory::new();
//! let evaluator = factory.evaluator::<Hunt, Xp>("10 + kills * 2").unwrap();
//! assert_eq!(evaluator.evaluate(&Hunt { kills: 4 }), Xp(18));
//! ```

pub mod ast;
pub mod catalog;
pub mod compiler;
pub mod error;
pub mod factory;
pub mod lexer;
pub mod parser;
pub mod resolver;

pub use ast::{BinaryOp, Expr};
pub use catalog::{
    CatalogCache, DeclaringType, FormulaValue, MemberDecl, MemberTable, OutputKind, ProgressState, Reader,
    SingleValue, VariableBinding, VariableCatalog, Widen,
};
pub use compiler::{
    compile, construction_path, format_invariant, CompiledEvaluator, ConstructionPath, ConstructorTable,
    NumericParam, ParamKind, ParamType, RewardType,
};
pub use error::{FormulaError, Result};
pub use factory::{RewardDescriptor, RewardFactory, TypeTag};
pub use parser::parse;
pub use resolver::{resolve, BoundExpr, BoundFormula};
