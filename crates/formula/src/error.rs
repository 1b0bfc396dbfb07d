//! Error types for the formula crate

use qreward_core::QuestError;

/// Formula compilation error
///
/// Every variant is detected before a formula is ever evaluated. Evaluation
/// itself cannot fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    /// Malformed formula syntax
    #[error("Parse error in `{formula}` at position {position}: {message}")]
    Parse {
        formula: String,
        position: usize,
        message: String,
    },

    /// Variable name not exposed by the quest state
    #[error("Unknown variable `{name}` in `{formula}` for state {state_type}")]
    UnknownVariable {
        formula: String,
        name: String,
        state_type: &'static str,
    },

    /// Variable name exposed by unrelated members
    #[error("Ambiguous variable `{name}` in `{formula}`: declared by {}", candidates.join(", "))]
    AmbiguousVariable {
        formula: String,
        name: String,
        candidates: Vec<String>,
    },

    /// Variable bound to a member whose type cannot be reduced to a number
    #[error("Variable `{name}` in `{formula}` has non-numeric type {type_name}")]
    NonNumericVariable {
        formula: String,
        name: String,
        type_name: &'static str,
    },

    /// Reward type exposes no single-argument number or string constructor
    #[error("Reward type {reward_type} has no usable construction path")]
    NoConstructionPath { reward_type: &'static str },

    /// Reward type exposes several candidate constructors
    #[error("Reward type {reward_type} has {} usable construction paths ({})", params.len(), params.join(", "))]
    AmbiguousConstructionPath {
        reward_type: &'static str,
        params: Vec<&'static str>,
    },

    /// Descriptor does not describe the requested state/reward pair
    #[error("Descriptor for {descriptor} used to compile {requested}")]
    DescriptorMismatch {
        descriptor: String,
        requested: String,
    },
}

impl FormulaError {
    /// Formula text the error relates to, if any
    pub fn formula(&self) -> Option<&str> {
        match self {
            FormulaError::Parse { formula, .. }
            | FormulaError::UnknownVariable { formula, .. }
            | FormulaError::AmbiguousVariable { formula, .. }
            | FormulaError::NonNumericVariable { formula, .. } => Some(formula),
            _ => None,
        }
    }
}

impl From<FormulaError> for QuestError {
    fn from(err: FormulaError) -> Self {
        QuestError::Formula(err.to_string())
    }
}

/// Result type for formula operations
pub type Result<T> = std::result::Result<T, FormulaError>;
