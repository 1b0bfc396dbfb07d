//! Reward registry
//!
//! Maps the reward type identifiers used in template files to reward types,
//! per progress-state type, and erases the compiled evaluators behind
//! [`RewardEvaluator`].

use crate::rewards::{CreditsReward, QuestReward, RankReward, ReputationReward, UnlockReward, XpReward};
use qreward_core::{QuestError, RewardTypeName};
use qreward_formula::{CompiledEvaluator, FormulaError, ProgressState, RewardFactory, RewardType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Compiled reward formula with the reward type erased
pub trait RewardEvaluator<S>: Send + Sync {
    fn formula(&self) -> &str;

    /// Formula result before materialization
    fn evaluate_raw(&self, state: &S) -> f64;

    /// Evaluate and build the reward, returning the formula result too
    fn grant(&self, state: &S) -> (f64, Box<dyn QuestReward>);
}

impl<S, R> RewardEvaluator<S> for CompiledEvaluator<S, R>
where
    S: ProgressState,
    R: RewardType + QuestReward,
{
    fn formula(&self) -> &str {
        CompiledEvaluator::formula(self)
    }

    fn evaluate_raw(&self, state: &S) -> f64 {
        CompiledEvaluator::evaluate_raw(self, state)
    }

    fn grant(&self, state: &S) -> (f64, Box<dyn QuestReward>) {
        let raw = CompiledEvaluator::evaluate_raw(self, state);
        (raw, Box::new(self.materialize(raw)))
    }
}

type CompileFn<S> = fn(&RewardFactory, &str) -> Result<Arc<dyn RewardEvaluator<S>>, FormulaError>;

fn compile_erased<S, R>(factory: &RewardFactory, formula: &str) -> Result<Arc<dyn RewardEvaluator<S>>, FormulaError>
where
    S: ProgressState,
    R: RewardType + QuestReward,
{
    let evaluator: Arc<dyn RewardEvaluator<S>> = factory.evaluator::<S, R>(formula)?;
    Ok(evaluator)
}

/// Reward types available to templates of state `S`
pub struct RewardRegistry<S> {
    entries: HashMap<RewardTypeName, CompileFn<S>>,
}

impl<S: ProgressState> RewardRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry with the built-in rewards
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register::<XpReward>("XpReward")
            .register::<CreditsReward>("CreditsReward")
            .register::<RankReward>("RankReward")
            .register::<UnlockReward>("UnlockReward")
            .register::<ReputationReward>("ReputationReward");
        registry
    }

    /// Make `R` available under `name`, replacing any previous entry
    pub fn register<R: RewardType + QuestReward>(&mut self, name: impl Into<RewardTypeName>) -> &mut Self {
        let name = name.into();
        if self.entries.insert(name.clone(), compile_erased::<S, R>).is_some() {
            tracing::debug!("Replaced reward type {} for state {}", name, std::any::type_name::<S>());
        }
        self
    }

    pub fn contains(&self, name: &RewardTypeName) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<&RewardTypeName> {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort_by(|a, b| a.get().cmp(b.get()));
        names
    }

    /// Compile `formula` for the reward type registered as `reward_type`
    pub fn compile(
        &self,
        factory: &RewardFactory,
        reward_type: &RewardTypeName,
        formula: &str,
    ) -> Result<Arc<dyn RewardEvaluator<S>>, QuestError> {
        let compile = self
            .entries
            .get(reward_type)
            .ok_or_else(|| QuestError::UnknownRewardType(reward_type.clone()))?;
        Ok(compile(factory, formula)?)
    }
}

impl<S: ProgressState> Default for RewardRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for RewardRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardRegistry")
            .field("state", &std::any::type_name::<S>())
            .field("reward_types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
