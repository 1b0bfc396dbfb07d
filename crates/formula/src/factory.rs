//! Evaluator factory
//!
//! Process-wide memo of compiled evaluators, keyed by
//! `(state type, reward type, formula)`. Each key is compiled at most once,
//! even under concurrent first use; failures are cached like successes.

use crate::catalog::{CatalogCache, ProgressState, VariableCatalog};
use crate::compiler::{compile, CompiledEvaluator, RewardType};
use crate::error::{FormulaError, Result};
use crate::parser::parse;
use crate::resolver::resolve;
use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Runtime identity of a type
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

/// What to compile: a formula for a state type and a reward type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardDescriptor {
    state: TypeTag,
    reward: TypeTag,
    formula: String,
}

impl RewardDescriptor {
    pub fn new<S: ProgressState, R: RewardType>(formula: impl Into<String>) -> Self {
        Self {
            state: TypeTag::of::<S>(),
            reward: TypeTag::of::<R>(),
            formula: formula.into(),
        }
    }

    pub fn state_type(&self) -> TypeTag {
        self.state
    }

    pub fn reward_type(&self) -> TypeTag {
        self.reward
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }
}

impl fmt::Display for RewardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ({} -> {})", self.formula, self.state.name, self.reward.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FactoryKey {
    state: TypeId,
    reward: TypeId,
    formula: String,
}

type Compiled = Result<Arc<dyn Any + Send + Sync>>;

/// Memoizing evaluator factory
#[derive(Default)]
pub struct RewardFactory {
    catalogs: CatalogCache,
    evaluators: DashMap<FactoryKey, Arc<OnceLock<Compiled>>>,
    compilations: AtomicUsize,
}

impl RewardFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator for `descriptor`, compiled on first request
    ///
    /// Concurrent first requests for one key block on a single compilation
    /// and all observe its outcome.
    pub fn get_or_compile<S: ProgressState, R: RewardType>(
        &self,
        descriptor: &RewardDescriptor,
    ) -> Result<Arc<CompiledEvaluator<S, R>>> {
        if descriptor.state != TypeTag::of::<S>() || descriptor.reward != TypeTag::of::<R>() {
            return Err(Self::mismatch::<S, R>(descriptor));
        }

        let key = FactoryKey {
            state: descriptor.state.id,
            reward: descriptor.reward.id,
            formula: descriptor.formula.clone(),
        };
        // Clone the cell out so the shard lock is not held while compiling.
        let cell = Arc::clone(&self.evaluators.entry(key).or_default());

        match cell.get_or_init(|| self.compile::<S, R>(descriptor)) {
            Ok(erased) => Arc::clone(erased)
                .downcast::<CompiledEvaluator<S, R>>()
                .map_err(|_| Self::mismatch::<S, R>(descriptor)),
            Err(err) => Err(err.clone()),
        }
    }

    /// Shorthand building the descriptor from type parameters
    pub fn evaluator<S: ProgressState, R: RewardType>(
        &self,
        formula: &str,
    ) -> Result<Arc<CompiledEvaluator<S, R>>> {
        self.get_or_compile::<S, R>(&RewardDescriptor::new::<S, R>(formula))
    }

    /// Variable catalog of `S`
    pub fn catalog<S: ProgressState>(&self) -> Arc<VariableCatalog<S>> {
        self.catalogs.get::<S>()
    }

    /// Number of compilations performed, failed ones included
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Number of memoized keys
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    fn compile<S: ProgressState, R: RewardType>(&self, descriptor: &RewardDescriptor) -> Compiled {
        self.compilations.fetch_add(1, Ordering::Relaxed);

        let formula = descriptor.formula();
        let catalog = self.catalogs.get::<S>();

        let outcome = parse(formula)
            .and_then(|expr| resolve(&expr, &catalog, formula))
            .and_then(|bound| compile::<S, R>(&bound));

        match outcome {
            Ok(evaluator) => {
                tracing::debug!("Compiled evaluator for {}", descriptor);
                Ok(Arc::new(evaluator) as Arc<dyn Any + Send + Sync>)
            }
            Err(err) => {
                tracing::warn!("Failed to compile {}: {}", descriptor, err);
                Err(err)
            }
        }
    }

    fn mismatch<S, R>(descriptor: &RewardDescriptor) -> FormulaError {
        FormulaError::DescriptorMismatch {
            descriptor: descriptor.to_string(),
            requested: format!("{} -> {}", type_name::<S>(), type_name::<R>()),
        }
    }
}

impl fmt::Debug for RewardFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardFactory")
            .field("evaluators", &self.evaluators.len())
            .field("catalogs", &self.catalogs.len())
            .field("compilations", &self.compilations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{hunt_state, BaseState, HuntState};
    use crate::compiler::ConstructorTable;

    #[derive(Debug, PartialEq)]
    struct Xp(u32);

    impl RewardType for Xp {
        fn constructors(table: &mut ConstructorTable<Self>) {
            table.number(Xp);
        }
    }

    #[derive(Debug, PartialEq)]
    struct Title(String);

    impl RewardType for Title {
        fn constructors(table: &mut ConstructorTable<Self>) {
            table.string(Title);
        }
    }

    #[test]
    fn test_get_or_compile_is_idempotent() {
        let factory = RewardFactory::new();
        let descriptor = RewardDescriptor::new::<HuntState, Xp>("10 + kills * 2");

        let first = factory.get_or_compile::<HuntState, Xp>(&descriptor).unwrap();
        let second = factory.get_or_compile::<HuntState, Xp>(&descriptor.clone()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.compilations(), 1);
        assert_eq!(first.evaluate(&hunt_state()), Xp(18));
    }

    #[test]
    fn test_concurrent_first_use_compiles_once() {
        let factory = RewardFactory::new();
        let descriptor = RewardDescriptor::new::<HuntState, Xp>("bonus * completed + dist");

        let evaluators: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| factory.get_or_compile::<HuntState, Xp>(&descriptor).unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(factory.compilations(), 1);
        assert!(evaluators.iter().all(|e| Arc::ptr_eq(e, &evaluators[0])));
        assert_eq!(evaluators[0].evaluate(&hunt_state()), Xp(272));
    }

    #[test]
    fn test_failure_is_cached() {
        let factory = RewardFactory::new();

        let first = factory.evaluator::<HuntState, Xp>("kills + unknownVar").unwrap_err();
        let second = factory.evaluator::<HuntState, Xp>("kills + unknownVar").unwrap_err();

        assert_eq!(first, second);
        assert_eq!(factory.compilations(), 1);
        assert!(matches!(first, FormulaError::UnknownVariable { .. }));
    }

    #[test]
    fn test_keys_are_distinct_per_type_pair() {
        let factory = RewardFactory::new();

        let xp = factory.evaluator::<HuntState, Xp>("kills").unwrap();
        let title = factory.evaluator::<HuntState, Title>("kills").unwrap();
        let base = factory.evaluator::<BaseState, Xp>("kills").unwrap();

        assert_eq!(factory.len(), 3);
        assert_eq!(xp.evaluate(&hunt_state()), Xp(4));
        assert_eq!(title.evaluate(&hunt_state()), Title("4".into()));
        assert_eq!(base.evaluate(&hunt_state().base), Xp(100));

        // One catalog per state type, shared across reward types
        assert_eq!(factory.catalog::<HuntState>().len(), 9);
    }

    #[test]
    fn test_descriptor_mismatch() {
        let factory = RewardFactory::new();
        let descriptor = RewardDescriptor::new::<HuntState, Xp>("kills");

        let err = factory.get_or_compile::<BaseState, Xp>(&descriptor).unwrap_err();
        assert!(matches!(err, FormulaError::DescriptorMismatch { .. }));
        assert!(factory.is_empty());
    }
}
