//! Quest parameter values
//!
//! Quest templates often leave a quantity open until the quest is handed out:
//! a kill target rolled from a range, a destination picked from a list.
//! [`QuestParameterValue`] holds such a quantity and reduces to one value, so
//! state members of this type can be used directly in reward formulas.

use qreward_formula::{SingleValue, Widen};
use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A quest quantity that may still be unresolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestParameterValue<T> {
    /// Fixed value
    Constant(T),

    /// Inclusive range, `rolled` once resolved
    Range { min: T, max: T, rolled: Option<T> },

    /// One of several values, `selected` index once resolved
    Choice { values: Vec<T>, selected: Option<usize> },
}

impl<T: Copy + Default> QuestParameterValue<T> {
    pub fn range(min: T, max: T) -> Self {
        QuestParameterValue::Range { min, max, rolled: None }
    }

    pub fn choice(values: Vec<T>) -> Self {
        QuestParameterValue::Choice { values, selected: None }
    }

    /// Whether the value no longer changes
    pub fn is_resolved(&self) -> bool {
        match self {
            QuestParameterValue::Constant(_) => true,
            QuestParameterValue::Range { rolled, .. } => rolled.is_some(),
            QuestParameterValue::Choice { values, selected } => {
                selected.is_some_and(|index| index < values.len())
            }
        }
    }

    /// Current value
    ///
    /// An unresolved range yields its minimum, an unresolved choice its first
    /// value (or `T::default()` when there is nothing to choose from).
    pub fn value(&self) -> T {
        match self {
            QuestParameterValue::Constant(value) => *value,
            QuestParameterValue::Range { min, rolled, .. } => rolled.unwrap_or(*min),
            QuestParameterValue::Choice { values, selected } => selected
                .and_then(|index| values.get(index))
                .or_else(|| values.first())
                .copied()
                .unwrap_or_default(),
        }
    }
}

impl<T: Copy + Default + PartialOrd + SampleUniform> QuestParameterValue<T> {
    /// Resolve the value, if not resolved yet
    pub fn roll<R: Rng + ?Sized>(&mut self, rng: &mut R) -> T {
        match self {
            QuestParameterValue::Constant(_) => {}
            QuestParameterValue::Range { min, max, rolled } => {
                if rolled.is_none() {
                    let value = if *min < *max { rng.gen_range(*min..=*max) } else { *min };
                    *rolled = Some(value);
                }
            }
            QuestParameterValue::Choice { values, selected } => {
                if selected.is_none() && !values.is_empty() {
                    *selected = Some(rng.gen_range(0..values.len()));
                }
            }
        }
        self.value()
    }
}

impl<T: Default> Default for QuestParameterValue<T> {
    fn default() -> Self {
        QuestParameterValue::Constant(T::default())
    }
}

impl<T: Widen + Default> SingleValue for QuestParameterValue<T> {
    type Output = T;

    fn single_value(&self) -> T {
        self.value()
    }
}
