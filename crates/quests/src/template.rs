//! Quest templates
//!
//! A template couples a progress-state type with the compiled rewards of one
//! template file. Rewards that fail to compile are disabled one by one; the
//! template itself always loads.

use crate::registry::{RewardEvaluator, RewardRegistry};
use crate::rewards::QuestReward;
use qreward_config::QuestTemplateConfig;
use qreward_core::{QuestError, QuestId, RewardTypeName};
use qreward_formula::{ProgressState, RewardFactory};
use std::fmt;
use std::sync::Arc;

/// One compiled reward of a template
pub struct TemplateReward<S> {
    reward_type: RewardTypeName,
    evaluator: Arc<dyn RewardEvaluator<S>>,
}

impl<S> TemplateReward<S> {
    pub fn reward_type(&self) -> &RewardTypeName {
        &self.reward_type
    }

    pub fn formula(&self) -> &str {
        self.evaluator.formula()
    }

    pub fn evaluator(&self) -> &Arc<dyn RewardEvaluator<S>> {
        &self.evaluator
    }
}

/// Loaded quest template for progress state `S`
pub struct QuestTemplate<S> {
    id: QuestId,
    description: String,
    rewards: Vec<TemplateReward<S>>,
    disabled: Vec<QuestError>,
}

impl<S: ProgressState> QuestTemplate<S> {
    /// Compile every reward declared by `config`
    pub fn from_config(config: &QuestTemplateConfig, registry: &RewardRegistry<S>, factory: &RewardFactory) -> Self {
        let mut rewards = Vec::with_capacity(config.rewards.len());
        let mut disabled = Vec::new();

        for declaration in &config.rewards {
            match registry.compile(factory, &declaration.reward_type, &declaration.formula) {
                Ok(evaluator) => rewards.push(TemplateReward {
                    reward_type: declaration.reward_type.clone(),
                    evaluator,
                }),
                Err(err) => {
                    let err = QuestError::RewardDisabled {
                        quest: config.name.clone(),
                        reward_type: declaration.reward_type.clone(),
                        formula: declaration.formula.clone(),
                        reason: err.to_string(),
                    };
                    tracing::warn!("{} (line {})", err, declaration.line);
                    disabled.push(err);
                }
            }
        }

        tracing::debug!(
            "Quest template {}: {} rewards compiled, {} disabled",
            config.name,
            rewards.len(),
            disabled.len()
        );

        Self {
            id: config.name.clone(),
            description: config.description.clone(),
            rewards,
            disabled,
        }
    }

    /// Rewards earned by completing the quest with `state`
    ///
    /// Non-finite formula results are granted as materialized (saturated or
    /// NaN-derived) values and logged.
    pub fn grant(&self, state: &S) -> Vec<Box<dyn QuestReward>> {
        self.rewards
            .iter()
            .map(|reward| {
                let (raw, granted) = reward.evaluator.grant(state);
                if !raw.is_finite() {
                    tracing::warn!(
                        "Quest {}: reward {} (`{}`) evaluated to {}, granting {:?}",
                        self.id,
                        reward.reward_type,
                        reward.formula(),
                        raw,
                        granted
                    );
                }
                granted
            })
            .collect()
    }
}

impl<S> QuestTemplate<S> {
    pub fn id(&self) -> &QuestId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Rewards that compiled
    pub fn rewards(&self) -> &[TemplateReward<S>] {
        &self.rewards
    }

    /// One `RewardDisabled` error per reward that failed to compile
    pub fn disabled(&self) -> &[QuestError] {
        &self.disabled
    }
}

impl<S> fmt::Debug for QuestTemplate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestTemplate")
            .field("id", &self.id)
            .field("state", &std::any::type_name::<S>())
            .field(
                "rewards",
                &self.rewards.iter().map(|r| (r.reward_type.get(), r.formula())).collect::<Vec<_>>(),
            )
            .field("disabled", &self.disabled.len())
            .finish()
    }
}
