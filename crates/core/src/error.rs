//! Core error types for QReward

use crate::types::{QuestId, RewardTypeName, StateTypeName};

#[derive(thiserror::Error, Debug)]
pub enum QuestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single reward of a quest template could not be compiled.
    ///
    /// The rest of the template stays usable.
    #[error("Quest `{quest}`: reward {reward_type} (`{formula}`) disabled: {reason}")]
    RewardDisabled {
        quest: QuestId,
        reward_type: RewardTypeName,
        formula: String,
        reason: String,
    },

    #[error("Unknown reward type: {0}")]
    UnknownRewardType(RewardTypeName),

    #[error("Unknown quest state type: {0}")]
    UnknownStateType(StateTypeName),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, QuestError>;
