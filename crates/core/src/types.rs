//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quest template identifier (the `name` of a template file)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestId(pub String);

impl QuestId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuestId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for QuestId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration identifier of a reward type (e.g. `XpReward`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewardTypeName(pub String);

impl RewardTypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RewardTypeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RewardTypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for RewardTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration identifier of a quest progress-state type (e.g. `kills`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateTypeName(pub String);

impl StateTypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StateTypeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for StateTypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for StateTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_raw_name() {
        assert_eq!(QuestId::from("zombie_hunt").to_string(), "zombie_hunt");
        assert_eq!(RewardTypeName::new("XpReward").get(), "XpReward");
        assert_eq!(StateTypeName::from(String::from("kills")).get(), "kills");
    }

    #[test]
    fn test_ids_hash_by_value() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(QuestId::from("a"));
        set.insert(QuestId::new("a"));
        assert_eq!(set.len(), 1);
    }
}
