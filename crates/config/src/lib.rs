//! QReward Quest Template Configuration
//!
//! Quest templates are plain text files (`*.quest`), one `key = value` per
//! line:
//!
//! ```text
//! # Zombie hunt
//! name = zombie_hunt
//! state = kills
//! description = Clear the graveyard
//! reward = XpReward: 10 + kills * 2
//! reward = CreditsReward: kills / 2
//! ```
//!
//! `name` and `state` are required. `reward` may repeat and has the form
//! `<RewardType>: <formula>`. Formulas are only carried here; they are
//! compiled when the template is loaded.

mod error;

pub use error::{ConfigError, Result};

use qreward_core::{QuestId, RewardTypeName, StateTypeName};
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of quest template files
pub const TEMPLATE_EXTENSION: &str = "quest";

/// One `reward = <RewardType>: <formula>` line
#[derive(Debug, Clone, PartialEq)]
pub struct RewardDeclaration {
    /// Reward type identifier (e.g. `XpReward`)
    pub reward_type: RewardTypeName,
    /// Formula text, trimmed
    pub formula: String,
    /// 1-based line in the template file
    pub line: usize,
}

/// Parsed quest template file
#[derive(Debug, Clone, PartialEq)]
pub struct QuestTemplateConfig {
    /// Quest template name (from "name")
    pub name: QuestId,
    /// Progress-state type name (from "state")
    pub state: StateTypeName,
    /// Free-form description (from "description")
    pub description: String,
    /// Declared rewards, in file order (from "reward")
    pub rewards: Vec<RewardDeclaration>,
    /// File the template was loaded from
    pub source: Option<PathBuf>,
}

/// Keys seen so far while parsing one file
#[derive(Default)]
struct PartialConfig {
    name: Option<String>,
    state: Option<String>,
    description: Option<String>,
    rewards: Vec<RewardDeclaration>,
}

impl QuestTemplateConfig {
    /// Load a template from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        config.source = Some(path.to_path_buf());

        tracing::debug!(
            "Loaded quest template {} from {} ({} rewards)",
            config.name,
            path.display(),
            config.rewards.len()
        );
        Ok(config)
    }

    /// Parse template file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut partial = PartialConfig::default();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            let number = index + 1;

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                return Err(ConfigError::InvalidLine {
                    line: number,
                    content: line.to_string(),
                });
            };
            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();

            partial.parse_option(number, key, value)?;
        }

        partial.finish()
    }

    /// Referenced reward type identifiers, deduplicated in file order
    pub fn reward_types(&self) -> Vec<&RewardTypeName> {
        let mut types: Vec<&RewardTypeName> = Vec::new();
        for reward in &self.rewards {
            if !types.contains(&&reward.reward_type) {
                types.push(&reward.reward_type);
            }
        }
        types
    }

    /// Log the template at info level
    pub fn display(&self) {
        tracing::info!("Quest template {} (state {})", self.name, self.state);
        if !self.description.is_empty() {
            tracing::info!("    {}", self.description);
        }
        for reward in &self.rewards {
            tracing::info!("    {} = {}", reward.reward_type, reward.formula);
        }
    }
}

impl PartialConfig {
    fn parse_option(&mut self, line: usize, key: &str, value: &str) -> Result<()> {
        match key {
            "name" => Self::set_once(&mut self.name, line, key, value),
            "state" => Self::set_once(&mut self.state, line, key, value),
            "description" => Self::set_once(&mut self.description, line, key, value),
            "reward" => {
                self.rewards.push(parse_reward(line, value)?);
                Ok(())
            }
            _ => {
                tracing::debug!("Ignoring unknown quest template option on line {}: {} = {}", line, key, value);
                Ok(())
            }
        }
    }

    fn set_once(slot: &mut Option<String>, line: usize, key: &str, value: &str) -> Result<()> {
        if slot.is_some() {
            return Err(ConfigError::DuplicateKey {
                line,
                key: key.to_string(),
            });
        }
        *slot = Some(value.to_string());
        Ok(())
    }

    fn finish(self) -> Result<QuestTemplateConfig> {
        let name = self.name.filter(|name| !name.is_empty()).ok_or(ConfigError::MissingKey("name"))?;
        let state = self.state.filter(|state| !state.is_empty()).ok_or(ConfigError::MissingKey("state"))?;

        Ok(QuestTemplateConfig {
            name: QuestId::new(name),
            state: StateTypeName::new(state),
            description: self.description.unwrap_or_default(),
            rewards: self.rewards,
            source: None,
        })
    }
}

/// Parse `<RewardType>: <formula>`
///
/// The formula itself may be empty; it fails later, when compiled, and only
/// disables that one reward.
fn parse_reward(line: usize, value: &str) -> Result<RewardDeclaration> {
    let Some(colon) = value.find(':') else {
        return Err(ConfigError::InvalidReward {
            line,
            message: format!("expected `<RewardType>: <formula>`, found `{}`", value),
        });
    };

    let reward_type = value[..colon].trim();
    let formula = value[colon + 1..].trim();

    if reward_type.is_empty() {
        return Err(ConfigError::InvalidReward {
            line,
            message: "missing reward type".into(),
        });
    }
    if !reward_type.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::InvalidReward {
            line,
            message: format!("invalid reward type `{}`", reward_type),
        });
    }

    Ok(RewardDeclaration {
        reward_type: RewardTypeName::new(reward_type),
        formula: formula.to_string(),
        line,
    })
}

/// Paths of the template files in `dir`, sorted
pub fn template_paths<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let io_error = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every template file in `dir`
///
/// Files are visited in sorted order. A broken file only fails its own entry;
/// an unreadable directory fails the whole call.
pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<(PathBuf, Result<QuestTemplateConfig>)>> {
    let paths = template_paths(&dir)?;
    tracing::debug!("Found {} quest template files in {}", paths.len(), dir.as_ref().display());

    Ok(paths
        .into_iter()
        .map(|path| {
            let config = QuestTemplateConfig::load(&path);
            (path, config)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZOMBIE_HUNT: &str = r#"
# Zombie hunt
name = zombie_hunt
state = kills
description = Clear the graveyard
reward = XpReward: 10 + kills * 2
reward = CreditsReward:kills / 2
colour = green
"#;

    #[test]
    fn test_parse_template() {
        let config = QuestTemplateConfig::parse(ZOMBIE_HUNT).unwrap();
        assert_eq!(config.name.get(), "zombie_hunt");
        assert_eq!(config.state.get(), "kills");
        assert_eq!(config.description, "Clear the graveyard");
        assert_eq!(config.rewards.len(), 2);

        assert_eq!(config.rewards[0].reward_type.get(), "XpReward");
        assert_eq!(config.rewards[0].formula, "10 + kills * 2");
        assert_eq!(config.rewards[0].line, 6);
        assert_eq!(config.rewards[1].formula, "kills / 2");
        assert_eq!(config.source, None);
    }

    #[test]
    fn test_formula_may_contain_equals_and_colons() {
        let config = QuestTemplateConfig::parse("name = a\nstate = b\nreward = UnlockReward: x:y=z").unwrap();
        assert_eq!(config.rewards[0].formula, "x:y=z");
    }

    #[test]
    fn test_empty_formula_is_kept() {
        let config = QuestTemplateConfig::parse("name = a\nstate = b\nreward = XpReward:").unwrap();
        assert_eq!(config.rewards[0].formula, "");
    }

    #[test]
    fn test_missing_required_keys() {
        let err = QuestTemplateConfig::parse("state = kills").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("name")));

        let err = QuestTemplateConfig::parse("name = hunt\nstate =").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("state")));
    }

    #[test]
    fn test_errors_carry_line() {
        let err = QuestTemplateConfig::parse("name = a\n\nnot an option").unwrap_err();
        assert_eq!(err.line(), Some(3));

        let err = QuestTemplateConfig::parse("name = a\nname = b").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey { line: 2, .. }));

        let err = QuestTemplateConfig::parse("name = a\nstate = b\nreward = 10 + kills").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReward { line: 3, .. }));

        let err = QuestTemplateConfig::parse("name = a\nstate = b\nreward = Xp Reward: 1").unwrap_err();
        assert!(err.to_string().contains("invalid reward type"));
    }

    #[test]
    fn test_reward_types_are_deduplicated() {
        let config = QuestTemplateConfig::parse(
            "name = a\nstate = b\nreward = XpReward: 1\nreward = RankReward: 2\nreward = XpReward: 3",
        )
        .unwrap();
        let types: Vec<&str> = config.reward_types().iter().map(|t| t.get()).collect();
        assert_eq!(types, vec!["XpReward", "RankReward"]);
    }

    #[test]
    fn test_load_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zombie_hunt.quest");
        fs::write(&path, ZOMBIE_HUNT).unwrap();

        let config = QuestTemplateConfig::load(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.quest");
        fs::write(&path, "name = broken\nreward").unwrap();

        let err = QuestTemplateConfig::load(&path).unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("broken.quest"));

        let missing = QuestTemplateConfig::load(dir.path().join("absent.quest")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_dir_sorted_and_isolated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.quest"), "name = b\nstate = kills").unwrap();
        fs::write(dir.path().join("a.quest"), "name = a\nstate = kills").unwrap();
        fs::write(dir.path().join("c.quest"), "state = kills").unwrap();
        fs::write(dir.path().join("notes.txt"), "name = ignored").unwrap();

        let loaded = load_dir(dir.path()).unwrap();
        let names: Vec<_> = loaded
            .iter()
            .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.quest", "b.quest", "c.quest"]);

        assert_eq!(loaded[0].1.as_ref().unwrap().name.get(), "a");
        assert_eq!(loaded[1].1.as_ref().unwrap().name.get(), "b");
        assert!(loaded[2].1.is_err());
    }

    #[test]
    fn test_load_dir_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dir(dir.path().join("nope")).is_err());
    }
}
