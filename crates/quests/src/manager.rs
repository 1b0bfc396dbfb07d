//! # Quest Template Manager
//!
//! Owns every loaded quest template, keyed by template name, together with the
//! registry of progress-state types templates may name.

use crate::registry::RewardRegistry;
use crate::template::QuestTemplate;
use dashmap::DashMap;
use parking_lot::RwLock;
use qreward_config::QuestTemplateConfig;
use qreward_core::{QuestError, QuestId, Result, StateTypeName};
use qreward_formula::{ProgressState, RewardFactory};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type ErasedTemplate = Arc<dyn Any + Send + Sync>;

/// Builds a template of one registered state type
type StateLoader = Arc<dyn Fn(&QuestTemplateConfig, &RewardFactory) -> (ErasedTemplate, TemplateSummary) + Send + Sync>;

struct RegisteredTemplate {
    state: StateTypeName,
    template: ErasedTemplate,
}

/// Outcome of loading one template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub name: QuestId,
    pub state: StateTypeName,
    /// Rewards that compiled
    pub rewards: usize,
    /// Messages of the rewards that were disabled
    pub disabled: Vec<String>,
}

/// Outcome of loading a template directory
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    /// Templates that loaded, possibly with disabled rewards
    pub loaded: Vec<TemplateSummary>,
    /// Files that could not be loaded at all
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    /// Disabled rewards across all loaded templates
    pub fn disabled_count(&self) -> usize {
        self.loaded.iter().map(|summary| summary.disabled.len()).sum()
    }

    /// Whether every file loaded and every reward compiled
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.disabled_count() == 0
    }
}

/// Quest Template Manager
///
/// # Thread Safety
/// Cheap to clone; clones share the same templates, state registry and
/// evaluator factory.
#[derive(Clone)]
pub struct QuestTemplateManager {
    /// Compiled evaluator memo shared by all templates
    factory: Arc<RewardFactory>,

    /// Template builders per state type name
    states: Arc<RwLock<HashMap<StateTypeName, StateLoader>>>,

    /// Loaded templates
    /// Key: template name
    templates: Arc<DashMap<QuestId, RegisteredTemplate>>,
}

impl QuestTemplateManager {
    /// Create a manager with its own evaluator factory
    pub fn new() -> Self {
        Self::with_factory(Arc::new(RewardFactory::new()))
    }

    /// Create a manager sharing an existing evaluator factory
    pub fn with_factory(factory: Arc<RewardFactory>) -> Self {
        tracing::debug!("Creating QuestTemplateManager");

        Self {
            factory,
            states: Arc::new(RwLock::new(HashMap::new())),
            templates: Arc::new(DashMap::new()),
        }
    }

    pub fn factory(&self) -> &Arc<RewardFactory> {
        &self.factory
    }

    /// Make state type `S` available to templates as `name`
    pub fn register_state<S: ProgressState>(&self, name: impl Into<StateTypeName>, registry: RewardRegistry<S>) {
        let name = name.into();
        let state = name.clone();

        let loader: StateLoader = Arc::new(move |config: &QuestTemplateConfig, factory: &RewardFactory| {
            let template = QuestTemplate::<S>::from_config(config, &registry, factory);
            let summary = TemplateSummary {
                name: config.name.clone(),
                state: state.clone(),
                rewards: template.rewards().len(),
                disabled: template.disabled().iter().map(|err| err.to_string()).collect(),
            };
            (Arc::new(template) as ErasedTemplate, summary)
        });

        tracing::debug!("Registering quest state {} as {}", std::any::type_name::<S>(), name);
        self.states.write().insert(name, loader);
    }

    /// Whether a state type is registered under `name`
    pub fn has_state(&self, name: &StateTypeName) -> bool {
        self.states.read().contains_key(name)
    }

    /// Compile and store one template, replacing any template of the same name
    pub fn load_config(&self, config: &QuestTemplateConfig) -> Result<TemplateSummary> {
        let loader = self
            .states
            .read()
            .get(&config.state)
            .cloned()
            .ok_or_else(|| QuestError::UnknownStateType(config.state.clone()))?;

        let (template, summary) = loader(config, &self.factory);

        let previous = self.templates.insert(
            config.name.clone(),
            RegisteredTemplate {
                state: config.state.clone(),
                template,
            },
        );
        if previous.is_some() {
            tracing::debug!("Replaced quest template {}", config.name);
        }

        tracing::info!(
            "Loaded quest template {} ({} rewards, {} disabled)",
            summary.name,
            summary.rewards,
            summary.disabled.len()
        );
        Ok(summary)
    }

    /// Load every template file in `dir`
    ///
    /// Files are read and templates compiled on the blocking pool, all
    /// templates in parallel. Failures stay local to their file.
    pub async fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<LoadReport> {
        let dir = dir.as_ref().to_path_buf();
        tracing::info!("Loading quest templates from {}", dir.display());

        let files = tokio::task::spawn_blocking(move || qreward_config::load_dir(dir))
            .await
            .map_err(|err| QuestError::Config(format!("template scan aborted: {}", err)))??;

        let mut report = LoadReport::default();
        let mut pending = Vec::new();

        for (path, config) in files {
            match config {
                Ok(config) => {
                    let manager = self.clone();
                    let handle = tokio::task::spawn_blocking(move || manager.load_config(&config));
                    pending.push((path, handle));
                }
                Err(err) => {
                    tracing::warn!("Skipping quest template {}: {}", path.display(), err);
                    report.failed.push((path, err.to_string()));
                }
            }
        }

        for (path, handle) in pending {
            match handle.await {
                Ok(Ok(summary)) => report.loaded.push(summary),
                Ok(Err(err)) => {
                    tracing::warn!("Skipping quest template {}: {}", path.display(), err);
                    report.failed.push((path, err.to_string()));
                }
                Err(err) => {
                    tracing::error!("Loading quest template {} aborted: {}", path.display(), err);
                    report.failed.push((path, err.to_string()));
                }
            }
        }

        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::info!(
            "Loaded {} quest templates ({} files failed, {} rewards disabled)",
            report.loaded.len(),
            report.failed.len(),
            report.disabled_count()
        );
        Ok(report)
    }

    /// Template `name`, if it is loaded for state type `S`
    pub fn template<S: ProgressState>(&self, name: &str) -> Option<Arc<QuestTemplate<S>>> {
        let erased = self.templates.get(&QuestId::from(name)).map(|entry| Arc::clone(&entry.template))?;
        erased.downcast::<QuestTemplate<S>>().ok()
    }

    /// State type name template `name` was loaded for
    pub fn state_of(&self, name: &str) -> Option<StateTypeName> {
        self.templates.get(&QuestId::from(name)).map(|entry| entry.state.clone())
    }

    /// Names of the loaded templates, sorted
    pub fn template_names(&self) -> Vec<QuestId> {
        let mut names: Vec<QuestId> = self.templates.iter().map(|entry| entry.key().clone()).collect();
        names.sort_by(|a, b| a.get().cmp(b.get()));
        names
    }

    /// Unload template `name`
    pub fn remove_template(&self, name: &str) -> bool {
        self.templates.remove(&QuestId::from(name)).is_some()
    }

    #[inline]
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

impl Default for QuestTemplateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::{RankReward, XpReward};
    use crate::tests::{kill_state, KillState};
    use qreward_formula::MemberTable;
    use std::fs;

    struct EscortState {
        distance: f64,
    }

    impl ProgressState for EscortState {
        fn declare(members: &mut MemberTable<Self>) {
            members.field("distance", |s| &s.distance);
        }
    }

    fn manager() -> QuestTemplateManager {
        let manager = QuestTemplateManager::new();
        manager.register_state::<KillState>("kills", RewardRegistry::with_builtin());
        manager.register_state::<EscortState>("escort", RewardRegistry::with_builtin());
        manager
    }

    #[test]
    fn test_manager_creation() {
        let manager = QuestTemplateManager::new();
        assert_eq!(manager.template_count(), 0);
        assert!(!manager.has_state(&"kills".into()));
    }

    #[test]
    fn test_load_config_and_lookup() {
        let manager = manager();
        let config = QuestTemplateConfig::parse("name = hunt\nstate = kills\nreward = XpReward: 10 + kills * 2").unwrap();

        let summary = manager.load_config(&config).unwrap();
        assert_eq!(summary.rewards, 1);
        assert!(summary.disabled.is_empty());
        assert_eq!(manager.template_count(), 1);
        assert_eq!(manager.state_of("hunt").map(|s| s.get().to_string()), Some("kills".into()));

        let template = manager.template::<KillState>("hunt").unwrap();
        let granted = template.grant(&kill_state(4));
        assert_eq!(granted[0].downcast_ref::<XpReward>(), Some(&XpReward(18)));

        // Wrong state type or unknown name
        assert!(manager.template::<EscortState>("hunt").is_none());
        assert!(manager.template::<KillState>("missing").is_none());
    }

    #[test]
    fn test_unknown_state_fails_only_that_template() {
        let manager = manager();
        let config = QuestTemplateConfig::parse("name = fishing\nstate = fish").unwrap();

        let err = manager.load_config(&config).unwrap_err();
        assert!(matches!(err, QuestError::UnknownStateType(state) if state.get() == "fish"));
        assert_eq!(manager.template_count(), 0);
    }

    #[test]
    fn test_reload_replaces_template() {
        let manager = manager();
        let first = QuestTemplateConfig::parse("name = hunt\nstate = kills\nreward = XpReward: kills").unwrap();
        let second = QuestTemplateConfig::parse("name = hunt\nstate = kills\nreward = XpReward: kills * 10").unwrap();

        manager.load_config(&first).unwrap();
        manager.load_config(&second).unwrap();
        assert_eq!(manager.template_count(), 1);

        let granted = manager.template::<KillState>("hunt").unwrap().grant(&kill_state(2));
        assert_eq!(granted[0].downcast_ref::<XpReward>(), Some(&XpReward(20)));

        assert!(manager.remove_template("hunt"));
        assert!(!manager.remove_template("hunt"));
    }

    #[test]
    fn test_shared_factory_compiles_once() {
        let manager = manager();
        for name in ["a", "b", "c"] {
            let config = QuestTemplateConfig::parse(&format!(
                "name = {}\nstate = kills\nreward = XpReward: 10 + kills * 2",
                name
            ))
            .unwrap();
            manager.load_config(&config).unwrap();
        }
        assert_eq!(manager.factory().compilations(), 1);
        assert_eq!(manager.template_names().len(), 3);
    }

    #[tokio::test]
    async fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("hunt.quest"),
            "name = hunt\nstate = kills\nreward = XpReward: 10 + kills * 2\nreward = RankReward: kills / 2",
        )
        .unwrap();
        fs::write(
            dir.path().join("escort.quest"),
            "name = escort\nstate = escort\nreward = XpReward: distance / 10\nreward = XpReward: kills",
        )
        .unwrap();
        fs::write(dir.path().join("fishing.quest"), "name = fishing\nstate = fish").unwrap();
        fs::write(dir.path().join("broken.quest"), "state = kills").unwrap();

        let manager = manager();
        let report = manager.load_dir(dir.path()).await.unwrap();

        let loaded: Vec<&str> = report.loaded.iter().map(|s| s.name.get()).collect();
        assert_eq!(loaded, vec!["escort", "hunt"]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].0.ends_with("broken.quest"));
        assert!(report.failed[1].0.ends_with("fishing.quest"));
        assert_eq!(report.disabled_count(), 1);
        assert!(!report.is_clean());

        let hunt = manager.template::<KillState>("hunt").unwrap();
        let granted = hunt.grant(&kill_state(5));
        assert_eq!(granted[0].downcast_ref::<XpReward>(), Some(&XpReward(20)));
        assert_eq!(granted[1].downcast_ref::<RankReward>(), Some(&RankReward(3)));

        let escort = manager.template::<EscortState>("escort").unwrap();
        assert_eq!(escort.rewards().len(), 1);
        let granted = escort.grant(&EscortState { distance: 125.0 });
        assert_eq!(granted[0].downcast_ref::<XpReward>(), Some(&XpReward(13)));
    }

    #[tokio::test]
    async fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager().load_dir(dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, QuestError::Config(_)));
    }
}
