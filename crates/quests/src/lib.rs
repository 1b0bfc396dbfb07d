//! # QReward Quests
//!
//! Quest templates whose rewards are computed by compiled formulas.
//!
//! ## Features
//! - Quest parameter values that reduce to one number in formulas
//! - Built-in rewards (experience, credits, rank, unlocks, reputation)
//! - Reward registries per progress-state type
//! - Template loading with per-reward failure isolation
//! - Asynchronous, parallel loading of template directories

pub mod manager;
pub mod parameter;
pub mod registry;
pub mod rewards;
pub mod template;

pub use manager::{LoadReport, QuestTemplateManager, TemplateSummary};
pub use parameter::QuestParameterValue;
pub use registry::{RewardEvaluator, RewardRegistry};
pub use rewards::{
    CreditsReward, QuestReward, RankReward, ReputationReward, UnlockReward, XpReward, BUILTIN_REWARDS,
};
pub use template::{QuestTemplate, TemplateReward};

#[cfg(test)]
pub(crate) mod tests {
    use crate::parameter::QuestParameterValue;
    use qreward_formula::{MemberTable, ProgressState};

    /// Kill-count quest progress
    pub struct KillState {
        pub kills: u32,
        pub target: QuestParameterValue<u8>,
        pub zone: Vec<String>,
    }

    impl ProgressState for KillState {
        fn declare(members: &mut MemberTable<Self>) {
            members.field("kills", |s| &s.kills).alias("k");
            members.field("target", |s| &s.target);
            members.opaque::<Vec<String>>("zone");
        }
    }

    pub fn kill_state(kills: u32) -> KillState {
        KillState {
            kills,
            target: QuestParameterValue::Range {
                min: 5,
                max: 10,
                rolled: Some(8),
            },
            zone: vec!["graveyard".into()],
        }
    }

    #[test]
    fn test_opaque_member_disables_reward() {
        use crate::{QuestTemplate, RewardRegistry};
        use qreward_config::QuestTemplateConfig;
        use qreward_formula::RewardFactory;

        let config = QuestTemplateConfig::parse("name = z\nstate = kills\nreward = XpReward: zone * 2").unwrap();
        let template = QuestTemplate::<KillState>::from_config(&config, &RewardRegistry::with_builtin(), &RewardFactory::new());

        assert!(template.rewards().is_empty());
        assert!(template.disabled()[0].to_string().contains("non-numeric"));
        assert_eq!(kill_state(1).zone.len(), 1);
    }
}
