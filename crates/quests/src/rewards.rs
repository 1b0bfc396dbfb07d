//! Built-in quest rewards

use qreward_formula::{ConstructorTable, RewardType};
use std::any::Any;
use std::fmt;

/// A granted reward, handed to whatever dispatches rewards to players
pub trait QuestReward: fmt::Debug + Send + Sync + 'static {
    /// Configuration identifier of the reward type
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl dyn QuestReward {
    /// Concrete reward, if it is an `R`
    pub fn downcast_ref<R: QuestReward>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }
}

macro_rules! builtin_reward {
    ($(#[$doc:meta])* $name:ident($param:ty), $ctor:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(pub $param);

        impl RewardType for $name {
            fn constructors(table: &mut ConstructorTable<Self>) {
                table.$ctor($name);
            }
        }

        impl QuestReward for $name {
            fn kind(&self) -> &'static str {
                stringify!($name)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

builtin_reward!(
    /// Experience points
    XpReward(u32), number
);

builtin_reward!(
    /// Currency, may be negative for penalties
    CreditsReward(i64), number
);

builtin_reward!(
    /// Rank levels
    RankReward(u8), number
);

builtin_reward!(
    /// Unlock key, the formula result in invariant text form
    UnlockReward(String), string
);

builtin_reward!(
    /// Faction reputation
    ReputationReward(f32), number
);

/// Configuration identifiers of the built-in rewards
pub const BUILTIN_REWARDS: [&str; 5] = [
    "XpReward",
    "CreditsReward",
    "RankReward",
    "UnlockReward",
    "ReputationReward",
];
