//! 对战核心逻辑（资源、骰子、状态效果、信任经济与结算规则）。

pub mod arena;
pub mod card;
pub mod conditions;
pub mod dice;
pub mod effects;
pub mod keywords;
pub mod party;
pub mod rules;
pub mod state;
pub mod strike;
pub mod trust;

pub use arena::Arena;
pub use card::{
    Card, CardCategory, CardId, CardKind, CardType, Decision, DecisionAction, Keyword, Piles,
};
pub use conditions::{ActiveCondition, ConditionEffect, ConditionKind, ConditionStore};
pub use dice::{RandomSource, RollMode, ScriptedDice, SeededDice, Tier, TierOutcome};
pub use effects::{StrikeTrigger, TriggerCondition, Whose};
pub use party::{MemberId, Party, PartyMember, TargetingStrategy};
pub use rules::{DecisionOutcome, SkipReason, TurnFlags};
pub use state::{CombatantState, EnergyPool, PerSide, Resource, Side};
pub use strike::StrikeReport;
pub use trust::TrustTier;
