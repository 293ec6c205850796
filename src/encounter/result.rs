use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::EncounterStats;
use crate::game::card::Card;
use crate::game::state::{CombatantState, PerSide, Resource};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Dungeon,
    Visitor,
    Both,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WinCondition {
    Kill,
    Break,
    Panic,
    Overcome,
    Unveil,
    Dominate,
    Bond,
    Survive,
}

impl WinCondition {
    pub fn winner(self) -> Winner {
        match self {
            WinCondition::Kill | WinCondition::Break | WinCondition::Panic => Winner::Dungeon,
            WinCondition::Overcome
            | WinCondition::Unveil
            | WinCondition::Dominate
            | WinCondition::Survive => Winner::Visitor,
            WinCondition::Bond => Winner::Both,
        }
    }

    pub fn for_depleted(resource: Resource) -> Option<WinCondition> {
        match resource {
            Resource::Vitality => Some(WinCondition::Kill),
            Resource::Resolve => Some(WinCondition::Break),
            Resource::Nerve => Some(WinCondition::Panic),
            Resource::Structure => Some(WinCondition::Overcome),
            Resource::Veil => Some(WinCondition::Unveil),
            Resource::Presence => Some(WinCondition::Dominate),
            Resource::Rapport | Resource::Trust => None,
        }
    }
}

impl fmt::Display for WinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 对局结果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub winner: Winner,
    pub condition: WinCondition,
    pub desc: String,
}

impl Outcome {
    pub fn new(condition: WinCondition, desc: impl Into<String>) -> Self {
        Self {
            winner: condition.winner(),
            condition,
            desc: desc.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub round: u32,
    pub dungeon: BTreeMap<Resource, i32>,
    pub visitor: BTreeMap<Resource, i32>,
    #[serde(default)]
    pub knockouts: u32,
}

/// 传给下一场遭遇的状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carryover {
    pub visitor: CombatantState,
    pub dungeon: CombatantState,
    #[serde(default)]
    pub dungeon_discard: Vec<Card>,
    #[serde(default)]
    pub visitor_discard: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncounterResult {
    pub outcome: Outcome,
    pub rounds: u32,
    pub stats: EncounterStats,
    pub snapshots: Vec<RoundSnapshot>,
    pub final_states: PerSide<CombatantState>,
    pub carryover: Carryover,
    #[serde(default)]
    pub log: Vec<String>,
}
