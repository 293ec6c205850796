use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::log::CombatLog;
use crate::game::card::{CardCategory, CardType};
use crate::game::party::TargetingStrategy;
use crate::game::state::{PerSide, Resource, Side};

/// 对局统计。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncounterStats {
    pub plays: PerSide<BTreeMap<CardCategory, u32>>,
    pub strikes: PerSide<u32>,
    pub damage_dealt: PerSide<i32>,
    pub damage_taken: PerSide<i32>,
    pub offers_made: PerSide<u32>,
    pub offers_accepted: PerSide<u32>,
    pub offers_refused: PerSide<u32>,
    pub tests_passed: PerSide<u32>,
    pub tests_failed: PerSide<u32>,
    pub extracted: PerSide<i32>,
    pub reacts_used: PerSide<u32>,
    pub traps_fired: PerSide<u32>,
    pub betrayals: u32,
    pub knockouts: u32,
    pub skipped: PerSide<u32>,
}

impl EncounterStats {
    pub fn record_play(&mut self, side: Side, category: CardCategory) {
        *self.plays.get_mut(side).entry(category).or_insert(0) += 1;
    }

    pub fn plays_of(&self, side: Side, category: CardCategory) -> u32 {
        self.plays.get(side).get(&category).copied().unwrap_or(0)
    }
}

/// 单局运行上下文。
#[derive(Debug, Clone)]
pub struct RunContext {
    pub round: u32,
    pub active: Side,
    pub stats: EncounterStats,
    pub log: CombatLog,
    pub promoter_cap: i32,
    pub promoter_gained: PerSide<i32>,
    pub last_type: PerSide<Option<CardType>>,
    pub targeting: TargetingStrategy,
    pub auto_damage: Vec<Resource>,
    pub bond_formed: bool,
}

impl RunContext {
    pub fn new(promoter_cap: i32, targeting: TargetingStrategy, log: CombatLog) -> Self {
        Self {
            round: 0,
            active: Side::Dungeon,
            stats: EncounterStats::default(),
            log,
            promoter_cap: promoter_cap.max(0),
            promoter_gained: PerSide::default(),
            last_type: PerSide::default(),
            targeting,
            auto_damage: Vec::new(),
            bond_formed: false,
        }
    }

    pub fn promoter_headroom(&self, side: Side) -> i32 {
        (self.promoter_cap - *self.promoter_gained.get(side)).max(0)
    }

    pub fn reset_round_gains(&mut self) {
        self.promoter_gained = PerSide::default();
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(3, TargetingStrategy::default(), CombatLog::default())
    }
}
