//! 出牌决策协作者（接口、脚本回放与启发式策略）。

pub mod heuristic;

use std::collections::VecDeque;

use crate::encounter::context::EncounterStats;
use crate::encounter::log::CombatLog;
use crate::game::{Card, CombatantState, Decision, EnergyPool, Side, TargetingStrategy};

pub use heuristic::{AiConfig, AiStrategy, HeuristicPicker};

pub struct TurnContext<'a> {
    pub round: u32,
    pub side: Side,
    pub stats: &'a EncounterStats,
    pub log: &'a mut CombatLog,
    pub opponent_reacts: Vec<Card>,
    pub promoter_cap: i32,
    pub promoter_gained: i32,
    pub targeting: TargetingStrategy,
    pub draw_pile: &'a [Card],
    pub discard_pile: &'a [Card],
}

/// 每回合给出有序决策。
pub trait CardPicker {
    fn pick_cards(
        &mut self,
        hand: &[Card],
        energy: &EnergyPool,
        me: &CombatantState,
        opponent: &CombatantState,
        ctx: &mut TurnContext<'_>,
    ) -> Vec<Decision>;
}

/// 按脚本回放决策。
#[derive(Debug, Clone, Default)]
pub struct ScriptedPicker {
    turns: VecDeque<Vec<Decision>>,
}

impl ScriptedPicker {
    pub fn new(turns: Vec<Vec<Decision>>) -> Self {
        Self {
            turns: turns.into(),
        }
    }

    pub fn passive() -> Self {
        Self::default()
    }
}

impl CardPicker for ScriptedPicker {
    fn pick_cards(
        &mut self,
        _hand: &[Card],
        _energy: &EnergyPool,
        _me: &CombatantState,
        _opponent: &CombatantState,
        _ctx: &mut TurnContext<'_>,
    ) -> Vec<Decision> {
        self.turns.pop_front().unwrap_or_default()
    }
}
