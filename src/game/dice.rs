//! 骰子与档位引擎。

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::card::Card;

/// 单局唯一随机源。
pub trait RandomSource {
    fn d6(&mut self) -> i32;

    fn chance(&mut self) -> f64;

    fn index(&mut self, len: usize) -> usize;

    fn shuffle_cards(&mut self, cards: &mut [Card]) {
        for i in (1..cards.len()).rev() {
            let j = self.index(i + 1);
            cards.swap(i, j);
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: SmallRng,
}

impl SeededDice {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededDice {
    fn d6(&mut self) -> i32 {
        self.rng.gen_range(1..=6)
    }

    fn chance(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }

    fn shuffle_cards(&mut self, cards: &mut [Card]) {
        cards.shuffle(&mut self.rng);
    }
}

/// 按队列回放的随机源，用于测试。
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    dice: VecDeque<i32>,
    chances: VecDeque<f64>,
    indices: VecDeque<usize>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dice(mut self, dice: Vec<i32>) -> Self {
        self.dice.extend(dice);
        self
    }

    pub fn with_chances(mut self, chances: Vec<f64>) -> Self {
        self.chances.extend(chances);
        self
    }

    pub fn with_indices(mut self, indices: Vec<usize>) -> Self {
        self.indices.extend(indices);
        self
    }

    pub fn remaining_dice(&self) -> usize {
        self.dice.len()
    }
}

impl RandomSource for ScriptedDice {
    fn d6(&mut self) -> i32 {
        self.dice.pop_front().unwrap_or(3).clamp(1, 6)
    }

    fn chance(&mut self) -> f64 {
        self.chances.pop_front().unwrap_or(0.99)
    }

    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.indices.pop_front().unwrap_or(0).min(len - 1)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    Normal,
    Advantage,
    Disadvantage,
}

impl RollMode {
    pub fn combine(advantage: bool, disadvantage: bool) -> Self {
        match (advantage, disadvantage) {
            (true, false) => RollMode::Advantage,
            (false, true) => RollMode::Disadvantage,
            _ => RollMode::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub dice: Vec<i32>,
    pub kept: [i32; 2],
    pub modifier: i32,
    pub total: i32,
}

/// 掷 2d6，优势或劣势时掷 3d6 取两枚。
pub fn roll(rng: &mut dyn RandomSource, mode: RollMode, modifier: i32) -> Roll {
    let mut dice = vec![rng.d6(), rng.d6()];
    if mode != RollMode::Normal {
        dice.push(rng.d6());
    }

    let mut sorted = dice.clone();
    sorted.sort_unstable();
    let kept = match mode {
        RollMode::Normal => [dice[0], dice[1]],
        RollMode::Advantage => [sorted[2], sorted[1]],
        RollMode::Disadvantage => [sorted[0], sorted[1]],
    };
    Roll {
        total: kept[0] + kept[1] + modifier,
        dice,
        kept,
        modifier,
    }
}

pub fn type_modifier(value: i32, affinity: bool) -> i32 {
    if affinity {
        value
    } else {
        value.div_euclid(2)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Tier {
    Devastating,
    Strong,
    Partial,
    Stalemate,
    Reversal,
}

impl Tier {
    pub fn is_damaging_hit(self) -> bool {
        matches!(self, Tier::Strong | Tier::Devastating)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TierOutcome {
    pub tier: Tier,
    pub margin: i32,
    pub atk_mult: f64,
    pub def_mult: f64,
}

const DEVASTATING_MARGIN: i32 = 5;
const STRONG_MARGIN: i32 = 2;
const PARTIAL_MARGIN: i32 = -2;
const STALEMATE_MARGIN: i32 = -4;

pub fn resolve_tier(attacker_total: i32, defender_total: i32) -> TierOutcome {
    let margin = attacker_total - defender_total;
    let (tier, atk_mult, def_mult) = if margin >= DEVASTATING_MARGIN {
        (Tier::Devastating, 1.5, 0.0)
    } else if margin >= STRONG_MARGIN {
        (Tier::Strong, 1.0, 0.0)
    } else if margin >= PARTIAL_MARGIN {
        (Tier::Partial, 0.5, 0.5)
    } else if margin >= STALEMATE_MARGIN {
        (Tier::Stalemate, 0.0, 1.0)
    } else {
        (Tier::Reversal, 0.0, 1.5)
    };
    TierOutcome {
        tier,
        margin,
        atk_mult,
        def_mult,
    }
}

pub fn apply_damage(power: i32, mult: f64) -> i32 {
    if power <= 0 || mult <= 0.0 {
        return 0;
    }
    let scaled = (f64::from(power) * mult).floor() as i32;
    scaled.max(1)
}
