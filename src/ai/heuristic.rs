use std::cmp::Ordering;
use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{CardPicker, TurnContext};
use crate::game::{
    Card, CardCategory, CardKind, CombatantState, ConditionKind, Decision, EnergyPool,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiStrategy {
    Aggressive,
    Cautious,
    Diplomatic,
    Random,
    Balanced,
}

impl Default for AiStrategy {
    fn default() -> Self {
        AiStrategy::Balanced
    }
}

impl FromStr for AiStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" | "aggro" => Ok(AiStrategy::Aggressive),
            "cautious" | "defensive" => Ok(AiStrategy::Cautious),
            "diplomatic" | "social" => Ok(AiStrategy::Diplomatic),
            "random" => Ok(AiStrategy::Random),
            "balanced" | "adaptive" => Ok(AiStrategy::Balanced),
            _ => Err(()),
        }
    }
}

impl AiStrategy {
    fn category_weight(self, category: CardCategory) -> f64 {
        use CardCategory::*;
        match (self, category) {
            (_, React) => 0.0,
            (AiStrategy::Random, _) => 1.0,
            (_, Energy) => 1.0,
            (AiStrategy::Aggressive, Strike) => 3.0,
            (AiStrategy::Aggressive, Empower) => 2.0,
            (AiStrategy::Aggressive, Disrupt) => 1.5,
            (AiStrategy::Aggressive, Trap) => 1.0,
            (AiStrategy::Aggressive, _) => 0.4,
            (AiStrategy::Cautious, Counter) => 2.5,
            (AiStrategy::Cautious, Reshape | Trap) => 2.0,
            (AiStrategy::Cautious, Strike | Disrupt) => 1.5,
            (AiStrategy::Cautious, _) => 0.6,
            (AiStrategy::Diplomatic, Offer) => 3.0,
            (AiStrategy::Diplomatic, Test) => 2.5,
            (AiStrategy::Diplomatic, Reshape | Counter) => 1.5,
            (AiStrategy::Diplomatic, Strike | Empower) => 0.5,
            (AiStrategy::Diplomatic, _) => 1.0,
            (AiStrategy::Balanced, Strike) => 2.0,
            (AiStrategy::Balanced, _) => 1.5,
        }
    }
}

fn default_randomness() -> f64 {
    0.3
}

fn default_energy_target() -> i32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    #[serde(default)]
    pub strategy: AiStrategy,
    #[serde(default = "default_randomness")]
    pub randomness: f64,
    #[serde(default = "default_energy_target")]
    pub energy_target: i32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl AiConfig {
    pub fn with_strategy(mut self, strategy: AiStrategy) -> Self {
        self.strategy = strategy;
        if matches!(self.strategy, AiStrategy::Random) {
            self.randomness = self.randomness.max(1.0);
        }
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            strategy: AiStrategy::default(),
            randomness: default_randomness(),
            energy_target: default_energy_target(),
            seed: None,
        }
    }
}

/// 朴素启发式出牌器。
pub struct HeuristicPicker {
    config: AiConfig,
    rng: SmallRng,
}

impl HeuristicPicker {
    pub fn new(config: AiConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn random_noise(&mut self) -> f64 {
        if self.config.randomness <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-0.5..0.5) * self.config.randomness
    }

    fn score(&mut self, card: &Card, me: &CombatantState, opponent: &CombatantState) -> f64 {
        let weight = self.config.strategy.category_weight(card.category());
        if weight <= 0.0 {
            return 0.0;
        }
        let situational = match &card.kind {
            CardKind::Offer(_) if opponent.conditions.has(ConditionKind::Betrayed) => 0.0,
            CardKind::Reshape(_) => 0.5 + me.pressure(),
            CardKind::Counter(_) => 0.75 + me.pressure() * 0.5,
            _ => 1.0,
        };
        let power = f64::from(card.power.max(0)) * 0.25;
        (weight * situational + power + self.random_noise()).max(0.0)
    }
}

impl CardPicker for HeuristicPicker {
    fn pick_cards(
        &mut self,
        hand: &[Card],
        energy: &EnergyPool,
        me: &CombatantState,
        opponent: &CombatantState,
        ctx: &mut TurnContext<'_>,
    ) -> Vec<Decision> {
        let mut scored: Vec<(f64, &Card)> = hand
            .iter()
            .filter(|card| card.category() != CardCategory::React)
            .map(|card| (self.score(card, me, opponent), card))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut decisions = Vec::new();
        let mut budget = energy.available();

        if energy.base < self.config.energy_target && scored.len() > 2 {
            let weakest = scored
                .iter()
                .rposition(|(_, card)| card.category() != CardCategory::Energy);
            if let Some(idx) = weakest {
                let (_, card) = scored.remove(idx);
                decisions.push(Decision::energy(card.id));
                budget += 1;
            }
        }

        for (score, card) in scored {
            if score <= 0.0 || card.cost > budget {
                continue;
            }
            budget -= card.cost.max(0);
            match &card.kind {
                CardKind::Energy(spec) => {
                    budget += spec.permanent.max(0) + spec.temporary.max(0);
                    decisions.push(Decision::activate(card.id));
                }
                _ => decisions.push(Decision::play(card.id)),
            }
        }

        ctx.log.push(format!(
            "{} plans {} decisions ({:?})",
            ctx.side,
            decisions.len(),
            self.config.strategy
        ));
        decisions
    }
}
