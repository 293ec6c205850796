//! 回合编排：自动效果、双方回合、逐张胜负检查与回合结束维护。

use std::collections::BTreeSet;

use super::config::{EncounterConfig, SetupError};
use super::context::RunContext;
use super::log::CombatLog;
use super::result::{Carryover, EncounterResult, Outcome, RoundSnapshot, WinCondition};
use crate::ai::{AiConfig, CardPicker, HeuristicPicker, TurnContext};
use crate::game::card::{Card, Piles};
use crate::game::dice::{RandomSource, SeededDice};
use crate::game::party::TargetingStrategy;
use crate::game::rules::TurnFlags;
use crate::game::state::{PerSide, Resource, Side};
use crate::game::Arena;

/// 驱动一场遭遇战。
pub struct Orchestrator {
    config: EncounterConfig,
    arena: Arena,
    pickers: PerSide<Box<dyn CardPicker>>,
    snapshots: Vec<RoundSnapshot>,
}

impl Orchestrator {
    pub fn new(config: EncounterConfig) -> Result<Self, SetupError> {
        config.validate()?;

        let (dungeon, visitor) = match &config.carryover {
            Some(carry) => {
                if carry.dungeon.side != Side::Dungeon || carry.visitor.side != Side::Visitor {
                    return Err(SetupError::InvalidConfig {
                        reason: "carryover states are on the wrong sides".into(),
                    });
                }
                let mut dungeon = carry.dungeon.clone();
                let mut visitor = carry.visitor.clone();
                dungeon.energy.refresh();
                visitor.energy.refresh();
                (dungeon, visitor)
            }
            None => (
                config.build_combatant(Side::Dungeon)?,
                config.build_combatant(Side::Visitor)?,
            ),
        };

        let carried = config.carryover.as_ref();
        let piles = PerSide::new(
            build_piles(
                &config.dungeon.deck,
                carried.map(|c| c.dungeon_discard.as_slice()),
            ),
            build_piles(
                &config.visitor.deck,
                carried.map(|c| c.visitor_discard.as_slice()),
            ),
        );

        let mut ctx = RunContext::new(
            config.promoter_cap,
            config.targeting,
            CombatLog::new(config.log_to_console),
        );
        ctx.active = config.initiative;
        for effect in &config.auto_effects {
            if !ctx.auto_damage.contains(&effect.resource) {
                ctx.auto_damage.push(effect.resource);
            }
        }

        let rng: Box<dyn RandomSource> = match config.seed {
            Some(seed) => Box::new(SeededDice::from_seed(seed)),
            None => Box::new(SeededDice::from_entropy()),
        };

        let pickers: PerSide<Box<dyn CardPicker>> = PerSide::new(
            Box::new(HeuristicPicker::new(picker_config(&config, Side::Dungeon))),
            Box::new(HeuristicPicker::new(picker_config(&config, Side::Visitor))),
        );

        Ok(Self {
            arena: Arena::new(dungeon, visitor, piles, ctx, rng),
            config,
            pickers,
            snapshots: Vec::new(),
        })
    }

    pub fn with_pickers(
        mut self,
        dungeon: Box<dyn CardPicker>,
        visitor: Box<dyn CardPicker>,
    ) -> Self {
        self.pickers = PerSide::new(dungeon, visitor);
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.arena.rng = rng;
        self
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn run(mut self) -> EncounterResult {
        self.opening_draw();

        let mut outcome = None;
        let mut rounds = 0;
        for round in 1..=self.config.max_rounds {
            rounds = round;
            self.arena.ctx.round = round;
            self.arena.log(format!("-- round {round} --"));

            if let Some(found) = self.play_round(round) {
                self.snapshot(round);
                outcome = Some(found);
                break;
            }
            self.arena.end_round(self.config.min_hand_size);
            self.snapshot(round);
            if let Some(found) = self.arena.check_win() {
                outcome = Some(found);
                break;
            }
        }

        let outcome = outcome.unwrap_or_else(|| {
            Outcome::new(
                WinCondition::Survive,
                format!("visitor endures {} rounds", self.config.max_rounds),
            )
        });
        self.finish(outcome, rounds)
    }

    fn opening_draw(&mut self) {
        let min_hand = self.config.min_hand_size;
        let arena = &mut self.arena;
        for side in Side::ALL {
            let piles = arena.piles.get_mut(side);
            arena.rng.shuffle_cards(&mut piles.draw);
            piles.draw_to(min_hand, arena.rng.as_mut());
        }
        let hands = (
            self.arena.piles.dungeon.hand.len(),
            self.arena.piles.visitor.hand.len(),
        );
        self.arena.log(format!(
            "opening hands: dungeon {}, visitor {}",
            hands.0, hands.1
        ));
    }

    fn play_round(&mut self, round: u32) -> Option<Outcome> {
        self.apply_auto_effects(round);
        if let Some(outcome) = self.arena.check_win() {
            return Some(outcome);
        }

        let first = self.config.initiative;
        for side in [first, first.opponent()] {
            if let Some(outcome) = self.take_turn(side, round) {
                return Some(outcome);
            }
        }
        None
    }

    fn apply_auto_effects(&mut self, round: u32) {
        let effects = self.config.auto_effects.clone();
        for effect in effects {
            let Some(amount) = effect.amount_for_round(round) else {
                continue;
            };
            if amount <= 0 {
                continue;
            }
            let side = effect.resource.owner();
            let member = if effect.resource == Resource::Vitality {
                self.arena.route_member(side, TargetingStrategy::Random)
            } else {
                None
            };
            self.arena
                .log(format!("environment presses {side} {} for {amount}", effect.resource));
            self.arena.damage(side, effect.resource, amount, member);
        }
    }

    fn take_turn(&mut self, side: Side, round: u32) -> Option<Outcome> {
        self.arena.ctx.active = side;
        let decisions = {
            let arena = &mut self.arena;
            let piles = arena.piles.get(side);
            let me = arena.combatants.get(side);
            let opponent = arena.combatants.get(side.opponent());
            let energy = me.energy;
            let mut turn = TurnContext {
                round,
                side,
                stats: &arena.ctx.stats,
                log: &mut arena.ctx.log,
                opponent_reacts: arena.piles.get(side.opponent()).react_cards(),
                promoter_cap: arena.ctx.promoter_cap,
                promoter_gained: *arena.ctx.promoter_gained.get(side),
                targeting: arena.ctx.targeting,
                draw_pile: &piles.draw,
                discard_pile: &piles.discard,
            };
            self.pickers
                .get_mut(side)
                .pick_cards(&piles.hand, &energy, me, opponent, &mut turn)
        };

        let mut flags = TurnFlags::default();
        for decision in decisions {
            self.arena.execute_decision(side, &decision, &mut flags);
            if let Some(outcome) = self.arena.check_win() {
                return Some(outcome);
            }
        }
        None
    }

    fn snapshot(&mut self, round: u32) {
        self.snapshots.push(RoundSnapshot {
            round,
            dungeon: self.arena.combatant(Side::Dungeon).snapshot_values(),
            visitor: self.arena.combatant(Side::Visitor).snapshot_values(),
            knockouts: self.arena.ctx.stats.knockouts,
        });
    }

    fn finish(self, outcome: Outcome, rounds: u32) -> EncounterResult {
        let Orchestrator {
            arena, snapshots, ..
        } = self;
        let Arena {
            combatants,
            piles,
            mut ctx,
            ..
        } = arena;
        ctx.log.push(format!(
            "outcome: {} ({:?}) after {rounds} rounds: {}",
            outcome.condition, outcome.winner, outcome.desc
        ));

        let carryover = Carryover {
            visitor: combatants.visitor.clone(),
            dungeon: combatants.dungeon.clone(),
            dungeon_discard: piles.dungeon.discard,
            visitor_discard: piles.visitor.discard,
        };
        EncounterResult {
            outcome,
            rounds,
            stats: ctx.stats,
            snapshots,
            final_states: combatants,
            carryover,
            log: ctx.log.into_lines(),
        }
    }
}

fn picker_config(config: &EncounterConfig, side: Side) -> AiConfig {
    let mut ai = config.ai.get(side).clone();
    if ai.seed.is_none() {
        ai.seed = config.seed.map(|seed| match side {
            Side::Dungeon => seed.wrapping_add(1),
            Side::Visitor => seed.wrapping_add(2),
        });
    }
    ai
}

fn build_piles(deck: &[Card], carried_discard: Option<&[Card]>) -> Piles {
    let mut draw = deck.to_vec();
    if let Some(discard) = carried_discard {
        let mut seen: BTreeSet<_> = draw.iter().map(|card| card.id).collect();
        for card in discard {
            if seen.insert(card.id) {
                draw.push(card.clone());
            }
        }
    }
    Piles::from_deck(draw)
}

pub fn run_encounter(config: EncounterConfig) -> Result<EncounterResult, SetupError> {
    Ok(Orchestrator::new(config)?.run())
}

pub fn run_encounter_json(json: &str) -> Result<EncounterResult, SetupError> {
    run_encounter(EncounterConfig::from_json(json)?)
}
