use std::fmt;

use serde::{Deserialize, Serialize};

use super::arena::Arena;
use super::card::{
    Card, CardCategory, CardId, CardKind, CounterEffect, Decision, DecisionAction, DisruptEffect,
    EnergySpec, ReshapeEffect, TrapEffect, TrapTrigger,
};
use super::conditions::{ConditionEffect, ConditionKind};
use super::state::{Resource, Side};

const HINDER_DURATION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SkipReason {
    NotInHand { card_id: CardId },
    EnergyAlreadyCommitted,
    AlreadyRestrained,
    NotEnergyCard { card_id: CardId },
    ReactHeld { card_id: CardId },
    InsufficientEnergy { required: i32, available: i32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotInHand { card_id } => write!(f, "card {card_id} not in hand"),
            SkipReason::EnergyAlreadyCommitted => f.write_str("energy already committed this turn"),
            SkipReason::AlreadyRestrained => f.write_str("already restrained this turn"),
            SkipReason::NotEnergyCard { card_id } => write!(f, "card {card_id} is not an energy card"),
            SkipReason::ReactHeld { card_id } => write!(f, "react card {card_id} is held"),
            SkipReason::InsufficientEnergy {
                required,
                available,
            } => write!(f, "needs {required} energy, has {available}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Committed,
    Restrained,
    Played(CardCategory),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnFlags {
    pub energy_committed: bool,
    pub restrained: bool,
}

impl Arena {
    pub fn execute_decision(
        &mut self,
        side: Side,
        decision: &Decision,
        flags: &mut TurnFlags,
    ) -> DecisionOutcome {
        match self.try_decision(side, decision, flags) {
            Ok(outcome) => outcome,
            Err(reason) => {
                *self.ctx.stats.skipped.get_mut(side) += 1;
                self.log(format!("skip {side} card {}: {reason}", decision.card));
                DecisionOutcome::Skipped(reason)
            }
        }
    }

    fn try_decision(
        &mut self,
        side: Side,
        decision: &Decision,
        flags: &mut TurnFlags,
    ) -> Result<DecisionOutcome, SkipReason> {
        let card_id = decision.card;
        let category = self
            .piles
            .get(side)
            .find_in_hand(card_id)
            .map(Card::category)
            .ok_or(SkipReason::NotInHand { card_id })?;

        match decision.action {
            DecisionAction::Energy => {
                if flags.energy_committed {
                    return Err(SkipReason::EnergyAlreadyCommitted);
                }
                let card = self.take_card(side, card_id)?;
                self.combatant_mut(side).energy.gain_permanent(1);
                flags.energy_committed = true;
                self.log(format!("{side} commits '{}' as energy", card.name));
                self.finish_card(side, card);
                Ok(DecisionOutcome::Committed)
            }
            DecisionAction::Restrain => {
                if flags.restrained {
                    return Err(SkipReason::AlreadyRestrained);
                }
                let card = self.take_card(side, card_id)?;
                flags.restrained = true;
                self.log(format!("{side} restrains '{}'", card.name));
                self.finish_card(side, card);
                self.gain_promoter(side.opponent(), 1);
                Ok(DecisionOutcome::Restrained)
            }
            DecisionAction::Activate if category != CardCategory::Energy => {
                Err(SkipReason::NotEnergyCard { card_id })
            }
            DecisionAction::Activate | DecisionAction::Play => self.play_card(side, card_id),
        }
    }

    fn take_card(&mut self, side: Side, card_id: CardId) -> Result<Card, SkipReason> {
        self.piles
            .get_mut(side)
            .take_from_hand(card_id)
            .ok_or(SkipReason::NotInHand { card_id })
    }

    fn attune_discount(&self, side: Side, card: &Card) -> Option<(i32, u64)> {
        if card.cost <= 0 {
            return None;
        }
        self.combatant(side)
            .conditions
            .iter_kind(ConditionKind::Attune)
            .find_map(|entry| match entry.effect {
                ConditionEffect::Attune {
                    card_type,
                    discount,
                } if card_type.map(|t| t == card.card_type).unwrap_or(true) => {
                    Some((discount.max(0), entry.seq))
                }
                _ => None,
            })
    }

    fn play_card(&mut self, side: Side, card_id: CardId) -> Result<DecisionOutcome, SkipReason> {
        let card = self
            .piles
            .get(side)
            .find_in_hand(card_id)
            .cloned()
            .ok_or(SkipReason::NotInHand { card_id })?;
        if card.category() == CardCategory::React {
            return Err(SkipReason::ReactHeld { card_id });
        }

        let attune = self.attune_discount(side, &card);
        let cost = (card.cost - attune.map(|(d, _)| d).unwrap_or(0)).max(0);
        let energy = self.combatant(side).energy;
        if !energy.can_afford(cost) {
            return Err(SkipReason::InsufficientEnergy {
                required: cost,
                available: energy.available(),
            });
        }

        let card = self.take_card(side, card_id)?;
        self.combatant_mut(side).energy.spend(cost);
        if let Some((_, seq)) = attune {
            self.combatant_mut(side).conditions.remove_seq(seq);
        }
        let category = card.category();
        self.ctx.stats.record_play(side, category);
        self.log(format!(
            "{side} plays '{}' ({}, cost {cost})",
            card.name,
            category.as_str()
        ));

        self.dispatch(side, &card);
        *self.ctx.last_type.get_mut(side) = Some(card.card_type);
        self.finish_card(side, card);
        Ok(DecisionOutcome::Played(category))
    }

    fn dispatch(&mut self, side: Side, card: &Card) {
        match &card.kind {
            CardKind::Strike => {
                self.resolve_strike(side, card);
            }
            CardKind::Empower(effect) => {
                self.combatant_mut(side).conditions.add(
                    side,
                    card.name.clone(),
                    1,
                    ConditionEffect::Empower(effect.clone()),
                );
                self.fire_traps(side.opponent(), TrapTrigger::EmpowerPlayed);
            }
            CardKind::Disrupt(DisruptEffect::Hinder(hindrance)) => {
                self.combatant_mut(side.opponent()).conditions.add(
                    side,
                    card.name.clone(),
                    HINDER_DURATION,
                    ConditionEffect::Disrupt(hindrance.clone()),
                );
            }
            CardKind::Disrupt(DisruptEffect::Guard { member, duration }) => {
                self.combatant_mut(side).conditions.replace(
                    side,
                    card.name.clone(),
                    *duration,
                    ConditionEffect::Guard {
                        member: *member,
                        reduction: card.power,
                    },
                );
            }
            CardKind::Counter(counter) => self.resolve_counter(side, card, counter),
            CardKind::Trap(trap) => self.resolve_trap(side, card, trap),
            CardKind::Offer(spec) => self.resolve_offer(side, card, spec),
            CardKind::Test(spec) => self.resolve_test(side, card, spec),
            CardKind::Reshape(reshape) => self.resolve_reshape(side, reshape),
            CardKind::Energy(spec) => self.resolve_energy(side, card, spec),
            CardKind::React(_) => {}
        }
    }

    fn resolve_counter(&mut self, side: Side, card: &Card, counter: &CounterEffect) {
        let reduction = counter.reduction.unwrap_or(card.power).max(0);
        self.combatant_mut(side).conditions.add(
            side,
            card.name.clone(),
            counter.duration,
            ConditionEffect::Fortify { reduction },
        );
        if counter.cleanse {
            self.cleanse(
                side,
                &[
                    ConditionKind::Disrupt,
                    ConditionKind::Entangled,
                    ConditionKind::Erode,
                ],
            );
        }
        self.fire_traps(side.opponent(), TrapTrigger::CounterPlayed);
    }

    fn cleanse(&mut self, side: Side, kinds: &[ConditionKind]) -> usize {
        let opponent = side.opponent();
        let removed = self
            .combatant_mut(side)
            .conditions
            .remove_where(|entry| entry.placed_by == opponent && kinds.contains(&entry.kind()));
        if !removed.is_empty() {
            self.log(format!("{side} cleanses {} conditions", removed.len()));
        }
        removed.len()
    }

    fn resolve_trap(&mut self, side: Side, card: &Card, trap: &TrapEffect) {
        let opponent = side.opponent();
        let target = match card.target {
            Some(resource) if resource.owner() == opponent => resource,
            Some(resource) => resource.counterpart(),
            None => self.combatant(opponent).lowest_ratio_reducer(),
        };
        self.combatant_mut(side).conditions.add(
            side,
            card.name.clone(),
            1,
            ConditionEffect::Trap {
                trigger: trap.trigger,
                damage: card.power,
                target,
                entangle: trap.entangle,
            },
        );
    }

    fn resolve_reshape(&mut self, side: Side, reshape: &ReshapeEffect) {
        for delta in &reshape.restore {
            if delta.resource.owner() == side {
                self.benefit(side, delta.resource, delta.amount);
            }
        }

        if let Some(shift) = reshape.shift {
            let own = |r: Resource| r.owner() == side && !r.is_promoter();
            if own(shift.from) && own(shift.to) && shift.from != shift.to {
                let room = self.combatant(side).starting_value(shift.to)
                    - self.combatant(side).value(shift.to);
                let moved = shift
                    .amount
                    .max(0)
                    .min(self.combatant(side).value(shift.from))
                    .min(room.max(0));
                if moved > 0 {
                    let member = if shift.from == Resource::Vitality {
                        let strategy = self.ctx.targeting;
                        self.route_member(side, strategy)
                    } else {
                        None
                    };
                    let report = self.damage(side, shift.from, moved, member);
                    let gained = self.benefit(side, shift.to, report.dealt);
                    self.log(format!(
                        "{side} shifts {} {} into {gained} {}",
                        report.dealt, shift.from, shift.to
                    ));
                }
            }
        }

        if reshape.cleanse {
            self.cleanse(
                side,
                &[
                    ConditionKind::Disrupt,
                    ConditionKind::Entangled,
                    ConditionKind::Erode,
                    ConditionKind::Binding,
                    ConditionKind::Exposure,
                ],
            );
        }

        for _ in 0..reshape.draw {
            let piles = self.piles.get_mut(side);
            if piles.draw_one(self.rng.as_mut()).is_none() {
                break;
            }
        }

        if let Some(vitality) = reshape.revive {
            self.revive_first(side, vitality);
        }
    }

    fn resolve_energy(&mut self, side: Side, card: &Card, spec: &EnergySpec) {
        let energy = &mut self.combatant_mut(side).energy;
        if spec.permanent > 0 {
            energy.gain_permanent(spec.permanent);
        }
        if spec.temporary > 0 {
            energy.gain_temporary(spec.temporary);
        }
        if let Some(attune) = spec.attune {
            self.combatant_mut(side).conditions.add(
                side,
                card.name.clone(),
                attune.duration,
                ConditionEffect::Attune {
                    card_type: attune.card_type,
                    discount: attune.discount,
                },
            );
        }
    }
}
