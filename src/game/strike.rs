//! 攻击结算流水线。

use super::arena::Arena;
use super::card::{Card, CardKind, ReactPower, ReactSpec, ReactVariant, TrapTrigger};
use super::conditions::{ConditionEffect, ConditionKind};
use super::dice::{apply_damage, resolve_tier, roll, type_modifier, RollMode, Tier};
use super::keywords::{resonate_bonus, StrikeAftermath, MARKER_DURATION};
use super::party::MemberId;
use super::state::{CombatantState, Resource, Side};

pub const REACT_DIFFICULTY: i32 = 7;
pub const ABSORB_FORTIFY: i32 = 1;
pub const REFLECT_DAMAGE: i32 = 1;

pub fn react_power(card: &Card, spec: &ReactSpec, owner: &CombatantState) -> i32 {
    match spec.power {
        ReactPower::Flat => card.power,
        ReactPower::Desperate {
            resource,
            per_missing,
        } => {
            if per_missing <= 0 {
                return card.power;
            }
            let missing = (owner.starting_value(resource) - owner.value(resource)).max(0);
            card.power + missing / per_missing
        }
    }
}

/// 选出可支付的最强反应牌。
pub fn best_react<'a>(hand: &'a [Card], owner: &CombatantState) -> Option<(&'a Card, ReactSpec, i32)> {
    let mut best: Option<(&Card, ReactSpec, i32)> = None;
    for card in hand {
        let CardKind::React(spec) = &card.kind else {
            continue;
        };
        if !owner.energy.can_afford(card.cost) {
            continue;
        }
        let power = react_power(card, spec, owner);
        if best.map(|(_, _, p)| power > p).unwrap_or(true) {
            best = Some((card, *spec, power));
        }
    }
    best
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactResult {
    pub mitigation: i32,
    pub reflected: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeReport {
    pub tier: Tier,
    pub margin: i32,
    pub target: Resource,
    pub power: i32,
    pub base: i32,
    pub dealt: i32,
}

impl Arena {
    pub fn resolve_strike(&mut self, attacker: Side, card: &Card) -> Option<StrikeReport> {
        let defender = attacker.opponent();
        *self.ctx.stats.strikes.get_mut(attacker) += 1;

        self.fire_traps(defender, TrapTrigger::StrikePlayed);
        if self.check_win().is_some() {
            return None;
        }

        if attacker == Side::Dungeon {
            self.decay_trust_on_strike();
        }
        self.check_betrayal(attacker);

        let mut target = self.strike_target(attacker, card);
        let mut keywords = card.keywords.clone();
        let mut advantage = false;
        let mut disadvantage = false;
        let mut power = card.power;

        if let Some(empower) = self
            .combatant_mut(attacker)
            .conditions
            .take_first(ConditionKind::Empower, |_| true)
        {
            if let ConditionEffect::Empower(effect) = empower.effect {
                advantage |= effect.advantage;
                power += effect.power_bonus;
                for keyword in effect.grant_keywords {
                    if !keywords.contains(&keyword) {
                        keywords.push(keyword);
                    }
                }
                if let Some(retarget) = effect.retarget.filter(|r| r.owner() == defender) {
                    target = retarget;
                }
            }
        }

        if let Some(disrupt) = self
            .combatant_mut(attacker)
            .conditions
            .take_first(ConditionKind::Disrupt, |entry| entry.placed_by == defender)
        {
            if let ConditionEffect::Disrupt(hindrance) = disrupt.effect {
                disadvantage |= hindrance.disadvantage;
                if hindrance.strip_keywords {
                    keywords.clear();
                }
                if hindrance.randomize_target {
                    let reducers = defender.reducers();
                    target = reducers[self.rng.index(reducers.len())];
                }
                if hindrance.self_damage > 0 {
                    self.log(format!("'{}' backfires on {attacker}", disrupt.source));
                    self.damage(attacker, target.counterpart(), hindrance.self_damage, None);
                }
            }
        }

        if self
            .combatant(attacker)
            .conditions
            .has(ConditionKind::Entangled)
        {
            disadvantage = true;
        }

        let same_type = *self.ctx.last_type.get(attacker) == Some(card.card_type);
        power += resonate_bonus(&keywords, same_type);

        if let Some(trigger) = &card.trigger {
            let (me, opponent) = (self.combatant(attacker), self.combatant(defender));
            power += trigger.bonus_for(me, opponent);
        }

        let betrayed_bonus: i32 = self
            .combatant(attacker)
            .conditions
            .iter_kind(ConditionKind::Betrayed)
            .map(|entry| match entry.effect {
                ConditionEffect::Betrayed { power_bonus } => power_bonus,
                _ => 0,
            })
            .max()
            .unwrap_or(0);
        power += betrayed_bonus;
        let power = power.max(0);

        let affinity = card.card_type.has_affinity(target);
        let atk_mod = type_modifier(self.combatant(attacker).type_modifier(card.card_type), affinity);
        let scorned: i32 = self
            .combatant(defender)
            .conditions
            .iter_kind(ConditionKind::Scorned)
            .map(|entry| match entry.effect {
                ConditionEffect::Scorned { defense_bonus } => defense_bonus,
                _ => 0,
            })
            .max()
            .unwrap_or(0);
        let def_mod =
            type_modifier(self.combatant(defender).type_modifier(card.card_type), affinity) + scorned;

        let mode = RollMode::combine(advantage, disadvantage);
        let atk_roll = roll(self.rng.as_mut(), mode, atk_mod);
        let def_roll = roll(self.rng.as_mut(), RollMode::Normal, def_mod);
        let outcome = resolve_tier(atk_roll.total, def_roll.total);
        let base = apply_damage(power, outcome.atk_mult);
        self.log(format!(
            "{attacker} strikes {target} with '{}': {} vs {} -> {:?} (power {power})",
            card.name, atk_roll.total, def_roll.total, outcome.tier
        ));

        let member = if target == Resource::Vitality {
            let strategy = self.ctx.targeting;
            self.route_member(defender, strategy)
        } else {
            None
        };

        let mut dealt = 0;
        let mut overflow = 0;
        if base > 0 {
            let fortify = self.combatant(defender).conditions.fortify_total();
            let guard = self.guard_reduction(defender, member);
            let react = if outcome.tier.is_damaging_hit() {
                self.consult_react(defender, outcome.tier)
            } else {
                ReactResult::default()
            };

            let exposure = self
                .combatant_mut(defender)
                .conditions
                .take_first(ConditionKind::Exposure, |_| true)
                .map(|entry| match entry.effect {
                    ConditionEffect::Exposure { bonus } => bonus,
                    _ => 0,
                })
                .unwrap_or(0);

            let final_damage = (base + exposure - react.mitigation - fortify - guard).max(0);
            if final_damage < base + exposure {
                self.log(format!(
                    "{defender} mitigates {} (react {}, fortify {fortify}, guard {guard})",
                    base + exposure - final_damage,
                    react.mitigation
                ));
            }

            let report = self.damage(defender, target, final_damage, member);
            dealt = report.dealt;
            overflow = report.overflow;
            *self.ctx.stats.damage_dealt.get_mut(attacker) += dealt;

            if react.reflected > 0 {
                self.damage(attacker, target.counterpart(), react.reflected, None);
            }
        }

        self.apply_strike_keywords(StrikeAftermath {
            attacker,
            keywords: &keywords,
            target,
            tier: outcome.tier,
            dealt,
            overflow,
            source: &card.name,
        });

        if outcome.margin < 0 {
            let recoil = apply_damage(power, outcome.def_mult);
            if recoil > 0 {
                self.log(format!("{attacker} takes {recoil} recoil"));
                self.damage(attacker, target.counterpart(), recoil, None);
            }
        }

        Some(StrikeReport {
            tier: outcome.tier,
            margin: outcome.margin,
            target,
            power,
            base,
            dealt,
        })
    }

    /// 确定攻击目标资源。
    fn strike_target(&self, attacker: Side, card: &Card) -> Resource {
        let defender = attacker.opponent();
        match card.target {
            Some(resource) if resource.owner() == defender => resource,
            Some(resource) => resource.counterpart(),
            None => self.combatant(defender).lowest_ratio_reducer(),
        }
    }

    fn guard_reduction(&self, defender: Side, member: Option<MemberId>) -> i32 {
        let Some(member) = member else {
            return 0;
        };
        self.combatant(defender)
            .conditions
            .iter_kind(ConditionKind::Guard)
            .filter_map(|entry| match entry.effect {
                ConditionEffect::Guard {
                    member: guarded,
                    reduction,
                } if guarded.map(|id| id == member).unwrap_or(true) => Some(reduction),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn consult_react(&mut self, defender: Side, tier: Tier) -> ReactResult {
        let choice = {
            let hand = &self.piles.get(defender).hand;
            best_react(hand, self.combatant(defender)).map(|(card, spec, power)| (card.id, spec, power))
        };
        let Some((card_id, spec, power)) = choice else {
            return ReactResult::default();
        };
        let Some(card) = self.piles.get_mut(defender).take_from_hand(card_id) else {
            return ReactResult::default();
        };
        if !self.combatant_mut(defender).energy.spend(card.cost) {
            self.piles.get_mut(defender).hand.push(card);
            return ReactResult::default();
        }
        *self.ctx.stats.reacts_used.get_mut(defender) += 1;

        let check = roll(self.rng.as_mut(), RollMode::Normal, 0);
        let mut result = ReactResult::default();
        if check.total >= REACT_DIFFICULTY {
            result.mitigation = power.max(0);
            match spec.variant {
                ReactVariant::Block => {}
                ReactVariant::Absorb => {
                    self.combatant_mut(defender).conditions.add(
                        defender,
                        card.name.clone(),
                        MARKER_DURATION,
                        ConditionEffect::Fortify {
                            reduction: ABSORB_FORTIFY,
                        },
                    );
                }
                ReactVariant::Reflect => {
                    if tier == Tier::Devastating {
                        result.reflected = REFLECT_DAMAGE;
                    }
                }
            }
            self.log(format!(
                "{defender} reacts with '{}' ({}), blocking {}",
                card.name, check.total, result.mitigation
            ));
        } else {
            self.log(format!("{defender} react '{}' fails ({})", card.name, check.total));
        }
        self.finish_card(defender, card);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::tests::{arena_with, dungeon_state, party_visitor, visitor_state};
    use crate::game::card::{CardType, Keyword};
    use crate::game::dice::ScriptedDice;

    fn strike(power: i32, target: Resource) -> Card {
        Card::strike(1, "Claw", power, target)
    }

    fn react(id: u32, power: i32, variant: ReactVariant) -> Card {
        Card::new(
            id,
            "Parry",
            CardType::Physical,
            1,
            power,
            CardKind::React(ReactSpec {
                variant,
                power: ReactPower::Flat,
            }),
        )
    }

    #[test]
    fn strong_hit_reduces_target() {
        let dice = ScriptedDice::new().with_dice(vec![4, 4, 3, 3]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        let report = arena
            .resolve_strike(Side::Dungeon, &strike(2, Resource::Vitality))
            .expect("strike resolves");
        assert_eq!(report.tier, Tier::Strong);
        assert_eq!(report.dealt, 2);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Vitality), 18);
    }

    #[test]
    fn reversal_damages_attacker_counterpart() {
        let dice = ScriptedDice::new().with_dice(vec![1, 1, 6, 6]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        let report = arena
            .resolve_strike(Side::Visitor, &strike(2, Resource::Presence))
            .expect("strike resolves");
        assert_eq!(report.tier, Tier::Reversal);
        assert_eq!(arena.combatant(Side::Dungeon).value(Resource::Presence), 12);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 13);
    }

    #[test]
    fn dungeon_strike_decays_trust_and_betrays() {
        let dice = ScriptedDice::new().with_dice(vec![3, 3, 3, 3]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        arena.combatant_mut(Side::Visitor).set_promoter(6);
        arena.resolve_strike(Side::Dungeon, &strike(2, Resource::Nerve));
        let visitor = arena.combatant(Side::Visitor);
        assert_eq!(visitor.promoter(), 0);
        assert!(visitor.conditions.has(ConditionKind::Betrayed));
        // 6 decays to 4, then betrayal deals 4 to vitality.
        assert_eq!(visitor.value(Resource::Vitality), 16);
        assert_eq!(visitor.value(Resource::Nerve), 15);
    }

    #[test]
    fn empower_is_consumed_and_grants_power() {
        let dice = ScriptedDice::new().with_dice(vec![4, 4, 1, 3, 3, 3, 3]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        arena.combatant_mut(Side::Dungeon).conditions.add(
            Side::Dungeon,
            "focus",
            1,
            ConditionEffect::Empower(crate::game::card::EmpowerEffect {
                advantage: true,
                power_bonus: 2,
                grant_keywords: vec![Keyword::Drain],
                retarget: None,
            }),
        );
        let report = arena
            .resolve_strike(Side::Dungeon, &strike(2, Resource::Vitality))
            .expect("strike resolves");
        assert_eq!(report.power, 4);
        assert_eq!(report.tier, Tier::Strong);
        assert_eq!(report.dealt, 4);
        assert!(!arena
            .combatant(Side::Dungeon)
            .conditions
            .has(ConditionKind::Empower));
    }

    #[test]
    fn fortify_guard_and_react_reduce_final_damage() {
        let dice = ScriptedDice::new().with_dice(vec![6, 6, 1, 2, 4, 3]);
        let mut visitor = party_visitor();
        visitor.conditions.add(Side::Visitor, "brace", 1, ConditionEffect::Fortify { reduction: 1 });
        visitor.conditions.add(
            Side::Visitor,
            "shield",
            1,
            ConditionEffect::Guard {
                member: Some(3),
                reduction: 1,
            },
        );
        let mut arena = arena_with(dungeon_state(), visitor, dice);
        arena.piles.visitor.hand.push(react(9, 2, ReactVariant::Absorb));

        let report = arena
            .resolve_strike(Side::Dungeon, &strike(4, Resource::Vitality))
            .expect("strike resolves");
        assert_eq!(report.tier, Tier::Devastating);
        assert_eq!(report.base, 6);
        // 6 - react 2 - fortify 1 - guard 1 on the lowest member.
        assert_eq!(report.dealt, 2);
        let visitor = arena.combatant(Side::Visitor);
        assert_eq!(visitor.energy.available(), 2);
        assert_eq!(visitor.conditions.fortify_total(), 2);
        assert_eq!(arena.piles.visitor.discard.len(), 1);
    }

    #[test]
    fn failed_react_is_still_discarded() {
        let dice = ScriptedDice::new().with_dice(vec![6, 6, 1, 2, 1, 1]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        arena.piles.visitor.hand.push(react(9, 5, ReactVariant::Reflect));
        let report = arena
            .resolve_strike(Side::Dungeon, &strike(4, Resource::Vitality))
            .expect("strike resolves");
        assert_eq!(report.dealt, 6);
        assert!(arena.piles.visitor.hand.is_empty());
        assert_eq!(arena.piles.visitor.discard.len(), 1);
    }

    #[test]
    fn reflect_returns_damage_on_devastating() {
        let dice = ScriptedDice::new().with_dice(vec![6, 6, 1, 2, 5, 5]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        arena.piles.visitor.hand.push(react(9, 2, ReactVariant::Reflect));
        arena.resolve_strike(Side::Dungeon, &strike(4, Resource::Vitality));
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Vitality), 16);
        assert_eq!(arena.combatant(Side::Dungeon).value(Resource::Structure), 15);
    }

    #[test]
    fn strike_played_trap_fires_before_roll() {
        let dice = ScriptedDice::new().with_dice(vec![3, 3, 3, 3]);
        let mut arena = arena_with(dungeon_state(), visitor_state(), dice);
        arena.combatant_mut(Side::Visitor).conditions.add(
            Side::Visitor,
            "pit",
            1,
            ConditionEffect::Trap {
                trigger: TrapTrigger::StrikePlayed,
                damage: 2,
                target: Resource::Structure,
                entangle: false,
            },
        );
        arena.resolve_strike(Side::Dungeon, &strike(2, Resource::Vitality));
        assert_eq!(arena.combatant(Side::Dungeon).value(Resource::Structure), 14);
        assert_eq!(*arena.ctx.stats.traps_fired.get(Side::Visitor), 1);
    }
}
