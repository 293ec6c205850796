//! 对战场地：双方状态、牌堆、运行上下文与唯一随机源。

use super::card::{Card, CardId, Piles, TrapTrigger};
use super::conditions::{ConditionEffect, ConditionKind};
use super::dice::RandomSource;
use super::party::{purge_member_cards, return_member_cards, MemberId, TargetingStrategy};
use super::state::{CombatantState, DamageReport, PerSide, Resource, Side};
use crate::encounter::context::RunContext;
use crate::encounter::result::{Outcome, WinCondition};

/// 结算器可触及的全部对战状态。
pub struct Arena {
    pub combatants: PerSide<CombatantState>,
    pub piles: PerSide<Piles>,
    pub ctx: RunContext,
    pub rng: Box<dyn RandomSource>,
}

impl Arena {
    pub fn new(
        dungeon: CombatantState,
        visitor: CombatantState,
        piles: PerSide<Piles>,
        ctx: RunContext,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            combatants: PerSide::new(dungeon, visitor),
            piles,
            ctx,
            rng,
        }
    }

    pub fn combatant(&self, side: Side) -> &CombatantState {
        self.combatants.get(side)
    }

    pub fn combatant_mut(&mut self, side: Side) -> &mut CombatantState {
        self.combatants.get_mut(side)
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.ctx.log.push(line);
    }

    pub fn route_member(&mut self, side: Side, strategy: TargetingStrategy) -> Option<MemberId> {
        let party = self.combatants.get(side).party.as_ref()?;
        party.choose_target(strategy, self.rng.as_mut())
    }

    /// 扣减资源，成员倒下时清出其卡牌。
    pub fn damage(
        &mut self,
        side: Side,
        resource: Resource,
        amount: i32,
        member: Option<MemberId>,
    ) -> DamageReport {
        let report = self
            .combatants
            .get_mut(side)
            .take_damage(resource, amount, member);
        if report.dealt > 0 {
            *self.ctx.stats.damage_taken.get_mut(side) += report.dealt;
            let left = self.combatants.get(side).value(resource);
            self.log(format!(
                "{side} loses {} {resource} ({left} left)",
                report.dealt
            ));
        }
        if let Some(knocked) = report.knocked_out {
            self.handle_knockout(side, knocked, report);
        }
        report
    }

    fn handle_knockout(&mut self, side: Side, member: MemberId, report: DamageReport) {
        self.ctx.stats.knockouts += 1;
        let piles = std::mem::take(self.piles.get_mut(side));
        let (piles, manifest) = purge_member_cards(piles, member);
        *self.piles.get_mut(side) = piles;

        let benched = manifest.total();
        if let Some(party) = self.combatants.get_mut(side).party.as_mut() {
            party.benched.extend(manifest.cards);
        }
        let morale = report.morale.unwrap_or_default();
        self.log(format!(
            "member {member} knocked out: {benched} cards benched, morale -{} resolve -{} nerve",
            morale.resolve, morale.nerve
        ));
    }

    pub fn benefit(&mut self, side: Side, resource: Resource, amount: i32) -> i32 {
        let gained = self.combatants.get_mut(side).apply_benefit(resource, amount);
        if gained > 0 {
            self.log(format!("{side} gains {gained} {resource}"));
        }
        gained
    }

    pub fn revive_first(&mut self, side: Side, vitality: i32) -> Option<MemberId> {
        let party = self.combatants.get_mut(side).party.as_mut()?;
        let member = party.first_knocked_out()?;
        if !party.restore(member, vitality) {
            return None;
        }
        let benched = std::mem::take(&mut party.benched);
        let discard = std::mem::take(&mut self.piles.get_mut(side).discard);
        let (remaining, discard, returned) = return_member_cards(benched, discard, member);
        if let Some(party) = self.combatants.get_mut(side).party.as_mut() {
            party.benched = remaining;
        }
        self.piles.get_mut(side).discard = discard;
        self.log(format!(
            "member {member} restored, {} cards returned to discard",
            returned.len()
        ));
        Some(member)
    }

    pub fn finish_card(&mut self, side: Side, card: Card) {
        if let Some(member) = card.member {
            if let Some(party) = self.combatants.get_mut(side).party.as_mut() {
                if !party.is_active(member) {
                    party.benched.push(card);
                    return;
                }
            }
        }
        self.piles.get_mut(side).discard.push(card);
    }

    pub fn hand_contains(&self, side: Side, card: CardId) -> bool {
        self.piles.get(side).find_in_hand(card).is_some()
    }

    /// 触发陷阱。
    pub fn fire_traps(&mut self, bearer: Side, trigger: TrapTrigger) -> u32 {
        let victim = bearer.opponent();
        let mut fired = 0;
        while let Some(trap) = self.combatants.get_mut(bearer).conditions.take_first(
            ConditionKind::Trap,
            |entry| matches!(entry.effect, ConditionEffect::Trap { trigger: t, .. } if t == trigger),
        ) {
            let ConditionEffect::Trap {
                damage,
                target,
                entangle,
                ..
            } = trap.effect
            else {
                continue;
            };
            fired += 1;
            *self.ctx.stats.traps_fired.get_mut(bearer) += 1;
            self.log(format!(
                "{bearer} trap '{}' springs on {} ({})",
                trap.source,
                trigger.as_str(),
                victim
            ));
            let target = if target.owner() == victim {
                target
            } else {
                target.counterpart()
            };
            let member = if target == Resource::Vitality {
                let strategy = self.ctx.targeting;
                self.route_member(victim, strategy)
            } else {
                None
            };
            self.damage(victim, target, damage, member);
            if entangle {
                self.place_entangle(bearer, victim, &trap.source);
            }
        }
        fired
    }

    pub fn check_win(&self) -> Option<Outcome> {
        if self.ctx.bond_formed {
            return Some(Outcome::new(
                WinCondition::Bond,
                "a covenant binds dungeon and visitor",
            ));
        }

        let visitor = self.combatants.get(Side::Visitor);
        if let Some(party) = &visitor.party {
            if party.is_wiped() {
                return Some(Outcome::new(
                    WinCondition::Kill,
                    format!(
                        "{} of {} party members knocked out",
                        party.knockout_count,
                        party.members.len()
                    ),
                ));
            }
        }
        for side in [Side::Visitor, Side::Dungeon] {
            let state = self.combatants.get(side);
            for resource in side.reducers() {
                if state.value(resource) > 0 {
                    continue;
                }
                if let Some(condition) = WinCondition::for_depleted(resource) {
                    return Some(Outcome::new(condition, format!("{side} {resource} depleted")));
                }
            }
        }
        None
    }

    /// 回合结束结算。
    pub fn end_round(&mut self, min_hand: usize) {
        for side in Side::ALL {
            self.apply_bindings(side);
            self.apply_dependencies(side);

            let expired = self.combatants.get_mut(side).conditions.tick_round();
            for entry in expired {
                if let ConditionEffect::Erode { resource, amount } = entry.effect {
                    let member = if resource == Resource::Vitality {
                        let strategy = self.ctx.targeting;
                        self.route_member(side, strategy)
                    } else {
                        None
                    };
                    self.log(format!("erode '{}' on {side} resolves", entry.source));
                    self.damage(side, resource, amount, member);
                }
            }

            let drawn = {
                let piles = self.piles.get_mut(side);
                piles.draw_to(min_hand, self.rng.as_mut())
            };
            if !drawn.is_empty() {
                self.log(format!("{side} draws {} cards", drawn.len()));
            }
            self.combatants.get_mut(side).energy.refresh();
        }
        self.ctx.reset_round_gains();
    }

    fn apply_bindings(&mut self, side: Side) {
        let drains: Vec<(String, Resource, i32)> = self
            .combatants
            .get(side)
            .conditions
            .iter_kind(ConditionKind::Binding)
            .filter(|entry| !entry.fresh)
            .filter_map(|entry| match entry.effect {
                ConditionEffect::Binding { resource, amount } => {
                    Some((entry.source.clone(), resource, amount))
                }
                _ => None,
            })
            .collect();
        for (source, resource, amount) in drains {
            self.log(format!("binding '{source}' drains {side}"));
            self.damage(side, resource, amount, None);
        }
    }

    fn apply_dependencies(&mut self, side: Side) {
        let promoter = self.combatants.get(side).promoter();
        let broken: Vec<u64> = self
            .combatants
            .get(side)
            .conditions
            .iter_kind(ConditionKind::Dependency)
            .filter(|entry| !entry.fresh)
            .filter(|entry| {
                matches!(entry.effect, ConditionEffect::Dependency { trust_floor, .. } if promoter < trust_floor)
            })
            .map(|entry| entry.seq)
            .collect();
        for seq in broken {
            let Some(entry) = self.combatants.get_mut(side).conditions.remove_seq(seq) else {
                continue;
            };
            if let ConditionEffect::Dependency {
                resource, amount, ..
            } = entry.effect
            {
                self.log(format!("dependency '{}' collapses on {side}", entry.source));
                self.damage(side, resource, amount, None);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encounter::log::CombatLog;
    use crate::game::card::{CardKind, CardType};
    use crate::game::dice::ScriptedDice;
    use crate::game::party::{Party, PartyMember};

    pub(crate) fn dungeon_state() -> CombatantState {
        CombatantState::new(
            Side::Dungeon,
            &[
                (Resource::Structure, 16),
                (Resource::Veil, 14),
                (Resource::Presence, 12),
            ],
            3,
        )
    }

    pub(crate) fn visitor_state() -> CombatantState {
        CombatantState::new(
            Side::Visitor,
            &[
                (Resource::Vitality, 20),
                (Resource::Resolve, 16),
                (Resource::Nerve, 16),
            ],
            3,
        )
    }

    pub(crate) fn party_visitor() -> CombatantState {
        let party = Party::new(
            vec![
                PartyMember::new(1, "Bram", "fighter", 10),
                PartyMember::new(2, "Ysolde", "scout", 7),
                PartyMember::new(3, "Ilse", "mystic", 6),
            ],
            2,
        );
        CombatantState::new(
            Side::Visitor,
            &[(Resource::Resolve, 16), (Resource::Nerve, 16)],
            3,
        )
        .with_party(party)
    }

    pub(crate) fn arena_with(
        dungeon: CombatantState,
        visitor: CombatantState,
        dice: ScriptedDice,
    ) -> Arena {
        Arena::new(
            dungeon,
            visitor,
            PerSide::default(),
            RunContext::new(3, TargetingStrategy::default(), CombatLog::new(false)),
            Box::new(dice),
        )
    }

    pub(crate) fn arena() -> Arena {
        arena_with(dungeon_state(), visitor_state(), ScriptedDice::new())
    }

    fn tagged(id: CardId, member: MemberId) -> Card {
        Card::new(id, "Kit", CardType::Physical, 1, 1, CardKind::Strike).for_member(member)
    }

    #[test]
    fn knockout_benches_member_cards_and_restore_returns_them() {
        let mut arena = arena_with(dungeon_state(), party_visitor(), ScriptedDice::new());
        arena.piles.visitor = Piles::new(
            vec![tagged(1, 3), tagged(2, 1)],
            vec![tagged(3, 3)],
            vec![tagged(4, 3)],
        );

        let report = arena.damage(Side::Visitor, Resource::Vitality, 6, Some(3));
        assert_eq!(report.knocked_out, Some(3));
        assert!(arena.piles.visitor.all_cards().all(|c| c.member != Some(3)));
        let party = arena.combatant(Side::Visitor).party.clone().expect("party");
        assert_eq!(party.benched.len(), 3);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 15);
        assert!(arena.ctx.log.contains("member 3 knocked out"));

        assert_eq!(arena.revive_first(Side::Visitor, 2), Some(3));
        let party = arena.combatant(Side::Visitor).party.clone().expect("party");
        assert_eq!(party.knockout_count, 0);
        assert!(party.benched.is_empty());
        assert_eq!(arena.piles.visitor.discard.len(), 3);
    }

    #[test]
    fn played_card_of_fallen_member_goes_to_bench() {
        let mut arena = arena_with(dungeon_state(), party_visitor(), ScriptedDice::new());
        arena.damage(Side::Visitor, Resource::Vitality, 6, Some(3));
        arena.finish_card(Side::Visitor, tagged(9, 3));
        arena.finish_card(Side::Visitor, tagged(10, 1));
        assert_eq!(arena.piles.visitor.discard.len(), 1);
        let party = arena.combatant(Side::Visitor).party.clone().expect("party");
        assert_eq!(party.benched.len(), 1);
    }

    #[test]
    fn party_wipe_reports_kill() {
        let mut arena = arena_with(dungeon_state(), party_visitor(), ScriptedDice::new());
        arena.damage(Side::Visitor, Resource::Vitality, 7, Some(2));
        assert!(arena.check_win().is_none());
        arena.damage(Side::Visitor, Resource::Vitality, 6, Some(3));
        let outcome = arena.check_win().expect("party wiped");
        assert_eq!(outcome.condition, WinCondition::Kill);
    }

    #[test]
    fn depleted_reducers_map_to_conditions() {
        let cases = [
            (Side::Visitor, Resource::Resolve, WinCondition::Break),
            (Side::Visitor, Resource::Nerve, WinCondition::Panic),
            (Side::Dungeon, Resource::Structure, WinCondition::Overcome),
            (Side::Dungeon, Resource::Veil, WinCondition::Unveil),
            (Side::Dungeon, Resource::Presence, WinCondition::Dominate),
        ];
        for (side, resource, condition) in cases {
            let mut arena = arena();
            arena.damage(side, resource, 99, None);
            assert_eq!(arena.check_win().map(|o| o.condition), Some(condition));
        }
    }

    #[test]
    fn trap_fires_once() {
        let mut arena = arena();
        arena.combatant_mut(Side::Visitor).conditions.add(
            Side::Visitor,
            "snare",
            1,
            ConditionEffect::Trap {
                trigger: TrapTrigger::EmpowerPlayed,
                damage: 3,
                target: Resource::Veil,
                entangle: true,
            },
        );
        assert_eq!(arena.fire_traps(Side::Visitor, TrapTrigger::StrikePlayed), 0);
        assert_eq!(arena.fire_traps(Side::Visitor, TrapTrigger::EmpowerPlayed), 1);
        assert_eq!(arena.fire_traps(Side::Visitor, TrapTrigger::EmpowerPlayed), 0);
        assert_eq!(arena.combatant(Side::Dungeon).value(Resource::Veil), 11);
        assert!(arena
            .combatant(Side::Dungeon)
            .conditions
            .has(ConditionKind::Entangled));
    }

    #[test]
    fn binding_drains_after_fresh_round_and_erode_hits_on_expiry() {
        let mut arena = arena();
        let visitor = arena.combatant_mut(Side::Visitor);
        visitor.conditions.add(
            Side::Dungeon,
            "pact",
            2,
            ConditionEffect::Binding {
                resource: Resource::Nerve,
                amount: 1,
            },
        );
        visitor.conditions.add(
            Side::Dungeon,
            "rot",
            1,
            ConditionEffect::Erode {
                resource: Resource::Resolve,
                amount: 2,
            },
        );

        arena.end_round(0);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Nerve), 16);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 16);

        arena.end_round(0);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Nerve), 15);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 14);

        arena.end_round(0);
        arena.end_round(0);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Nerve), 14);
    }

    #[test]
    fn dependency_reverses_below_floor() {
        let mut arena = arena();
        arena.combatant_mut(Side::Visitor).conditions.add(
            Side::Dungeon,
            "lifeline",
            3,
            ConditionEffect::Dependency {
                resource: Resource::Resolve,
                amount: 3,
                trust_floor: 2,
            },
        );
        arena.end_round(0);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 16);
        arena.end_round(0);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 13);
        assert!(!arena
            .combatant(Side::Visitor)
            .conditions
            .has(ConditionKind::Dependency));
    }
}
