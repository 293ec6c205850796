//! 关键词结算。

use super::arena::Arena;
use super::card::Keyword;
use super::conditions::{ConditionEffect, ConditionKind};
use super::dice::Tier;
use super::state::{Resource, Side};

pub const DRAIN_CAP: i32 = 2;
pub const RESONATE_BONUS: i32 = 1;
pub const RALLY_AMOUNT: i32 = 1;
pub const ERODE_AMOUNT: i32 = 1;
pub const MARKER_DURATION: u32 = 1;

pub fn drain_amount(dealt: i32) -> i32 {
    (dealt.max(0) / 2).min(DRAIN_CAP)
}

pub fn resonate_bonus(keywords: &[Keyword], matches_last_type: bool) -> i32 {
    if matches_last_type && keywords.contains(&Keyword::Resonate) {
        RESONATE_BONUS
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrikeAftermath<'a> {
    pub attacker: Side,
    pub keywords: &'a [Keyword],
    pub target: Resource,
    pub tier: Tier,
    pub dealt: i32,
    pub overflow: i32,
    pub source: &'a str,
}

impl Arena {
    pub fn place_entangle(&mut self, placed_by: Side, bearer: Side, source: &str) -> bool {
        let conditions = &mut self.combatants.get_mut(bearer).conditions;
        if conditions.has(ConditionKind::Ward) || conditions.has(ConditionKind::Entangled) {
            return false;
        }
        conditions.add(placed_by, source, MARKER_DURATION, ConditionEffect::Entangled);
        self.log(format!("{bearer} is entangled by '{source}'"));
        true
    }

    pub fn place_erode(
        &mut self,
        placed_by: Side,
        bearer: Side,
        resource: Resource,
        amount: i32,
        source: &str,
    ) -> bool {
        if self.ctx.auto_damage.contains(&resource) {
            self.log(format!("erode on {resource} suppressed"));
            return false;
        }
        let conditions = &mut self.combatants.get_mut(bearer).conditions;
        if conditions.has(ConditionKind::Ward) {
            return false;
        }
        conditions.add(
            placed_by,
            source,
            MARKER_DURATION,
            ConditionEffect::Erode { resource, amount },
        );
        true
    }

    pub fn apply_strike_keywords(&mut self, after: StrikeAftermath<'_>) {
        let attacker = after.attacker;
        let defender = attacker.opponent();
        let has = |keyword: Keyword| after.keywords.contains(&keyword);

        if has(Keyword::Drain) && after.dealt > 0 {
            let heal = drain_amount(after.dealt);
            let lowest = self.combatant(attacker).lowest_ratio_reducer();
            self.benefit(attacker, lowest, heal);
        }

        let primary_empty = self.combatant(defender).value(after.target) == 0;
        if has(Keyword::Overwhelm) && after.overflow > 0 && primary_empty {
            let next = defender
                .reducers()
                .into_iter()
                .find(|r| *r != after.target && self.combatant(defender).value(*r) > 0);
            if let Some(spill) = next {
                self.log(format!("overwhelm spills {} into {spill}", after.overflow));
                self.damage(defender, spill, after.overflow, None);
            }
        }

        if has(Keyword::Rally) && after.tier.is_damaging_hit() {
            let lowest = self.combatant(attacker).lowest_ratio_reducer();
            self.benefit(attacker, lowest, RALLY_AMOUNT);
        }

        if has(Keyword::Entangle) && after.dealt > 0 {
            self.place_entangle(attacker, defender, after.source);
        }

        if has(Keyword::Erode) && after.dealt > 0 {
            self.place_erode(attacker, defender, after.target, ERODE_AMOUNT, after.source);
        }

        if has(Keyword::Ward) {
            let conditions = &mut self.combatants.get_mut(attacker).conditions;
            if !conditions.has(ConditionKind::Ward) {
                conditions.add(attacker, after.source, MARKER_DURATION, ConditionEffect::Ward);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::tests::{arena, arena_with, dungeon_state, party_visitor};
    use crate::game::dice::ScriptedDice;

    fn aftermath<'a>(keywords: &'a [Keyword], dealt: i32, overflow: i32) -> StrikeAftermath<'a> {
        StrikeAftermath {
            attacker: Side::Dungeon,
            keywords,
            target: Resource::Nerve,
            tier: Tier::Strong,
            dealt,
            overflow,
            source: "test",
        }
    }

    #[test]
    fn drain_is_capped() {
        assert_eq!(drain_amount(1), 0);
        assert_eq!(drain_amount(3), 1);
        assert_eq!(drain_amount(9), 2);
    }

    #[test]
    fn resonate_needs_matching_type() {
        assert_eq!(resonate_bonus(&[Keyword::Resonate], true), 1);
        assert_eq!(resonate_bonus(&[Keyword::Resonate], false), 0);
        assert_eq!(resonate_bonus(&[], true), 0);
    }

    #[test]
    fn entangle_is_idempotent_and_ward_blocks() {
        let mut arena = arena();
        assert!(arena.place_entangle(Side::Dungeon, Side::Visitor, "vines"));
        assert!(!arena.place_entangle(Side::Dungeon, Side::Visitor, "vines"));
        assert_eq!(
            arena
                .combatant(Side::Visitor)
                .conditions
                .count(ConditionKind::Entangled),
            1
        );

        arena
            .combatant_mut(Side::Dungeon)
            .conditions
            .add(Side::Dungeon, "aegis", 1, ConditionEffect::Ward);
        assert!(!arena.place_entangle(Side::Visitor, Side::Dungeon, "snare"));
        assert!(!arena.place_erode(Side::Visitor, Side::Dungeon, Resource::Veil, 1, "rust"));
    }

    #[test]
    fn erode_suppressed_on_auto_damage_resource() {
        let mut arena = arena();
        arena.ctx.auto_damage.push(Resource::Nerve);
        assert!(!arena.place_erode(Side::Dungeon, Side::Visitor, Resource::Nerve, 1, "dread"));
        assert!(arena.place_erode(Side::Dungeon, Side::Visitor, Resource::Resolve, 1, "doubt"));
    }

    #[test]
    fn drain_and_rally_heal_attacker_lowest_reducer() {
        let mut arena = arena();
        arena.damage(Side::Dungeon, Resource::Veil, 6, None);
        arena.apply_strike_keywords(aftermath(&[Keyword::Drain, Keyword::Rally], 5, 0));
        assert_eq!(arena.combatant(Side::Dungeon).value(Resource::Veil), 11);
    }

    #[test]
    fn overwhelm_spills_to_next_live_reducer() {
        let mut arena = arena();
        arena.damage(Side::Visitor, Resource::Nerve, 16, None);
        arena.apply_strike_keywords(aftermath(&[Keyword::Overwhelm], 2, 3));
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Vitality), 17);
        assert_eq!(arena.combatant(Side::Visitor).value(Resource::Resolve), 16);
    }

    #[test]
    fn overwhelm_holds_while_party_vitality_remains() {
        let mut arena = arena_with(dungeon_state(), party_visitor(), ScriptedDice::new());
        let report = arena.damage(Side::Visitor, Resource::Vitality, 8, Some(3));
        assert_eq!(report.overflow, 2);
        arena.apply_strike_keywords(StrikeAftermath {
            target: Resource::Vitality,
            ..aftermath(&[Keyword::Overwhelm], report.dealt, report.overflow)
        });
        let visitor = arena.combatant(Side::Visitor);
        assert_eq!(visitor.value(Resource::Vitality), 17);
        // Only the knockout's morale loss touches resolve.
        assert_eq!(visitor.value(Resource::Resolve), 15);
    }
}
