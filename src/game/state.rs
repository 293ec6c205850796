use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::card::CardType;
use super::conditions::ConditionStore;
use super::party::{MemberId, MoraleLoss, Party};

const PROMOTER_HALVES_PER_POINT: u8 = 2;

/// 对战双方。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Dungeon,
    Visitor,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Dungeon, Side::Visitor];

    pub fn opponent(self) -> Side {
        match self {
            Side::Dungeon => Side::Visitor,
            Side::Visitor => Side::Dungeon,
        }
    }

    pub fn reducers(self) -> [Resource; 3] {
        match self {
            Side::Dungeon => [Resource::Structure, Resource::Veil, Resource::Presence],
            Side::Visitor => [Resource::Vitality, Resource::Resolve, Resource::Nerve],
        }
    }

    pub fn promoter(self) -> Resource {
        match self {
            Side::Dungeon => Resource::Rapport,
            Side::Visitor => Resource::Trust,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Dungeon => "dungeon",
            Side::Visitor => "visitor",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 资源池标识（三个消耗池 + 一个增益池）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Structure,
    Veil,
    Presence,
    Rapport,
    Vitality,
    Resolve,
    Nerve,
    Trust,
}

impl Resource {
    pub fn owner(self) -> Side {
        match self {
            Resource::Structure | Resource::Veil | Resource::Presence | Resource::Rapport => {
                Side::Dungeon
            }
            Resource::Vitality | Resource::Resolve | Resource::Nerve | Resource::Trust => {
                Side::Visitor
            }
        }
    }

    pub fn is_promoter(self) -> bool {
        matches!(self, Resource::Rapport | Resource::Trust)
    }

    pub fn counterpart(self) -> Resource {
        match self {
            Resource::Structure => Resource::Vitality,
            Resource::Veil => Resource::Nerve,
            Resource::Presence => Resource::Resolve,
            Resource::Rapport => Resource::Trust,
            Resource::Vitality => Resource::Structure,
            Resource::Resolve => Resource::Presence,
            Resource::Nerve => Resource::Veil,
            Resource::Trust => Resource::Rapport,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Structure => "structure",
            Resource::Veil => "veil",
            Resource::Presence => "presence",
            Resource::Rapport => "rapport",
            Resource::Vitality => "vitality",
            Resource::Resolve => "resolve",
            Resource::Nerve => "nerve",
            Resource::Trust => "trust",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 双方各一份的值。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerSide<T> {
    pub dungeon: T,
    pub visitor: T,
}

impl<T> PerSide<T> {
    pub fn new(dungeon: T, visitor: T) -> Self {
        Self { dungeon, visitor }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Dungeon => &self.dungeon,
            Side::Visitor => &self.visitor,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Dungeon => &mut self.dungeon,
            Side::Visitor => &mut self.visitor,
        }
    }

    pub fn split_mut(&mut self, side: Side) -> (&mut T, &T) {
        match side {
            Side::Dungeon => (&mut self.dungeon, &self.visitor),
            Side::Visitor => (&mut self.visitor, &self.dungeon),
        }
    }
}

/// 能量池：永久能量、本回合临时加成与已消耗量。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnergyPool {
    pub base: i32,
    #[serde(default)]
    pub temp_bonus: i32,
    #[serde(default)]
    pub spent: i32,
}

impl EnergyPool {
    pub fn new(base: i32) -> Self {
        Self {
            base: base.max(0),
            temp_bonus: 0,
            spent: 0,
        }
    }

    pub fn available(&self) -> i32 {
        (self.base + self.temp_bonus - self.spent).max(0)
    }

    pub fn can_afford(&self, cost: i32) -> bool {
        self.available() >= cost.max(0)
    }

    pub fn spend(&mut self, cost: i32) -> bool {
        let cost = cost.max(0);
        if !self.can_afford(cost) {
            return false;
        }
        self.spent += cost;
        true
    }

    pub fn gain_permanent(&mut self, amount: i32) {
        self.base = (self.base + amount).max(0);
    }

    pub fn gain_temporary(&mut self, amount: i32) {
        self.temp_bonus = (self.temp_bonus + amount).max(0);
    }

    pub fn refresh(&mut self) {
        self.spent = 0;
        self.temp_bonus = 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageReport {
    pub dealt: i32,
    pub overflow: i32,
    pub member: Option<MemberId>,
    pub knocked_out: Option<MemberId>,
    pub morale: Option<MoraleLoss>,
}

/// 单方战斗状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatantState {
    pub side: Side,
    pub pools: BTreeMap<Resource, i32>,
    pub starting: BTreeMap<Resource, i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub type_modifiers: BTreeMap<CardType, i32>,
    #[serde(default)]
    pub conditions: ConditionStore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<Party>,
    #[serde(default)]
    pub energy: EnergyPool,
    #[serde(default)]
    pub promoter_halves: u8,
}

impl CombatantState {
    pub fn new(side: Side, values: &[(Resource, i32)], energy_base: i32) -> Self {
        let mut pools = BTreeMap::new();
        for resource in side.reducers() {
            pools.insert(resource, 0);
        }
        pools.insert(side.promoter(), 0);
        for (resource, value) in values {
            if resource.owner() == side {
                pools.insert(*resource, (*value).max(0));
            }
        }
        let starting = pools.clone();
        Self {
            side,
            pools,
            starting,
            type_modifiers: BTreeMap::new(),
            conditions: ConditionStore::default(),
            party: None,
            energy: EnergyPool::new(energy_base),
            promoter_halves: 0,
        }
    }

    pub fn with_party(mut self, party: Party) -> Self {
        let total = party.max_vitality_total();
        self.pools.remove(&Resource::Vitality);
        self.starting.insert(Resource::Vitality, total);
        self.party = Some(party);
        self
    }

    pub fn with_type_modifiers(mut self, modifiers: BTreeMap<CardType, i32>) -> Self {
        self.type_modifiers = modifiers;
        self
    }

    pub fn value(&self, resource: Resource) -> i32 {
        if resource == Resource::Vitality {
            if let Some(party) = &self.party {
                return party.aggregate_vitality();
            }
        }
        self.pools.get(&resource).copied().unwrap_or(0)
    }

    pub fn starting_value(&self, resource: Resource) -> i32 {
        if resource == Resource::Vitality {
            if let Some(party) = &self.party {
                return party.max_vitality_total();
            }
        }
        self.starting.get(&resource).copied().unwrap_or(0)
    }

    pub fn promoter(&self) -> i32 {
        self.value(self.side.promoter())
    }

    pub fn ratio(&self, resource: Resource) -> f64 {
        let start = self.starting_value(resource);
        if start <= 0 {
            return 1.0;
        }
        f64::from(self.value(resource)) / f64::from(start)
    }

    pub fn lowest_ratio_reducer(&self) -> Resource {
        let reducers = self.side.reducers();
        let mut lowest = reducers[0];
        let mut lowest_ratio = self.ratio(lowest);
        for resource in reducers.iter().skip(1) {
            let ratio = self.ratio(*resource);
            if ratio < lowest_ratio {
                lowest = *resource;
                lowest_ratio = ratio;
            }
        }
        lowest
    }

    pub fn pressure(&self) -> f64 {
        (1.0 - self.ratio(self.lowest_ratio_reducer())).clamp(0.0, 1.0)
    }

    pub fn type_modifier(&self, card_type: CardType) -> i32 {
        self.type_modifiers.get(&card_type).copied().unwrap_or(0)
    }

    pub fn take_damage(
        &mut self,
        resource: Resource,
        amount: i32,
        member: Option<MemberId>,
    ) -> DamageReport {
        let amount = amount.max(0);
        if amount == 0 || resource.owner() != self.side {
            return DamageReport::default();
        }

        if resource == Resource::Vitality && self.party.is_some() {
            return self.damage_party_member(amount, member);
        }

        let current = self.value(resource);
        let dealt = amount.min(current);
        self.pools.insert(resource, current - dealt);
        DamageReport {
            dealt,
            overflow: amount - dealt,
            ..DamageReport::default()
        }
    }

    fn damage_party_member(&mut self, amount: i32, member: Option<MemberId>) -> DamageReport {
        let Some(party) = self.party.as_mut() else {
            return DamageReport::default();
        };
        let Some(target) = member
            .filter(|id| party.is_active(*id))
            .or_else(|| party.first_active())
        else {
            return DamageReport {
                overflow: amount,
                ..DamageReport::default()
            };
        };

        let hit = party.damage_member(target, amount);
        let mut report = DamageReport {
            dealt: hit.dealt,
            overflow: hit.overflow,
            member: Some(target),
            ..DamageReport::default()
        };
        if hit.knocked_out {
            let loss = party.morale_loss_for(party.knockout_count.saturating_sub(1));
            report.knocked_out = Some(target);
            report.morale = Some(loss);
            self.drain_pool(Resource::Resolve, loss.resolve);
            self.drain_pool(Resource::Nerve, loss.nerve);
        }
        report
    }

    fn drain_pool(&mut self, resource: Resource, amount: i32) {
        if let Some(value) = self.pools.get_mut(&resource) {
            *value = (*value - amount.max(0)).max(0);
        }
    }

    /// 恢复资源，返回实际增加量。
    pub fn apply_benefit(&mut self, resource: Resource, amount: i32) -> i32 {
        let amount = amount.max(0);
        if amount == 0 || resource.owner() != self.side {
            return 0;
        }

        if resource == Resource::Vitality {
            if let Some(party) = self.party.as_mut() {
                return party.heal_lowest(amount);
            }
        }

        let current = self.value(resource);
        let next = if resource.is_promoter() {
            current.saturating_add(amount)
        } else {
            (current + amount).min(self.starting_value(resource)).max(current)
        };
        self.pools.insert(resource, next);
        next - current
    }

    pub fn set_promoter(&mut self, value: i32) {
        self.pools.insert(self.side.promoter(), value.max(0));
    }

    pub fn accrue_promoter_half(&mut self) -> bool {
        self.promoter_halves += 1;
        if self.promoter_halves >= PROMOTER_HALVES_PER_POINT {
            self.promoter_halves -= PROMOTER_HALVES_PER_POINT;
            return true;
        }
        false
    }

    pub fn snapshot_values(&self) -> BTreeMap<Resource, i32> {
        let mut values = BTreeMap::new();
        for resource in self.side.reducers() {
            values.insert(resource, self.value(resource));
        }
        values.insert(self.side.promoter(), self.promoter());
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::party::PartyMember;

    fn dungeon() -> CombatantState {
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

    #[test]
    fn damage_never_drives_pool_negative() {
        let mut state = dungeon();
        let report = state.take_damage(Resource::Presence, 20, None);
        assert_eq!(report.dealt, 12);
        assert_eq!(report.overflow, 8);
        assert_eq!(state.value(Resource::Presence), 0);
    }

    #[test]
    fn benefit_caps_reducers_but_not_promoters() {
        let mut state = dungeon();
        state.take_damage(Resource::Veil, 3, None);
        assert_eq!(state.apply_benefit(Resource::Veil, 10), 3);
        assert_eq!(state.value(Resource::Veil), 14);

        assert_eq!(state.apply_benefit(Resource::Rapport, 40), 40);
        assert_eq!(state.value(Resource::Rapport), 40);
    }

    #[test]
    fn foreign_resources_are_ignored() {
        let mut state = dungeon();
        assert_eq!(state.take_damage(Resource::Vitality, 5, None), DamageReport::default());
        assert_eq!(state.apply_benefit(Resource::Trust, 5), 0);
    }

    #[test]
    fn lowest_ratio_prefers_declaration_order_on_ties() {
        let mut state = dungeon();
        assert_eq!(state.lowest_ratio_reducer(), Resource::Structure);
        state.take_damage(Resource::Presence, 6, None);
        assert_eq!(state.lowest_ratio_reducer(), Resource::Presence);
    }

    #[test]
    fn party_vitality_is_derived() {
        let party = Party::new(
            vec![
                PartyMember::new(1, "Bram", "fighter", 10),
                PartyMember::new(2, "Ysolde", "scout", 6),
            ],
            2,
        );
        let mut state = CombatantState::new(
            Side::Visitor,
            &[(Resource::Resolve, 16), (Resource::Nerve, 16)],
            3,
        )
        .with_party(party);

        assert_eq!(state.value(Resource::Vitality), 16);
        let report = state.take_damage(Resource::Vitality, 4, Some(2));
        assert_eq!(report.member, Some(2));
        assert_eq!(state.value(Resource::Vitality), 12);
    }

    #[test]
    fn energy_pool_refresh_clears_spent_and_temp() {
        let mut pool = EnergyPool::new(3);
        pool.gain_temporary(2);
        assert_eq!(pool.available(), 5);
        assert!(pool.spend(4));
        assert!(!pool.spend(2));
        pool.refresh();
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn promoter_halves_convert_at_one_point() {
        let mut state = dungeon();
        assert!(!state.accrue_promoter_half());
        assert!(state.accrue_promoter_half());
        assert_eq!(state.promoter_halves, 0);
    }
}
