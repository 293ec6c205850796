//! 信任经济：信任档位、交易接受判定、背叛与盟约。

use serde::{Deserialize, Serialize};

use super::arena::Arena;
use super::card::{Card, OfferCost, OfferSpec, OfferSubtype, ResourceDelta, TestSpec, TrapTrigger};
use super::conditions::{
    ConditionEffect, ConditionKind, BETRAYED_POWER_BONUS, GRUDGE_DURATION, SCORNED_DEFENSE_BONUS,
};
use super::dice::{roll, RollMode};
use super::state::{Resource, Side};

pub const VEILED_THRESHOLD: i32 = 3;
pub const ENTRUSTED_THRESHOLD: i32 = 6;
pub const COVENANT_THRESHOLD: i32 = 9;
pub const BETRAYAL_THRESHOLD: i32 = 4;
pub const VEILED_BENEFIT_SOFTENER: f64 = 3.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Transparent,
    Veiled,
    Entrusted,
    CovenantEligible,
}

impl TrustTier {
    pub fn from_promoter(value: i32) -> Self {
        if value >= COVENANT_THRESHOLD {
            TrustTier::CovenantEligible
        } else if value >= ENTRUSTED_THRESHOLD {
            TrustTier::Entrusted
        } else if value >= VEILED_THRESHOLD {
            TrustTier::Veiled
        } else {
            TrustTier::Transparent
        }
    }

    pub fn index(self) -> i32 {
        match self {
            TrustTier::Transparent => 0,
            TrustTier::Veiled => 1,
            TrustTier::Entrusted => 2,
            TrustTier::CovenantEligible => 3,
        }
    }
}

/// 交易接受方式。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acceptance {
    Always,
    Never,
    Chance(f64),
}

impl Acceptance {
    fn decide(self, chance: impl FnOnce() -> f64) -> bool {
        match self {
            Acceptance::Always => true,
            Acceptance::Never => false,
            Acceptance::Chance(p) => chance() < p,
        }
    }
}

pub fn covenant_probability(promoter: i32, pressure: f64, offerer_has_struck: bool) -> f64 {
    let trust_factor = (f64::from(promoter.max(0)) / f64::from(COVENANT_THRESHOLD)).min(1.0);
    let desperation = 0.5 + 0.5 * pressure.clamp(0.0, 1.0);
    let suspicion = if offerer_has_struck { 0.5 } else { 1.0 };
    trust_factor * desperation * suspicion
}

pub fn transparent_threshold(pressure: f64) -> i32 {
    1 - (pressure.clamp(0.0, 1.0) * 3.0).floor() as i32
}

pub fn veiled_probability(benefit: i32) -> f64 {
    if benefit <= 0 {
        return 0.0;
    }
    let benefit = f64::from(benefit);
    benefit / (benefit + VEILED_BENEFIT_SOFTENER)
}

pub fn test_acceptance_probability(tier: TrustTier) -> f64 {
    0.5 + 0.1 * f64::from(tier.index())
}

pub fn offer_acceptance(
    spec: &OfferSpec,
    tier: TrustTier,
    promoter: i32,
    pressure: f64,
    offerer_has_struck: bool,
) -> Acceptance {
    if spec.subtype == OfferSubtype::Covenant {
        return Acceptance::Chance(covenant_probability(promoter, pressure, offerer_has_struck));
    }
    match tier {
        TrustTier::Transparent => {
            let net = spec.benefit_total() - spec.cost.weight();
            if net >= transparent_threshold(pressure) {
                Acceptance::Always
            } else {
                Acceptance::Never
            }
        }
        TrustTier::Veiled => Acceptance::Chance(veiled_probability(spec.benefit_total())),
        TrustTier::Entrusted | TrustTier::CovenantEligible => Acceptance::Always,
    }
}

pub fn strike_decay(trust: i32) -> i32 {
    if trust >= ENTRUSTED_THRESHOLD {
        2
    } else {
        1
    }
}

impl Arena {
    /// 增加信任，受每回合上限约束。
    pub fn gain_promoter(&mut self, side: Side, amount: i32) -> i32 {
        let allowed = amount.max(0).min(self.ctx.promoter_headroom(side));
        if allowed == 0 {
            return 0;
        }
        let promoter = side.promoter();
        let gained = self.combatants.get_mut(side).apply_benefit(promoter, allowed);
        *self.ctx.promoter_gained.get_mut(side) += gained;
        if gained > 0 {
            self.log(format!("{side} {promoter} +{gained}"));
        }
        gained
    }

    fn accrue_refusal(&mut self, acceptor: Side) {
        if self.combatants.get_mut(acceptor).accrue_promoter_half() {
            self.gain_promoter(acceptor, 1);
        }
    }

    fn apply_benefits(&mut self, side: Side, deltas: &[ResourceDelta]) {
        for delta in deltas {
            if delta.resource.owner() == side {
                self.benefit(side, delta.resource, delta.amount);
            }
        }
    }

    fn apply_penalties(&mut self, side: Side, deltas: &[ResourceDelta]) {
        for delta in deltas {
            if delta.resource.owner() != side {
                continue;
            }
            let member = if delta.resource == Resource::Vitality {
                let strategy = self.ctx.targeting;
                self.route_member(side, strategy)
            } else {
                None
            };
            self.damage(side, delta.resource, delta.amount, member);
        }
    }

    pub fn resolve_offer(&mut self, offerer: Side, card: &Card, spec: &OfferSpec) {
        let acceptor = offerer.opponent();
        *self.ctx.stats.offers_made.get_mut(offerer) += 1;

        if self
            .combatant(acceptor)
            .conditions
            .has(ConditionKind::Betrayed)
        {
            *self.ctx.stats.offers_refused.get_mut(offerer) += 1;
            self.log(format!("{acceptor} refuses '{}' (betrayed)", card.name));
            return;
        }

        let state = self.combatant(acceptor);
        let promoter = state.promoter();
        let pressure = state.pressure();
        let struck = *self.ctx.stats.strikes.get(offerer) > 0;
        let rule = offer_acceptance(
            spec,
            TrustTier::from_promoter(promoter),
            promoter,
            pressure,
            struck,
        );
        let rng = &mut self.rng;
        let accepted = rule.decide(|| rng.chance());

        if !accepted {
            *self.ctx.stats.offers_refused.get_mut(offerer) += 1;
            self.log(format!("{acceptor} refuses '{}'", card.name));
            if spec.subtype == OfferSubtype::Covenant {
                let halved = self.combatant(acceptor).promoter() / 2;
                self.combatant_mut(acceptor).set_promoter(halved);
                self.log(format!("{acceptor} {} halved to {halved}", acceptor.promoter()));
            }
            self.accrue_refusal(acceptor);
            return;
        }

        *self.ctx.stats.offers_accepted.get_mut(offerer) += 1;
        self.log(format!("{acceptor} accepts '{}'", card.name));
        self.apply_benefits(acceptor, &spec.benefit);
        self.apply_offer_cost(offerer, acceptor, &card.name, &spec.cost);
        if spec.investment.trust > 0 {
            self.gain_promoter(acceptor, spec.investment.trust);
        }
        self.fire_traps(offerer, TrapTrigger::OfferAccepted);

        if spec.subtype == OfferSubtype::Covenant {
            self.ctx.bond_formed = true;
            self.log("covenant sealed");
        }
    }

    fn apply_offer_cost(&mut self, offerer: Side, acceptor: Side, source: &str, cost: &OfferCost) {
        let placed = match *cost {
            OfferCost::None => None,
            OfferCost::Damage { resource, amount } => {
                self.apply_penalties(acceptor, &[ResourceDelta::new(resource, amount)]);
                None
            }
            OfferCost::Extraction { amount } => {
                *self.ctx.stats.extracted.get_mut(offerer) += amount.max(0);
                None
            }
            OfferCost::Binding {
                resource,
                amount,
                duration,
            } if resource.owner() == acceptor => {
                Some((duration, ConditionEffect::Binding { resource, amount }))
            }
            OfferCost::Exposure { bonus, duration } => {
                Some((duration, ConditionEffect::Exposure { bonus }))
            }
            OfferCost::Dependency {
                resource,
                amount,
                trust_floor,
                duration,
            } if resource.owner() == acceptor => Some((
                duration,
                ConditionEffect::Dependency {
                    resource,
                    amount,
                    trust_floor,
                },
            )),
            OfferCost::Binding { .. } | OfferCost::Dependency { .. } => None,
        };
        if let Some((duration, effect)) = placed {
            self.combatants
                .get_mut(acceptor)
                .conditions
                .add(offerer, source, duration, effect);
        }
    }

    pub fn resolve_test(&mut self, offerer: Side, card: &Card, spec: &TestSpec) {
        let acceptor = offerer.opponent();
        let tier = TrustTier::from_promoter(self.combatant(acceptor).promoter());
        let p = test_acceptance_probability(tier);
        if self.rng.chance() >= p {
            self.log(format!("{acceptor} declines test '{}'", card.name));
            return;
        }

        let result = roll(self.rng.as_mut(), RollMode::Normal, tier.index());
        if result.total >= spec.difficulty {
            *self.ctx.stats.tests_passed.get_mut(acceptor) += 1;
            self.log(format!(
                "{acceptor} passes test '{}' ({} vs {})",
                card.name, result.total, spec.difficulty
            ));
            self.apply_benefits(acceptor, &spec.reward);
            if spec.promoter_gain > 0 {
                self.gain_promoter(acceptor, spec.promoter_gain);
            }
        } else {
            *self.ctx.stats.tests_failed.get_mut(acceptor) += 1;
            self.log(format!(
                "{acceptor} fails test '{}' ({} vs {})",
                card.name, result.total, spec.difficulty
            ));
            self.apply_penalties(acceptor, &spec.penalty);
        }
    }

    pub fn decay_trust_on_strike(&mut self) {
        let visitor = self.combatant_mut(Side::Visitor);
        let trust = visitor.promoter();
        if trust <= 0 {
            return;
        }
        let next = (trust - strike_decay(trust)).max(0);
        visitor.set_promoter(next);
        self.log(format!("visitor trust decays to {next}"));
    }

    pub fn check_betrayal(&mut self, striker: Side) {
        let trust = self.combatant(Side::Visitor).promoter();
        if trust < BETRAYAL_THRESHOLD {
            return;
        }
        self.ctx.stats.betrayals += 1;
        self.combatant_mut(Side::Visitor).set_promoter(0);

        match striker {
            Side::Dungeon => {
                let target = self.combatant(Side::Visitor).lowest_ratio_reducer();
                let member = if target == Resource::Vitality {
                    let strategy = self.ctx.targeting;
                    self.route_member(Side::Visitor, strategy)
                } else {
                    None
                };
                self.log(format!("betrayal: {trust} trust turns on the visitor"));
                self.damage(Side::Visitor, target, trust, member);
                self.combatant_mut(Side::Visitor).conditions.add(
                    Side::Dungeon,
                    "betrayal",
                    GRUDGE_DURATION,
                    ConditionEffect::Betrayed {
                        power_bonus: BETRAYED_POWER_BONUS,
                    },
                );
            }
            Side::Visitor => {
                self.log(format!("visitor breaks faith with {trust} trust banked"));
                self.combatant_mut(Side::Dungeon).conditions.add(
                    Side::Visitor,
                    "broken faith",
                    GRUDGE_DURATION,
                    ConditionEffect::Scorned {
                        defense_bonus: SCORNED_DEFENSE_BONUS,
                    },
                );
            }
        }
    }
}
