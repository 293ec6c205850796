//! 队伍子系统：成员生命、击倒、士气连锁与成员卡牌生命周期。

use serde::{Deserialize, Serialize};

use super::card::{Card, CardId, Piles};
use super::dice::RandomSource;

pub type MemberId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    KnockedOut,
}

impl Default for MemberStatus {
    fn default() -> Self {
        MemberStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyMember {
    pub id: MemberId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub vitality: i32,
    #[serde(default)]
    pub max_vitality: i32,
    #[serde(default)]
    pub status: MemberStatus,
}

impl PartyMember {
    pub fn new(id: MemberId, name: impl Into<String>, role: impl Into<String>, vitality: i32) -> Self {
        Self {
            id,
            name: name.into(),
            role: role.into(),
            vitality: vitality.max(0),
            max_vitality: vitality.max(0),
            status: MemberStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoraleLoss {
    #[serde(default)]
    pub resolve: i32,
    #[serde(default)]
    pub nerve: i32,
}

impl MoraleLoss {
    pub const fn new(resolve: i32, nerve: i32) -> Self {
        Self { resolve, nerve }
    }
}

pub fn default_morale_cascade() -> Vec<MoraleLoss> {
    vec![MoraleLoss::new(1, 1), MoraleLoss::new(2, 2), MoraleLoss::new(3, 3)]
}

/// 成员受伤目标选择方式。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetingStrategy {
    LowestVitality,
    HighestVitality,
    Frontline,
    Random,
    Focus { member: MemberId },
}

impl Default for TargetingStrategy {
    fn default() -> Self {
        TargetingStrategy::LowestVitality
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberHit {
    pub dealt: i32,
    pub overflow: i32,
    pub knocked_out: bool,
}

/// 多人队伍。队伍总生命值始终由在场成员实时求和。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Party {
    pub members: Vec<PartyMember>,
    #[serde(default)]
    pub knockout_count: u32,
    pub kill_threshold: u32,
    #[serde(default = "default_morale_cascade")]
    pub morale_cascade: Vec<MoraleLoss>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub benched: Vec<Card>,
}

impl Party {
    pub fn new(members: Vec<PartyMember>, kill_threshold: u32) -> Self {
        let threshold = kill_threshold.clamp(1, members.len().max(1) as u32);
        Self {
            members,
            knockout_count: 0,
            kill_threshold: threshold,
            morale_cascade: default_morale_cascade(),
            benched: Vec::new(),
        }
    }

    pub fn with_morale_cascade(mut self, cascade: Vec<MoraleLoss>) -> Self {
        self.morale_cascade = cascade;
        self
    }

    pub fn aggregate_vitality(&self) -> i32 {
        self.members
            .iter()
            .filter(|member| member.is_active())
            .map(|member| member.vitality)
            .sum()
    }

    pub fn max_vitality_total(&self) -> i32 {
        self.members.iter().map(|member| member.max_vitality).sum()
    }

    pub fn member(&self, id: MemberId) -> Option<&PartyMember> {
        self.members.iter().find(|member| member.id == id)
    }

    fn member_mut(&mut self, id: MemberId) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|member| member.id == id)
    }

    pub fn is_active(&self, id: MemberId) -> bool {
        self.member(id).map(PartyMember::is_active).unwrap_or(false)
    }

    pub fn first_active(&self) -> Option<MemberId> {
        self.members
            .iter()
            .find(|member| member.is_active())
            .map(|member| member.id)
    }

    pub fn first_knocked_out(&self) -> Option<MemberId> {
        self.members
            .iter()
            .find(|member| !member.is_active())
            .map(|member| member.id)
    }

    pub fn is_wiped(&self) -> bool {
        self.knockout_count >= self.kill_threshold
    }

    pub fn choose_target(
        &self,
        strategy: TargetingStrategy,
        rng: &mut dyn RandomSource,
    ) -> Option<MemberId> {
        let active: Vec<&PartyMember> = self.members.iter().filter(|m| m.is_active()).collect();
        if active.is_empty() {
            return None;
        }
        // Ties keep roster order: min_by_key/max_by_key would pick the last max.
        let chosen = match strategy {
            TargetingStrategy::Frontline => active[0],
            TargetingStrategy::LowestVitality => active
                .iter()
                .copied()
                .fold(active[0], |best, m| if m.vitality < best.vitality { m } else { best }),
            TargetingStrategy::HighestVitality => active
                .iter()
                .copied()
                .fold(active[0], |best, m| if m.vitality > best.vitality { m } else { best }),
            TargetingStrategy::Random => active[rng.index(active.len())],
            TargetingStrategy::Focus { member } => active
                .iter()
                .copied()
                .find(|m| m.id == member)
                .unwrap_or(active[0]),
        };
        Some(chosen.id)
    }

    pub fn damage_member(&mut self, id: MemberId, amount: i32) -> MemberHit {
        let Some(member) = self.member_mut(id) else {
            return MemberHit {
                overflow: amount.max(0),
                ..MemberHit::default()
            };
        };
        if !member.is_active() {
            return MemberHit {
                overflow: amount.max(0),
                ..MemberHit::default()
            };
        }

        let dealt = amount.max(0).min(member.vitality);
        member.vitality -= dealt;
        let knocked_out = member.vitality == 0;
        if knocked_out {
            member.status = MemberStatus::KnockedOut;
            self.knockout_count += 1;
        }
        MemberHit {
            dealt,
            overflow: amount.max(0) - dealt,
            knocked_out,
        }
    }

    pub fn morale_loss_for(&self, index: u32) -> MoraleLoss {
        self.morale_cascade
            .get(index as usize)
            .or_else(|| self.morale_cascade.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn heal_lowest(&mut self, amount: i32) -> i32 {
        let target = self
            .members
            .iter()
            .filter(|m| m.is_active() && m.vitality < m.max_vitality)
            .fold(None::<&PartyMember>, |best, m| match best {
                Some(b) if i64::from(b.vitality) * i64::from(m.max_vitality)
                    <= i64::from(m.vitality) * i64::from(b.max_vitality) =>
                {
                    Some(b)
                }
                _ => Some(m),
            })
            .map(|m| m.id);

        let Some(id) = target else {
            return 0;
        };
        let Some(member) = self.member_mut(id) else {
            return 0;
        };
        let gained = amount.max(0).min(member.max_vitality - member.vitality);
        member.vitality += gained;
        gained
    }

    pub fn restore(&mut self, id: MemberId, vitality: i32) -> bool {
        let Some(member) = self.member_mut(id) else {
            return false;
        };
        if member.is_active() {
            return false;
        }
        member.status = MemberStatus::Active;
        member.vitality = vitality.clamp(1, member.max_vitality.max(1));
        self.knockout_count = self.knockout_count.saturating_sub(1);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalManifest {
    pub member: MemberId,
    pub from_hand: Vec<CardId>,
    pub from_draw: Vec<CardId>,
    pub from_discard: Vec<CardId>,
    pub cards: Vec<Card>,
}

impl RemovalManifest {
    pub fn total(&self) -> usize {
        self.cards.len()
    }
}

fn split_member_cards(pile: Vec<Card>, member: MemberId) -> (Vec<Card>, Vec<Card>) {
    pile.into_iter()
        .partition(|card| card.member != Some(member))
}

/// 移除倒下成员的卡牌。
pub fn purge_member_cards(piles: Piles, member: MemberId) -> (Piles, RemovalManifest) {
    let (hand, hand_removed) = split_member_cards(piles.hand, member);
    let (draw, draw_removed) = split_member_cards(piles.draw, member);
    let (discard, discard_removed) = split_member_cards(piles.discard, member);

    let mut manifest = RemovalManifest {
        member,
        from_hand: hand_removed.iter().map(|card| card.id).collect(),
        from_draw: draw_removed.iter().map(|card| card.id).collect(),
        from_discard: discard_removed.iter().map(|card| card.id).collect(),
        cards: Vec::new(),
    };
    manifest.cards.extend(hand_removed);
    manifest.cards.extend(draw_removed);
    manifest.cards.extend(discard_removed);

    (Piles::new(hand, draw, discard), manifest)
}

pub fn return_member_cards(
    benched: Vec<Card>,
    discard: Vec<Card>,
    member: MemberId,
) -> (Vec<Card>, Vec<Card>, Vec<CardId>) {
    let (returning, remaining): (Vec<Card>, Vec<Card>) = benched
        .into_iter()
        .partition(|card| card.member == Some(member));
    let returned_ids = returning.iter().map(|card| card.id).collect();
    let mut discard = discard;
    discard.extend(returning);
    (remaining, discard, returned_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::{Card, CardKind, CardType};
    use crate::game::dice::ScriptedDice;

    fn party() -> Party {
        Party::new(
            vec![
                PartyMember::new(1, "Bram", "fighter", 10),
                PartyMember::new(2, "Ysolde", "scout", 7),
                PartyMember::new(3, "Ilse", "mystic", 6),
            ],
            2,
        )
    }

    fn tagged(id: CardId, member: MemberId) -> Card {
        Card::new(id, "Tagged", CardType::Physical, 1, 2, CardKind::Strike).for_member(member)
    }

    #[test]
    fn knockout_increments_count_once() {
        let mut party = party();
        let hit = party.damage_member(3, 6);
        assert!(hit.knocked_out);
        assert_eq!(party.knockout_count, 1);

        let again = party.damage_member(3, 4);
        assert!(!again.knocked_out);
        assert_eq!(again.overflow, 4);
        assert_eq!(party.knockout_count, 1);
        assert_eq!(party.aggregate_vitality(), 17);
    }

    #[test]
    fn wipe_uses_kill_threshold() {
        let mut party = party();
        party.damage_member(2, 7);
        assert!(!party.is_wiped());
        party.damage_member(3, 6);
        assert!(party.is_wiped());
    }

    #[test]
    fn targeting_strategies() {
        let mut rng = ScriptedDice::new().with_indices(vec![2]);
        let party = party();
        assert_eq!(party.choose_target(TargetingStrategy::LowestVitality, &mut rng), Some(3));
        assert_eq!(party.choose_target(TargetingStrategy::HighestVitality, &mut rng), Some(1));
        assert_eq!(party.choose_target(TargetingStrategy::Frontline, &mut rng), Some(1));
        assert_eq!(
            party.choose_target(TargetingStrategy::Focus { member: 2 }, &mut rng),
            Some(2)
        );
        assert_eq!(party.choose_target(TargetingStrategy::Random, &mut rng), Some(3));
    }

    #[test]
    fn morale_cascade_repeats_last_entry() {
        let party = party().with_morale_cascade(vec![MoraleLoss::new(2, 1)]);
        assert_eq!(party.morale_loss_for(0), MoraleLoss::new(2, 1));
        assert_eq!(party.morale_loss_for(4), MoraleLoss::new(2, 1));
    }

    #[test]
    fn purge_strips_member_cards_from_every_pile() {
        let piles = Piles::new(
            vec![tagged(1, 2), tagged(2, 1)],
            vec![tagged(3, 2)],
            vec![tagged(4, 2), tagged(5, 3)],
        );
        let (piles, manifest) = purge_member_cards(piles, 2);
        assert_eq!(manifest.from_hand, vec![1]);
        assert_eq!(manifest.from_draw, vec![3]);
        assert_eq!(manifest.from_discard, vec![4]);
        assert_eq!(manifest.total(), 3);
        assert!(piles.all_cards().all(|card| card.member != Some(2)));
        assert_eq!(piles.hand.len(), 1);
    }

    #[test]
    fn restore_reverses_knockout_and_returns_cards() {
        let mut party = party();
        party.damage_member(2, 7);
        assert!(party.restore(2, 3));
        assert_eq!(party.knockout_count, 0);
        assert_eq!(party.member(2).map(|m| m.vitality), Some(3));
        assert!(!party.restore(2, 3));

        let (benched, discard, ids) =
            return_member_cards(vec![tagged(7, 2), tagged(8, 3)], Vec::new(), 2);
        assert_eq!(ids, vec![7]);
        assert_eq!(benched.len(), 1);
        assert_eq!(discard.len(), 1);
    }

    #[test]
    fn heal_targets_lowest_ratio_member() {
        let mut party = party();
        party.damage_member(1, 5);
        party.damage_member(3, 1);
        assert_eq!(party.heal_lowest(10), 5);
        assert_eq!(party.member(1).map(|m| m.vitality), Some(10));
    }
}
