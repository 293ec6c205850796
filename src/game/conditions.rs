//! 状态效果存储：按类型索引，保留插入顺序。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::card::{CardType, EmpowerEffect, Hindrance, TrapTrigger};
use super::party::MemberId;
use super::state::{Resource, Side};

pub const BETRAYED_POWER_BONUS: i32 = 2;
pub const SCORNED_DEFENSE_BONUS: i32 = 1;
pub const GRUDGE_DURATION: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Empower,
    Disrupt,
    Fortify,
    Guard,
    Attune,
    Erode,
    Trap,
    Entangled,
    Ward,
    Betrayed,
    Scorned,
    Binding,
    Dependency,
    Exposure,
}

impl ConditionKind {
    pub fn decays(self) -> bool {
        !matches!(
            self,
            ConditionKind::Empower | ConditionKind::Disrupt | ConditionKind::Trap
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Empower => "empower",
            ConditionKind::Disrupt => "disrupt",
            ConditionKind::Fortify => "fortify",
            ConditionKind::Guard => "guard",
            ConditionKind::Attune => "attune",
            ConditionKind::Erode => "erode",
            ConditionKind::Trap => "trap",
            ConditionKind::Entangled => "entangled",
            ConditionKind::Ward => "ward",
            ConditionKind::Betrayed => "betrayed",
            ConditionKind::Scorned => "scorned",
            ConditionKind::Binding => "binding",
            ConditionKind::Dependency => "dependency",
            ConditionKind::Exposure => "exposure",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionEffect {
    Empower(EmpowerEffect),
    Disrupt(Hindrance),
    Fortify {
        reduction: i32,
    },
    Guard {
        #[serde(default)]
        member: Option<MemberId>,
        reduction: i32,
    },
    Attune {
        #[serde(default)]
        card_type: Option<CardType>,
        discount: i32,
    },
    Erode {
        resource: Resource,
        amount: i32,
    },
    Trap {
        trigger: TrapTrigger,
        damage: i32,
        target: Resource,
        #[serde(default)]
        entangle: bool,
    },
    Entangled,
    Ward,
    Betrayed {
        power_bonus: i32,
    },
    Scorned {
        defense_bonus: i32,
    },
    Binding {
        resource: Resource,
        amount: i32,
    },
    Dependency {
        resource: Resource,
        amount: i32,
        trust_floor: i32,
    },
    Exposure {
        bonus: i32,
    },
}

impl ConditionEffect {
    pub fn kind(&self) -> ConditionKind {
        match self {
            ConditionEffect::Empower(_) => ConditionKind::Empower,
            ConditionEffect::Disrupt(_) => ConditionKind::Disrupt,
            ConditionEffect::Fortify { .. } => ConditionKind::Fortify,
            ConditionEffect::Guard { .. } => ConditionKind::Guard,
            ConditionEffect::Attune { .. } => ConditionKind::Attune,
            ConditionEffect::Erode { .. } => ConditionKind::Erode,
            ConditionEffect::Trap { .. } => ConditionKind::Trap,
            ConditionEffect::Entangled => ConditionKind::Entangled,
            ConditionEffect::Ward => ConditionKind::Ward,
            ConditionEffect::Betrayed { .. } => ConditionKind::Betrayed,
            ConditionEffect::Scorned { .. } => ConditionKind::Scorned,
            ConditionEffect::Binding { .. } => ConditionKind::Binding,
            ConditionEffect::Dependency { .. } => ConditionKind::Dependency,
            ConditionEffect::Exposure { .. } => ConditionKind::Exposure,
        }
    }
}

/// 场上生效的一个状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveCondition {
    pub placed_by: Side,
    pub source: String,
    pub duration: u32,
    #[serde(default)]
    pub fresh: bool,
    pub seq: u64,
    #[serde(flatten)]
    pub effect: ConditionEffect,
}

impl ActiveCondition {
    pub fn kind(&self) -> ConditionKind {
        self.effect.kind()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionStore {
    #[serde(default)]
    by_kind: BTreeMap<ConditionKind, Vec<ActiveCondition>>,
    #[serde(default)]
    next_seq: u64,
}

impl ConditionStore {
    pub fn add(
        &mut self,
        placed_by: Side,
        source: impl Into<String>,
        duration: u32,
        effect: ConditionEffect,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = ActiveCondition {
            placed_by,
            source: source.into(),
            duration,
            fresh: true,
            seq,
            effect,
        };
        self.by_kind.entry(entry.kind()).or_default().push(entry);
        seq
    }

    pub fn replace(
        &mut self,
        placed_by: Side,
        source: impl Into<String>,
        duration: u32,
        effect: ConditionEffect,
    ) -> u64 {
        self.by_kind.remove(&effect.kind());
        self.add(placed_by, source, duration, effect)
    }

    pub fn has(&self, kind: ConditionKind) -> bool {
        self.by_kind
            .get(&kind)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    pub fn has_placed_by(&self, kind: ConditionKind, side: Side) -> bool {
        self.iter_kind(kind).any(|entry| entry.placed_by == side)
    }

    pub fn iter_kind(&self, kind: ConditionKind) -> impl Iterator<Item = &ActiveCondition> {
        self.by_kind.get(&kind).into_iter().flatten()
    }

    pub fn count(&self, kind: ConditionKind) -> usize {
        self.iter_kind(kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.values().all(Vec::is_empty)
    }

    pub fn take_first<F>(&mut self, kind: ConditionKind, pred: F) -> Option<ActiveCondition>
    where
        F: Fn(&ActiveCondition) -> bool,
    {
        let entries = self.by_kind.get_mut(&kind)?;
        let idx = entries.iter().position(|entry| pred(entry))?;
        let mut taken = entries.remove(idx);
        taken.duration = 0;
        if entries.is_empty() {
            self.by_kind.remove(&kind);
        }
        Some(taken)
    }

    pub fn remove_where<F>(&mut self, pred: F) -> Vec<ActiveCondition>
    where
        F: Fn(&ActiveCondition) -> bool,
    {
        let mut removed = Vec::new();
        for entries in self.by_kind.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) = entries.drain(..).partition(|entry| pred(entry));
            *entries = kept;
            removed.extend(gone);
        }
        self.by_kind.retain(|_, entries| !entries.is_empty());
        removed.sort_by_key(|entry| entry.seq);
        removed
    }

    pub fn remove_seq(&mut self, seq: u64) -> Option<ActiveCondition> {
        self.remove_where(|entry| entry.seq == seq).pop()
    }

    pub fn iter(&self) -> Vec<&ActiveCondition> {
        let mut all: Vec<&ActiveCondition> = self.by_kind.values().flatten().collect();
        all.sort_by_key(|entry| entry.seq);
        all
    }

    pub fn fortify_total(&self) -> i32 {
        self.iter_kind(ConditionKind::Fortify)
            .map(|entry| match entry.effect {
                ConditionEffect::Fortify { reduction } => reduction.max(0),
                _ => 0,
            })
            .sum()
    }

    /// 回合结束衰减，返回到期条目。
    pub fn tick_round(&mut self) -> Vec<ActiveCondition> {
        let mut expired = Vec::new();
        for (kind, entries) in self.by_kind.iter_mut() {
            if !kind.decays() {
                continue;
            }
            for entry in entries.iter_mut() {
                if entry.fresh {
                    entry.fresh = false;
                } else {
                    entry.duration = entry.duration.saturating_sub(1);
                }
            }
            let (gone, kept): (Vec<_>, Vec<_>) =
                entries.drain(..).partition(|entry| entry.duration == 0);
            *entries = kept;
            expired.extend(gone);
        }
        self.by_kind.retain(|_, entries| !entries.is_empty());
        expired.sort_by_key(|entry| entry.seq);
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_timed_effect() -> Vec<ConditionEffect> {
        vec![
            ConditionEffect::Fortify { reduction: 1 },
            ConditionEffect::Guard {
                member: Some(1),
                reduction: 2,
            },
            ConditionEffect::Attune {
                card_type: None,
                discount: 1,
            },
            ConditionEffect::Erode {
                resource: Resource::Nerve,
                amount: 1,
            },
            ConditionEffect::Entangled,
            ConditionEffect::Ward,
            ConditionEffect::Betrayed { power_bonus: 2 },
            ConditionEffect::Scorned { defense_bonus: 1 },
            ConditionEffect::Binding {
                resource: Resource::Nerve,
                amount: 1,
            },
            ConditionEffect::Dependency {
                resource: Resource::Resolve,
                amount: 2,
                trust_floor: 3,
            },
            ConditionEffect::Exposure { bonus: 1 },
        ]
    }

    #[test]
    fn fresh_skips_first_decrement_for_every_timed_kind() {
        for effect in every_timed_effect() {
            let kind = effect.kind();
            let mut store = ConditionStore::default();
            store.add(Side::Dungeon, "test", 1, effect);

            assert!(store.tick_round().is_empty(), "{kind:?} expired while fresh");
            assert!(store.has(kind));
            let expired = store.tick_round();
            assert_eq!(expired.len(), 1, "{kind:?} should expire on second tick");
            assert!(!store.has(kind));
        }
    }

    #[test]
    fn fortify_of_two_rounds_outlasts_its_placement_round() {
        let mut store = ConditionStore::default();
        store.add(Side::Visitor, "bulwark", 2, ConditionEffect::Fortify { reduction: 1 });

        assert!(store.tick_round().is_empty());
        assert_eq!(store.fortify_total(), 1);
        assert!(store.tick_round().is_empty());
        assert_eq!(store.fortify_total(), 1);
        assert_eq!(store.tick_round().len(), 1);
        assert_eq!(store.fortify_total(), 0);
    }

    #[test]
    fn consumed_kinds_do_not_decay() {
        let mut store = ConditionStore::default();
        store.add(
            Side::Visitor,
            "focus",
            1,
            ConditionEffect::Empower(EmpowerEffect::default()),
        );
        store.add(
            Side::Visitor,
            "snare",
            1,
            ConditionEffect::Trap {
                trigger: TrapTrigger::StrikePlayed,
                damage: 2,
                target: Resource::Vitality,
                entangle: false,
            },
        );
        for _ in 0..4 {
            assert!(store.tick_round().is_empty());
        }
        assert!(store.has(ConditionKind::Empower));
        assert!(store.has(ConditionKind::Trap));
    }

    #[test]
    fn take_first_respects_insertion_order_and_predicate() {
        let mut store = ConditionStore::default();
        store.add(Side::Dungeon, "a", 1, ConditionEffect::Disrupt(Hindrance::default()));
        store.add(Side::Visitor, "b", 1, ConditionEffect::Disrupt(Hindrance::default()));
        store.add(Side::Visitor, "c", 1, ConditionEffect::Disrupt(Hindrance::default()));

        let taken = store
            .take_first(ConditionKind::Disrupt, |c| c.placed_by == Side::Visitor)
            .expect("visitor disrupt present");
        assert_eq!(taken.source, "b");
        assert_eq!(taken.duration, 0);
        assert_eq!(store.count(ConditionKind::Disrupt), 2);
    }

    #[test]
    fn replace_keeps_single_entry() {
        let mut store = ConditionStore::default();
        store.replace(
            Side::Visitor,
            "shield",
            1,
            ConditionEffect::Guard {
                member: Some(1),
                reduction: 2,
            },
        );
        store.replace(
            Side::Visitor,
            "wall",
            1,
            ConditionEffect::Guard {
                member: Some(2),
                reduction: 3,
            },
        );
        let guards: Vec<_> = store.iter_kind(ConditionKind::Guard).collect();
        assert_eq!(guards.len(), 1);
        assert_eq!(guards[0].source, "wall");
    }

    #[test]
    fn fortify_total_sums_entries_and_iter_is_ordered() {
        let mut store = ConditionStore::default();
        store.add(Side::Dungeon, "x", 2, ConditionEffect::Ward);
        store.add(Side::Dungeon, "y", 1, ConditionEffect::Fortify { reduction: 2 });
        store.add(Side::Dungeon, "z", 1, ConditionEffect::Fortify { reduction: 1 });
        assert_eq!(store.fortify_total(), 3);
        let order: Vec<u64> = store.iter().iter().map(|c| c.seq).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn store_survives_json_round_trip() {
        let mut store = ConditionStore::default();
        store.add(
            Side::Dungeon,
            "pact",
            2,
            ConditionEffect::Binding {
                resource: Resource::Nerve,
                amount: 1,
            },
        );
        let json = serde_json::to_string(&store).expect("store serializes");
        let back: ConditionStore = serde_json::from_str(&json).expect("store parses");
        assert_eq!(back, store);
    }
}
