use serde::{Deserialize, Serialize};

use super::conditions::ConditionKind;
use super::state::{CombatantState, Resource};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Whose {
    Own,
    Opponent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerCondition {
    ResourceBelow {
        resource: Resource,
        threshold: i32,
    },
    ResourceAtLeast {
        resource: Resource,
        amount: i32,
    },
    HasCondition {
        whose: Whose,
        condition: ConditionKind,
    },
    Any {
        conditions: Vec<TriggerCondition>,
    },
    All {
        conditions: Vec<TriggerCondition>,
    },
}

impl TriggerCondition {
    pub fn is_satisfied(&self, me: &CombatantState, opponent: &CombatantState) -> bool {
        match self {
            TriggerCondition::ResourceBelow {
                resource,
                threshold,
            } => pick_owner(*resource, me, opponent).value(*resource) < *threshold,
            TriggerCondition::ResourceAtLeast { resource, amount } => {
                pick_owner(*resource, me, opponent).value(*resource) >= *amount
            }
            TriggerCondition::HasCondition { whose, condition } => match whose {
                Whose::Own => me.conditions.has(*condition),
                Whose::Opponent => opponent.conditions.has(*condition),
            },
            TriggerCondition::Any { conditions } => conditions
                .iter()
                .any(|condition| condition.is_satisfied(me, opponent)),
            TriggerCondition::All { conditions } => conditions
                .iter()
                .all(|condition| condition.is_satisfied(me, opponent)),
        }
    }
}

fn pick_owner<'a>(
    resource: Resource,
    me: &'a CombatantState,
    opponent: &'a CombatantState,
) -> &'a CombatantState {
    if resource.owner() == me.side {
        me
    } else {
        opponent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrikeTrigger {
    pub condition: TriggerCondition,
    pub bonus: i32,
}

impl StrikeTrigger {
    pub fn bonus_for(&self, me: &CombatantState, opponent: &CombatantState) -> i32 {
        if self.condition.is_satisfied(me, opponent) {
            self.bonus
        } else {
            0
        }
    }
}
