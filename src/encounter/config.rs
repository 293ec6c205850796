//! 对局配置、战斗者模板与启动期校验。

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::result::Carryover;
use crate::ai::AiConfig;
use crate::game::card::{Card, CardCategory, CardId, CardType};
use crate::game::party::{MemberId, MoraleLoss, Party, PartyMember, TargetingStrategy};
use crate::game::state::{CombatantState, PerSide, Resource, Side};

/// 配置阶段错误。
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SetupError {
    #[error("unknown template '{name}'")]
    UnknownTemplate { name: String },
    #[error("template '{name}' is a {actual} profile, expected {expected}")]
    SideMismatch {
        name: String,
        expected: Side,
        actual: Side,
    },
    #[error("{resource} does not belong to the {side}")]
    ForeignResource { side: Side, resource: Resource },
    #[error("card id {card_id} appears more than once")]
    DuplicateCardId { card_id: CardId },
    #[error("card {card_id} targets {resource}, which the {side} cannot strike")]
    InvalidTarget {
        card_id: CardId,
        side: Side,
        resource: Resource,
    },
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
    #[error("bad json: {message}")]
    Json { message: String },
}

impl From<serde_json::Error> for SetupError {
    fn from(error: serde_json::Error) -> Self {
        SetupError::Json {
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    pub side: Side,
    pub values: Vec<(Resource, i32)>,
    pub members: Vec<(&'static str, &'static str, i32)>,
    pub kill_threshold: u32,
}

static TEMPLATES: Lazy<BTreeMap<&'static str, Template>> = Lazy::new(|| {
    let mut templates = BTreeMap::new();
    templates.insert(
        "crypt",
        Template {
            side: Side::Dungeon,
            values: vec![
                (Resource::Structure, 16),
                (Resource::Veil, 14),
                (Resource::Presence, 12),
            ],
            members: Vec::new(),
            kill_threshold: 0,
        },
    );
    templates.insert(
        "warren",
        Template {
            side: Side::Dungeon,
            values: vec![
                (Resource::Structure, 14),
                (Resource::Veil, 12),
                (Resource::Presence, 14),
            ],
            members: Vec::new(),
            kill_threshold: 0,
        },
    );
    templates.insert(
        "wanderer",
        Template {
            side: Side::Visitor,
            values: vec![
                (Resource::Vitality, 20),
                (Resource::Resolve, 16),
                (Resource::Nerve, 16),
            ],
            members: Vec::new(),
            kill_threshold: 0,
        },
    );
    templates.insert(
        "delving_party",
        Template {
            side: Side::Visitor,
            values: vec![(Resource::Resolve, 16), (Resource::Nerve, 16)],
            members: vec![
                ("Bram", "fighter", 10),
                ("Ysolde", "scout", 7),
                ("Ilse", "mystic", 6),
            ],
            kill_threshold: 2,
        },
    );
    templates
});

pub fn template(name: &str) -> Result<&'static Template, SetupError> {
    TEMPLATES.get(name).ok_or_else(|| SetupError::UnknownTemplate {
        name: name.to_string(),
    })
}

pub fn template_names() -> Vec<&'static str> {
    TEMPLATES.keys().copied().collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PartySpec {
    pub members: Vec<PartyMember>,
    #[serde(default)]
    pub kill_threshold: Option<u32>,
    #[serde(default)]
    pub morale_cascade: Option<Vec<MoraleLoss>>,
}

/// 单方配置：模板与覆盖值。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CombatantSpec {
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<Resource, i32>,
    #[serde(default)]
    pub party: Option<PartySpec>,
    #[serde(default)]
    pub kill_threshold: Option<u32>,
    #[serde(default)]
    pub type_modifiers: BTreeMap<CardType, i32>,
    #[serde(default)]
    pub energy: Option<i32>,
    #[serde(default)]
    pub deck: Vec<Card>,
}

/// 回合开始前的环境伤害。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoEffect {
    pub resource: Resource,
    pub amount: i32,
    #[serde(default = "default_every")]
    pub every: u32,
    #[serde(default)]
    pub escalate_every: u32,
}

impl AutoEffect {
    pub fn amount_for_round(&self, round: u32) -> Option<i32> {
        let every = self.every.max(1);
        if round == 0 || round % every != 0 {
            return None;
        }
        let escalation = if self.escalate_every > 0 {
            ((round - 1) / self.escalate_every) as i32
        } else {
            0
        };
        Some(self.amount.max(0) + escalation)
    }
}

fn default_every() -> u32 {
    1
}

fn default_initiative() -> Side {
    Side::Dungeon
}

fn default_max_rounds() -> u32 {
    12
}

fn default_min_hand() -> usize {
    5
}

fn default_base_energy() -> i32 {
    3
}

fn default_promoter_cap() -> i32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncounterConfig {
    #[serde(default = "default_initiative")]
    pub initiative: Side,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_min_hand")]
    pub min_hand_size: usize,
    #[serde(default = "default_base_energy")]
    pub base_energy: i32,
    #[serde(default = "default_promoter_cap")]
    pub promoter_cap: i32,
    #[serde(default)]
    pub auto_effects: Vec<AutoEffect>,
    #[serde(default)]
    pub targeting: TargetingStrategy,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub ai: PerSide<AiConfig>,
    #[serde(default)]
    pub dungeon: CombatantSpec,
    #[serde(default)]
    pub visitor: CombatantSpec,
    #[serde(default)]
    pub carryover: Option<Carryover>,
    #[serde(default)]
    pub log_to_console: bool,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            initiative: default_initiative(),
            max_rounds: default_max_rounds(),
            min_hand_size: default_min_hand(),
            base_energy: default_base_energy(),
            promoter_cap: default_promoter_cap(),
            auto_effects: Vec::new(),
            targeting: TargetingStrategy::default(),
            seed: None,
            ai: PerSide::default(),
            dungeon: CombatantSpec::default(),
            visitor: CombatantSpec::default(),
            carryover: None,
            log_to_console: false,
        }
    }
}

impl EncounterConfig {
    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        let config: EncounterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn spec(&self, side: Side) -> &CombatantSpec {
        match side {
            Side::Dungeon => &self.dungeon,
            Side::Visitor => &self.visitor,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.max_rounds == 0 {
            return Err(SetupError::InvalidConfig {
                reason: "max_rounds must be at least 1".into(),
            });
        }
        for effect in &self.auto_effects {
            if effect.resource.is_promoter() {
                return Err(SetupError::InvalidConfig {
                    reason: format!("auto effect cannot target {}", effect.resource),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for side in Side::ALL {
            for card in &self.spec(side).deck {
                if !seen.insert(card.id) {
                    return Err(SetupError::DuplicateCardId { card_id: card.id });
                }
                validate_target(side, card)?;
            }
        }
        Ok(())
    }

    pub fn build_combatant(&self, side: Side) -> Result<CombatantState, SetupError> {
        let spec = self.spec(side);
        let mut values: BTreeMap<Resource, i32> = BTreeMap::new();
        let mut members: Vec<PartyMember> = Vec::new();
        let mut kill_threshold = 0;

        if let Some(name) = &spec.template {
            let template = template(name)?;
            if template.side != side {
                return Err(SetupError::SideMismatch {
                    name: name.clone(),
                    expected: side,
                    actual: template.side,
                });
            }
            values.extend(template.values.iter().copied());
            members = template
                .members
                .iter()
                .enumerate()
                .map(|(idx, (name, role, vitality))| {
                    PartyMember::new(idx as MemberId + 1, *name, *role, *vitality)
                })
                .collect();
            kill_threshold = template.kill_threshold;
        }

        for (resource, value) in &spec.values {
            if resource.owner() != side {
                return Err(SetupError::ForeignResource {
                    side,
                    resource: *resource,
                });
            }
            values.insert(*resource, *value);
        }

        let mut cascade = None;
        if let Some(party) = &spec.party {
            if side != Side::Visitor {
                return Err(SetupError::InvalidConfig {
                    reason: "only the visitor can field a party".into(),
                });
            }
            members = party.members.iter().cloned().map(normalize_member).collect();
            kill_threshold = party.kill_threshold.unwrap_or(kill_threshold);
            cascade = party.morale_cascade.clone();
        }
        if let Some(threshold) = spec.kill_threshold {
            kill_threshold = threshold;
        }

        let values: Vec<(Resource, i32)> = values.into_iter().collect();
        let energy = spec.energy.unwrap_or(self.base_energy);
        let mut state = CombatantState::new(side, &values, energy)
            .with_type_modifiers(spec.type_modifiers.clone());

        if !members.is_empty() {
            let ids: BTreeSet<MemberId> = members.iter().map(|m| m.id).collect();
            if ids.len() != members.len() {
                return Err(SetupError::InvalidConfig {
                    reason: "party member ids must be unique".into(),
                });
            }
            let threshold = if kill_threshold == 0 {
                members.len() as u32
            } else {
                kill_threshold
            };
            let mut party = Party::new(members, threshold);
            if let Some(cascade) = cascade {
                party = party.with_morale_cascade(cascade);
            }
            state = state.with_party(party);
        }

        validate_member_tags(side, &spec.deck, &state)?;
        Ok(state)
    }
}

fn normalize_member(mut member: PartyMember) -> PartyMember {
    if member.max_vitality <= 0 {
        member.max_vitality = member.vitality;
    }
    member.vitality = member.vitality.clamp(0, member.max_vitality);
    member
}

fn validate_target(side: Side, card: &Card) -> Result<(), SetupError> {
    let Some(resource) = card.target else {
        return Ok(());
    };
    let strikes = matches!(card.category(), CardCategory::Strike | CardCategory::Trap);
    if strikes && (resource.owner() == side || resource.is_promoter()) {
        return Err(SetupError::InvalidTarget {
            card_id: card.id,
            side,
            resource,
        });
    }
    Ok(())
}

fn validate_member_tags(
    side: Side,
    deck: &[Card],
    state: &CombatantState,
) -> Result<(), SetupError> {
    for card in deck {
        let Some(member) = card.member else {
            continue;
        };
        let known = state
            .party
            .as_ref()
            .map(|party| party.member(member).is_some())
            .unwrap_or(false);
        if !known {
            return Err(SetupError::InvalidConfig {
                reason: format!("{side} card {} is tagged to unknown member {member}", card.id),
            });
        }
    }
    Ok(())
}
