use serde::{Deserialize, Serialize};

use super::dice::RandomSource;
use super::effects::StrikeTrigger;
use super::party::MemberId;
use super::state::Resource;

/// 全局唯一的卡牌标识。
pub type CardId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Physical,
    Social,
    Mystical,
    Environmental,
}

impl Default for CardType {
    fn default() -> Self {
        CardType::Physical
    }
}

impl CardType {
    pub fn has_affinity(self, resource: Resource) -> bool {
        match self {
            CardType::Physical => matches!(resource, Resource::Vitality | Resource::Structure),
            CardType::Social => matches!(resource, Resource::Resolve | Resource::Presence),
            CardType::Mystical => matches!(resource, Resource::Nerve | Resource::Veil),
            CardType::Environmental => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Physical => "physical",
            CardType::Social => "social",
            CardType::Mystical => "mystical",
            CardType::Environmental => "environmental",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    Entangle,
    Erode,
    Drain,
    Overwhelm,
    Resonate,
    Ward,
    Rally,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDelta {
    pub resource: Resource,
    pub amount: i32,
}

impl ResourceDelta {
    pub fn new(resource: Resource, amount: i32) -> Self {
        Self { resource, amount }
    }
}

fn default_duration() -> u32 {
    1
}

fn default_test_difficulty() -> i32 {
    7
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmpowerEffect {
    #[serde(default)]
    pub advantage: bool,
    #[serde(default)]
    pub power_bonus: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_keywords: Vec<Keyword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retarget: Option<Resource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hindrance {
    #[serde(default)]
    pub disadvantage: bool,
    #[serde(default)]
    pub self_damage: i32,
    #[serde(default)]
    pub strip_keywords: bool,
    #[serde(default)]
    pub randomize_target: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DisruptEffect {
    Hinder(Hindrance),
    Guard {
        #[serde(rename = "protect", default)]
        member: Option<MemberId>,
        #[serde(default = "default_duration")]
        duration: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterEffect {
    #[serde(default)]
    pub reduction: Option<i32>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub cleanse: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrapTrigger {
    StrikePlayed,
    EmpowerPlayed,
    CounterPlayed,
    OfferAccepted,
}

impl TrapTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            TrapTrigger::StrikePlayed => "strike_played",
            TrapTrigger::EmpowerPlayed => "empower_played",
            TrapTrigger::CounterPlayed => "counter_played",
            TrapTrigger::OfferAccepted => "offer_accepted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrapEffect {
    #[serde(rename = "springs_on")]
    pub trigger: TrapTrigger,
    #[serde(default)]
    pub entangle: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferSubtype {
    Standard,
    Covenant,
}

impl Default for OfferSubtype {
    fn default() -> Self {
        OfferSubtype::Standard
    }
}

/// 交易代价，由接受方承担。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfferCost {
    None,
    Damage {
        resource: Resource,
        amount: i32,
    },
    Binding {
        resource: Resource,
        amount: i32,
        #[serde(default = "default_duration")]
        duration: u32,
    },
    Exposure {
        bonus: i32,
        #[serde(default = "default_duration")]
        duration: u32,
    },
    Extraction {
        amount: i32,
    },
    Dependency {
        resource: Resource,
        amount: i32,
        trust_floor: i32,
        #[serde(default = "default_duration")]
        duration: u32,
    },
}

impl Default for OfferCost {
    fn default() -> Self {
        OfferCost::None
    }
}

impl OfferCost {
    pub fn weight(&self) -> i32 {
        match self {
            OfferCost::None => 0,
            OfferCost::Damage { amount, .. } => *amount,
            OfferCost::Binding {
                amount, duration, ..
            } => amount.saturating_mul(*duration as i32),
            OfferCost::Exposure { bonus, .. } => *bonus,
            OfferCost::Extraction { amount } => *amount,
            OfferCost::Dependency { amount, .. } => *amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Investment {
    #[serde(default)]
    pub trust: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfferSpec {
    #[serde(default)]
    pub subtype: OfferSubtype,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub benefit: Vec<ResourceDelta>,
    #[serde(rename = "price", default)]
    pub cost: OfferCost,
    #[serde(default)]
    pub investment: Investment,
}

impl OfferSpec {
    pub fn benefit_total(&self) -> i32 {
        self.benefit.iter().map(|delta| delta.amount.max(0)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reward: Vec<ResourceDelta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub penalty: Vec<ResourceDelta>,
    #[serde(default)]
    pub promoter_gain: i32,
    #[serde(default = "default_test_difficulty")]
    pub difficulty: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shift {
    pub from: Resource,
    pub to: Resource,
    pub amount: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReshapeEffect {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restore: Vec<ResourceDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,
    #[serde(default)]
    pub cleanse: bool,
    #[serde(default)]
    pub draw: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revive: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttuneSpec {
    #[serde(default)]
    pub card_type: Option<CardType>,
    pub discount: i32,
    #[serde(default = "default_duration")]
    pub duration: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnergySpec {
    #[serde(default)]
    pub permanent: i32,
    #[serde(default)]
    pub temporary: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attune: Option<AttuneSpec>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReactVariant {
    Block,
    Absorb,
    Reflect,
}

impl Default for ReactVariant {
    fn default() -> Self {
        ReactVariant::Block
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "formula", rename_all = "snake_case")]
pub enum ReactPower {
    Flat,
    Desperate { resource: Resource, per_missing: i32 },
}

impl Default for ReactPower {
    fn default() -> Self {
        ReactPower::Flat
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactSpec {
    #[serde(default)]
    pub variant: ReactVariant,
    #[serde(rename = "scaling", default)]
    pub power: ReactPower,
}

/// 按类别区分的卡牌效果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CardKind {
    Strike,
    Empower(EmpowerEffect),
    Disrupt(DisruptEffect),
    Counter(CounterEffect),
    Trap(TrapEffect),
    Offer(OfferSpec),
    Test(TestSpec),
    Reshape(ReshapeEffect),
    Energy(EnergySpec),
    React(ReactSpec),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    Strike,
    Empower,
    Disrupt,
    Counter,
    Trap,
    Offer,
    Test,
    Reshape,
    Energy,
    React,
}

impl CardCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CardCategory::Strike => "strike",
            CardCategory::Empower => "empower",
            CardCategory::Disrupt => "disrupt",
            CardCategory::Counter => "counter",
            CardCategory::Trap => "trap",
            CardCategory::Offer => "offer",
            CardCategory::Test => "test",
            CardCategory::Reshape => "reshape",
            CardCategory::Energy => "energy",
            CardCategory::React => "react",
        }
    }
}

/// 战斗中使用的卡牌数据。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub card_type: CardType,
    #[serde(default)]
    pub cost: i32,
    #[serde(default)]
    pub power: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Resource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<Keyword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<StrikeTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<MemberId>,
    #[serde(flatten)]
    pub kind: CardKind,
}

impl Card {
    pub fn new(
        id: CardId,
        name: impl Into<String>,
        card_type: CardType,
        cost: i32,
        power: i32,
        kind: CardKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            card_type,
            cost,
            power,
            target: None,
            keywords: Vec::new(),
            trigger: None,
            member: None,
            kind,
        }
    }

    pub fn strike(id: CardId, name: impl Into<String>, power: i32, target: Resource) -> Self {
        Self::new(id, name, CardType::Physical, 1, power, CardKind::Strike).with_target(target)
    }

    pub fn with_target(mut self, target: Resource) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<Keyword>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_trigger(mut self, trigger: StrikeTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_type(mut self, card_type: CardType) -> Self {
        self.card_type = card_type;
        self
    }

    pub fn with_cost(mut self, cost: i32) -> Self {
        self.cost = cost;
        self
    }

    pub fn for_member(mut self, member: MemberId) -> Self {
        self.member = Some(member);
        self
    }

    pub fn category(&self) -> CardCategory {
        match self.kind {
            CardKind::Strike => CardCategory::Strike,
            CardKind::Empower(_) => CardCategory::Empower,
            CardKind::Disrupt(_) => CardCategory::Disrupt,
            CardKind::Counter(_) => CardCategory::Counter,
            CardKind::Trap(_) => CardCategory::Trap,
            CardKind::Offer(_) => CardCategory::Offer,
            CardKind::Test(_) => CardCategory::Test,
            CardKind::Reshape(_) => CardCategory::Reshape,
            CardKind::Energy(_) => CardCategory::Energy,
            CardKind::React(_) => CardCategory::React,
        }
    }

    pub fn has_keyword(&self, keyword: Keyword) -> bool {
        self.keywords.contains(&keyword)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Energy,
    Play,
    Activate,
    Restrain,
}

/// 出牌方的一步决策。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    pub card: CardId,
    pub action: DecisionAction,
}

impl Decision {
    pub fn play(card: CardId) -> Self {
        Self {
            card,
            action: DecisionAction::Play,
        }
    }

    pub fn energy(card: CardId) -> Self {
        Self {
            card,
            action: DecisionAction::Energy,
        }
    }

    pub fn activate(card: CardId) -> Self {
        Self {
            card,
            action: DecisionAction::Activate,
        }
    }

    pub fn restrain(card: CardId) -> Self {
        Self {
            card,
            action: DecisionAction::Restrain,
        }
    }
}

/// 手牌、抽牌堆与弃牌堆。抽牌堆顶为末尾元素。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Piles {
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub draw: Vec<Card>,
    #[serde(default)]
    pub discard: Vec<Card>,
}

impl Piles {
    pub fn new(hand: Vec<Card>, draw: Vec<Card>, discard: Vec<Card>) -> Self {
        Self {
            hand,
            draw,
            discard,
        }
    }

    pub fn from_deck(deck: Vec<Card>) -> Self {
        Self::new(Vec::new(), deck, Vec::new())
    }

    pub fn find_in_hand(&self, card_id: CardId) -> Option<&Card> {
        self.hand.iter().find(|card| card.id == card_id)
    }

    pub fn take_from_hand(&mut self, card_id: CardId) -> Option<Card> {
        let idx = self.hand.iter().position(|card| card.id == card_id)?;
        Some(self.hand.remove(idx))
    }

    pub fn react_cards(&self) -> Vec<Card> {
        self.hand
            .iter()
            .filter(|card| card.category() == CardCategory::React)
            .cloned()
            .collect()
    }

    pub fn all_cards(&self) -> impl Iterator<Item = &Card> {
        self.hand
            .iter()
            .chain(self.draw.iter())
            .chain(self.discard.iter())
    }

    pub fn draw_one(&mut self, rng: &mut dyn RandomSource) -> Option<CardId> {
        if self.draw.is_empty() {
            if self.discard.is_empty() {
                return None;
            }
            self.draw.append(&mut self.discard);
            rng.shuffle_cards(&mut self.draw);
        }
        let card = self.draw.pop()?;
        let id = card.id;
        self.hand.push(card);
        Some(id)
    }

    pub fn draw_to(&mut self, min_hand: usize, rng: &mut dyn RandomSource) -> Vec<CardId> {
        let mut drawn = Vec::new();
        while self.hand.len() < min_hand {
            match self.draw_one(rng) {
                Some(id) => drawn.push(id),
                None => break,
            }
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::dice::ScriptedDice;

    #[test]
    fn card_json_uses_category_tag() {
        let json = r#"{
            "id": 11,
            "name": "Grasping Roots",
            "type": "environmental",
            "cost": 2,
            "power": 3,
            "target": "nerve",
            "keywords": ["entangle"],
            "category": "strike"
        }"#;
        let card: Card = serde_json::from_str(json).expect("strike card should parse");
        assert_eq!(card.category(), CardCategory::Strike);
        assert_eq!(card.target, Some(Resource::Nerve));
        assert!(card.has_keyword(Keyword::Entangle));
    }

    #[test]
    fn disrupt_payload_parses_guard_mode() {
        let json = r#"{
            "id": 12,
            "name": "Shield Wall",
            "power": 2,
            "category": "disrupt",
            "mode": "guard",
            "protect": 2
        }"#;
        let card: Card = serde_json::from_str(json).expect("guard card should parse");
        assert_eq!(card.member, None);
        assert_eq!(
            card.kind,
            CardKind::Disrupt(DisruptEffect::Guard {
                member: Some(2),
                duration: 1
            })
        );
    }

    #[test]
    fn offer_payload_parses_cost_kinds() {
        let json = r#"{
            "id": 13,
            "name": "Whispered Bargain",
            "category": "offer",
            "subtype": "covenant",
            "benefit": [{"resource": "resolve", "amount": 3}],
            "price": {"kind": "binding", "resource": "nerve", "amount": 1, "duration": 2},
            "investment": {"trust": 2}
        }"#;
        let card: Card = serde_json::from_str(json).expect("offer card should parse");
        let CardKind::Offer(spec) = card.kind else {
            panic!("expected offer payload");
        };
        assert_eq!(spec.subtype, OfferSubtype::Covenant);
        assert_eq!(spec.benefit_total(), 3);
        assert_eq!(spec.cost.weight(), 2);
        assert_eq!(spec.investment.trust, 2);
    }

    #[test]
    fn trap_payload_parses_alongside_strike_trigger_key() {
        let json = r#"{
            "id": 14,
            "name": "Snare",
            "power": 2,
            "target": "vitality",
            "category": "trap",
            "springs_on": "strike_played",
            "entangle": true
        }"#;
        let card: Card = serde_json::from_str(json).expect("trap card should parse");
        assert_eq!(
            card.kind,
            CardKind::Trap(TrapEffect {
                trigger: TrapTrigger::StrikePlayed,
                entangle: true
            })
        );
        assert_eq!(card.trigger, None);
    }

    #[test]
    fn every_category_survives_json() {
        use crate::game::effects::TriggerCondition;

        let kinds = vec![
            CardKind::Strike,
            CardKind::Empower(EmpowerEffect {
                advantage: true,
                power_bonus: 1,
                grant_keywords: vec![Keyword::Drain],
                retarget: Some(Resource::Nerve),
            }),
            CardKind::Disrupt(DisruptEffect::Hinder(Hindrance {
                disadvantage: true,
                self_damage: 1,
                ..Hindrance::default()
            })),
            CardKind::Disrupt(DisruptEffect::Guard {
                member: Some(3),
                duration: 2,
            }),
            CardKind::Counter(CounterEffect {
                reduction: Some(2),
                duration: 2,
                cleanse: true,
            }),
            CardKind::Trap(TrapEffect {
                trigger: TrapTrigger::OfferAccepted,
                entangle: false,
            }),
            CardKind::Offer(OfferSpec {
                subtype: OfferSubtype::Standard,
                benefit: vec![ResourceDelta::new(Resource::Resolve, 2)],
                cost: OfferCost::Dependency {
                    resource: Resource::Nerve,
                    amount: 2,
                    trust_floor: 3,
                    duration: 2,
                },
                investment: Investment { trust: 1 },
            }),
            CardKind::Test(TestSpec {
                reward: vec![ResourceDelta::new(Resource::Nerve, 1)],
                penalty: vec![ResourceDelta::new(Resource::Resolve, 2)],
                promoter_gain: 1,
                difficulty: 8,
            }),
            CardKind::Reshape(ReshapeEffect {
                shift: Some(Shift {
                    from: Resource::Vitality,
                    to: Resource::Resolve,
                    amount: 2,
                }),
                draw: 1,
                revive: Some(3),
                ..ReshapeEffect::default()
            }),
            CardKind::Energy(EnergySpec {
                permanent: 1,
                temporary: 1,
                attune: Some(AttuneSpec {
                    card_type: Some(CardType::Social),
                    discount: 1,
                    duration: 2,
                }),
            }),
            CardKind::React(ReactSpec {
                variant: ReactVariant::Reflect,
                power: ReactPower::Desperate {
                    resource: Resource::Vitality,
                    per_missing: 4,
                },
            }),
        ];

        for (idx, kind) in kinds.into_iter().enumerate() {
            let card = Card::new(idx as CardId + 1, "Sample", CardType::Mystical, 2, 3, kind)
                .with_target(Resource::Veil)
                .with_keywords(vec![Keyword::Rally])
                .with_trigger(StrikeTrigger {
                    condition: TriggerCondition::ResourceBelow {
                        resource: Resource::Veil,
                        threshold: 5,
                    },
                    bonus: 2,
                })
                .for_member(1);
            let json = serde_json::to_string(&card).expect("card serializes");
            let back: Card = serde_json::from_str(&json).expect("card parses back");
            assert_eq!(back, card, "{json}");
        }
    }

    #[test]
    fn draw_reshuffles_discard_when_empty() {
        let mut piles = Piles::new(
            Vec::new(),
            vec![Card::strike(1, "A", 1, Resource::Vitality)],
            vec![Card::strike(2, "B", 1, Resource::Vitality)],
        );
        let mut rng = ScriptedDice::new();
        let drawn = piles.draw_to(3, &mut rng);
        assert_eq!(drawn, vec![1, 2]);
        assert!(piles.discard.is_empty());
        assert_eq!(piles.hand.len(), 2);
    }
}
