//! 卡牌目录：不可变的卡牌定义，按 id 查询。

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::rules::RuleError;

pub type CardId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Retail,
    HedgeFund,
    MarketMaker,
    ShortSeller,
    Neutral,
}

impl Faction {
    pub fn salt(self) -> u64 {
        match self {
            Faction::Retail => 0x5245_5441,
            Faction::HedgeFund => 0x4845_4447,
            Faction::MarketMaker => 0x4d4b_4d4b,
            Faction::ShortSeller => 0x5348_5254,
            Faction::Neutral => 0x4e45_5554,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Taunt,
    Ranged,
    Rush,
    Shield,
    JudgeGreen,
    JudgeBlue,
}

/// Judge 专员的极性，决定可进入的 Judge 槽位。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Green,
    Blue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Strike,
    Remedy,
    Research,
    Capital,
    Sanction,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardKind {
    Unit,
    Instrument { kind: InstrumentKind, power: i32 },
}

/// 出牌时对目标的要求。
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetRule {
    None,
    EnemyUnit,
    FriendlyUnit,
    EnemyUnitOrLeader,
    EventUnit,
    EnemyUnitMaxAttack { max: i32 },
    EnemyUnitMaxCost { max: i32 },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CardDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub faction: Faction,
    pub kind: CardKind,
    pub cost: i32,
    pub attack: i32,
    pub health: i32,
    pub traits: &'static [Trait],
    pub dirty: bool,
    pub dirty_power: i32,
    pub target: TargetRule,
    pub collectible: bool,
}

impl CardDefinition {
    pub fn is_unit(&self) -> bool {
        matches!(self.kind, CardKind::Unit)
    }

    pub fn has_trait(&self, value: Trait) -> bool {
        self.traits.contains(&value)
    }

    pub fn polarity(&self) -> Option<Polarity> {
        if self.has_trait(Trait::JudgeGreen) {
            Some(Polarity::Green)
        } else if self.has_trait(Trait::JudgeBlue) {
            Some(Polarity::Blue)
        } else {
            None
        }
    }
}

const fn unit(
    id: &'static str,
    name: &'static str,
    faction: Faction,
    cost: i32,
    attack: i32,
    health: i32,
    traits: &'static [Trait],
) -> CardDefinition {
    CardDefinition {
        id,
        name,
        faction,
        kind: CardKind::Unit,
        cost,
        attack,
        health,
        traits,
        dirty: false,
        dirty_power: 0,
        target: TargetRule::None,
        collectible: true,
    }
}

const fn instrument(
    id: &'static str,
    name: &'static str,
    faction: Faction,
    cost: i32,
    kind: InstrumentKind,
    power: i32,
    target: TargetRule,
) -> CardDefinition {
    CardDefinition {
        id,
        name,
        faction,
        kind: CardKind::Instrument { kind, power },
        cost,
        attack: 0,
        health: 0,
        traits: &[],
        dirty: false,
        dirty_power: 0,
        target,
        collectible: true,
    }
}

const fn dirty(mut card: CardDefinition, power: i32) -> CardDefinition {
    card.dirty = true;
    card.dirty_power = power;
    card
}

const fn token(mut card: CardDefinition) -> CardDefinition {
    card.collectible = false;
    card
}

use Faction::{HedgeFund, MarketMaker, Neutral, Retail, ShortSeller};
use InstrumentKind::{Capital, Remedy, Research, Sanction, Strike};
use Trait::{JudgeBlue, JudgeGreen, Ranged, Rush, Shield, Taunt};

const CARDS: &[CardDefinition] = &[
    // Retail
    unit("retail_ape", "Diamond-Hand Ape", Retail, 1, 1, 2, &[]),
    unit("retail_meme_lord", "Meme Lord", Retail, 2, 2, 2, &[Rush]),
    unit("retail_forum_mod", "Forum Moderator", Retail, 3, 2, 4, &[Taunt]),
    dirty(unit("retail_yolo_trader", "YOLO Trader", Retail, 3, 4, 2, &[Rush]), 1),
    unit("retail_petitioner", "Citizen Petitioner", Retail, 2, 1, 3, &[JudgeGreen]),
    unit("retail_crowd_lobbyist", "Crowdfunded Lobbyist", Retail, 3, 2, 3, &[JudgeBlue]),
    unit("retail_options_kid", "Options Kid", Retail, 2, 3, 1, &[Ranged]),
    unit("retail_hodl_wall", "HODL Wall", Retail, 4, 1, 7, &[Taunt, Shield]),
    unit("retail_squeeze_captain", "Squeeze Captain", Retail, 5, 5, 5, &[]),
    instrument("retail_rocket_post", "Rocket Emoji Post", Retail, 2, Strike, 2, TargetRule::EnemyUnitOrLeader),
    token(unit("retail_bagholder", "Bagholder", Retail, 1, 1, 1, &[])),
    // HedgeFund
    unit("hedge_analyst", "Junior Analyst", HedgeFund, 1, 1, 2, &[Ranged]),
    unit("hedge_quant", "Quant Desk", HedgeFund, 2, 2, 3, &[]),
    unit("hedge_arbitrageur", "Arbitrageur", HedgeFund, 3, 3, 3, &[]),
    unit("hedge_compliance", "Compliance Counsel", HedgeFund, 3, 1, 4, &[JudgeGreen]),
    unit("hedge_lobbyist", "K Street Lobbyist", HedgeFund, 3, 2, 3, &[JudgeBlue]),
    unit("hedge_algo", "Algo Runner", HedgeFund, 3, 2, 2, &[Ranged, Rush]),
    unit("hedge_enforcer", "Desk Enforcer", HedgeFund, 4, 3, 6, &[Taunt]),
    dirty(unit("hedge_raider", "Corporate Raider", HedgeFund, 5, 5, 4, &[]), 2),
    unit("hedge_prime_broker", "Prime Broker", HedgeFund, 6, 4, 8, &[Shield]),
    instrument("hedge_leverage", "Leverage Facility", HedgeFund, 2, Capital, 3, TargetRule::None),
    // MarketMaker
    unit("mm_liquidity_bot", "Liquidity Bot", MarketMaker, 1, 0, 3, &[Taunt]),
    unit("mm_spread_trader", "Spread Trader", MarketMaker, 2, 2, 2, &[]),
    unit("mm_floor_clerk", "Floor Clerk", MarketMaker, 2, 1, 3, &[JudgeGreen]),
    unit("mm_specialist", "Book Specialist", MarketMaker, 3, 2, 4, &[]),
    unit("mm_exchange_agent", "Exchange Agent", MarketMaker, 3, 3, 2, &[JudgeBlue]),
    unit("mm_hft", "HFT Node", MarketMaker, 3, 3, 1, &[Ranged, Rush]),
    unit("mm_circuit_warden", "Circuit Warden", MarketMaker, 4, 2, 5, &[Taunt]),
    unit("mm_clearing_house", "Clearing House", MarketMaker, 5, 3, 6, &[Shield]),
    unit("mm_designated", "Designated Maker", MarketMaker, 6, 5, 6, &[]),
    instrument("mm_rebalance", "Rebalance", MarketMaker, 2, Remedy, 4, TargetRule::None),
    // ShortSeller
    unit("short_analyst", "Bear Analyst", ShortSeller, 1, 2, 1, &[]),
    unit("short_report_writer", "Report Writer", ShortSeller, 2, 2, 2, &[Ranged]),
    unit("short_activist", "Activist Counsel", ShortSeller, 2, 1, 3, &[JudgeGreen]),
    unit("short_borrow_desk", "Borrow Desk", ShortSeller, 3, 2, 4, &[Taunt]),
    dirty(unit("short_fixer", "Shadow Fixer", ShortSeller, 3, 2, 3, &[JudgeBlue]), 1),
    unit("short_doom_poster", "Doom Poster", ShortSeller, 3, 3, 3, &[]),
    dirty(unit("short_bear_raider", "Bear Raider", ShortSeller, 4, 4, 3, &[Rush]), 1),
    unit("short_vulture", "Vulture Fund", ShortSeller, 5, 4, 5, &[]),
    dirty(unit("short_kingpin", "Short Kingpin", ShortSeller, 6, 6, 5, &[]), 2),
    instrument("short_fud_campaign", "FUD Campaign", ShortSeller, 1, Sanction, 2, TargetRule::EnemyUnit),
    // Neutral units
    unit("neutral_intern", "Summer Intern", Neutral, 1, 1, 1, &[]),
    unit("neutral_consultant", "Consultant", Neutral, 2, 2, 3, &[]),
    unit("neutral_bodyguard", "Bodyguard", Neutral, 3, 2, 5, &[Taunt]),
    unit("neutral_auditor", "Court Auditor", Neutral, 3, 2, 3, &[JudgeGreen]),
    dirty(unit("neutral_bagman", "Bagman", Neutral, 3, 2, 3, &[JudgeBlue]), 1),
    // Neutral instruments
    instrument("margin_call", "Margin Call", Neutral, 2, Strike, 3, TargetRule::EnemyUnit),
    instrument("short_squeeze", "Short Squeeze", Neutral, 3, Strike, 2, TargetRule::None),
    instrument("dividend", "Dividend", Neutral, 1, Capital, 3, TargetRule::None),
    dirty(instrument("insider_tip", "Insider Tip", Neutral, 1, Research, 2, TargetRule::None), 2),
    dirty(instrument("pump_and_dump", "Pump and Dump", Neutral, 2, Strike, 3, TargetRule::FriendlyUnit), 3),
    dirty(instrument("naked_short", "Naked Short", Neutral, 0, Capital, 5, TargetRule::None), 1),
    instrument("audit", "Surprise Audit", Neutral, 2, Sanction, 1, TargetRule::EnemyUnit),
    instrument("bailout", "Bailout", Neutral, 3, Remedy, 5, TargetRule::None),
    instrument("hedge_position", "Hedge Position", Neutral, 1, Remedy, 1, TargetRule::FriendlyUnit),
    instrument("flash_crash", "Flash Crash", Neutral, 4, Strike, 1, TargetRule::None),
    instrument("spin_doctor", "Spin Doctor", Neutral, 2, Remedy, 2, TargetRule::None),
    dirty(instrument("lobbying", "Lobbying Dinner", Neutral, 2, Remedy, 2, TargetRule::None), 1),
    instrument("stop_loss", "Stop Loss", Neutral, 1, Remedy, 0, TargetRule::FriendlyUnit),
    dirty(instrument("rug_pull", "Rug Pull", Neutral, 3, Strike, 0, TargetRule::EnemyUnitMaxAttack { max: 2 }), 2),
    instrument("leaked_memo", "Leaked Memo", Neutral, 2, Sanction, 2, TargetRule::EnemyUnit),
    dirty(instrument("hostile_takeover", "Hostile Takeover", Neutral, 6, Strike, 0, TargetRule::EnemyUnitMaxCost { max: 3 }), 1),
    instrument("circuit_breaker", "Circuit Breaker", Neutral, 2, Sanction, 1, TargetRule::None),
    instrument("market_rally", "Market Rally", Neutral, 3, Remedy, 1, TargetRule::None),
    instrument("liquidate", "Liquidate", Neutral, 1, Capital, 1, TargetRule::FriendlyUnit),
    instrument("subpoena", "Subpoena", Neutral, 2, Strike, 3, TargetRule::EventUnit),
    instrument("whistleblower", "Whistleblower", Neutral, 2, Sanction, 2, TargetRule::None),
    instrument("golden_parachute", "Golden Parachute", Neutral, 2, Remedy, 2, TargetRule::None),
    instrument("debt_restructure", "Debt Restructure", Neutral, 1, Capital, 3, TargetRule::None),
    instrument("ipo", "IPO Day", Neutral, 3, Capital, 2, TargetRule::None),
    instrument("analyst_report", "Analyst Report", Neutral, 2, Research, 2, TargetRule::None),
];

static CATALOG: Lazy<BTreeMap<&'static str, &'static CardDefinition>> =
    Lazy::new(|| CARDS.iter().map(|card| (card.id, card)).collect());

pub fn lookup(card_id: &str) -> Option<&'static CardDefinition> {
    CATALOG.get(card_id).copied()
}

/// 查询卡牌定义；未知 id 属于目录损坏，调用方应视为致命错误。
pub fn card(card_id: &str) -> Result<&'static CardDefinition, RuleError> {
    lookup(card_id).ok_or_else(|| RuleError::UnknownCard {
        card_id: card_id.to_string(),
    })
}

pub fn all_cards() -> impl Iterator<Item = &'static CardDefinition> {
    CARDS.iter()
}

/// 阵营可用牌池：本阵营与中立的可收集卡牌，按目录顺序。
pub fn faction_pool(faction: Faction) -> Vec<&'static CardDefinition> {
    CARDS
        .iter()
        .filter(|card| card.collectible && (card.faction == faction || card.faction == Faction::Neutral))
        .collect()
}
