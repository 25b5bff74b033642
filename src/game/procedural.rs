//! 程序化行为生成：由 `hash(card_id + salt)` 推导的逐卡参数表。
//!
//! 这里的函数都是纯函数，结果只取决于卡牌 id，从不读取对局随机数。
//! 目录内卡牌的结果在首次访问时整体缓存。

use std::collections::BTreeMap;
use std::hash::Hasher;

use fxhash::FxHasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::catalog;

pub const RESIST_CAP_PCT: u32 = 45;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DebuffKind {
    Exposed,
    Stun,
    AttackDown,
}

impl DebuffKind {
    pub const ALL: [DebuffKind; 3] = [DebuffKind::Exposed, DebuffKind::Stun, DebuffKind::AttackDown];

    fn index(self) -> usize {
        match self {
            DebuffKind::Exposed => 0,
            DebuffKind::Stun => 1,
            DebuffKind::AttackDown => 2,
        }
    }

    fn salt(self) -> &'static str {
        match self {
            DebuffKind::Exposed => "resist:exposed",
            DebuffKind::Stun => "resist:stun",
            DebuffKind::AttackDown => "resist:attack_down",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DebuffKind::Exposed => "Exposed",
            DebuffKind::Stun => "Stun",
            DebuffKind::AttackDown => "Attack-down",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    EntryShield,
    EntryHeal,
    TurnIncome,
    TurnCleanse,
    CombatExpose,
    CombatFee,
    CombatSnowball,
}

impl SignatureKind {
    pub const ALL: [SignatureKind; 7] = [
        SignatureKind::EntryShield,
        SignatureKind::EntryHeal,
        SignatureKind::TurnIncome,
        SignatureKind::TurnCleanse,
        SignatureKind::CombatExpose,
        SignatureKind::CombatFee,
        SignatureKind::CombatSnowball,
    ];
}

/// 没有专属脚本的单位所使用的兜底触发能力。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature {
    pub kind: SignatureKind,
    pub magnitude: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupportEffect {
    HealLeader { amount: i32 },
    ShieldAlly,
    ReduceProbation { amount: i32 },
    DrawCard,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BriberyRider {
    ExtraFavor,
    ClearProbation,
    OpponentHostility,
    SkimShares,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GreenProfile {
    pub fee: i32,
    pub rebate_pct: i32,
    pub primary: DebuffKind,
    pub support: SupportEffect,
}

impl GreenProfile {
    /// 维护费随回合数缓慢上涨。
    pub fn upkeep(&self, turn: u32) -> i32 {
        self.fee + (turn / 20) as i32
    }

    pub fn rebate(&self, shares: i32) -> i32 {
        (shares.max(0) * self.rebate_pct / 100).max(1)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlueProfile {
    pub tax: i32,
    pub skim_pct: i32,
    pub primary: DebuffKind,
    pub support: SupportEffect,
    pub rider: BriberyRider,
}

impl BlueProfile {
    pub fn skim(&self, opponent_shares: i32) -> i32 {
        let opponent_shares = opponent_shares.max(0);
        (self.tax + opponent_shares * self.skim_pct / 100).min(opponent_shares)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JudgeProfile {
    pub green: GreenProfile,
    pub blue: BlueProfile,
}

#[derive(Debug, Clone, Copy)]
struct CardProfile {
    resist_pct: [u32; 3],
    signature: Signature,
    judge: JudgeProfile,
}

static PROFILE_CACHE: Lazy<BTreeMap<&'static str, CardProfile>> = Lazy::new(|| {
    catalog::all_cards()
        .map(|card| (card.id, compute_profile(card.id)))
        .collect()
});

fn mix64(mut value: u64) -> u64 {
    value ^= value >> 30;
    value = value.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value ^= value >> 27;
    value = value.wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}

/// 稳定哈希：FxHasher 不随 Rust 版本变化，再经过一次 64 位混合。
pub fn card_hash(card_id: &str, salt: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(card_id.as_bytes());
    hasher.write(b":");
    hasher.write(salt.as_bytes());
    mix64(hasher.finish())
}

fn compute_resistances(card_id: &str) -> [u32; 3] {
    let mut pcts = [0u32; 3];
    for kind in DebuffKind::ALL {
        let hash = card_hash(card_id, kind.salt());
        pcts[kind.index()] = if hash % 100 < 40 {
            0
        } else {
            ((hash >> 16) % u64::from(RESIST_CAP_PCT + 1)) as u32
        };
    }
    if pcts.iter().all(|pct| *pct == 0) {
        let hash = card_hash(card_id, "resist:fallback");
        pcts[(hash % 3) as usize] = 10 + ((hash >> 8) % 16) as u32;
    }
    pcts
}

fn compute_signature(card_id: &str) -> Signature {
    let hash = card_hash(card_id, "signature");
    Signature {
        kind: SignatureKind::ALL[(hash % SignatureKind::ALL.len() as u64) as usize],
        magnitude: 1 + ((hash >> 8) % 2) as i32,
    }
}

fn support_from(bits: u64) -> SupportEffect {
    match bits % 4 {
        0 => SupportEffect::HealLeader { amount: 2 },
        1 => SupportEffect::ShieldAlly,
        2 => SupportEffect::ReduceProbation { amount: 1 },
        _ => SupportEffect::DrawCard,
    }
}

fn compute_judge_profile(card_id: &str) -> JudgeProfile {
    let green = card_hash(card_id, "judge:green");
    let blue = card_hash(card_id, "judge:blue");
    JudgeProfile {
        green: GreenProfile {
            fee: (green % 3) as i32,
            rebate_pct: 10 + 5 * ((green >> 4) % 5) as i32,
            primary: DebuffKind::ALL[((green >> 12) % 3) as usize],
            support: support_from(green >> 16),
        },
        blue: BlueProfile {
            tax: 1 + (blue % 3) as i32,
            skim_pct: 10 + 5 * ((blue >> 4) % 4) as i32,
            primary: DebuffKind::ALL[((blue >> 12) % 3) as usize],
            support: support_from(blue >> 16),
            rider: match (blue >> 20) % 4 {
                0 => BriberyRider::ExtraFavor,
                1 => BriberyRider::ClearProbation,
                2 => BriberyRider::OpponentHostility,
                _ => BriberyRider::SkimShares,
            },
        },
    }
}

fn compute_profile(card_id: &str) -> CardProfile {
    CardProfile {
        resist_pct: compute_resistances(card_id),
        signature: compute_signature(card_id),
        judge: compute_judge_profile(card_id),
    }
}

fn profile(card_id: &str) -> CardProfile {
    PROFILE_CACHE
        .get(card_id)
        .copied()
        .unwrap_or_else(|| compute_profile(card_id))
}

pub fn resistance_pct(card_id: &str, kind: DebuffKind) -> u32 {
    profile(card_id).resist_pct[kind.index()]
}

/// 抵抗某类减益的概率，范围 [0, 0.45]。
pub fn resistance_chance(card_id: &str, kind: DebuffKind) -> f64 {
    f64::from(resistance_pct(card_id, kind)) / 100.0
}

pub fn resistance_summary(card_id: &str) -> String {
    DebuffKind::ALL
        .iter()
        .map(|kind| format!("{} {}%", kind.label(), resistance_pct(card_id, *kind)))
        .collect::<Vec<_>>()
        .join(" / ")
}

pub fn fallback_signature(card_id: &str) -> Signature {
    profile(card_id).signature
}

pub fn judge_profile(card_id: &str) -> JudgeProfile {
    profile(card_id).judge
}
