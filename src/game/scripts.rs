//! 卡牌效果注册表：卡牌 id → 类型化效果脚本。
//!
//! 没有专属脚本的单位退回到程序化签名能力，法术退回到按类型的通用效果。

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use super::{
    catalog::{CardDefinition, CardKind, Faction, InstrumentKind, TargetRule},
    effects::{CardEffect, EffectCondition, EffectKind, EffectTarget, EffectTrigger},
    procedural::{self, DebuffKind, SignatureKind},
};

pub const FACTION_PRIORITY: i8 = 10;
pub const SCRIPT_PRIORITY: i8 = 5;

use EffectTarget::{
    AllEnemyFront, AllEnemyUnits, AllFriendlyUnits, AllUnits, ContextTarget, EnemyLeader, FriendlyLeader,
    SelfUnit, WeakestFriendly,
};
use EffectTrigger::{OnDeath, OnHit, OnPlay, OnSummon, OnTurnStart};

fn on(trigger: EffectTrigger, kind: EffectKind) -> CardEffect {
    CardEffect::new(trigger, SCRIPT_PRIORITY, kind)
}

fn passive(trigger: EffectTrigger, kind: EffectKind) -> CardEffect {
    CardEffect::new(trigger, FACTION_PRIORITY, kind)
}

fn debuff(kind: DebuffKind, turns: u32, target: EffectTarget) -> EffectKind {
    EffectKind::Debuff {
        kind,
        turns,
        amount: 1,
        target,
    }
}

fn both(first: EffectKind, second: EffectKind) -> EffectKind {
    EffectKind::Composite {
        effects: vec![first, second],
    }
}

static REGISTRY: Lazy<BTreeMap<&'static str, Vec<CardEffect>>> = Lazy::new(|| {
    let mut registry = BTreeMap::new();
    let mut add = |id: &'static str, effects: Vec<CardEffect>| {
        registry.insert(id, effects);
    };

    // 单位
    add("retail_meme_lord", vec![on(OnHit, EffectKind::GainShares { amount: 1 })]);
    add("retail_forum_mod", vec![on(OnTurnStart, EffectKind::Heal { amount: 1, target: SelfUnit })]);
    add(
        "retail_squeeze_captain",
        vec![on(OnSummon, EffectKind::Damage { amount: 1, target: AllEnemyFront })],
    );
    add("hedge_quant", vec![on(OnTurnStart, EffectKind::GainShares { amount: 1 })]);
    add("hedge_arbitrageur", vec![on(OnHit, EffectKind::Skim { amount: 1 })]);
    add("hedge_lobbyist", vec![on(OnSummon, EffectKind::AdjustFavor { amount: 1 })]);
    add(
        "hedge_prime_broker",
        vec![on(OnSummon, EffectKind::AddShield { charges: 1, target: WeakestFriendly })],
    );
    add(
        "mm_specialist",
        vec![on(OnTurnStart, EffectKind::Heal { amount: 1, target: AllFriendlyUnits })],
    );
    add(
        "mm_circuit_warden",
        vec![on(OnHit, debuff(DebuffKind::AttackDown, 1, ContextTarget))
            .with_condition(EffectCondition::TargetAlive)],
    );
    add(
        "mm_designated",
        vec![on(
            OnSummon,
            both(
                EffectKind::Cleanse { target: AllFriendlyUnits },
                EffectKind::Heal { amount: 3, target: FriendlyLeader },
            ),
        )],
    );
    add(
        "short_report_writer",
        vec![on(OnHit, debuff(DebuffKind::Exposed, 1, ContextTarget)).with_condition(EffectCondition::TargetAlive)],
    );
    add("short_fixer", vec![on(OnTurnStart, EffectKind::Skim { amount: 1 })]);
    add("short_vulture", vec![on(OnDeath, EffectKind::Damage { amount: 2, target: EnemyLeader })]);
    add(
        "neutral_bodyguard",
        vec![on(OnSummon, EffectKind::AddShield { charges: 1, target: SelfUnit })],
    );

    // 中立法术
    add("margin_call", vec![on(OnPlay, EffectKind::Damage { amount: 3, target: ContextTarget })]);
    add("short_squeeze", vec![on(OnPlay, EffectKind::Damage { amount: 2, target: AllEnemyFront })]);
    add("dividend", vec![on(OnPlay, EffectKind::GainShares { amount: 3 })]);
    add("insider_tip", vec![on(OnPlay, EffectKind::Draw { count: 2 })]);
    add(
        "pump_and_dump",
        vec![on(
            OnPlay,
            both(
                EffectKind::BuffAttack { amount: 3, target: ContextTarget },
                debuff(DebuffKind::Exposed, 1, ContextTarget),
            ),
        )],
    );
    add("naked_short", vec![on(OnPlay, EffectKind::NakedShort { shares: 5, debt: 5 })]);
    add("audit", vec![on(OnPlay, debuff(DebuffKind::Stun, 1, ContextTarget))]);
    add("bailout", vec![on(OnPlay, EffectKind::Heal { amount: 5, target: FriendlyLeader })]);
    add(
        "hedge_position",
        vec![on(OnPlay, EffectKind::AddShield { charges: 1, target: ContextTarget })],
    );
    add("flash_crash", vec![on(OnPlay, EffectKind::Damage { amount: 1, target: AllUnits })]);
    add(
        "spin_doctor",
        vec![on(
            OnPlay,
            both(
                EffectKind::AdjustProbation { amount: -2, opponent: false },
                EffectKind::AdjustFavor { amount: 1 },
            ),
        )],
    );
    add(
        "lobbying",
        vec![on(
            OnPlay,
            both(EffectKind::AdjustFavor { amount: 2 }, EffectKind::ShiftMood { amount: -1 }),
        )],
    );
    add(
        "stop_loss",
        vec![on(
            OnPlay,
            both(
                EffectKind::HealFull { target: ContextTarget },
                EffectKind::Cleanse { target: ContextTarget },
            ),
        )],
    );
    add("rug_pull", vec![on(OnPlay, EffectKind::Destroy { target: ContextTarget })]);
    add(
        "leaked_memo",
        vec![on(
            OnPlay,
            both(
                debuff(DebuffKind::Exposed, 2, ContextTarget),
                debuff(DebuffKind::AttackDown, 1, ContextTarget),
            ),
        )],
    );
    add("hostile_takeover", vec![on(OnPlay, EffectKind::Seize)]);
    add("circuit_breaker", vec![on(OnPlay, debuff(DebuffKind::AttackDown, 1, AllEnemyUnits))]);
    add(
        "market_rally",
        vec![on(OnPlay, EffectKind::BuffAttack { amount: 1, target: AllFriendlyUnits })],
    );
    add("liquidate", vec![on(OnPlay, EffectKind::Liquidate)]);
    add("subpoena", vec![on(OnPlay, EffectKind::Damage { amount: 3, target: ContextTarget })]);
    add(
        "whistleblower",
        vec![on(
            OnPlay,
            both(
                EffectKind::AdjustProbation { amount: 2, opponent: true },
                EffectKind::AdjustHostility { amount: 1, opponent: true },
            ),
        )],
    );
    add(
        "golden_parachute",
        vec![on(
            OnPlay,
            both(EffectKind::Heal { amount: 2, target: FriendlyLeader }, EffectKind::Draw { count: 1 }),
        )],
    );
    add("debt_restructure", vec![on(OnPlay, EffectKind::Restructure { amount: 3 })]);
    add(
        "ipo",
        vec![on(
            OnPlay,
            EffectKind::SpawnToken {
                card_id: "retail_bagholder".to_string(),
                count: 2,
            },
        )],
    );
    registry
});

pub fn has_script(card_id: &str) -> bool {
    REGISTRY.contains_key(card_id)
}

/// 单位的签名能力编译成普通效果脚本。
fn signature_effects(card_id: &str) -> Vec<CardEffect> {
    let signature = procedural::fallback_signature(card_id);
    let magnitude = signature.magnitude;
    let effect = match signature.kind {
        SignatureKind::EntryShield => on(
            OnSummon,
            EffectKind::AddShield {
                charges: magnitude as u32,
                target: SelfUnit,
            },
        ),
        SignatureKind::EntryHeal => on(
            OnSummon,
            EffectKind::Heal {
                amount: magnitude + 1,
                target: FriendlyLeader,
            },
        ),
        SignatureKind::TurnIncome => on(OnTurnStart, EffectKind::GainShares { amount: magnitude }),
        SignatureKind::TurnCleanse => on(OnTurnStart, EffectKind::Cleanse { target: SelfUnit }),
        SignatureKind::CombatExpose => on(OnHit, debuff(DebuffKind::Exposed, magnitude as u32, ContextTarget))
            .with_condition(EffectCondition::TargetAlive),
        SignatureKind::CombatFee => on(OnHit, EffectKind::GainShares { amount: magnitude }),
        SignatureKind::CombatSnowball => on(OnHit, EffectKind::Snowball { cap: 2 * magnitude }),
    };
    vec![effect]
}

fn instrument_effects(kind: InstrumentKind, power: i32, target: TargetRule) -> Vec<CardEffect> {
    let targeted = target != TargetRule::None;
    let effect = match kind {
        InstrumentKind::Strike => EffectKind::Damage {
            amount: power,
            target: if targeted { ContextTarget } else { EnemyLeader },
        },
        InstrumentKind::Remedy => EffectKind::Heal {
            amount: power,
            target: FriendlyLeader,
        },
        InstrumentKind::Research => EffectKind::Draw { count: power.max(0) as u32 },
        InstrumentKind::Capital => EffectKind::GainShares { amount: power },
        InstrumentKind::Sanction => debuff(
            DebuffKind::Exposed,
            power.max(1) as u32,
            if targeted { ContextTarget } else { AllEnemyFront },
        ),
    };
    vec![on(OnPlay, effect)]
}

/// 卡牌在某个时机的全部效果：专属脚本优先，否则走兜底。
pub fn card_effects(card: &CardDefinition, trigger: EffectTrigger) -> Vec<CardEffect> {
    let effects = match REGISTRY.get(card.id) {
        Some(effects) => effects.clone(),
        None => match card.kind {
            CardKind::Unit => signature_effects(card.id),
            CardKind::Instrument { kind, power } => instrument_effects(kind, power, card.target),
        },
    };
    effects.into_iter().filter(|effect| effect.trigger == trigger).collect()
}

/// 阵营被动，作用于该阵营玩家的全部单位与回合。
pub fn faction_effects(faction: Faction, trigger: EffectTrigger) -> Vec<CardEffect> {
    let effects = match faction {
        Faction::Retail => vec![
            passive(OnSummon, EffectKind::BuffAttack { amount: 1, target: SelfUnit })
                .with_condition(EffectCondition::FriendlyUnitsAtLeast { min: 3 }),
            passive(OnTurnStart, EffectKind::GainShares { amount: 1 })
                .with_condition(EffectCondition::FriendlyUnitsAtLeast { min: 3 }),
        ],
        Faction::HedgeFund => vec![
            passive(OnSummon, EffectKind::AddShield { charges: 1, target: SelfUnit })
                .with_condition(EffectCondition::SharesAtLeast { amount: 5 }),
            passive(OnTurnStart, EffectKind::Interest { per: 5, cap: 2 }),
        ],
        Faction::MarketMaker => vec![
            passive(OnSummon, EffectKind::Heal { amount: 1, target: FriendlyLeader }),
            passive(OnTurnStart, EffectKind::Heal { amount: 1, target: WeakestFriendly }),
        ],
        Faction::ShortSeller => vec![
            passive(OnSummon, EffectKind::Damage { amount: 1, target: EffectTarget::OpposingUnit }),
            passive(OnTurnStart, EffectKind::GainShares { amount: 1 })
                .with_condition(EffectCondition::EnemyLeaderBelowOwn),
            passive(OnHit, EffectKind::Damage { amount: 1, target: ContextTarget }).with_condition(
                EffectCondition::All {
                    conditions: vec![EffectCondition::TargetAlive, EffectCondition::TargetBelowHalf],
                },
            ),
        ],
        Faction::Neutral => Vec::new(),
    };
    effects.into_iter().filter(|effect| effect.trigger == trigger).collect()
}
