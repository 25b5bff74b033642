use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::{
    catalog::{self, CardId},
    procedural::{self, DebuffKind},
    rules::{RuleEngine, RuleError},
    state::{EventKind, GameEvent, Lane, MatchState, Side, TargetRef, UnitId, BOARD_COLS, JUDGE_COL},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectTrigger {
    OnPlay,
    OnSummon,
    OnTurnStart,
    OnHit,
    OnDeath,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    ContextTarget,
    SelfUnit,
    OpposingUnit,
    WeakestFriendly,
    AllFriendlyUnits,
    AllEnemyUnits,
    AllEnemyFront,
    AllUnits,
    FriendlyLeader,
    EnemyLeader,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectCondition {
    FriendlyUnitsAtLeast { min: usize },
    SharesAtLeast { amount: i32 },
    EnemyLeaderBelowOwn,
    TargetAlive,
    TargetBelowHalf,
    All { conditions: Vec<EffectCondition> },
}

impl EffectCondition {
    pub fn is_satisfied(&self, ctx: &EffectContext, state: &MatchState) -> bool {
        match self {
            EffectCondition::FriendlyUnitsAtLeast { min } => state.units_of(ctx.source_side).len() >= *min,
            EffectCondition::SharesAtLeast { amount } => state.player(ctx.source_side).shares >= *amount,
            EffectCondition::EnemyLeaderBelowOwn => {
                state.player(ctx.source_side.opponent()).leader.hp < state.player(ctx.source_side).leader.hp
            }
            EffectCondition::TargetAlive => ctx
                .target_unit()
                .and_then(|id| state.unit(id))
                .map(|unit| unit.health > 0)
                .unwrap_or(false),
            EffectCondition::TargetBelowHalf => ctx
                .target_unit()
                .and_then(|id| state.unit(id))
                .map(|unit| unit.health * 2 < unit.max_health)
                .unwrap_or(false),
            EffectCondition::All { conditions } => {
                conditions.iter().all(|condition| condition.is_satisfied(ctx, state))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    Damage { amount: i32, target: EffectTarget },
    Heal { amount: i32, target: EffectTarget },
    HealFull { target: EffectTarget },
    GainShares { amount: i32 },
    Skim { amount: i32 },
    Interest { per: i32, cap: i32 },
    Draw { count: u32 },
    BuffAttack { amount: i32, target: EffectTarget },
    Snowball { cap: i32 },
    AddShield { charges: u32, target: EffectTarget },
    Debuff { kind: DebuffKind, turns: u32, amount: i32, target: EffectTarget },
    Cleanse { target: EffectTarget },
    AdjustFavor { amount: i32 },
    AdjustProbation { amount: i32, opponent: bool },
    AdjustHostility { amount: i32, opponent: bool },
    ShiftMood { amount: i32 },
    NakedShort { shares: i32, debt: i32 },
    Restructure { amount: i32 },
    Destroy { target: EffectTarget },
    Liquidate,
    Seize,
    SpawnToken { card_id: String, count: u32 },
    Composite { effects: Vec<EffectKind> },
    Conditional { condition: Box<EffectCondition>, effect: Box<EffectKind> },
}

/// 卡牌脚本中的一条触发效果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardEffect {
    pub trigger: EffectTrigger,
    #[serde(default)]
    pub priority: i8,
    pub kind: EffectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EffectCondition>,
}

impl CardEffect {
    pub fn new(trigger: EffectTrigger, priority: i8, kind: EffectKind) -> Self {
        Self {
            trigger,
            priority,
            kind,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: EffectCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn can_trigger(&self, ctx: &EffectContext, state: &MatchState) -> bool {
        self.condition
            .as_ref()
            .map(|condition| condition.is_satisfied(ctx, state))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectContext {
    pub trigger: EffectTrigger,
    pub source_side: Side,
    pub source_card: CardId,
    pub source_unit: Option<UnitId>,
    pub target: Option<TargetRef>,
}

impl EffectContext {
    pub fn new(trigger: EffectTrigger, source_side: Side, source_card: impl Into<CardId>) -> Self {
        Self {
            trigger,
            source_side,
            source_card: source_card.into(),
            source_unit: None,
            target: None,
        }
    }

    pub fn with_source_unit(mut self, unit_id: UnitId) -> Self {
        self.source_unit = Some(unit_id);
        self
    }

    pub fn with_target(mut self, target: Option<TargetRef>) -> Self {
        self.target = target;
        self
    }

    pub fn target_unit(&self) -> Option<UnitId> {
        match self.target {
            Some(TargetRef::Unit { unit_id }) => Some(unit_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct StackItem {
    priority: i8,
    order: u64,
    effect: CardEffect,
    context: EffectContext,
}

impl PartialEq for StackItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.order == other.order
    }
}

impl Eq for StackItem {}

impl PartialOrd for StackItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StackItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// 按优先级结算、同优先级先进先出的效果栈。
#[derive(Default)]
pub struct EffectStack {
    heap: BinaryHeap<StackItem>,
    order: u64,
}

impl EffectStack {
    pub fn push(&mut self, effect: CardEffect, context: EffectContext) {
        self.order += 1;
        self.heap.push(StackItem {
            priority: effect.priority,
            order: self.order,
            effect,
            context,
        });
    }

    fn pop(&mut self) -> Option<StackItem> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[derive(Default)]
pub struct EffectEngine {
    stack: EffectStack,
}

impl EffectEngine {
    pub fn queue_effects(&mut self, effects: Vec<CardEffect>, context: EffectContext) {
        for effect in effects {
            if effect.trigger == context.trigger {
                self.stack.push(effect, context.clone());
            }
        }
    }

    pub fn stack(&self) -> &EffectStack {
        &self.stack
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

impl RuleEngine {
    pub(crate) fn queue_effects(&mut self, effects: Vec<CardEffect>, context: EffectContext) {
        self.effects.queue_effects(effects, context);
    }

    /// 结算栈中全部效果；结算期间阵亡单位的遗言会继续入栈。
    pub(crate) fn resolve_effects(&mut self, state: &mut MatchState) -> Result<(), RuleError> {
        while let Some(item) = self.effects.stack.pop() {
            if state.is_finished() {
                self.effects.stack.clear();
                break;
            }
            if !item.effect.can_trigger(&item.context, state) {
                continue;
            }
            self.apply_kind(state, &item.effect.kind, &item.context)?;
        }
        Ok(())
    }

    fn target_units(&self, state: &MatchState, target: EffectTarget, ctx: &EffectContext) -> Vec<UnitId> {
        let own = ctx.source_side;
        let enemy = own.opponent();
        match target {
            EffectTarget::ContextTarget => ctx.target_unit().filter(|id| state.unit(*id).is_some()).into_iter().collect(),
            EffectTarget::SelfUnit => ctx.source_unit.filter(|id| state.unit(*id).is_some()).into_iter().collect(),
            EffectTarget::OpposingUnit => ctx
                .source_unit
                .and_then(|id| state.unit(id))
                .and_then(|unit| {
                    state
                        .slot(enemy, Lane::Front, unit.col)
                        .or_else(|| state.slot(enemy, Lane::Back, unit.col))
                })
                .into_iter()
                .collect(),
            EffectTarget::WeakestFriendly => state
                .units_of(own)
                .into_iter()
                .filter_map(|id| state.unit(id))
                .filter(|unit| unit.health < unit.max_health)
                .max_by(|a, b| (a.max_health - a.health).cmp(&(b.max_health - b.health)).then(b.id.cmp(&a.id)))
                .map(|unit| unit.id)
                .into_iter()
                .collect(),
            EffectTarget::AllFriendlyUnits => state.units_of(own),
            EffectTarget::AllEnemyUnits => state.units_of(enemy),
            EffectTarget::AllEnemyFront => state.player(enemy).board.front.iter().flatten().copied().collect(),
            EffectTarget::AllUnits => {
                let mut units = state.units_of(own);
                units.extend(state.units_of(enemy));
                units
            }
            EffectTarget::FriendlyLeader | EffectTarget::EnemyLeader => Vec::new(),
        }
    }

    fn leader_target(target: EffectTarget, ctx: &EffectContext) -> Option<Side> {
        match target {
            EffectTarget::FriendlyLeader => Some(ctx.source_side),
            EffectTarget::EnemyLeader => Some(ctx.source_side.opponent()),
            EffectTarget::ContextTarget => match ctx.target {
                Some(TargetRef::Leader { side }) => Some(side),
                _ => None,
            },
            _ => None,
        }
    }

    fn apply_kind(&mut self, state: &mut MatchState, kind: &EffectKind, ctx: &EffectContext) -> Result<(), RuleError> {
        let own = ctx.source_side;
        match kind {
            EffectKind::Damage { amount, target } => {
                if let Some(side) = Self::leader_target(*target, ctx) {
                    self.damage_leader(state, side, *amount);
                } else if let (EffectTarget::ContextTarget, Some(TargetRef::Event { unit_id })) = (target, ctx.target) {
                    self.damage_event(state, unit_id, *amount, Some(own));
                } else {
                    for unit_id in self.target_units(state, *target, ctx) {
                        self.damage_unit(state, unit_id, *amount, Some(own))?;
                    }
                }
            }
            EffectKind::Heal { amount, target } => {
                if let Some(side) = Self::leader_target(*target, ctx) {
                    self.heal_leader(state, side, *amount);
                } else {
                    for unit_id in self.target_units(state, *target, ctx) {
                        self.heal_unit(state, unit_id, *amount);
                    }
                }
            }
            EffectKind::HealFull { target } => {
                for unit_id in self.target_units(state, *target, ctx) {
                    let missing = state.unit(unit_id).map(|unit| unit.max_health - unit.health).unwrap_or(0);
                    self.heal_unit(state, unit_id, missing);
                }
            }
            EffectKind::GainShares { amount } => self.gain_shares(state, own, *amount),
            EffectKind::Skim { amount } => self.transfer_shares(state, own.opponent(), own, *amount),
            EffectKind::Interest { per, cap } => {
                let interest = (state.player(own).shares / (*per).max(1)).min(*cap);
                self.gain_shares(state, own, interest);
            }
            EffectKind::Draw { count } => {
                for _ in 0..*count {
                    self.draw_card(state, own);
                }
            }
            EffectKind::BuffAttack { amount, target } => {
                for unit_id in self.target_units(state, *target, ctx) {
                    if let Some(unit) = state.unit_mut(unit_id) {
                        unit.attack += amount;
                        let event = GameEvent::AttackBuffed {
                            unit_id,
                            amount: *amount,
                            attack: unit.attack,
                        };
                        self.emit(state, event);
                    }
                }
            }
            EffectKind::Snowball { cap } => {
                if let Some(unit) = ctx.source_unit.and_then(|id| state.unit_mut(id)) {
                    if unit.attack < unit.base_attack + cap {
                        unit.attack += 1;
                        let event = GameEvent::AttackBuffed {
                            unit_id: unit.id,
                            amount: 1,
                            attack: unit.attack,
                        };
                        self.emit(state, event);
                    }
                }
            }
            EffectKind::AddShield { charges, target } => {
                for unit_id in self.target_units(state, *target, ctx) {
                    self.add_shield(state, unit_id, *charges);
                }
            }
            EffectKind::Debuff { kind, turns, amount, target } => {
                for unit_id in self.target_units(state, *target, ctx) {
                    self.apply_debuff(state, unit_id, *kind, *turns, *amount);
                }
            }
            EffectKind::Cleanse { target } => {
                for unit_id in self.target_units(state, *target, ctx) {
                    self.cleanse_unit(state, unit_id);
                }
            }
            EffectKind::AdjustFavor { amount } => {
                state.player_mut(own).adjust_favor(*amount);
                self.emit_standing(state, own);
            }
            EffectKind::AdjustProbation { amount, opponent } => {
                let side = if *opponent { own.opponent() } else { own };
                state.player_mut(side).adjust_probation(*amount);
                self.emit_standing(state, side);
            }
            EffectKind::AdjustHostility { amount, opponent } => {
                let side = if *opponent { own.opponent() } else { own };
                let player = state.player_mut(side);
                player.judge_hostility = (player.judge_hostility + amount).max(0);
                self.emit_standing(state, side);
            }
            EffectKind::ShiftMood { amount } => self.shift_mood(state, *amount),
            EffectKind::NakedShort { shares, debt } => {
                self.gain_shares(state, own, *shares);
                let player = state.player_mut(own);
                player.naked_short_debt += debt;
                let event = GameEvent::DebtTaken {
                    side: own,
                    debt: player.naked_short_debt,
                };
                self.emit(state, event);
            }
            EffectKind::Restructure { amount } => {
                let player = state.player_mut(own);
                let paid = (*amount).min(player.naked_short_debt).max(0);
                player.naked_short_debt -= paid;
                let remaining = player.naked_short_debt;
                self.emit(
                    state,
                    GameEvent::DebtRepaid {
                        side: own,
                        amount: paid,
                        remaining,
                    },
                );
                if remaining == 0 {
                    self.settle_debt(state, own);
                } else if let Some(curtain) = self.first_curtain(state, own) {
                    self.clear_event(state, curtain, None);
                }
            }
            EffectKind::Destroy { target } => {
                for unit_id in self.target_units(state, *target, ctx) {
                    self.destroy_unit(state, unit_id, Some(own))?;
                }
            }
            EffectKind::Liquidate => {
                if let Some(unit_id) = self.target_units(state, EffectTarget::ContextTarget, ctx).first().copied() {
                    let card_id = state.unit(unit_id).map(|unit| unit.card_id.clone()).unwrap_or_default();
                    let refund = catalog::card(&card_id)?.cost + 1;
                    self.destroy_unit(state, unit_id, None)?;
                    self.gain_shares(state, own, refund);
                }
            }
            EffectKind::Seize => {
                if let Some(unit_id) = self.target_units(state, EffectTarget::ContextTarget, ctx).first().copied() {
                    self.seize_unit(state, unit_id, own)?;
                }
            }
            EffectKind::SpawnToken { card_id, count } => {
                let card = catalog::card(card_id)?;
                for _ in 0..*count {
                    let Some((lane, col)) = first_open_slot(state, own) else { break };
                    let unit_id = super::rules::instantiate_unit(state, own, card, lane, col);
                    self.emit(
                        state,
                        GameEvent::UnitSummoned {
                            side: own,
                            unit_id,
                            card_id: card.id.to_string(),
                            lane,
                            col,
                        },
                    );
                }
            }
            EffectKind::Composite { effects } => {
                for effect in effects {
                    self.apply_kind(state, effect, ctx)?;
                }
            }
            EffectKind::Conditional { condition, effect } => {
                if condition.is_satisfied(ctx, state) {
                    self.apply_kind(state, effect, ctx)?;
                }
            }
        }
        Ok(())
    }

    /// 通用减益入口：先按卡牌抗性掷骰，未抵抗才生效。
    ///
    /// 抗性为 0 时不掷骰，不推进随机游标。
    pub(crate) fn apply_debuff(
        &mut self,
        state: &mut MatchState,
        unit_id: UnitId,
        kind: DebuffKind,
        turns: u32,
        amount: i32,
    ) -> bool {
        let Some(card_id) = state.unit(unit_id).map(|unit| unit.card_id.clone()) else {
            return false;
        };
        let pct = procedural::resistance_pct(&card_id, kind);
        if pct > 0 && state.roll_chance(f64::from(pct) / 100.0) {
            self.emit(
                state,
                GameEvent::DebuffResisted {
                    unit_id,
                    kind,
                    chance_pct: pct,
                },
            );
            return false;
        }
        self.force_debuff(state, unit_id, kind, turns, amount);
        true
    }

    /// 不经抗性判定直接施加减益。
    pub(crate) fn force_debuff(
        &mut self,
        state: &mut MatchState,
        unit_id: UnitId,
        kind: DebuffKind,
        turns: u32,
        amount: i32,
    ) {
        let until_turn = state.turn + 2 * turns.max(1);
        let Some(unit) = state.unit_mut(unit_id) else { return };
        match kind {
            DebuffKind::Exposed => unit.exposed_until_turn = unit.exposed_until_turn.max(until_turn),
            DebuffKind::Stun => unit.stunned_until_turn = unit.stunned_until_turn.max(until_turn),
            DebuffKind::AttackDown => {
                unit.temp_attack_penalty = unit.temp_attack_penalty.max(amount.max(1));
                unit.temp_attack_penalty_until_turn = unit.temp_attack_penalty_until_turn.max(until_turn);
            }
        }
        self.emit(state, GameEvent::DebuffApplied { unit_id, kind, until_turn });
    }

    pub(crate) fn cleanse_unit(&mut self, state: &mut MatchState, unit_id: UnitId) {
        let Some(unit) = state.unit_mut(unit_id) else { return };
        unit.stunned_until_turn = 0;
        unit.exposed_until_turn = 0;
        unit.temp_attack_penalty = 0;
        unit.temp_attack_penalty_until_turn = 0;
        self.emit(state, GameEvent::UnitCleansed { unit_id });
    }

    pub(crate) fn add_shield(&mut self, state: &mut MatchState, unit_id: UnitId, charges: u32) {
        let Some(unit) = state.unit_mut(unit_id) else { return };
        unit.shield_charges += charges;
        let charges = unit.shield_charges;
        self.emit(state, GameEvent::ShieldGained { unit_id, charges });
    }

    pub(crate) fn shift_mood(&mut self, state: &mut MatchState, delta: i32) {
        let mood = (state.judge_mood + delta).clamp(-3, 3);
        if mood != state.judge_mood {
            state.judge_mood = mood;
            self.emit(state, GameEvent::MoodShifted { mood });
        }
    }

    fn first_curtain(&self, state: &MatchState, side: Side) -> Option<UnitId> {
        state
            .event_units
            .values()
            .find(|event| matches!(event.kind, EventKind::IronCurtain { debtor } if debtor == side))
            .map(|event| event.id)
    }

    /// 债务还清：清零计数并撤除该方全部铁幕。
    pub(crate) fn settle_debt(&mut self, state: &mut MatchState, side: Side) {
        state.player_mut(side).debt_turns = 0;
        while let Some(curtain) = self.first_curtain(state, side) {
            self.clear_event(state, curtain, None);
        }
    }

    fn seize_unit(&mut self, state: &mut MatchState, unit_id: UnitId, to: Side) -> Result<(), RuleError> {
        let Some(unit) = state.unit(unit_id) else { return Ok(()) };
        let from = unit.owner;
        let preferred = (unit.lane, unit.col);
        let mirrored_free = state.slot(to, preferred.0, preferred.1).is_none()
            && MatchState::slot_polarity(preferred.0, preferred.1).is_none()
            && !state.is_denied(to, preferred.0, preferred.1);
        let destination = if mirrored_free {
            Some(preferred)
        } else {
            first_open_slot(state, to)
        };
        let Some((lane, col)) = destination else {
            return self.destroy_unit(state, unit_id, Some(to));
        };
        let Some(mut unit) = state.remove_unit(unit_id) else { return Ok(()) };
        unit.owner = to;
        unit.lane = lane;
        unit.col = col;
        unit.cannot_attack_until_turn = state.turn + 1;
        state.place_unit(unit);
        self.emit(state, GameEvent::UnitSeized { unit_id, from, to });
        Ok(())
    }
}

/// 第一个可用的非 Judge 空位，前排优先。
pub(crate) fn first_open_slot(state: &MatchState, side: Side) -> Option<(Lane, usize)> {
    Lane::ALL.iter().find_map(|lane| {
        (0..BOARD_COLS)
            .filter(|col| *col != JUDGE_COL)
            .find(|col| state.slot(side, *lane, *col).is_none() && !state.is_denied(side, *lane, *col))
            .map(|col| (*lane, col))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fixtures::{active_match, place};
    use crate::game::rng::sample_at;

    fn effect(priority: i8) -> CardEffect {
        CardEffect::new(EffectTrigger::OnPlay, priority, EffectKind::GainShares { amount: priority as i32 })
    }

    #[test]
    fn stack_pops_by_priority_then_fifo() {
        let mut stack = EffectStack::default();
        let ctx = EffectContext::new(EffectTrigger::OnPlay, Side::A, "dividend");
        stack.push(effect(5), ctx.clone());
        stack.push(effect(10), ctx.clone());
        stack.push(effect(5), ctx.clone());
        let first = stack.pop().expect("item");
        assert_eq!(first.priority, 10);
        let second = stack.pop().expect("item");
        let third = stack.pop().expect("item");
        assert!(second.order < third.order, "same priority resolves in insertion order");
        assert!(stack.is_empty());
    }

    #[test]
    fn queue_filters_by_trigger() {
        let mut engine = EffectEngine::default();
        let ctx = EffectContext::new(EffectTrigger::OnSummon, Side::B, "retail_ape");
        engine.queue_effects(
            vec![
                CardEffect::new(EffectTrigger::OnSummon, 5, EffectKind::GainShares { amount: 1 }),
                CardEffect::new(EffectTrigger::OnHit, 5, EffectKind::GainShares { amount: 1 }),
            ],
            ctx,
        );
        assert_eq!(engine.stack().len(), 1);
    }

    /// 第一张对 `kind` 抗性满足条件的单位牌。
    fn unit_with_resistance<F>(accept: F) -> (&'static str, DebuffKind, u32)
    where
        F: Fn(u32) -> bool,
    {
        catalog::all_cards()
            .filter(|card| card.is_unit())
            .flat_map(|card| {
                DebuffKind::ALL
                    .iter()
                    .map(move |kind| (card.id, *kind, procedural::resistance_pct(card.id, *kind)))
            })
            .find(|(_, _, pct)| accept(*pct))
            .expect("catalog covers the resistance case")
    }

    #[test]
    fn resisted_debuff_costs_one_roll_and_changes_nothing() {
        let (card_id, kind, pct) = unit_with_resistance(|pct| pct > 0);
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, card_id, Lane::Front, 0);
        state.rng_counter = (0..10_000u64)
            .find(|counter| sample_at(state.seed, *counter) < f64::from(pct) / 100.0)
            .expect("a resisting draw");
        let counter = state.rng_counter;
        let before = state.unit(unit_id).cloned();

        let mut engine = RuleEngine::new();
        assert!(!engine.apply_debuff(&mut state, unit_id, kind, 2, 1));
        assert_eq!(state.rng_counter, counter + 1);
        assert_eq!(state.unit(unit_id).cloned(), before);
        assert_eq!(
            engine.take_events(),
            vec![GameEvent::DebuffResisted {
                unit_id,
                kind,
                chance_pct: pct,
            }]
        );
    }

    #[test]
    fn zero_resistance_applies_without_rolling() {
        let (card_id, kind, _) = unit_with_resistance(|pct| pct == 0);
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, card_id, Lane::Front, 0);
        let counter = state.rng_counter;

        let mut engine = RuleEngine::new();
        assert!(engine.apply_debuff(&mut state, unit_id, kind, 1, 1));
        assert_eq!(state.rng_counter, counter);
        let until_turn = state.turn + 2;
        assert_eq!(
            engine.take_events(),
            vec![GameEvent::DebuffApplied { unit_id, kind, until_turn }]
        );
    }

    #[test]
    fn seized_unit_avoids_denied_columns() {
        let mut state = active_match();
        let side = state.active_side;
        let enemy = side.opponent();
        let unit_id = place(&mut state, enemy, "neutral_intern", Lane::Front, 0);
        state.player_mut(side).blocked_col = Some(0);

        let mut engine = RuleEngine::new();
        engine.seize_unit(&mut state, unit_id, side).expect("seize");
        let unit = state.unit(unit_id).expect("seized");
        assert_eq!(unit.owner, side);
        assert_eq!((unit.lane, unit.col), (Lane::Front, 1));
        assert!(state.integrity_check().is_ok());

        let mut open = active_match();
        let unit_id = place(&mut open, enemy, "neutral_intern", Lane::Back, 3);
        engine.seize_unit(&mut open, unit_id, side).expect("seize");
        let unit = open.unit(unit_id).expect("seized");
        assert_eq!((unit.owner, unit.lane, unit.col), (side, Lane::Back, 3));
    }
}
