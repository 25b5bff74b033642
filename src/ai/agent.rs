//! 单回合启发式机器人。
//!
//! 机器人只通过公开入口函数行动，因此每一步都经过与真人相同的校验；
//! 被拒绝的候选直接丢弃，不会改变对局。

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::catalog::{self, CardDefinition, CardId, CardKind, TargetRule, Trait};
use crate::game::effects::{EffectKind, EffectTrigger};
use crate::game::rules::{
    self, ActionResult, AttackInput, EndTurnInput, FatalError, MulliganInput, PlayCardInput, RepayInput,
    RepositionInput, RuleEngine,
};
use crate::game::scripts;
use crate::game::state::{Controller, Lane, MatchState, MatchStatus, Side, TargetRef, UnitState, BOARD_COLS, JUDGE_COL};

const WIN_SCORE: f64 = 1_000_000.0;
/// 换牌时费用不低于该值的手牌会被换掉。
const MULLIGAN_COST_FLOOR: i32 = 5;
/// 缓刑达到该值后，谨慎的机器人不再打脏牌。
const CAUTIOUS_PROBATION: i32 = 4;

/// 机器人提交给引擎的一步操作。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotAction {
    Mulligan { input: MulliganInput },
    Repay { input: RepayInput },
    PlayCard { input: PlayCardInput },
    Attack { input: AttackInput },
    Reposition { input: RepositionInput },
    EndTurn { input: EndTurnInput },
}

impl BotAction {
    /// 通过对应的入口函数执行。
    pub fn apply(&self, state: &MatchState) -> Result<ActionResult, FatalError> {
        match self {
            BotAction::Mulligan { input } => rules::apply_mulligan(state, input),
            BotAction::Repay { input } => rules::repay_naked_short(state, input),
            BotAction::PlayCard { input } => rules::play_card(state, input),
            BotAction::Attack { input } => rules::attack(state, input),
            BotAction::Reposition { input } => rules::reposition_judge_specialist(state, input),
            BotAction::EndTurn { input } => rules::end_turn(state, input),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    pub level: u8,
    pub randomness: f64,
    /// 出牌前是否逐一模拟候选并评估局面。
    pub lookahead: bool,
    pub max_actions: usize,
}

impl BotConfig {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Self {
                level: 1,
                randomness: 0.6,
                lookahead: false,
                max_actions: 12,
            },
            2 => Self {
                level: 2,
                randomness: 0.25,
                lookahead: false,
                max_actions: 24,
            },
            _ => Self {
                level: 3,
                randomness: 0.0,
                lookahead: true,
                max_actions: 24,
            },
        }
    }

    fn cautious(&self) -> bool {
        self.level >= 2
    }
}

/// 一次机器人调用的结果：最终对局与实际生效的动作序列。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotTurn {
    #[serde(rename = "match")]
    pub match_state: MatchState,
    pub actions: Vec<BotAction>,
}

pub struct BotAgent {
    config: BotConfig,
    rng: SmallRng,
}

impl BotAgent {
    pub fn with_seed(config: BotConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// 种子取自对局状态，同一局面总得到同一决策。
    pub fn for_match(state: &MatchState, level: u8) -> Self {
        let seed = state.seed ^ state.rng_counter.rotate_left(17) ^ (u64::from(state.turn) << 40);
        Self::with_seed(BotConfig::from_level(level), seed)
    }

    /// 换掉高费牌与无法识别的牌。
    pub fn mulligan_choice(&self, state: &MatchState, side: Side) -> Vec<usize> {
        state
            .player(side)
            .hand
            .iter()
            .enumerate()
            .filter(|(_, card_id)| catalog::lookup(card_id).map_or(true, |card| card.cost >= MULLIGAN_COST_FLOOR))
            .map(|(index, _)| index)
            .collect()
    }

    /// 走完整个回合：还债、出牌、攻击、归位专员，最后结束回合。
    pub fn play_turn(
        &mut self,
        state: &mut MatchState,
        side: Side,
        actions: &mut Vec<BotAction>,
    ) -> Result<(), FatalError> {
        let start = actions.len();
        self.repay_debt(state, side, actions, start)?;
        self.deploy(state, side, actions, start)?;
        self.attack_all(state, side, actions, start)?;
        self.reposition_specialists(state, side, actions, start)?;
        if state.status == MatchStatus::Active && state.active_side == side {
            let now = state.updated_at;
            submit(
                state,
                actions,
                BotAction::EndTurn {
                    input: EndTurnInput { side, now },
                },
            )?;
        }
        Ok(())
    }

    fn can_act(&self, state: &MatchState, side: Side, actions: &[BotAction], start: usize) -> bool {
        state.status == MatchStatus::Active && state.active_side == side && actions.len() - start < self.config.max_actions
    }

    fn random_noise(&mut self) -> f64 {
        if self.config.randomness <= 0.0 {
            0.0
        } else {
            (self.rng.gen::<f64>() - 0.5) * 2.0 * self.config.randomness
        }
    }

    fn repay_debt(
        &mut self,
        state: &mut MatchState,
        side: Side,
        actions: &mut Vec<BotAction>,
        start: usize,
    ) -> Result<(), FatalError> {
        if !self.can_act(state, side, actions, start) {
            return Ok(());
        }
        let player = state.player(side);
        let debt = player.naked_short_debt;
        if debt <= 0 || player.shares <= 0 {
            return Ok(());
        }
        // 余额宽裕时全额还清，拖得太久则能还多少还多少
        let amount = if player.shares >= debt + 2 {
            None
        } else if player.debt_turns >= 2 {
            Some(player.shares)
        } else {
            return Ok(());
        };
        submit(
            state,
            actions,
            BotAction::Repay {
                input: RepayInput { side, amount },
            },
        )?;
        Ok(())
    }

    fn deploy(
        &mut self,
        state: &mut MatchState,
        side: Side,
        actions: &mut Vec<BotAction>,
        start: usize,
    ) -> Result<(), FatalError> {
        let mut skipped: Vec<CardId> = Vec::new();
        while self.can_act(state, side, actions, start) {
            let Some(input) = self.choose_play(state, side, &skipped)? else {
                break;
            };
            let card_id = state.player(side).hand.get(input.hand_index).cloned().unwrap_or_default();
            if !submit(state, actions, BotAction::PlayCard { input })? {
                skipped.push(card_id);
            }
        }
        Ok(())
    }

    /// 优先出得起的单位；没有合适单位时再考虑有合法目标的金融工具。
    fn choose_play(
        &mut self,
        state: &MatchState,
        side: Side,
        skipped: &[CardId],
    ) -> Result<Option<PlayCardInput>, FatalError> {
        let player = state.player(side);
        let mut units = Vec::new();
        let mut instruments = Vec::new();
        for (hand_index, card_id) in player.hand.iter().enumerate() {
            if skipped.contains(card_id) {
                continue;
            }
            let Some(card) = catalog::lookup(card_id) else {
                continue;
            };
            if card.cost > player.shares || self.avoids(state, side, card) {
                continue;
            }
            if card.is_unit() {
                if let Some((lane, col)) = placement(state, side, card) {
                    units.push((
                        card,
                        PlayCardInput {
                            side,
                            hand_index,
                            lane: Some(lane),
                            col: Some(col),
                            target: None,
                        },
                    ));
                }
            } else if let Some(target) = instrument_target(state, side, card) {
                instruments.push((
                    card,
                    PlayCardInput {
                        side,
                        hand_index,
                        lane: None,
                        col: None,
                        target,
                    },
                ));
            }
        }

        if let Some(input) = self.pick(state, side, units, false)? {
            return Ok(Some(input));
        }
        self.pick(state, side, instruments, true)
    }

    fn pick(
        &mut self,
        state: &MatchState,
        side: Side,
        candidates: Vec<(&'static CardDefinition, PlayCardInput)>,
        must_improve: bool,
    ) -> Result<Option<PlayCardInput>, FatalError> {
        let baseline = evaluate(state, side);
        let mut best: Option<(f64, PlayCardInput)> = None;
        for (card, input) in candidates {
            let score = if self.config.lookahead {
                let result = rules::play_card(state, &input)?;
                if !result.ok {
                    continue;
                }
                let score = evaluate(&result.match_state, side);
                if must_improve && score <= baseline {
                    continue;
                }
                score
            } else {
                f64::from(card.cost) + self.random_noise()
            };
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, input));
            }
        }
        Ok(best.map(|(_, input)| input))
    }

    fn avoids(&self, state: &MatchState, side: Side, card: &CardDefinition) -> bool {
        let player = state.player(side);
        if self.config.cautious() && card.dirty && player.probation >= CAUTIOUS_PROBATION {
            return true;
        }
        scripts::card_effects(card, EffectTrigger::OnPlay).iter().any(|effect| match effect.kind {
            EffectKind::NakedShort { .. } => player.naked_short_debt > 0,
            EffectKind::Liquidate => !self.config.lookahead,
            _ => false,
        })
    }

    fn attack_all(
        &mut self,
        state: &mut MatchState,
        side: Side,
        actions: &mut Vec<BotAction>,
        start: usize,
    ) -> Result<(), FatalError> {
        for attacker_id in state.units_of(side) {
            if !self.can_act(state, side, actions, start) {
                break;
            }
            let Some(attacker) = state.unit(attacker_id) else {
                continue;
            };
            if !attacker.is_ready(state.turn) {
                continue;
            }
            for target in self.attack_targets(state, side, attacker) {
                let input = AttackInput {
                    side,
                    attacker_id,
                    target,
                };
                if submit(state, actions, BotAction::Attack { input })? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// 攻击优先级：嘲讽 > 前排 > 领袖 > 后排 > 事件 > Judge。
    fn attack_targets(&self, state: &MatchState, side: Side, attacker: &UnitState) -> Vec<TargetRef> {
        let enemy = side.opponent();
        let turn = state.turn;
        let power = attacker.effective_attack(turn);
        let in_judge_slot = MatchState::slot_polarity(attacker.lane, attacker.col).is_some() && attacker.polarity().is_some();
        let mut targets = Vec::new();
        if power > 0 {
            let worth_it = |defender: &UnitState| {
                !self.config.cautious() || defender.health <= power || attacker.health > defender.effective_attack(turn)
            };
            let mut enemies: Vec<&UnitState> = state
                .units_of(enemy)
                .into_iter()
                .filter_map(|unit_id| state.unit(unit_id))
                .collect();
            enemies.sort_by_key(|unit| (unit.health > power, unit.health, unit.id));

            let taunts: Vec<TargetRef> = enemies
                .iter()
                .copied()
                .filter(|unit| unit.has_trait(Trait::Taunt))
                .map(|unit| TargetRef::Unit { unit_id: unit.id })
                .collect();
            targets.extend(taunts);
            targets.extend(
                enemies
                    .iter()
                    .copied()
                    .filter(|unit| unit.lane == Lane::Front && !unit.has_trait(Trait::Taunt) && worth_it(*unit))
                    .map(|unit| TargetRef::Unit { unit_id: unit.id }),
            );
            targets.push(TargetRef::Leader { side: enemy });
            targets.extend(
                enemies
                    .iter()
                    .copied()
                    .filter(|unit| unit.lane == Lane::Back && !unit.has_trait(Trait::Taunt) && worth_it(*unit))
                    .map(|unit| TargetRef::Unit { unit_id: unit.id }),
            );
            targets.extend(state.event_units.keys().map(|unit_id| TargetRef::Event { unit_id: *unit_id }));
        }
        if in_judge_slot {
            targets.push(TargetRef::Judge);
        }
        targets
    }

    fn reposition_specialists(
        &mut self,
        state: &mut MatchState,
        side: Side,
        actions: &mut Vec<BotAction>,
        start: usize,
    ) -> Result<(), FatalError> {
        for unit_id in state.units_of(side) {
            if !self.can_act(state, side, actions, start) || state.player(side).shares < state.rules.reposition_cost {
                break;
            }
            let Some(polarity) = state.unit(unit_id).and_then(UnitState::polarity) else {
                continue;
            };
            if state.judge_occupant(side, polarity).is_some() {
                continue;
            }
            let (lane, col) = MatchState::judge_slot(polarity);
            if state.is_denied(side, lane, col) {
                continue;
            }
            let input = RepositionInput {
                side,
                unit_id,
                lane,
                col,
            };
            submit(state, actions, BotAction::Reposition { input })?;
        }
        Ok(())
    }
}

/// 执行一步；被拒绝时返回 `false`，对局保持不变。
fn submit(state: &mut MatchState, actions: &mut Vec<BotAction>, action: BotAction) -> Result<bool, FatalError> {
    let result = action.apply(state)?;
    if !result.ok {
        tracing::debug!(match_id = %state.id, ?action, error = ?result.error, "bot candidate rejected");
        return Ok(false);
    }
    *state = result.match_state;
    actions.push(action);
    Ok(true)
}

/// 非 Judge 列，按离中线由近及远排列。
fn columns() -> Vec<usize> {
    let mut cols: Vec<usize> = (0..BOARD_COLS).filter(|col| *col != JUDGE_COL).collect();
    cols.sort_by_key(|col| col.abs_diff(JUDGE_COL));
    cols
}

/// 按特性选位：专员先找自己的 Judge 槽，远程偏后排，其余偏前排。只选空位。
fn placement(state: &MatchState, side: Side, card: &CardDefinition) -> Option<(Lane, usize)> {
    let mut slots = Vec::with_capacity(BOARD_COLS * 2);
    if let Some(polarity) = card.polarity() {
        slots.push(MatchState::judge_slot(polarity));
    }
    let lanes = if card.has_trait(Trait::Ranged) && !card.has_trait(Trait::Taunt) {
        [Lane::Back, Lane::Front]
    } else {
        [Lane::Front, Lane::Back]
    };
    for lane in lanes {
        slots.extend(columns().into_iter().map(|col| (lane, col)));
    }
    slots
        .into_iter()
        .find(|(lane, col)| matches!(RuleEngine::validate_placement(state, side, card, *lane, *col), Ok(None)))
}

fn instrument_target(state: &MatchState, side: Side, card: &CardDefinition) -> Option<Option<TargetRef>> {
    let enemy = side.opponent();
    let by_attack = |owner: Side| -> Vec<TargetRef> {
        let mut units: Vec<&UnitState> = state
            .units_of(owner)
            .into_iter()
            .filter_map(|unit_id| state.unit(unit_id))
            .collect();
        units.sort_by_key(|unit| (std::cmp::Reverse(unit.effective_attack(state.turn)), unit.id));
        units.into_iter().map(|unit| TargetRef::Unit { unit_id: unit.id }).collect()
    };
    let options: Vec<Option<TargetRef>> = match card.target {
        TargetRule::None => vec![None],
        TargetRule::EnemyUnit | TargetRule::EnemyUnitMaxAttack { .. } | TargetRule::EnemyUnitMaxCost { .. } => {
            by_attack(enemy).into_iter().map(Some).collect()
        }
        TargetRule::FriendlyUnit => by_attack(side).into_iter().map(Some).collect(),
        TargetRule::EnemyUnitOrLeader => {
            let power = match card.kind {
                CardKind::Instrument { power, .. } => power,
                CardKind::Unit => 0,
            };
            // 能击杀的单位优先，否则打脸
            let mut options: Vec<Option<TargetRef>> = by_attack(enemy)
                .into_iter()
                .filter(|target| match target {
                    TargetRef::Unit { unit_id } => state.unit(*unit_id).is_some_and(|unit| unit.health <= power),
                    _ => false,
                })
                .map(Some)
                .collect();
            options.push(Some(TargetRef::Leader { side: enemy }));
            options
        }
        TargetRule::EventUnit => state
            .event_units
            .keys()
            .map(|unit_id| Some(TargetRef::Event { unit_id: *unit_id }))
            .collect(),
    };
    options
        .into_iter()
        .find(|target| RuleEngine::validate_target(state, side, card.target, *target).is_ok())
}

#[derive(Debug, Clone, Copy)]
struct StrategyWeights {
    leader: f64,
    board: f64,
    hand: f64,
    shares: f64,
    standing: f64,
}

fn adaptive_weights(leader_diff: f64, board_diff: f64) -> StrategyWeights {
    StrategyWeights {
        leader: if leader_diff < 0.0 { 2.6 } else { 1.4 },
        board: if board_diff < 0.0 { 2.8 } else { 1.6 },
        hand: 0.8,
        shares: 0.5,
        standing: 1.1,
    }
}

fn board_value(state: &MatchState, side: Side) -> f64 {
    state
        .units_of(side)
        .into_iter()
        .filter_map(|unit_id| state.unit(unit_id))
        .map(|unit| {
            let attack = f64::from(unit.effective_attack(state.turn));
            let health = f64::from(unit.health.max(0));
            let taunt = if unit.has_trait(Trait::Taunt) { 1.0 } else { 0.0 };
            attack * 1.6 + health + f64::from(unit.shield_charges) * 1.5 + taunt
        })
        .sum()
}

fn standing(state: &MatchState, side: Side) -> f64 {
    let player = state.player(side);
    f64::from(player.favor) * 0.8
        - f64::from(player.probation) * 0.6
        - f64::from(player.naked_short_debt) * 0.5
        - f64::from(player.judge_hostility) * 0.5
}

/// 从 `side` 视角评估局面，越大越好。
pub fn evaluate(state: &MatchState, side: Side) -> f64 {
    if let Some(winner) = state.winner_side {
        return if winner == side { WIN_SCORE } else { -WIN_SCORE };
    }
    let enemy = side.opponent();
    let (own, other) = (state.player(side), state.player(enemy));
    let leader_diff = f64::from(own.leader.hp - other.leader.hp);
    let board_diff = board_value(state, side) - board_value(state, enemy);
    let hand_diff = own.hand.len() as f64 - other.hand.len() as f64;
    let shares_diff = f64::from(own.shares - other.shares);
    let standing_diff = standing(state, side) - standing(state, enemy);

    let weights = adaptive_weights(leader_diff, board_diff);
    leader_diff * weights.leader
        + board_diff * weights.board
        + hand_diff * weights.hand
        + shares_diff * weights.shares
        + standing_diff * weights.standing
}

/// 若有机器人需要行动则替它行动：换牌阶段处理所有未换牌的机器人方，
/// 对局进行中则走完当前机器人方的整个回合。
pub fn run_bot_turn(state: &MatchState) -> Result<BotTurn, FatalError> {
    let mut working = state.clone();
    let mut actions = Vec::new();
    match working.status {
        MatchStatus::Mulligan => {
            for side in [Side::A, Side::B] {
                let player = working.player(side);
                let Controller::Bot { level } = player.controller else {
                    continue;
                };
                if player.mulligan_done || working.status != MatchStatus::Mulligan {
                    continue;
                }
                let replace = BotAgent::for_match(&working, level).mulligan_choice(&working, side);
                let now = working.updated_at;
                submit(
                    &mut working,
                    &mut actions,
                    BotAction::Mulligan {
                        input: MulliganInput { side, replace, now },
                    },
                )?;
            }
        }
        MatchStatus::Active => {
            let side = working.active_side;
            if let Controller::Bot { level } = working.player(side).controller {
                let mut agent = BotAgent::for_match(&working, level);
                agent.play_turn(&mut working, side, &mut actions)?;
                tracing::debug!(match_id = %working.id, ?side, level, actions = actions.len(), "bot turn played");
            }
        }
        MatchStatus::Finished => {}
    }
    Ok(BotTurn {
        match_state: working,
        actions,
    })
}

pub fn maybe_run_bot(state: &MatchState) -> Result<MatchState, FatalError> {
    run_bot_turn(state).map(|turn| turn.match_state)
}

/// 当前是否轮到机器人行动。
pub fn bot_to_move(state: &MatchState) -> bool {
    match state.status {
        MatchStatus::Mulligan => [Side::A, Side::B]
            .into_iter()
            .any(|side| state.player(side).is_bot() && !state.player(side).mulligan_done),
        MatchStatus::Active => state.player(state.active_side).is_bot(),
        MatchStatus::Finished => false,
    }
}
