use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    catalog::{self, CardDefinition, CardId, Faction, TargetRule, Trait},
    deck,
    effects::{EffectContext, EffectEngine, EffectTrigger},
    scripts,
    state::{
        Controller, FinishReason, GameEvent, IntegrityError, Lane, MatchLog, MatchMode, MatchState, MatchStatus, PlayerState,
        Players, Side, TargetRef, UnitId, UnitState, BOARD_COLS,
    },
};
use crate::config::{ConfigError, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayCardInput {
    pub side: Side,
    pub hand_index: usize,
    #[serde(default)]
    pub lane: Option<Lane>,
    #[serde(default)]
    pub col: Option<usize>,
    #[serde(default)]
    pub target: Option<TargetRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackInput {
    pub side: Side,
    pub attacker_id: UnitId,
    pub target: TargetRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MulliganInput {
    pub side: Side,
    #[serde(default)]
    pub replace: Vec<usize>,
    pub now: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndTurnInput {
    pub side: Side,
    pub now: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepayInput {
    pub side: Side,
    /// 缺省时尽量全额偿还。
    #[serde(default)]
    pub amount: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositionInput {
    pub side: Side,
    pub unit_id: UnitId,
    pub lane: Lane,
    pub col: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcedeInput {
    pub side: Side,
    pub now: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SideSetup {
    pub faction: Faction,
    #[serde(default = "human")]
    pub controller: Controller,
    /// 自带牌组（牌顶在末尾）；缺省时按种子构筑。
    #[serde(default)]
    pub deck: Option<Vec<CardId>>,
}

fn human() -> Controller {
    Controller::Human
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMatchInput {
    pub id: String,
    pub seed: u64,
    pub mode: MatchMode,
    pub a: SideSetup,
    pub b: SideSetup,
    #[serde(default)]
    pub rules: Option<EngineConfig>,
}

/// 校验失败与规则拒绝；通过 `ActionResult` 返回，不改变对局。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleError {
    #[error("match is {status:?}, not active")]
    MatchNotActive { status: MatchStatus },
    #[error("match is already finished")]
    MatchFinished,
    #[error("it is not {side:?}'s turn")]
    NotYourTurn { side: Side },
    #[error("mulligan phase is over")]
    MulliganClosed,
    #[error("{side:?} already confirmed the mulligan")]
    MulliganAlreadyDone { side: Side },
    #[error("invalid mulligan selection at index {index}")]
    InvalidMulliganIndex { index: usize },
    #[error("no card at hand index {index}")]
    InvalidHandIndex { index: usize },
    #[error("need {required} shares, have {available}")]
    InsufficientShares { required: i32, available: i32 },
    #[error("unit cards need a lane and column")]
    PlacementRequired,
    #[error("slot {lane:?}/{col} does not exist")]
    InvalidSlot { lane: Lane, col: usize },
    #[error("slot {lane:?}/{col} is frozen or behind an iron curtain")]
    SlotDenied { lane: Lane, col: usize },
    #[error("slot {lane:?}/{col} is occupied")]
    SlotOccupied { lane: Lane, col: usize },
    #[error("slot {lane:?}/{col} is reserved for a matching Judge specialist")]
    JudgeSlotMismatch { lane: Lane, col: usize },
    #[error("card requires a target")]
    TargetRequired,
    #[error("target is not valid for this card")]
    InvalidTarget,
    #[error("unit {unit_id} not found")]
    UnitNotFound { unit_id: UnitId },
    #[error("unit {unit_id} belongs to the other side")]
    NotOwner { unit_id: UnitId },
    #[error("unit {unit_id} cannot attack yet")]
    UnitNotReady { unit_id: UnitId },
    #[error("unit {unit_id} is stunned")]
    UnitStunned { unit_id: UnitId },
    #[error("unit {unit_id} stands in a frozen position")]
    AttackerDenied { unit_id: UnitId },
    #[error("unit {unit_id} attacks from the back lane without ranged")]
    BackLaneNeedsRanged { unit_id: UnitId },
    #[error("an enemy taunt unit must be attacked first")]
    TauntBlocks,
    #[error("leader is shielded by {front_units} front units")]
    LeaderShielded { front_units: usize },
    #[error("target is out of reach")]
    TargetOutOfReach,
    #[error("unit {unit_id} is not a Judge specialist")]
    NotJudgeSpecialist { unit_id: UnitId },
    #[error("attacker must sit in a Judge slot to address the Judge")]
    NotInJudgeSlot,
    #[error("reposition to {lane:?}/{col} is not allowed")]
    InvalidReposition { lane: Lane, col: usize },
    #[error("no naked short debt outstanding")]
    NoDebt,
    #[error("repayment must be at least one share")]
    NothingToRepay,
    #[error("unknown card id `{card_id}`")]
    UnknownCard { card_id: CardId },
    #[error("state integrity violated: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

/// 不能作为普通拒绝处理的错误。
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("unknown card id `{card_id}`")]
    UnknownCard { card_id: CardId },
    #[error("invalid engine config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleError>,
    #[serde(rename = "match")]
    pub match_state: MatchState,
    pub events: Vec<GameEvent>,
}

impl ActionResult {
    fn accepted(match_state: MatchState, events: Vec<GameEvent>) -> Self {
        Self {
            ok: true,
            error: None,
            match_state,
            events,
        }
    }

    fn rejected(match_state: MatchState, error: RuleError) -> Self {
        Self {
            ok: false,
            error: Some(error),
            match_state,
            events: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct RuleEngine {
    pub(crate) effects: EffectEngine,
    events: Vec<GameEvent>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 事件同时写入对局日志与本次动作的返回值。
    pub(crate) fn emit(&mut self, state: &mut MatchState, event: GameEvent) {
        state.record(event.clone());
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn ensure_active(state: &MatchState) -> Result<(), RuleError> {
        match state.status {
            MatchStatus::Active => Ok(()),
            MatchStatus::Finished => Err(RuleError::MatchFinished),
            status => Err(RuleError::MatchNotActive { status }),
        }
    }

    pub(crate) fn ensure_turn(state: &MatchState, side: Side) -> Result<(), RuleError> {
        Self::ensure_active(state)?;
        if state.active_side != side {
            return Err(RuleError::NotYourTurn { side });
        }
        Ok(())
    }

    fn ensure_integrity(state: &MatchState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    pub(crate) fn emit_standing(&mut self, state: &mut MatchState, side: Side) {
        let player = state.player(side);
        let event = GameEvent::StandingChanged {
            side,
            favor: player.favor,
            probation: player.probation,
            hostility: player.judge_hostility,
        };
        self.emit(state, event);
    }

    pub(crate) fn gain_shares(&mut self, state: &mut MatchState, side: Side, amount: i32) {
        if amount <= 0 {
            return;
        }
        state.player_mut(side).gain_shares(amount);
        self.emit(state, GameEvent::SharesGained { side, amount });
    }

    pub(crate) fn lose_shares(&mut self, state: &mut MatchState, side: Side, amount: i32) -> i32 {
        let taken = state.player_mut(side).lose_shares(amount);
        if taken > 0 {
            self.emit(state, GameEvent::SharesLost { side, amount: taken });
        }
        taken
    }

    pub(crate) fn transfer_shares(&mut self, state: &mut MatchState, from: Side, to: Side, amount: i32) {
        let taken = self.lose_shares(state, from, amount);
        self.gain_shares(state, to, taken);
    }

    /// 校验出牌目标，返回结算时使用的目标。
    pub fn validate_target(
        state: &MatchState,
        side: Side,
        rule: TargetRule,
        target: Option<TargetRef>,
    ) -> Result<Option<TargetRef>, RuleError> {
        let enemy_unit = |unit_id: UnitId| -> Result<&UnitState, RuleError> {
            state
                .unit(unit_id)
                .filter(|unit| unit.owner == side.opponent())
                .ok_or(RuleError::InvalidTarget)
        };
        if rule == TargetRule::None {
            return Ok(None);
        }
        let target = target.ok_or(RuleError::TargetRequired)?;
        match (rule, target) {
            (TargetRule::EnemyUnit, TargetRef::Unit { unit_id }) => {
                enemy_unit(unit_id)?;
            }
            (TargetRule::FriendlyUnit, TargetRef::Unit { unit_id }) => {
                state
                    .unit(unit_id)
                    .filter(|unit| unit.owner == side)
                    .ok_or(RuleError::InvalidTarget)?;
            }
            (TargetRule::EnemyUnitOrLeader, TargetRef::Unit { unit_id }) => {
                enemy_unit(unit_id)?;
            }
            (TargetRule::EnemyUnitOrLeader, TargetRef::Leader { side: target_side }) if target_side != side => {}
            (TargetRule::EventUnit, TargetRef::Event { unit_id }) if state.event_units.contains_key(&unit_id) => {}
            (TargetRule::EnemyUnitMaxAttack { max }, TargetRef::Unit { unit_id }) => {
                if enemy_unit(unit_id)?.effective_attack(state.turn) > max {
                    return Err(RuleError::InvalidTarget);
                }
            }
            (TargetRule::EnemyUnitMaxCost { max }, TargetRef::Unit { unit_id }) => {
                let unit = enemy_unit(unit_id)?;
                if catalog::card(&unit.card_id)?.cost > max {
                    return Err(RuleError::InvalidTarget);
                }
            }
            _ => return Err(RuleError::InvalidTarget),
        }
        Ok(Some(target))
    }

    /// 单位落位校验；返回被覆盖的己方单位（翻面）。
    pub fn validate_placement(
        state: &MatchState,
        side: Side,
        card: &CardDefinition,
        lane: Lane,
        col: usize,
    ) -> Result<Option<UnitId>, RuleError> {
        if col >= BOARD_COLS {
            return Err(RuleError::InvalidSlot { lane, col });
        }
        if state.is_denied(side, lane, col) {
            return Err(RuleError::SlotDenied { lane, col });
        }
        if let Some(polarity) = MatchState::slot_polarity(lane, col) {
            if card.polarity() != Some(polarity) {
                return Err(RuleError::JudgeSlotMismatch { lane, col });
            }
        }
        Ok(state.slot(side, lane, col))
    }

    pub fn play_card(&mut self, state: &mut MatchState, input: &PlayCardInput) -> Result<(), RuleError> {
        let side = input.side;
        Self::ensure_turn(state, side)?;
        let card_id = state
            .player(side)
            .hand
            .get(input.hand_index)
            .cloned()
            .ok_or(RuleError::InvalidHandIndex { index: input.hand_index })?;
        let card = catalog::card(&card_id)?;

        let mut placement = None;
        let mut target = None;
        let mut total = card.cost;
        if card.is_unit() {
            let (Some(lane), Some(col)) = (input.lane, input.col) else {
                return Err(RuleError::PlacementRequired);
            };
            let displaced = Self::validate_placement(state, side, card, lane, col)?;
            if displaced.is_some() {
                total += state.rules.flip_surcharge;
            }
            placement = Some((lane, col, displaced));
        } else {
            target = Self::validate_target(state, side, card.target, input.target)?;
        }

        let available = state.player(side).shares;
        if available < total {
            return Err(RuleError::InsufficientShares {
                required: total,
                available,
            });
        }

        let player = state.player_mut(side);
        player.shares -= total;
        player.hand.remove(input.hand_index);
        player.discard.push(card_id.clone());
        self.emit(
            state,
            GameEvent::CardPlayed {
                side,
                card_id: card_id.clone(),
                cost: total,
            },
        );

        let freeze_col = if let Some((lane, col, displaced)) = placement {
            if let Some(old) = displaced {
                state.remove_unit(old);
                self.emit(state, GameEvent::UnitDisplaced { side, unit_id: old });
            }
            let unit_id = self.summon_unit(state, side, card, lane, col);
            let context = EffectContext::new(EffectTrigger::OnSummon, side, card.id).with_source_unit(unit_id);
            let faction = state.player(side).faction;
            self.queue_effects(scripts::faction_effects(faction, EffectTrigger::OnSummon), context.clone());
            self.queue_effects(scripts::card_effects(card, EffectTrigger::OnSummon), context);
            Some(col)
        } else {
            let target_col = match target {
                Some(TargetRef::Unit { unit_id }) => state.unit(unit_id).map(|unit| unit.col),
                _ => None,
            };
            let context = EffectContext::new(EffectTrigger::OnPlay, side, card.id).with_target(target);
            self.queue_effects(scripts::card_effects(card, EffectTrigger::OnPlay), context);
            target_col
        };
        self.resolve_effects(state)?;

        if !state.is_finished() {
            self.judge_card_played(state, side, card, freeze_col);
        }
        Ok(())
    }

    fn summon_unit(&mut self, state: &mut MatchState, side: Side, card: &CardDefinition, lane: Lane, col: usize) -> UnitId {
        let unit_id = instantiate_unit(state, side, card, lane, col);
        self.emit(
            state,
            GameEvent::UnitSummoned {
                side,
                unit_id,
                card_id: card.id.to_string(),
                lane,
                col,
            },
        );
        unit_id
    }

    pub fn repay_naked_short(&mut self, state: &mut MatchState, input: &RepayInput) -> Result<(), RuleError> {
        let side = input.side;
        Self::ensure_turn(state, side)?;
        let player = state.player(side);
        if player.naked_short_debt <= 0 {
            return Err(RuleError::NoDebt);
        }
        let requested = input.amount.unwrap_or(player.naked_short_debt);
        let payment = requested.min(player.shares).min(player.naked_short_debt);
        if payment < 1 {
            return Err(RuleError::NothingToRepay);
        }
        self.lose_shares(state, side, payment);
        let player = state.player_mut(side);
        player.naked_short_debt -= payment;
        let remaining = player.naked_short_debt;
        self.emit(
            state,
            GameEvent::DebtRepaid {
                side,
                amount: payment,
                remaining,
            },
        );
        if remaining == 0 {
            self.settle_debt(state, side);
        }
        Ok(())
    }

    pub fn concede(&mut self, state: &mut MatchState, input: &ConcedeInput) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::MatchFinished);
        }
        state.updated_at = input.now;
        self.finish(state, input.side.opponent(), FinishReason::Concession);
        Ok(())
    }
}

/// 按卡牌定义生成单位并落位，不触发任何效果。
pub(crate) fn instantiate_unit(state: &mut MatchState, side: Side, card: &CardDefinition, lane: Lane, col: usize) -> UnitId {
    let id = state.allocate_id();
    let rush = card.has_trait(Trait::Rush);
    let unit = UnitState {
        id,
        owner: side,
        card_id: card.id.to_string(),
        attack: card.attack,
        base_attack: card.attack,
        health: card.health,
        max_health: card.health,
        lane,
        col,
        traits: card.traits.to_vec(),
        cannot_attack_until_turn: if rush { state.turn } else { state.turn + 1 },
        stunned_until_turn: 0,
        exposed_until_turn: 0,
        temp_attack_penalty: 0,
        temp_attack_penalty_until_turn: 0,
        shield_charges: u32::from(card.has_trait(Trait::Shield)),
    };
    state.place_unit(unit);
    id
}

/// 在副本上执行动作：成功则提交并递增修订号，规则拒绝则原样返回输入。
fn execute<F>(state: &MatchState, action: F) -> Result<ActionResult, FatalError>
where
    F: FnOnce(&mut RuleEngine, &mut MatchState) -> Result<(), RuleError>,
{
    let mut working = state.clone();
    let mut engine = RuleEngine::new();
    let outcome = action(&mut engine, &mut working).and_then(|_| RuleEngine::ensure_integrity(&working));
    match outcome {
        Ok(()) => {
            working.revision += 1;
            Ok(ActionResult::accepted(working, engine.take_events()))
        }
        Err(RuleError::UnknownCard { card_id }) => Err(FatalError::UnknownCard { card_id }),
        Err(error) => {
            tracing::debug!(match_id = %state.id, %error, "action rejected");
            Ok(ActionResult::rejected(state.clone(), error))
        }
    }
}

fn side_salt(side: Side) -> u64 {
    match side {
        Side::A => 0xa5a5_0000_0000_0001,
        Side::B => 0x5a5a_0000_0000_0002,
    }
}

fn setup_deck(setup: &SideSetup, seed: u64, side: Side, rules: &EngineConfig) -> Result<Vec<CardId>, FatalError> {
    match &setup.deck {
        Some(deck) => {
            for card_id in deck {
                if catalog::lookup(card_id).is_none() {
                    return Err(FatalError::UnknownCard {
                        card_id: card_id.clone(),
                    });
                }
            }
            Ok(deck.clone())
        }
        None => Ok(deck::build_deck(setup.faction, seed ^ side_salt(side), rules)),
    }
}

pub fn create_initial_match(input: &CreateMatchInput, now: u64) -> Result<MatchState, FatalError> {
    let rules = input.rules.clone().unwrap_or_default();
    rules.validate()?;
    let deck_a = setup_deck(&input.a, input.seed, Side::A, &rules)?;
    let deck_b = setup_deck(&input.b, input.seed, Side::B, &rules)?;

    let mut state = MatchState {
        id: input.id.clone(),
        mode: input.mode,
        status: MatchStatus::Mulligan,
        turn: 0,
        active_side: Side::A,
        seed: input.seed,
        rng_counter: 0,
        players: Players {
            a: PlayerState::new(input.a.faction, input.a.controller, deck_a, &rules),
            b: PlayerState::new(input.b.faction, input.b.controller, deck_b, &rules),
        },
        units: Default::default(),
        event_units: Default::default(),
        event_row: [None; BOARD_COLS],
        judge_mood: 0,
        log: MatchLog::with_capacity(rules.log_capacity),
        next_unit_id: 1,
        revision: 0,
        updated_at: now,
        turn_deadline_at: 0,
        mulligan_deadline_at: now.saturating_add(rules.mulligan_duration_ms),
        winner_side: None,
        finish_reason: None,
        rules,
    };

    let mut engine = RuleEngine::new();
    let first_side = if state.roll_chance(0.5) { Side::A } else { Side::B };
    state.active_side = first_side;
    for side in [Side::A, Side::B] {
        for _ in 0..state.rules.starting_hand {
            if let Some(card_id) = state.player_mut(side).deck.pop() {
                state.player_mut(side).hand.push(card_id);
            }
        }
    }
    engine.emit(
        &mut state,
        GameEvent::MatchCreated {
            seed: input.seed,
            first_side,
        },
    );
    tracing::info!(match_id = %state.id, seed = input.seed, ?first_side, mode = ?state.mode, "match created");
    Ok(state)
}

/// 沙盒/教学对局：跳过换牌阶段，直接进入第一回合。
pub fn create_sandbox_match(input: &CreateMatchInput, now: u64) -> Result<MatchState, FatalError> {
    let mut state = create_initial_match(input, now)?;
    state.players.a.mulligan_done = true;
    state.players.b.mulligan_done = true;
    let mut engine = RuleEngine::new();
    match engine.activate(&mut state, now) {
        Ok(()) => Ok(state),
        Err(RuleError::UnknownCard { card_id }) => Err(FatalError::UnknownCard { card_id }),
        Err(error) => {
            tracing::warn!(match_id = %state.id, %error, "sandbox activation failed");
            Ok(state)
        }
    }
}

pub fn play_card(state: &MatchState, input: &PlayCardInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.play_card(working, input))
}

pub fn attack(state: &MatchState, input: &AttackInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.attack(working, input))
}

pub fn apply_mulligan(state: &MatchState, input: &MulliganInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.apply_mulligan(working, input))
}

pub fn end_turn(state: &MatchState, input: &EndTurnInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.end_turn(working, input))
}

pub fn repay_naked_short(state: &MatchState, input: &RepayInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.repay_naked_short(working, input))
}

pub fn reposition_judge_specialist(state: &MatchState, input: &RepositionInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.reposition_judge_specialist(working, input))
}

pub fn concede(state: &MatchState, input: &ConcedeInput) -> Result<ActionResult, FatalError> {
    execute(state, |engine, working| engine.concede(working, input))
}

/// 处理换牌与回合超时；无事发生时原样返回。
///
/// 未知卡牌与动作入口一样视为致命错误，其余失败保持原状态。
pub fn tick_timeouts(state: &MatchState, now: u64) -> Result<MatchState, FatalError> {
    let mut working = state.clone();
    let mut engine = RuleEngine::new();
    let outcome = match working.status {
        MatchStatus::Mulligan if now >= working.mulligan_deadline_at => engine.expire_mulligan(&mut working, now),
        MatchStatus::Active if now >= working.turn_deadline_at => {
            let side = working.active_side;
            engine.end_turn(&mut working, &EndTurnInput { side, now })
        }
        _ => return Ok(working),
    };
    match outcome {
        Ok(()) => {
            working.revision += 1;
            Ok(working)
        }
        Err(RuleError::UnknownCard { card_id }) => Err(FatalError::UnknownCard { card_id }),
        Err(error) => {
            tracing::error!(match_id = %state.id, %error, "timeout transition failed");
            Ok(state.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fixtures::{active_match, give_card, place};
    use crate::game::state::{EventKind, JUDGE_COL};

    #[test]
    fn rejected_action_returns_input_unchanged() {
        let state = active_match();
        let side = state.active_side;
        let input = PlayCardInput {
            side: side.opponent(),
            hand_index: 0,
            lane: Some(Lane::Front),
            col: Some(0),
            target: None,
        };
        let result = play_card(&state, &input).expect("not fatal");
        assert!(!result.ok);
        assert_eq!(result.error, Some(RuleError::NotYourTurn { side: side.opponent() }));
        assert_eq!(result.match_state, state);
        assert!(result.events.is_empty());
    }

    #[test]
    fn unit_play_spends_shares_and_discards_card() {
        let mut state = active_match();
        let side = state.active_side;
        let index = give_card(&mut state, side, "neutral_consultant");
        state.player_mut(side).shares = 5;
        let input = PlayCardInput {
            side,
            hand_index: index,
            lane: Some(Lane::Front),
            col: Some(0),
            target: None,
        };
        let result = play_card(&state, &input).expect("not fatal");
        assert!(result.ok, "{:?}", result.error);
        let next = &result.match_state;
        let unit_id = next.slot(side, Lane::Front, 0).expect("summoned");
        assert_eq!(next.unit(unit_id).map(|unit| unit.card_id.as_str()), Some("neutral_consultant"));
        assert!(next.player(side).shares <= 3);
        assert_eq!(next.player(side).discard.last().map(String::as_str), Some("neutral_consultant"));
        assert_eq!(next.revision, state.revision + 1);
    }

    #[test]
    fn flipping_an_occupied_slot_costs_the_surcharge() {
        let mut state = active_match();
        let side = state.active_side;
        let old = place(&mut state, side, "neutral_intern", Lane::Front, 1);
        let index = give_card(&mut state, side, "neutral_intern");
        state.player_mut(side).shares = 1;
        let input = PlayCardInput {
            side,
            hand_index: index,
            lane: Some(Lane::Front),
            col: Some(1),
            target: None,
        };
        let result = play_card(&state, &input).expect("not fatal");
        assert_eq!(
            result.error,
            Some(RuleError::InsufficientShares { required: 2, available: 1 })
        );

        state.player_mut(side).shares = 2;
        let result = play_card(&state, &input).expect("not fatal");
        assert!(result.ok);
        assert!(result.match_state.unit(old).is_none());
        assert!(result
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::UnitDisplaced { unit_id, .. } if *unit_id == old)));
    }

    #[test]
    fn judge_slots_only_accept_matching_specialists() {
        let mut state = active_match();
        let side = state.active_side;
        let index = give_card(&mut state, side, "neutral_auditor");
        state.player_mut(side).shares = 10;
        let wrong = PlayCardInput {
            side,
            hand_index: index,
            lane: Some(Lane::Front),
            col: Some(JUDGE_COL),
            target: None,
        };
        let result = play_card(&state, &wrong).expect("not fatal");
        assert!(matches!(result.error, Some(RuleError::JudgeSlotMismatch { .. })));

        let right = PlayCardInput {
            lane: Some(Lane::Back),
            ..wrong
        };
        assert!(play_card(&state, &right).expect("not fatal").ok);
    }

    #[test]
    fn targeted_instrument_requires_valid_target() {
        let mut state = active_match();
        let side = state.active_side;
        let index = give_card(&mut state, side, "margin_call");
        state.player_mut(side).shares = 10;
        let own = place(&mut state, side, "neutral_bodyguard", Lane::Front, 0);
        let input = PlayCardInput {
            side,
            hand_index: index,
            lane: None,
            col: None,
            target: None,
        };
        let result = play_card(&state, &input).expect("not fatal");
        assert_eq!(result.error, Some(RuleError::TargetRequired));

        let friendly = PlayCardInput {
            target: Some(TargetRef::Unit { unit_id: own }),
            ..input
        };
        let result = play_card(&state, &friendly).expect("not fatal");
        assert_eq!(result.error, Some(RuleError::InvalidTarget));
    }

    #[test]
    fn unknown_card_in_hand_is_fatal() {
        let mut state = active_match();
        let side = state.active_side;
        state.player_mut(side).hand.push("ghost_card".into());
        let input = PlayCardInput {
            side,
            hand_index: state.player(side).hand.len() - 1,
            lane: Some(Lane::Front),
            col: Some(0),
            target: None,
        };
        let err = play_card(&state, &input).expect_err("unknown card is fatal");
        assert!(matches!(err, FatalError::UnknownCard { card_id } if card_id == "ghost_card"));
    }

    #[test]
    fn full_repayment_clears_curtains() {
        let mut state = active_match();
        let side = state.active_side;
        state.player_mut(side).naked_short_debt = 3;
        state.player_mut(side).debt_turns = 2;
        state.player_mut(side).shares = 10;
        state.spawn_event(EventKind::IronCurtain { debtor: side }, 3, 0);
        let result = repay_naked_short(&state, &RepayInput { side, amount: None }).expect("not fatal");
        assert!(result.ok);
        let next = &result.match_state;
        assert_eq!(next.player(side).naked_short_debt, 0);
        assert_eq!(next.player(side).debt_turns, 0);
        assert!(next.curtain_cols(side).is_empty());
        assert_eq!(next.player(side).shares, 7);
    }

    #[test]
    fn repay_without_shares_is_denied() {
        let mut state = active_match();
        let side = state.active_side;
        state.player_mut(side).naked_short_debt = 3;
        state.player_mut(side).shares = 0;
        let result = repay_naked_short(&state, &RepayInput { side, amount: Some(2) }).expect("not fatal");
        assert_eq!(result.error, Some(RuleError::NothingToRepay));
    }

    #[test]
    fn concession_finishes_for_the_opponent() {
        let state = active_match();
        let side = state.active_side;
        let result = concede(&state, &ConcedeInput { side, now: 5 }).expect("not fatal");
        assert!(result.ok);
        assert_eq!(result.match_state.winner_side, Some(side.opponent()));
        let again = concede(&result.match_state, &ConcedeInput { side, now: 6 }).expect("not fatal");
        assert_eq!(again.error, Some(RuleError::MatchFinished));
    }

    #[test]
    fn timeout_into_unknown_card_is_fatal() {
        let mut state = active_match();
        let incoming = state.active_side.opponent();
        let ghost = place(&mut state, incoming, "neutral_intern", Lane::Front, 0);
        state.unit_mut(ghost).expect("unit").card_id = "ghost_card".into();

        let early = tick_timeouts(&state, state.turn_deadline_at - 1).expect("nothing due yet");
        assert_eq!(early, state);
        let err = tick_timeouts(&state, state.turn_deadline_at).expect_err("unknown card is fatal");
        assert!(matches!(err, FatalError::UnknownCard { card_id } if card_id == "ghost_card"));
    }

    #[test]
    fn far_future_timestamps_saturate_deadlines() {
        let state = active_match();
        let next = tick_timeouts(&state, u64::MAX).expect("not fatal");
        assert_eq!(next.turn, state.turn + 1);
        assert_eq!(next.turn_deadline_at, u64::MAX);

        let mut input = CreateMatchInput {
            id: "late".into(),
            seed: 1,
            mode: MatchMode::Pvp,
            a: SideSetup {
                faction: Faction::Retail,
                controller: Controller::Human,
                deck: None,
            },
            b: SideSetup {
                faction: Faction::HedgeFund,
                controller: Controller::Human,
                deck: None,
            },
            rules: None,
        };
        let created = create_initial_match(&input, u64::MAX).expect("created");
        assert_eq!(created.mulligan_deadline_at, u64::MAX);
        input.mode = MatchMode::Sandbox;
        let sandbox = create_sandbox_match(&input, u64::MAX).expect("created");
        assert_eq!(sandbox.turn_deadline_at, u64::MAX);
    }

    #[test]
    fn iron_curtain_column_rejects_placement() {
        let mut state = active_match();
        let side = state.active_side;
        let index = give_card(&mut state, side, "neutral_intern");
        state.player_mut(side).shares = 10;
        state.spawn_event(EventKind::IronCurtain { debtor: side }, 3, 3);
        for lane in [Lane::Front, Lane::Back] {
            let input = PlayCardInput {
                side,
                hand_index: index,
                lane: Some(lane),
                col: Some(3),
                target: None,
            };
            let result = play_card(&state, &input).expect("not fatal");
            assert_eq!(result.error, Some(RuleError::SlotDenied { lane, col: 3 }));
        }
        let open = PlayCardInput {
            side,
            hand_index: index,
            lane: Some(Lane::Front),
            col: Some(4),
            target: None,
        };
        assert!(play_card(&state, &open).expect("not fatal").ok);
    }
}
