//! 回合流程：换牌、激活、回合开始管线、结束回合与收盘。

use super::{
    catalog,
    effects::{EffectContext, EffectTrigger},
    rules::{EndTurnInput, MulliganInput, RuleEngine, RuleError},
    scripts,
    state::{EventKind, FinishReason, GameEvent, MatchState, MatchStatus, RandomEventKind, Side},
};

pub const CURTAIN_HEALTH: i32 = 3;
pub const DIVIDEND_CRATE_HEALTH: i32 = 2;
pub const DIVIDEND_CRATE_REWARD: i32 = 2;

/// 欠债第 `debt_turns` 回合时对单位造成的伤害。
pub fn debt_damage(debt_turns: u32) -> i32 {
    1 + (debt_turns.saturating_sub(1) / 2) as i32
}

pub fn curtain_chance(debt_turns: u32) -> f64 {
    (0.15 * f64::from(debt_turns)).min(0.6)
}

impl RuleEngine {
    /// 抽一张牌：牌库空则疲劳伤害递增，手牌满则直接烧掉。
    pub(crate) fn draw_card(&mut self, state: &mut MatchState, side: Side) {
        let max_hand = state.rules.max_hand_size as usize;
        let player = state.player_mut(side);
        match player.deck.pop() {
            None => {
                player.fatigue += 1;
                let amount = player.fatigue;
                self.emit(state, GameEvent::FatigueDamage { side, amount });
                self.damage_leader(state, side, amount);
            }
            Some(card_id) if player.hand.len() >= max_hand => {
                player.discard.push(card_id.clone());
                self.emit(state, GameEvent::CardBurned { side, card_id });
            }
            Some(card_id) => {
                player.hand.push(card_id.clone());
                self.emit(state, GameEvent::CardDrawn { side, card_id });
            }
        }
    }

    pub fn apply_mulligan(&mut self, state: &mut MatchState, input: &MulliganInput) -> Result<(), RuleError> {
        let side = input.side;
        if state.status != MatchStatus::Mulligan {
            return Err(RuleError::MulliganClosed);
        }
        let player = state.player(side);
        if player.mulligan_done {
            return Err(RuleError::MulliganAlreadyDone { side });
        }
        let mut indices = input.replace.clone();
        indices.sort_unstable();
        for pair in indices.windows(2) {
            if pair[0] == pair[1] {
                return Err(RuleError::InvalidMulliganIndex { index: pair[0] });
            }
        }
        if let Some(index) = indices.iter().find(|index| **index >= player.hand.len()) {
            return Err(RuleError::InvalidMulliganIndex { index: *index });
        }

        let player = state.player_mut(side);
        for index in indices.iter().rev() {
            let card_id = player.hand.remove(*index);
            // 换下的牌压到牌库底
            player.deck.insert(0, card_id);
        }
        for _ in 0..indices.len() {
            if let Some(card_id) = player.deck.pop() {
                player.hand.push(card_id);
            }
        }
        player.mulligan_done = true;
        state.updated_at = input.now;
        self.emit(
            state,
            GameEvent::MulliganApplied {
                side,
                replaced: indices.len(),
            },
        );
        if state.players.a.mulligan_done && state.players.b.mulligan_done {
            self.activate(state, input.now)?;
        }
        Ok(())
    }

    /// 换牌时限到期：未确认的一方按保留手牌处理。
    pub(crate) fn expire_mulligan(&mut self, state: &mut MatchState, now: u64) -> Result<(), RuleError> {
        for side in [Side::A, Side::B] {
            if !state.player(side).mulligan_done {
                state.player_mut(side).mulligan_done = true;
                self.emit(state, GameEvent::MulliganApplied { side, replaced: 0 });
            }
        }
        state.updated_at = now;
        self.activate(state, now)
    }

    pub(crate) fn activate(&mut self, state: &mut MatchState, now: u64) -> Result<(), RuleError> {
        state.status = MatchStatus::Active;
        state.turn = 1;
        let first_side = state.active_side;
        self.emit(state, GameEvent::MatchActivated { first_side });
        self.start_turn(state, now)
    }

    /// 回合开始管线，顺序固定；对局一旦结束立即停止。
    pub(crate) fn start_turn(&mut self, state: &mut MatchState, now: u64) -> Result<(), RuleError> {
        let side = state.active_side;
        let turn = state.turn;
        state.updated_at = now;
        self.emit(state, GameEvent::TurnStarted { side, turn });
        tracing::debug!(match_id = %state.id, ?side, turn, rng_counter = state.rng_counter, "turn started");

        for unit in state.units.values_mut() {
            if unit.temp_attack_penalty_until_turn < turn {
                unit.temp_attack_penalty = 0;
            }
        }
        let player = state.player_mut(side);
        player.blocked_lane = None;
        player.blocked_col = None;

        self.debt_tick(state, side)?;
        if state.is_finished() {
            return Ok(());
        }

        self.judge_turn_start(state, side)?;
        if state.is_finished() {
            return Ok(());
        }

        let income = state.rules.base_income;
        self.gain_shares(state, side, income);
        self.emit(state, GameEvent::IncomeCollected { side, amount: income });
        let faction = state.player(side).faction;
        let context = EffectContext::new(EffectTrigger::OnTurnStart, side, "faction");
        self.queue_effects(scripts::faction_effects(faction, EffectTrigger::OnTurnStart), context);
        self.resolve_effects(state)?;
        if state.is_finished() {
            return Ok(());
        }

        for unit_id in state.units_of(side) {
            let Some(card_id) = state.unit(unit_id).map(|unit| unit.card_id.clone()) else { continue };
            let card = catalog::card(&card_id)?;
            let context = EffectContext::new(EffectTrigger::OnTurnStart, side, card.id).with_source_unit(unit_id);
            self.queue_effects(scripts::card_effects(card, EffectTrigger::OnTurnStart), context);
            self.resolve_effects(state)?;
            if state.is_finished() {
                return Ok(());
            }
        }

        self.draw_card(state, side);
        if state.is_finished() {
            return Ok(());
        }

        if state.mode.allows_random_events() {
            self.random_event(state, side)?;
            if state.is_finished() {
                return Ok(());
            }
        }

        self.verdict_check(state, side);
        if state.is_finished() {
            return Ok(());
        }

        self.mood_drift(state);
        state.turn_deadline_at = now.saturating_add(state.rules.turn_duration_ms);
        Ok(())
    }

    fn debt_tick(&mut self, state: &mut MatchState, side: Side) -> Result<(), RuleError> {
        if state.player(side).naked_short_debt <= 0 {
            return Ok(());
        }
        let player = state.player_mut(side);
        player.debt_turns += 1;
        let turns = player.debt_turns;
        let damage = debt_damage(turns);
        self.emit(state, GameEvent::DebtTick { side, damage, turns });

        let units = state.units_of(side);
        match state.roll_index(units.len()) {
            Some(index) => self.damage_unit(state, units[index], damage, None)?,
            None => self.damage_leader(state, side, 1),
        }
        self.resolve_effects(state)?;
        if state.is_finished() {
            return Ok(());
        }

        if state.roll_chance(curtain_chance(turns)) {
            let cols = state.empty_event_cols();
            if let Some(index) = state.roll_index(cols.len()) {
                let col = cols[index];
                let kind = EventKind::IronCurtain { debtor: side };
                let unit_id = state.spawn_event(kind, CURTAIN_HEALTH, col);
                self.emit(state, GameEvent::EventSpawned { unit_id, kind, col });
            }
        }
        Ok(())
    }

    fn random_event(&mut self, state: &mut MatchState, side: Side) -> Result<(), RuleError> {
        if !state.roll_chance(state.rules.event_chance) {
            return Ok(());
        }
        let kind = match state.roll_index(4) {
            Some(0) => RandomEventKind::DividendCrate,
            Some(1) => RandomEventKind::MarketRally,
            Some(2) => RandomEventKind::FlashCrash,
            _ => RandomEventKind::Audit,
        };
        self.emit(state, GameEvent::RandomEvent { kind });
        match kind {
            RandomEventKind::DividendCrate => {
                let cols = state.empty_event_cols();
                if let Some(index) = state.roll_index(cols.len()) {
                    let col = cols[index];
                    let kind = EventKind::Dividend {
                        reward: DIVIDEND_CRATE_REWARD,
                    };
                    let unit_id = state.spawn_event(kind, DIVIDEND_CRATE_HEALTH, col);
                    self.emit(state, GameEvent::EventSpawned { unit_id, kind, col });
                }
            }
            RandomEventKind::MarketRally => {
                self.gain_shares(state, Side::A, 2);
                self.gain_shares(state, Side::B, 2);
            }
            RandomEventKind::FlashCrash => {
                let mut units = state.units_of(side);
                units.extend(state.units_of(side.opponent()));
                for unit_id in units {
                    self.damage_unit(state, unit_id, 1, None)?;
                }
                self.resolve_effects(state)?;
            }
            RandomEventKind::Audit => {
                let enemy = side.opponent();
                let audited = if state.player(enemy).probation > state.player(side).probation {
                    enemy
                } else {
                    side
                };
                let probation = state.player(audited).probation;
                if probation > 0 {
                    self.lose_shares(state, audited, probation);
                    state.player_mut(audited).adjust_probation(-1);
                    self.emit_standing(state, audited);
                }
            }
        }
        Ok(())
    }

    pub fn end_turn(&mut self, state: &mut MatchState, input: &EndTurnInput) -> Result<(), RuleError> {
        Self::ensure_turn(state, input.side)?;
        if state.turn >= state.rules.max_turns {
            self.market_close(state);
            return Ok(());
        }
        state.turn += 1;
        state.active_side = input.side.opponent();
        self.start_turn(state, input.now)
    }

    /// 收盘：领袖血量高者胜，其次好感，再次 A 方。
    fn market_close(&mut self, state: &mut MatchState) {
        let a = &state.players.a;
        let b = &state.players.b;
        let winner = if a.leader.hp != b.leader.hp {
            if a.leader.hp > b.leader.hp {
                Side::A
            } else {
                Side::B
            }
        } else if b.favor > a.favor {
            Side::B
        } else {
            Side::A
        };
        self.finish(state, winner, FinishReason::MarketClose);
    }
}
