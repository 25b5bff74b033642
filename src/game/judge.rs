//! Judge 子系统：脏牌抓捕、Judge 槽位影响、请愿与贿赂、裁决和情绪漂移。

use super::{
    catalog::{CardDefinition, Polarity},
    procedural::{self, BriberyRider, DebuffKind, SupportEffect},
    rules::{RepositionInput, RuleEngine, RuleError},
    state::{FinishReason, GameEvent, Lane, MatchState, Side, UnitId, BOARD_COLS, JUDGE_COL},
};

/// 敌意达到该值时，Judge 会在回合开始冻结一条战线。
pub const HOSTILITY_FREEZE_AT: i32 = 3;

/// 脏牌被抓的概率，对缓刑与 Judge 情绪单调不减。
pub fn catch_chance(dirty_power: i32, probation: i32, mood: i32) -> f64 {
    let raw = 0.10 + 0.05 * f64::from(dirty_power) + 0.06 * f64::from(probation) + 0.03 * f64::from(mood);
    raw.clamp(0.02, 0.90)
}

pub fn petition_chance(probation: i32, mood: i32) -> f64 {
    (0.5 - 0.05 * f64::from(probation) - 0.05 * f64::from(mood)).clamp(0.1, 0.9)
}

pub fn verdict_chance(favor: i32, threshold: i32, probation: i32, mood: i32) -> f64 {
    let raw = 0.04 + 0.02 * f64::from(favor - threshold) - 0.01 * f64::from(probation) - 0.01 * f64::from(mood);
    raw.clamp(0.01, 0.2)
}

fn pct(chance: f64) -> u32 {
    (chance * 100.0).round() as u32
}

impl RuleEngine {
    /// 出牌后的 Judge 审视：干净牌加好感，脏牌掷骰抓捕。
    pub(crate) fn judge_card_played(
        &mut self,
        state: &mut MatchState,
        side: Side,
        card: &CardDefinition,
        col: Option<usize>,
    ) {
        if !card.dirty {
            let player = state.player_mut(side);
            player.adjust_favor(1);
            player.adjust_probation(-1);
            self.emit_standing(state, side);
            return;
        }

        let chance = catch_chance(card.dirty_power, state.player(side).probation, state.judge_mood);
        if !state.roll_chance(chance) {
            return;
        }
        let confiscate = state.player(side).shares.min(card.dirty_power + 1);
        let confiscated = self.lose_shares(state, side, confiscate);
        let player = state.player_mut(side);
        player.adjust_probation(1 + card.dirty_power);
        player.adjust_favor(-2);
        player.judge_hostility += 1;
        player.blocked_col = Some(col.unwrap_or(JUDGE_COL));
        self.emit(
            state,
            GameEvent::JudgeCaught {
                side,
                card_id: card.id.to_string(),
                chance_pct: pct(chance),
                confiscated,
            },
        );
        self.emit_standing(state, side);
        tracing::debug!(match_id = %state.id, ?side, card = card.id, chance, "judge caught dirty play");

        // 抓捕眩晕不经过抗性判定
        let units = state.units_of(side);
        if !units.is_empty() && state.roll_chance(state.rules.catch_stun_chance) {
            if let Some(index) = state.roll_index(units.len()) {
                let unit_id = units[index];
                self.force_debuff(state, unit_id, DebuffKind::Stun, 1, 0);
                self.emit(state, GameEvent::CatchStun { unit_id });
            }
        }
    }

    fn opposing_judge_unit(state: &MatchState, side: Side, lane: Lane) -> Option<UnitId> {
        let enemy = side.opponent();
        let other = match lane {
            Lane::Front => Lane::Back,
            Lane::Back => Lane::Front,
        };
        state
            .slot(enemy, lane, JUDGE_COL)
            .or_else(|| state.slot(enemy, other, JUDGE_COL))
    }

    fn apply_support(&mut self, state: &mut MatchState, side: Side, specialist: UnitId, support: SupportEffect) {
        match support {
            SupportEffect::HealLeader { amount } => self.heal_leader(state, side, amount),
            SupportEffect::ShieldAlly => {
                let target = state
                    .units_of(side)
                    .into_iter()
                    .filter(|id| *id != specialist)
                    .filter_map(|id| state.unit(id))
                    .min_by_key(|unit| (unit.health, unit.id))
                    .map(|unit| unit.id)
                    .unwrap_or(specialist);
                self.add_shield(state, target, 1);
            }
            SupportEffect::ReduceProbation { amount } => {
                state.player_mut(side).adjust_probation(-amount);
                self.emit_standing(state, side);
            }
            SupportEffect::DrawCard => self.draw_card(state, side),
        }
    }

    /// 回合开始时双方 Judge 槽位的经济、主减益与辅助效果。
    pub(crate) fn judge_turn_start(&mut self, state: &mut MatchState, side: Side) -> Result<(), RuleError> {
        let enemy = side.opponent();
        for polarity in [Polarity::Green, Polarity::Blue] {
            let Some(unit_id) = state.judge_occupant(side, polarity) else { continue };
            let Some(card_id) = state.unit(unit_id).map(|unit| unit.card_id.clone()) else { continue };
            let profile = procedural::judge_profile(&card_id);
            self.emit(state, GameEvent::JudgeInfluence { side, polarity, unit_id });
            let (lane, primary, support) = match polarity {
                Polarity::Green => {
                    let green = profile.green;
                    let upkeep = green.upkeep(state.turn);
                    self.lose_shares(state, side, upkeep);
                    let rebate = green.rebate(state.player(side).shares);
                    self.gain_shares(state, side, rebate);
                    (Lane::Back, green.primary, green.support)
                }
                Polarity::Blue => {
                    let blue = profile.blue;
                    let skim = blue.skim(state.player(enemy).shares);
                    self.transfer_shares(state, enemy, side, skim);
                    (Lane::Front, blue.primary, blue.support)
                }
            };
            if let Some(target) = Self::opposing_judge_unit(state, side, lane) {
                self.apply_debuff(state, target, primary, 1, 1);
            }
            self.apply_support(state, side, unit_id, support);
            self.resolve_effects(state)?;
            if state.is_finished() {
                return Ok(());
            }
        }

        let holds_both = state.judge_occupant(side, Polarity::Green).is_some()
            && state.judge_occupant(side, Polarity::Blue).is_some();
        if holds_both && state.roll_chance(state.rules.combo_chance) {
            state.player_mut(side).adjust_favor(1);
            self.gain_shares(state, side, 2);
            self.emit(state, GameEvent::JudgeCombo { side });
            self.emit_standing(state, side);
        }

        if state.player(side).judge_hostility >= HOSTILITY_FREEZE_AT {
            let board = &state.player(side).board;
            let front = board.front.iter().flatten().count();
            let back = board.back.iter().flatten().count();
            let lane = if back > front { Lane::Back } else { Lane::Front };
            let player = state.player_mut(side);
            player.blocked_lane = Some(lane);
            player.judge_hostility -= 1;
            self.emit(state, GameEvent::JudgeFreeze { side, lane });
            self.emit_standing(state, side);
        }
        Ok(())
    }

    pub(crate) fn petition(&mut self, state: &mut MatchState, side: Side) {
        let player = state.player(side);
        let chance = petition_chance(player.probation, state.judge_mood);
        let success = state.roll_chance(chance);
        let player = state.player_mut(side);
        if success {
            player.adjust_favor(2);
            player.adjust_probation(-1);
            player.judge_hostility = (player.judge_hostility - 1).max(0);
        } else {
            player.adjust_probation(1);
        }
        self.emit(state, GameEvent::Petition { side, success });
        self.emit_standing(state, side);
    }

    pub(crate) fn bribe(&mut self, state: &mut MatchState, side: Side, specialist: UnitId) {
        let cost = state.rules.bribe_cost;
        self.lose_shares(state, side, cost);
        state.player_mut(side).adjust_favor(1);
        let card_id = state.unit(specialist).map(|unit| unit.card_id.clone()).unwrap_or_default();
        let rider = procedural::judge_profile(&card_id).blue.rider;
        let enemy = side.opponent();
        match rider {
            BriberyRider::ExtraFavor => state.player_mut(side).adjust_favor(1),
            BriberyRider::ClearProbation => state.player_mut(side).probation = 0,
            BriberyRider::OpponentHostility => {
                state.player_mut(enemy).judge_hostility += 1;
                self.emit_standing(state, enemy);
            }
            BriberyRider::SkimShares => self.transfer_shares(state, enemy, side, 1),
        }
        self.emit(state, GameEvent::Bribe { side, rider });
        self.emit_standing(state, side);
    }

    /// 好感达到门槛后掷骰，成功即由 Judge 判定胜负。
    pub(crate) fn verdict_check(&mut self, state: &mut MatchState, side: Side) {
        let threshold = state.rules.verdict_threshold;
        let player = state.player(side);
        if player.favor < threshold {
            return;
        }
        let chance = verdict_chance(player.favor, threshold, player.probation, state.judge_mood);
        if state.roll_chance(chance) {
            tracing::info!(match_id = %state.id, ?side, chance, "judge verdict");
            self.finish(state, side, FinishReason::Verdict);
        }
    }

    pub(crate) fn mood_drift(&mut self, state: &mut MatchState) {
        let roll = state.roll();
        if roll < 0.25 {
            self.shift_mood(state, -1);
        } else if roll >= 0.75 {
            self.shift_mood(state, 1);
        }
    }

    pub fn reposition_judge_specialist(
        &mut self,
        state: &mut MatchState,
        input: &RepositionInput,
    ) -> Result<(), RuleError> {
        let side = input.side;
        Self::ensure_turn(state, side)?;
        let (lane, col) = (input.lane, input.col);
        let unit = state
            .unit(input.unit_id)
            .ok_or(RuleError::UnitNotFound { unit_id: input.unit_id })?;
        if unit.owner != side {
            return Err(RuleError::NotOwner { unit_id: unit.id });
        }
        let polarity = unit
            .polarity()
            .ok_or(RuleError::NotJudgeSpecialist { unit_id: unit.id })?;
        if col >= BOARD_COLS {
            return Err(RuleError::InvalidSlot { lane, col });
        }
        let into_judge = MatchState::judge_slot(polarity) == (lane, col);
        let out_of_judge = MatchState::slot_polarity(unit.lane, unit.col).is_some()
            && MatchState::slot_polarity(lane, col).is_none();
        if !into_judge && !out_of_judge {
            return Err(RuleError::InvalidReposition { lane, col });
        }
        if state.slot(side, lane, col).is_some() {
            return Err(RuleError::SlotOccupied { lane, col });
        }
        if state.is_denied(side, lane, col) {
            return Err(RuleError::SlotDenied { lane, col });
        }
        let cost = state.rules.reposition_cost;
        let available = state.player(side).shares;
        if available < cost {
            return Err(RuleError::InsufficientShares {
                required: cost,
                available,
            });
        }

        self.lose_shares(state, side, cost);
        let turn = state.turn;
        if let Some(mut unit) = state.remove_unit(input.unit_id) {
            unit.lane = lane;
            unit.col = col;
            unit.cannot_attack_until_turn = turn + 1;
            state.place_unit(unit);
        }
        self.emit(
            state,
            GameEvent::UnitRepositioned {
                unit_id: input.unit_id,
                lane,
                col,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fixtures::{active_match, place};
    use crate::game::rng::sample_at;
    use crate::game::rules::{attack, reposition_judge_specialist, AttackInput};
    use crate::game::state::TargetRef;

    fn influence(state: &mut MatchState, side: Side) -> Vec<GameEvent> {
        let mut engine = RuleEngine::new();
        engine.judge_turn_start(state, side).expect("turn start");
        engine.take_events()
    }

    #[test]
    fn catch_chance_is_monotone_and_clamped() {
        for power in 0..4 {
            for mood in -3..=3 {
                let mut last = 0.0;
                for probation in 0..20 {
                    let chance = catch_chance(power, probation, mood);
                    assert!(chance >= last);
                    assert!((0.02..=0.90).contains(&chance));
                    last = chance;
                }
            }
            for probation in 0..5 {
                let mut last = 0.0;
                for mood in -3..=3 {
                    let chance = catch_chance(power, probation, mood);
                    assert!(chance >= last);
                    last = chance;
                }
            }
        }
        assert!((catch_chance(0, 0, -3) - 0.02).abs() < 1e-9);
        assert!((catch_chance(3, 20, 3) - 0.90).abs() < 1e-9);
    }

    #[test]
    fn verdict_and_petition_stay_in_bounds() {
        assert!((verdict_chance(12, 12, 0, 0) - 0.04).abs() < 1e-9);
        assert!((verdict_chance(40, 12, 0, -3) - 0.2).abs() < 1e-9);
        assert!((verdict_chance(12, 12, 10, 3) - 0.01).abs() < 1e-9);
        assert!((petition_chance(0, 0) - 0.5).abs() < 1e-9);
        assert!((petition_chance(20, 3) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn clean_play_improves_standing() {
        let mut state = active_match();
        let side = state.active_side;
        state.player_mut(side).probation = 2;
        let card = crate::game::catalog::card("neutral_intern").expect("card");
        let counter = state.rng_counter;
        let mut engine = RuleEngine::new();
        engine.judge_card_played(&mut state, side, card, Some(0));
        assert_eq!(state.player(side).favor, 1);
        assert_eq!(state.player(side).probation, 1);
        assert_eq!(state.rng_counter, counter, "clean plays never roll");
    }

    #[test]
    fn caught_dirty_play_is_penalised() {
        let card = crate::game::catalog::card("insider_tip").expect("card");
        // 找到一个会被抓的随机游标位置
        let base = active_match();
        let side = base.active_side;
        let caught = (0..200u64).find_map(|offset| {
            let mut state = base.clone();
            state.rng_counter = offset;
            state.player_mut(side).shares = 10;
            state.player_mut(side).favor = 3;
            let mut engine = RuleEngine::new();
            engine.judge_card_played(&mut state, side, card, None);
            (state.player(side).probation > 0).then_some(state)
        });
        let state = caught.expect("a catch within 200 draws");
        let player = state.player(side);
        assert_eq!(player.probation, 1 + card.dirty_power);
        assert_eq!(player.shares, 10 - (card.dirty_power + 1));
        assert_eq!(player.favor, 1);
        assert_eq!(player.judge_hostility, 1);
        assert_eq!(player.blocked_col, Some(JUDGE_COL));
    }

    #[test]
    fn judge_target_requires_a_judge_slot() {
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, "neutral_consultant", Lane::Front, 0);
        state.unit_mut(unit_id).expect("unit").cannot_attack_until_turn = 0;
        let result = attack(
            &state,
            &AttackInput {
                side,
                attacker_id: unit_id,
                target: TargetRef::Judge,
            },
        )
        .expect("not fatal");
        assert_eq!(result.error, Some(RuleError::NotInJudgeSlot));
    }

    #[test]
    fn green_specialist_petitions_from_the_back_lane() {
        let mut state = active_match();
        let side = state.active_side;
        let green = place(&mut state, side, "neutral_auditor", Lane::Back, JUDGE_COL);
        state.unit_mut(green).expect("unit").cannot_attack_until_turn = 0;
        let counter = state.rng_counter;
        let result = attack(
            &state,
            &AttackInput {
                side,
                attacker_id: green,
                target: TargetRef::Judge,
            },
        )
        .expect("not fatal");
        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.match_state.rng_counter, counter + 1);
        assert!(result
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::Petition { side: petitioner, .. } if *petitioner == side)));
    }

    #[test]
    fn bribe_needs_shares_and_adds_favor() {
        let mut state = active_match();
        let side = state.active_side;
        let blue = place(&mut state, side, "hedge_lobbyist", Lane::Front, JUDGE_COL);
        state.unit_mut(blue).expect("unit").cannot_attack_until_turn = 0;
        state.player_mut(side).shares = 1;
        let input = AttackInput {
            side,
            attacker_id: blue,
            target: TargetRef::Judge,
        };
        let result = attack(&state, &input).expect("not fatal");
        assert!(matches!(result.error, Some(RuleError::InsufficientShares { .. })));

        state.player_mut(side).shares = 5;
        let result = attack(&state, &input).expect("not fatal");
        assert!(result.ok);
        assert!(result.match_state.player(side).favor >= 1);
        assert!(result
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::Bribe { .. })));
    }

    #[test]
    fn specialists_move_into_their_slot_only() {
        let mut state = active_match();
        let side = state.active_side;
        state.player_mut(side).shares = 5;
        let green = place(&mut state, side, "neutral_auditor", Lane::Front, 0);
        let wrong = reposition_judge_specialist(
            &state,
            &RepositionInput {
                side,
                unit_id: green,
                lane: Lane::Front,
                col: JUDGE_COL,
            },
        )
        .expect("not fatal");
        assert!(matches!(wrong.error, Some(RuleError::InvalidReposition { .. })));

        let moved = reposition_judge_specialist(
            &state,
            &RepositionInput {
                side,
                unit_id: green,
                lane: Lane::Back,
                col: JUDGE_COL,
            },
        )
        .expect("not fatal");
        assert!(moved.ok, "{:?}", moved.error);
        let next = &moved.match_state;
        assert_eq!(next.judge_occupant(side, Polarity::Green), Some(green));
        assert_eq!(next.player(side).shares, 5 - next.rules.reposition_cost);
        assert!(!next.unit(green).expect("unit").is_ready(next.turn));
    }

    #[test]
    fn green_slot_pays_upkeep_then_rebates() {
        let mut state = active_match();
        let side = state.active_side;
        let green = place(&mut state, side, "neutral_auditor", Lane::Back, JUDGE_COL);
        state.player_mut(side).shares = 10;
        let profile = procedural::judge_profile("neutral_auditor").green;
        let after_fee = 10 - profile.upkeep(state.turn).min(10);
        let expected = after_fee + profile.rebate(after_fee);

        let events = influence(&mut state, side);
        assert_eq!(state.player(side).shares, expected);
        assert!(events.contains(&GameEvent::JudgeInfluence {
            side,
            polarity: Polarity::Green,
            unit_id: green,
        }));
    }

    #[test]
    fn blue_slot_skims_the_opponent() {
        let mut state = active_match();
        let side = state.active_side;
        let enemy = side.opponent();
        place(&mut state, side, "hedge_lobbyist", Lane::Front, JUDGE_COL);
        state.player_mut(side).shares = 0;
        state.player_mut(enemy).shares = 10;
        let skim = procedural::judge_profile("hedge_lobbyist").blue.skim(10);
        assert!(skim > 0);

        influence(&mut state, side);
        assert_eq!(state.player(side).shares, skim);
        assert_eq!(state.player(enemy).shares, 10 - skim);
    }

    #[test]
    fn holding_both_slots_rolls_the_combo() {
        let mut base = active_match();
        let side = base.active_side;
        place(&mut base, side, "neutral_auditor", Lane::Back, JUDGE_COL);
        place(&mut base, side, "hedge_lobbyist", Lane::Front, JUDGE_COL);

        let mut sure = base.clone();
        sure.rules.combo_chance = 1.0;
        let favor = sure.player(side).favor;
        let events = influence(&mut sure, side);
        assert!(events.contains(&GameEvent::JudgeCombo { side }));
        assert_eq!(sure.player(side).favor, favor + 1);

        let mut never = base.clone();
        never.rules.combo_chance = 0.0;
        let events = influence(&mut never, side);
        assert!(!events.contains(&GameEvent::JudgeCombo { side }));
        assert!(never.rng_counter > base.rng_counter, "the combo still rolls");
    }

    #[test]
    fn hostile_judge_freezes_the_busier_lane() {
        let mut state = active_match();
        let side = state.active_side;
        place(&mut state, side, "neutral_intern", Lane::Back, 0);
        place(&mut state, side, "neutral_intern", Lane::Back, 1);
        place(&mut state, side, "neutral_intern", Lane::Front, 0);
        state.player_mut(side).judge_hostility = HOSTILITY_FREEZE_AT;

        let events = influence(&mut state, side);
        assert_eq!(state.player(side).blocked_lane, Some(Lane::Back));
        assert_eq!(state.player(side).judge_hostility, HOSTILITY_FREEZE_AT - 1);
        assert!(events.contains(&GameEvent::JudgeFreeze { side, lane: Lane::Back }));

        let mut calm = active_match();
        calm.player_mut(side).judge_hostility = HOSTILITY_FREEZE_AT - 1;
        influence(&mut calm, side);
        assert_eq!(calm.player(side).blocked_lane, None);
    }

    #[test]
    fn verdict_ends_the_match_for_the_favoured_side() {
        let mut state = active_match();
        let side = state.active_side;
        let threshold = state.rules.verdict_threshold;
        state.player_mut(side).favor = threshold + 8;
        let probation = state.player(side).probation;
        let chance = verdict_chance(threshold + 8, threshold, probation, state.judge_mood);
        state.rng_counter = (0..10_000u64)
            .find(|counter| sample_at(state.seed, *counter) < chance)
            .expect("a winning draw");

        let mut engine = RuleEngine::new();
        engine.verdict_check(&mut state, side);
        assert!(state.is_finished());
        assert_eq!(state.winner_side, Some(side));
        assert_eq!(state.finish_reason, Some(FinishReason::Verdict));
    }

    #[test]
    fn verdict_needs_the_threshold() {
        let mut state = active_match();
        let side = state.active_side;
        state.player_mut(side).favor = state.rules.verdict_threshold - 1;
        let counter = state.rng_counter;
        let mut engine = RuleEngine::new();
        engine.verdict_check(&mut state, side);
        assert!(!state.is_finished());
        assert_eq!(state.rng_counter, counter);
    }
}
