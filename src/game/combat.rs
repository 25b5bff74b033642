//! 伤害、护盾、死亡结算与攻击流程。

use super::{
    catalog::{self, Faction, Polarity, Trait},
    effects::{EffectContext, EffectTrigger},
    rules::{AttackInput, RuleEngine, RuleError},
    scripts,
    state::{EventKind, FinishReason, GameEvent, Lane, MatchState, MatchStatus, Side, TargetRef, UnitId},
};

/// 攻击领袖时，敌方前排单位数对应的减伤；`None` 表示无法攻击领袖。
pub fn leader_shield_reduction(front_units: usize) -> Option<i32> {
    match front_units {
        0..=2 => Some(front_units as i32),
        _ => None,
    }
}

impl RuleEngine {
    /// 扣血但不处理死亡；护盾吸收整次伤害并消耗一层。
    fn apply_unit_damage(&mut self, state: &mut MatchState, unit_id: UnitId, amount: i32) {
        if amount <= 0 {
            return;
        }
        let Some(unit) = state.unit_mut(unit_id) else { return };
        if unit.shield_charges > 0 {
            unit.shield_charges -= 1;
            let charges_left = unit.shield_charges;
            self.emit(state, GameEvent::ShieldAbsorbed { unit_id, charges_left });
            return;
        }
        unit.health -= amount;
        let health = unit.health;
        self.emit(state, GameEvent::UnitDamaged { unit_id, amount, health });
    }

    pub(crate) fn damage_unit(
        &mut self,
        state: &mut MatchState,
        unit_id: UnitId,
        amount: i32,
        killer: Option<Side>,
    ) -> Result<(), RuleError> {
        self.apply_unit_damage(state, unit_id, amount);
        if state.unit(unit_id).map(|unit| unit.health <= 0).unwrap_or(false) {
            self.destroy_unit(state, unit_id, killer)?;
        }
        Ok(())
    }

    /// 移除单位：击杀奖励、阵营反噬，并把遗言效果入栈。
    pub(crate) fn destroy_unit(
        &mut self,
        state: &mut MatchState,
        unit_id: UnitId,
        killer: Option<Side>,
    ) -> Result<(), RuleError> {
        let Some(unit) = state.remove_unit(unit_id) else {
            return Ok(());
        };
        let card = catalog::card(&unit.card_id)?;
        let owner = unit.owner;
        self.emit(
            state,
            GameEvent::UnitDestroyed {
                unit_id,
                owner,
                card_id: unit.card_id.clone(),
                killer,
            },
        );

        let enemy_killer = killer.filter(|side| *side != owner);
        if let Some(side) = enemy_killer {
            let reward = state.rules.kill_reward;
            self.gain_shares(state, side, reward);
        }
        match state.player(owner).faction {
            Faction::HedgeFund => {
                self.lose_shares(state, owner, 1);
            }
            Faction::ShortSeller => {
                if let Some(side) = enemy_killer {
                    self.damage_leader(state, side, 1);
                }
            }
            _ => {}
        }

        let context = EffectContext::new(EffectTrigger::OnDeath, owner, card.id);
        self.queue_effects(scripts::card_effects(card, EffectTrigger::OnDeath), context);
        Ok(())
    }

    pub(crate) fn damage_leader(&mut self, state: &mut MatchState, side: Side, amount: i32) {
        if amount <= 0 || state.is_finished() {
            return;
        }
        let leader = &mut state.player_mut(side).leader;
        leader.hp -= amount;
        let hp = leader.hp;
        self.emit(state, GameEvent::LeaderDamaged { side, amount, hp });
        self.check_leaders(state);
    }

    pub(crate) fn heal_leader(&mut self, state: &mut MatchState, side: Side, amount: i32) {
        let leader = &mut state.player_mut(side).leader;
        let healed = amount.min(leader.max_hp - leader.hp).max(0);
        if healed == 0 {
            return;
        }
        leader.hp += healed;
        let hp = leader.hp;
        self.emit(state, GameEvent::LeaderHealed { side, amount: healed, hp });
    }

    pub(crate) fn heal_unit(&mut self, state: &mut MatchState, unit_id: UnitId, amount: i32) {
        let Some(unit) = state.unit_mut(unit_id) else { return };
        let healed = amount.min(unit.max_health - unit.health).max(0);
        if healed == 0 {
            return;
        }
        unit.health += healed;
        let health = unit.health;
        self.emit(state, GameEvent::UnitHealed { unit_id, amount: healed, health });
    }

    pub(crate) fn damage_event(&mut self, state: &mut MatchState, event_id: UnitId, amount: i32, killer: Option<Side>) {
        if amount <= 0 {
            return;
        }
        let Some(event) = state.event_units.get_mut(&event_id) else { return };
        event.health -= amount;
        let health = event.health;
        self.emit(
            state,
            GameEvent::EventDamaged {
                unit_id: event_id,
                amount,
                health,
            },
        );
        if health <= 0 {
            self.clear_event(state, event_id, killer);
        }
    }

    /// 事件单位离场；股息箱把奖励付给击破方，铁幕直接消失。
    pub(crate) fn clear_event(&mut self, state: &mut MatchState, event_id: UnitId, killer: Option<Side>) {
        let Some(event) = state.remove_event(event_id) else { return };
        self.emit(state, GameEvent::EventCleared { unit_id: event_id, killer });
        if let (EventKind::Dividend { reward }, Some(side)) = (event.kind, killer) {
            self.gain_shares(state, side, reward);
        }
    }

    /// 双方领袖同时倒下时血量高者胜，平局判给非行动方。
    pub(crate) fn check_leaders(&mut self, state: &mut MatchState) {
        if state.is_finished() {
            return;
        }
        let a = state.players.a.leader.hp;
        let b = state.players.b.leader.hp;
        let winner = match (a <= 0, b <= 0) {
            (false, false) => return,
            (true, false) => Side::B,
            (false, true) => Side::A,
            (true, true) if a > b => Side::A,
            (true, true) if b > a => Side::B,
            (true, true) => state.active_side.opponent(),
        };
        self.finish(state, winner, FinishReason::LeaderDefeated);
    }

    pub(crate) fn finish(&mut self, state: &mut MatchState, winner: Side, reason: FinishReason) {
        if state.is_finished() {
            return;
        }
        state.status = MatchStatus::Finished;
        state.winner_side = Some(winner);
        state.finish_reason = Some(reason);
        self.effects.clear();
        self.emit(state, GameEvent::MatchFinished { winner, reason });
        tracing::info!(match_id = %state.id, ?winner, ?reason, turn = state.turn, "match finished");
    }

    pub fn attack(&mut self, state: &mut MatchState, input: &AttackInput) -> Result<(), RuleError> {
        let side = input.side;
        Self::ensure_turn(state, side)?;
        let attacker_id = input.attacker_id;
        let attacker = state
            .unit(attacker_id)
            .ok_or(RuleError::UnitNotFound { unit_id: attacker_id })?;
        if attacker.owner != side {
            return Err(RuleError::NotOwner { unit_id: attacker_id });
        }
        if attacker.is_stunned(state.turn) {
            return Err(RuleError::UnitStunned { unit_id: attacker_id });
        }
        if !attacker.is_ready(state.turn) {
            return Err(RuleError::UnitNotReady { unit_id: attacker_id });
        }
        if state.is_denied(side, attacker.lane, attacker.col) {
            return Err(RuleError::AttackerDenied { unit_id: attacker_id });
        }
        let ranged = attacker.has_trait(Trait::Ranged);
        // Judge 槽位的专员无需远程即可请愿或行贿
        if attacker.lane == Lane::Back && !ranged && input.target != TargetRef::Judge {
            return Err(RuleError::BackLaneNeedsRanged { unit_id: attacker_id });
        }
        let slot_polarity = MatchState::slot_polarity(attacker.lane, attacker.col);
        let power = attacker.effective_attack(state.turn);
        let enemy = side.opponent();

        match input.target {
            TargetRef::Leader { side: target_side } => {
                if target_side != enemy {
                    return Err(RuleError::InvalidTarget);
                }
                if !state.taunt_units(enemy).is_empty() {
                    return Err(RuleError::TauntBlocks);
                }
                let reduction = if slot_polarity == Some(Polarity::Blue) {
                    0
                } else {
                    let front_units = state.front_count(enemy);
                    leader_shield_reduction(front_units).ok_or(RuleError::LeaderShielded { front_units })?
                };
                self.declare(state, side, attacker_id, input.target);
                self.damage_leader(state, enemy, (power - reduction).max(0));
            }
            TargetRef::Unit { unit_id } => {
                let defender = state
                    .unit(unit_id)
                    .filter(|unit| unit.owner == enemy)
                    .ok_or(RuleError::InvalidTarget)?;
                let taunts = state.taunt_units(enemy);
                if !taunts.is_empty() && !taunts.contains(&unit_id) {
                    return Err(RuleError::TauntBlocks);
                }
                if defender.lane == Lane::Back && !ranged && state.slot(enemy, Lane::Front, defender.col).is_some() {
                    return Err(RuleError::TargetOutOfReach);
                }
                self.declare(state, side, attacker_id, input.target);
                self.resolve_unit_combat(state, attacker_id, unit_id)?;
            }
            TargetRef::Event { unit_id } => {
                if !state.event_units.contains_key(&unit_id) {
                    return Err(RuleError::InvalidTarget);
                }
                self.declare(state, side, attacker_id, input.target);
                self.damage_event(state, unit_id, power, Some(side));
            }
            TargetRef::Judge => {
                let polarity = slot_polarity.ok_or(RuleError::NotInJudgeSlot)?;
                match polarity {
                    Polarity::Green => {
                        self.declare(state, side, attacker_id, input.target);
                        self.petition(state, side);
                    }
                    Polarity::Blue => {
                        let cost = state.rules.bribe_cost;
                        let available = state.player(side).shares;
                        if available < cost {
                            return Err(RuleError::InsufficientShares {
                                required: cost,
                                available,
                            });
                        }
                        self.declare(state, side, attacker_id, input.target);
                        self.bribe(state, side, attacker_id);
                    }
                }
            }
        }

        let turn = state.turn;
        if let Some(unit) = state.unit_mut(attacker_id) {
            unit.cannot_attack_until_turn = turn + 1;
        }
        self.resolve_effects(state)
    }

    fn declare(&mut self, state: &mut MatchState, side: Side, attacker_id: UnitId, target: TargetRef) {
        self.emit(
            state,
            GameEvent::AttackDeclared {
                side,
                attacker_id,
                target,
            },
        );
    }

    /// 单位互殴：同时结算伤害，再触发命中效果，最后处理死亡。
    fn resolve_unit_combat(&mut self, state: &mut MatchState, attacker_id: UnitId, defender_id: UnitId) -> Result<(), RuleError> {
        let turn = state.turn;
        let (Some(attacker), Some(defender)) = (state.unit(attacker_id), state.unit(defender_id)) else {
            return Ok(());
        };
        let side = attacker.owner;
        let dealt = attacker.effective_attack(turn) + i32::from(defender.is_exposed(turn));
        let taken = defender.effective_attack(turn) + i32::from(attacker.is_exposed(turn));
        let card = catalog::card(&attacker.card_id)?;

        self.apply_unit_damage(state, defender_id, dealt);
        self.apply_unit_damage(state, attacker_id, taken);

        if dealt > 0 {
            let context = EffectContext::new(EffectTrigger::OnHit, side, card.id)
                .with_source_unit(attacker_id)
                .with_target(Some(TargetRef::Unit { unit_id: defender_id }));
            let faction = state.player(side).faction;
            self.queue_effects(scripts::faction_effects(faction, EffectTrigger::OnHit), context.clone());
            self.queue_effects(scripts::card_effects(card, EffectTrigger::OnHit), context);
            self.resolve_effects(state)?;
        }

        for (unit_id, killer) in [(defender_id, side), (attacker_id, side.opponent())] {
            if state.unit(unit_id).map(|unit| unit.health <= 0).unwrap_or(false) {
                self.destroy_unit(state, unit_id, Some(killer))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fixtures::{active_match, place};
    use crate::game::rules::attack;
    use crate::game::state::JUDGE_COL;

    fn leader_attack(state: &MatchState, attacker_id: UnitId) -> crate::game::rules::ActionResult {
        let side = state.active_side;
        attack(
            state,
            &AttackInput {
                side,
                attacker_id,
                target: TargetRef::Leader { side: side.opponent() },
            },
        )
        .expect("not fatal")
    }

    #[test]
    fn leader_shield_table() {
        assert_eq!(leader_shield_reduction(0), Some(0));
        assert_eq!(leader_shield_reduction(1), Some(1));
        assert_eq!(leader_shield_reduction(2), Some(2));
        assert_eq!(leader_shield_reduction(3), None);
        assert_eq!(leader_shield_reduction(5), None);
    }

    #[test]
    fn front_units_reduce_leader_damage_until_denied() {
        let mut state = active_match();
        let side = state.active_side;
        let enemy = side.opponent();
        let attacker = place(&mut state, side, "short_kingpin", Lane::Front, 0);
        state.unit_mut(attacker).expect("unit").cannot_attack_until_turn = 0;

        for (front, expected) in [(0usize, 6), (1, 5), (2, 4)] {
            let mut trial = state.clone();
            for col in [0usize, 1, 3].iter().take(front) {
                place(&mut trial, enemy, "neutral_intern", Lane::Front, *col);
            }
            let before = trial.player(enemy).leader.hp;
            let result = leader_attack(&trial, attacker);
            assert!(result.ok, "{:?}", result.error);
            assert_eq!(before - result.match_state.player(enemy).leader.hp, expected);
        }

        let mut crowded = state.clone();
        for col in [0usize, 1, 3] {
            place(&mut crowded, enemy, "neutral_intern", Lane::Front, col);
        }
        let result = leader_attack(&crowded, attacker);
        assert_eq!(result.error, Some(RuleError::LeaderShielded { front_units: 3 }));
    }

    #[test]
    fn blue_slot_bypasses_front_shield_but_not_taunt() {
        let mut state = active_match();
        let side = state.active_side;
        let enemy = side.opponent();
        let blue = place(&mut state, side, "hedge_lobbyist", Lane::Front, JUDGE_COL);
        state.unit_mut(blue).expect("unit").cannot_attack_until_turn = 0;
        for col in [0usize, 1, 3] {
            place(&mut state, enemy, "neutral_intern", Lane::Front, col);
        }
        let before = state.player(enemy).leader.hp;
        let result = leader_attack(&state, blue);
        assert!(result.ok, "{:?}", result.error);
        assert_eq!(before - result.match_state.player(enemy).leader.hp, 2);

        place(&mut state, enemy, "neutral_bodyguard", Lane::Front, 4);
        let result = leader_attack(&state, blue);
        assert_eq!(result.error, Some(RuleError::TauntBlocks));
    }

    #[test]
    fn shield_charges_absorb_whole_hits() {
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, "neutral_bodyguard", Lane::Front, 0);
        state.unit_mut(unit_id).expect("unit").shield_charges = 2;
        let start = state.unit(unit_id).expect("unit").health;
        let mut engine = RuleEngine::new();

        engine.damage_unit(&mut state, unit_id, 1, None).expect("damage");
        assert_eq!(state.unit(unit_id).expect("unit").health, start);
        engine.damage_unit(&mut state, unit_id, 1, None).expect("damage");
        assert_eq!(state.unit(unit_id).expect("unit").health, start);
        assert_eq!(state.unit(unit_id).expect("unit").shield_charges, 0);
        engine.damage_unit(&mut state, unit_id, 1, None).expect("damage");
        assert_eq!(state.unit(unit_id).expect("unit").health, start - 1);
    }

    #[test]
    fn trades_are_simultaneous_and_pay_kill_reward() {
        let mut state = active_match();
        let side = state.active_side;
        let enemy = side.opponent();
        let attacker = place(&mut state, side, "neutral_intern", Lane::Front, 0);
        state.unit_mut(attacker).expect("unit").cannot_attack_until_turn = 0;
        let defender = place(&mut state, enemy, "neutral_intern", Lane::Front, 0);
        let shares = state.player(side).shares;
        let result = attack(
            &state,
            &AttackInput {
                side,
                attacker_id: attacker,
                target: TargetRef::Unit { unit_id: defender },
            },
        )
        .expect("not fatal");
        assert!(result.ok, "{:?}", result.error);
        let next = &result.match_state;
        assert!(next.unit(attacker).is_none());
        assert!(next.unit(defender).is_none());
        assert!(next.player(side).shares >= shares + next.rules.kill_reward - 1);
    }

    #[test]
    fn back_lane_attacker_needs_ranged() {
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, "neutral_intern", Lane::Back, 0);
        state.unit_mut(unit_id).expect("unit").cannot_attack_until_turn = 0;
        let result = leader_attack(&state, unit_id);
        assert_eq!(result.error, Some(RuleError::BackLaneNeedsRanged { unit_id }));
    }

    #[test]
    fn attack_consumes_the_action() {
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, "neutral_consultant", Lane::Front, 0);
        state.unit_mut(unit_id).expect("unit").cannot_attack_until_turn = 0;
        let result = leader_attack(&state, unit_id);
        assert!(result.ok);
        let again = leader_attack(&result.match_state, unit_id);
        assert_eq!(again.error, Some(RuleError::UnitNotReady { unit_id }));
    }

    #[test]
    fn dividend_crate_pays_the_breaker() {
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, "neutral_consultant", Lane::Front, 0);
        state.unit_mut(unit_id).expect("unit").cannot_attack_until_turn = 0;
        let crate_id = state.spawn_event(EventKind::Dividend { reward: 2 }, 2, 4);
        let shares = state.player(side).shares;
        let result = attack(
            &state,
            &AttackInput {
                side,
                attacker_id: unit_id,
                target: TargetRef::Event { unit_id: crate_id },
            },
        )
        .expect("not fatal");
        assert!(result.ok);
        assert!(result.match_state.event_units.is_empty());
        assert_eq!(result.match_state.player(side).shares, shares + 2);
        assert_eq!(result.match_state.unit(unit_id).map(|unit| unit.health), Some(3));
    }

    fn brawl(attacker_exposed: bool, defender_exposed: bool) -> (i32, i32) {
        let mut state = active_match();
        let side = state.active_side;
        let turn = state.turn;
        let attacker = place(&mut state, side, "neutral_bodyguard", Lane::Front, 0);
        let defender = place(&mut state, side.opponent(), "neutral_bodyguard", Lane::Front, 0);
        state.unit_mut(attacker).expect("unit").cannot_attack_until_turn = 0;
        if attacker_exposed {
            state.unit_mut(attacker).expect("unit").exposed_until_turn = turn;
        }
        if defender_exposed {
            state.unit_mut(defender).expect("unit").exposed_until_turn = turn;
        }
        let result = attack(
            &state,
            &AttackInput {
                side,
                attacker_id: attacker,
                target: TargetRef::Unit { unit_id: defender },
            },
        )
        .expect("not fatal");
        assert!(result.ok, "{:?}", result.error);
        let health = |unit_id| result.match_state.unit(unit_id).map(|unit| unit.health).expect("alive");
        (health(attacker), health(defender))
    }

    #[test]
    fn exposed_units_take_one_extra_damage() {
        // 双方都是 2 攻 5 血
        assert_eq!(brawl(false, false), (3, 3));
        assert_eq!(brawl(false, true), (3, 2));
        assert_eq!(brawl(true, false), (2, 3));
    }

    #[test]
    fn iron_curtain_column_cannot_attack() {
        let mut state = active_match();
        let side = state.active_side;
        let unit_id = place(&mut state, side, "neutral_consultant", Lane::Front, 1);
        state.unit_mut(unit_id).expect("unit").cannot_attack_until_turn = 0;
        state.spawn_event(EventKind::IronCurtain { debtor: side }, 3, 1);
        let result = leader_attack(&state, unit_id);
        assert_eq!(result.error, Some(RuleError::AttackerDenied { unit_id }));

        // 对手的铁幕不影响己方
        let mut other = active_match();
        let unit_id = place(&mut other, side, "neutral_consultant", Lane::Front, 1);
        other.unit_mut(unit_id).expect("unit").cannot_attack_until_turn = 0;
        other.spawn_event(EventKind::IronCurtain { debtor: side.opponent() }, 3, 1);
        assert!(leader_attack(&other, unit_id).ok);
    }
}
