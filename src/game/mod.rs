//! 对局核心逻辑（状态机、规则引擎、效果与 Judge 子系统）。

pub mod catalog;
pub mod combat;
pub mod deck;
pub mod effects;
pub mod judge;
pub mod procedural;
pub mod rng;
pub mod rules;
pub mod scripts;
pub mod state;
pub mod turn;

pub use catalog::{CardDefinition, CardId, CardKind, Faction, InstrumentKind, Polarity, TargetRule, Trait};
pub use effects::{
    CardEffect, EffectCondition, EffectContext, EffectEngine, EffectKind, EffectStack, EffectTarget, EffectTrigger,
};
pub use procedural::{judge_profile, resistance_chance, resistance_summary, DebuffKind, JudgeProfile};
pub use rules::{
    apply_mulligan, attack, concede, create_initial_match, create_sandbox_match, end_turn, play_card,
    repay_naked_short, reposition_judge_specialist, tick_timeouts, ActionResult, AttackInput, ConcedeInput,
    CreateMatchInput, EndTurnInput, FatalError, MulliganInput, PlayCardInput, RepayInput, RepositionInput,
    RuleEngine, RuleError, SideSetup,
};
pub use state::{
    Controller, FinishReason, GameEvent, IntegrityError, Lane, MatchMode, MatchState, MatchStatus, PlayerState,
    Side, TargetRef, UnitId, UnitState, BOARD_COLS, JUDGE_COL,
};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::catalog::{self, Faction};
    use super::rules::{create_initial_match, create_sandbox_match, instantiate_unit, CreateMatchInput, SideSetup};
    use super::state::{Controller, Lane, MatchMode, MatchState, Side, UnitId};

    fn input(mode: MatchMode) -> CreateMatchInput {
        CreateMatchInput {
            id: "fixture".into(),
            seed: 7,
            mode,
            a: SideSetup {
                faction: Faction::Retail,
                controller: Controller::Human,
                deck: None,
            },
            b: SideSetup {
                faction: Faction::MarketMaker,
                controller: Controller::Human,
                deck: None,
            },
            rules: None,
        }
    }

    /// 已进入第一回合、棋盘为空的沙盒对局。
    pub fn active_match() -> MatchState {
        create_sandbox_match(&input(MatchMode::Sandbox), 0).expect("fixture match")
    }

    pub fn mulligan_match() -> MatchState {
        create_initial_match(&input(MatchMode::Pvp), 0).expect("fixture match")
    }

    /// 直接落位，不触发任何效果。
    pub fn place(state: &mut MatchState, side: Side, card_id: &str, lane: Lane, col: usize) -> UnitId {
        let card = catalog::card(card_id).expect("catalog card");
        instantiate_unit(state, side, card, lane, col)
    }

    pub fn give_card(state: &mut MatchState, side: Side, card_id: &str) -> usize {
        let hand = &mut state.player_mut(side).hand;
        hand.push(card_id.to_string());
        hand.len() - 1
    }
}
