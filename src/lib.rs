pub mod ai;
pub mod config;
pub mod game;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use ai::{maybe_run_bot, orchestrate_bot_turn, run_bot_turn, BotAction, BotPlan, InMemoryPlanStore, Orchestration, PlanStore};
pub use config::{ConfigError, EngineConfig};
pub use game::{
    apply_mulligan, attack, concede, create_initial_match, create_sandbox_match, end_turn, play_card,
    repay_naked_short, reposition_judge_specialist, tick_timeouts, ActionResult, AttackInput, ConcedeInput,
    CreateMatchInput, EndTurnInput, FatalError, GameEvent, MatchState, MulliganInput, PlayCardInput, RepayInput,
    RepositionInput, RuleError,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

/// 致命错误写入浏览器控制台后再抛给调用方。
fn fatal_to_js(error: FatalError) -> JsValue {
    let message = error.to_string();
    web_sys::console::error_1(&message.clone().into());
    JsValue::from_str(&message)
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(serde_to_js_error)
}

// JS 时间戳为毫秒浮点数；负数与 NaN 归零，过大值饱和到 u64::MAX
fn millis(now: f64) -> u64 {
    now.max(0.0) as u64
}

/// 持有一局对局与机器人计划的有状态封装，输入输出均为 JSON。
#[wasm_bindgen]
pub struct MatchEngine {
    state: MatchState,
    plans: InMemoryPlanStore,
}

#[wasm_bindgen]
impl MatchEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(input_json: &str, now: f64) -> Result<MatchEngine, JsValue> {
        let input: CreateMatchInput = from_json(input_json)?;
        let state = create_initial_match(&input, millis(now)).map_err(fatal_to_js)?;
        Ok(MatchEngine {
            state,
            plans: InMemoryPlanStore::new(),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(&self.state)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: MatchState = from_json(json)?;
        state
            .integrity_check()
            .map_err(|error| serde_to_js_error(RuleError::IntegrityViolation { error }))?;
        self.state = state;
        Ok(())
    }

    pub fn play_card_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: PlayCardInput = from_json(input_json)?;
        let result = play_card(&self.state, &input);
        self.commit(result)
    }

    pub fn attack_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: AttackInput = from_json(input_json)?;
        let result = attack(&self.state, &input);
        self.commit(result)
    }

    pub fn mulligan_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: MulliganInput = from_json(input_json)?;
        let result = apply_mulligan(&self.state, &input);
        self.commit(result)
    }

    pub fn end_turn_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: EndTurnInput = from_json(input_json)?;
        let result = end_turn(&self.state, &input);
        self.commit(result)
    }

    pub fn repay_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: RepayInput = from_json(input_json)?;
        let result = repay_naked_short(&self.state, &input);
        self.commit(result)
    }

    pub fn reposition_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: RepositionInput = from_json(input_json)?;
        let result = reposition_judge_specialist(&self.state, &input);
        self.commit(result)
    }

    pub fn concede_json(&mut self, input_json: &str) -> Result<String, JsValue> {
        let input: ConcedeInput = from_json(input_json)?;
        let result = concede(&self.state, &input);
        self.commit(result)
    }

    pub fn tick(&mut self, now: f64) -> Result<String, JsValue> {
        self.state = tick_timeouts(&self.state, millis(now)).map_err(fatal_to_js)?;
        to_json(&self.state)
    }

    /// 推进机器人回合计划，返回 `{ match, plan? }`。
    pub fn bot_step(&mut self, now: f64) -> Result<String, JsValue> {
        let outcome = orchestrate_bot_turn(&mut self.plans, &self.state, millis(now)).map_err(fatal_to_js)?;
        self.state = outcome.match_state.clone();
        to_json(&outcome)
    }
}

impl MatchEngine {
    /// 成功的动作才替换持有的对局。
    fn commit(&mut self, result: Result<ActionResult, FatalError>) -> Result<String, JsValue> {
        let result = result.map_err(fatal_to_js)?;
        if result.ok {
            self.state = result.match_state.clone();
        }
        to_json(&result)
    }
}

fn run_action<I, F>(state: JsValue, input: JsValue, action: F) -> Result<JsValue, JsValue>
where
    I: DeserializeOwned,
    F: FnOnce(&MatchState, &I) -> Result<ActionResult, FatalError>,
{
    let state: MatchState = from_value(state).map_err(JsValue::from)?;
    let input: I = from_value(input).map_err(JsValue::from)?;
    let result = action(&state, &input).map_err(fatal_to_js)?;
    to_value(&result).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "createInitialMatch")]
pub fn create_initial_match_js(input: JsValue, now: f64) -> Result<JsValue, JsValue> {
    let input: CreateMatchInput = from_value(input).map_err(JsValue::from)?;
    let state = create_initial_match(&input, millis(now)).map_err(fatal_to_js)?;
    to_value(&state).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "tickTimeouts")]
pub fn tick_timeouts_js(state: JsValue, now: f64) -> Result<JsValue, JsValue> {
    let state: MatchState = from_value(state).map_err(JsValue::from)?;
    let next = tick_timeouts(&state, millis(now)).map_err(fatal_to_js)?;
    to_value(&next).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "playCard")]
pub fn play_card_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, play_card)
}

#[wasm_bindgen(js_name = "attack")]
pub fn attack_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, attack)
}

#[wasm_bindgen(js_name = "applyMulligan")]
pub fn apply_mulligan_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, apply_mulligan)
}

#[wasm_bindgen(js_name = "endTurn")]
pub fn end_turn_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, end_turn)
}

#[wasm_bindgen(js_name = "repayNakedShort")]
pub fn repay_naked_short_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, repay_naked_short)
}

#[wasm_bindgen(js_name = "repositionJudgeSpecialist")]
pub fn reposition_judge_specialist_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, reposition_judge_specialist)
}

#[wasm_bindgen(js_name = "concede")]
pub fn concede_js(state: JsValue, input: JsValue) -> Result<JsValue, JsValue> {
    run_action(state, input, concede)
}

#[wasm_bindgen(js_name = "maybeRunBot")]
pub fn maybe_run_bot_js(state: JsValue) -> Result<JsValue, JsValue> {
    let state: MatchState = from_value(state).map_err(JsValue::from)?;
    let next = maybe_run_bot(&state).map_err(fatal_to_js)?;
    to_value(&next).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: MatchState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_value(&RuleError::IntegrityViolation { error }).unwrap_or_else(|err| JsValue::from_str(&err.to_string())))
}

#[wasm_bindgen(js_name = "getResistanceChance")]
pub fn get_resistance_chance(card_id: &str, kind: JsValue) -> Result<f64, JsValue> {
    let kind: game::DebuffKind = from_value(kind).map_err(JsValue::from)?;
    Ok(game::resistance_chance(card_id, kind))
}

#[wasm_bindgen(js_name = "getResistanceSummary")]
pub fn get_resistance_summary(card_id: &str) -> String {
    game::resistance_summary(card_id)
}

#[wasm_bindgen(js_name = "getJudgeProfile")]
pub fn get_judge_profile(card_id: &str) -> Result<JsValue, JsValue> {
    to_value(&game::judge_profile(card_id)).map_err(JsValue::from)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}

#[cfg(test)]
mod tests {
    use super::millis;

    #[test]
    fn js_timestamps_clamp_into_range() {
        assert_eq!(millis(1_500.7), 1_500);
        assert_eq!(millis(-3.0), 0);
        assert_eq!(millis(f64::NAN), 0);
        assert_eq!(millis(f64::INFINITY), u64::MAX);
    }
}
