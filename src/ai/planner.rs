//! 机器人回合计划：先算出整回合动作与客户端时间轴，到点后才真正落地。
//!
//! 计划只影响结果何时可见，不影响结果本身。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::agent::{bot_to_move, run_bot_turn, BotAction};
use crate::game::rules::FatalError;
use crate::game::state::{MatchState, Side};

/// 机器人"思考"的起始延迟。
pub const THINK_DELAY_MS: u64 = 600;
/// 相邻两步动作在客户端时间轴上的间隔。
pub const ACTION_SPACING_MS: u64 = 450;

/// 计划所基于的对局快照；任一字段变化都意味着计划过期。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanKey {
    pub revision: u64,
    pub updated_at: u64,
    pub rng_counter: u64,
    pub turn: u32,
    pub active_side: Side,
}

impl PlanKey {
    pub fn of(state: &MatchState) -> Self {
        Self {
            revision: state.revision,
            updated_at: state.updated_at,
            rng_counter: state.rng_counter,
            turn: state.turn,
            active_side: state.active_side,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedAction {
    pub offset_ms: u64,
    pub action: BotAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotPlan {
    pub match_id: String,
    pub key: PlanKey,
    pub created_at: u64,
    pub ready_at: u64,
    pub actions: Vec<PlannedAction>,
}

/// 计划的持久化接口，由宿主提供实现。
pub trait PlanStore {
    fn load(&self, match_id: &str) -> Option<BotPlan>;
    fn save(&mut self, plan: BotPlan);
    fn remove(&mut self, match_id: &str) -> Option<BotPlan>;
}

#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: BTreeMap<String, BotPlan>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl PlanStore for InMemoryPlanStore {
    fn load(&self, match_id: &str) -> Option<BotPlan> {
        self.plans.get(match_id).cloned()
    }

    fn save(&mut self, plan: BotPlan) {
        self.plans.insert(plan.match_id.clone(), plan);
    }

    fn remove(&mut self, match_id: &str) -> Option<BotPlan> {
        self.plans.remove(match_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Orchestration {
    #[serde(rename = "match")]
    pub match_state: MatchState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<BotPlan>,
}

fn build_plan(state: &MatchState, now: u64) -> Result<BotPlan, FatalError> {
    let turn = run_bot_turn(state)?;
    let actions: Vec<PlannedAction> = turn
        .actions
        .into_iter()
        .enumerate()
        .map(|(index, action)| PlannedAction {
            offset_ms: THINK_DELAY_MS + index as u64 * ACTION_SPACING_MS,
            action,
        })
        .collect();
    let duration = actions.last().map_or(THINK_DELAY_MS, |last| last.offset_ms);
    Ok(BotPlan {
        match_id: state.id.clone(),
        key: PlanKey::of(state),
        created_at: now,
        ready_at: now.saturating_add(duration),
        actions,
    })
}

/// 依次重放计划动作；若出现分歧则退回即时计算。
fn replay(state: &MatchState, plan: &BotPlan) -> Result<MatchState, FatalError> {
    let mut working = state.clone();
    for planned in &plan.actions {
        let result = planned.action.apply(&working)?;
        if !result.ok {
            tracing::warn!(match_id = %state.id, error = ?result.error, "bot plan diverged on replay");
            return Ok(run_bot_turn(state)?.match_state);
        }
        working = result.match_state;
    }
    Ok(working)
}

/// 为轮到机器人的对局生成或推进计划。
///
/// 计划与当前快照不符时重新生成；`now` 到达 `ready_at` 后重放计划并从存储中移除。
/// 结果与直接调用 [`run_bot_turn`] 完全一致。
pub fn orchestrate_bot_turn<S>(store: &mut S, state: &MatchState, now: u64) -> Result<Orchestration, FatalError>
where
    S: PlanStore + ?Sized,
{
    if !bot_to_move(state) {
        store.remove(&state.id);
        return Ok(Orchestration {
            match_state: state.clone(),
            plan: None,
        });
    }

    let key = PlanKey::of(state);
    let plan = match store.load(&state.id) {
        Some(plan) if plan.key == key => plan,
        stale => {
            if stale.is_some() {
                tracing::debug!(match_id = %state.id, "bot plan is stale");
            }
            let plan = build_plan(state, now)?;
            tracing::debug!(
                match_id = %state.id,
                actions = plan.actions.len(),
                ready_at = plan.ready_at,
                "bot plan built"
            );
            store.save(plan.clone());
            plan
        }
    };

    if now < plan.ready_at {
        return Ok(Orchestration {
            match_state: state.clone(),
            plan: Some(plan),
        });
    }

    store.remove(&state.id);
    let match_state = replay(state, &plan)?;
    tracing::debug!(match_id = %state.id, revision = match_state.revision, "bot plan consumed");
    Ok(Orchestration {
        match_state,
        plan: Some(plan),
    })
}
