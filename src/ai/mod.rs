//! 机器人：单回合启发式策略与回合计划编排。

pub mod agent;
pub mod planner;

pub use agent::{bot_to_move, evaluate, maybe_run_bot, run_bot_turn, BotAction, BotAgent, BotConfig, BotTurn};
pub use planner::{orchestrate_bot_turn, BotPlan, InMemoryPlanStore, Orchestration, PlanKey, PlanStore, PlannedAction};
