//! 规则参数。每局对战在创建时保存一份快照，保证回放一致。

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: i64 },
    #[error("{field} must be within [0, 1] (got {value})")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("starting hand {hand} exceeds max hand size {max}")]
    HandTooLarge { hand: u32, max: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub deck_size: u32,
    pub copy_cap: u32,
    pub dirty_copy_cap: u32,
    pub leader_hp: i32,
    pub starting_shares: i32,
    pub base_income: i32,
    pub starting_hand: u32,
    pub max_hand_size: u32,
    pub turn_duration_ms: u64,
    pub mulligan_duration_ms: u64,
    pub max_turns: u32,
    pub log_capacity: usize,
    pub flip_surcharge: i32,
    pub kill_reward: i32,
    pub bribe_cost: i32,
    pub reposition_cost: i32,
    pub verdict_threshold: i32,
    pub event_chance: f64,
    pub combo_chance: f64,
    pub catch_stun_chance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deck_size: 100,
            copy_cap: 5,
            dirty_copy_cap: 2,
            leader_hp: 30,
            starting_shares: 3,
            base_income: 3,
            starting_hand: 5,
            max_hand_size: 10,
            turn_duration_ms: 60_000,
            mulligan_duration_ms: 30_000,
            max_turns: 120,
            log_capacity: 80,
            flip_surcharge: 1,
            kill_reward: 1,
            bribe_cost: 2,
            reposition_cost: 1,
            verdict_threshold: 12,
            event_chance: 0.2,
            combo_chance: 0.3,
            catch_stun_chance: 0.5,
        }
    }
}

impl EngineConfig {
    /// 从 JSON 读取，缺失字段使用默认值。
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives: [(&'static str, i64); 8] = [
            ("deck_size", self.deck_size as i64),
            ("copy_cap", self.copy_cap as i64),
            ("leader_hp", self.leader_hp as i64),
            ("max_hand_size", self.max_hand_size as i64),
            ("turn_duration_ms", self.turn_duration_ms as i64),
            ("mulligan_duration_ms", self.mulligan_duration_ms as i64),
            ("max_turns", self.max_turns as i64),
            ("log_capacity", self.log_capacity as i64),
        ];
        for (field, value) in positives {
            if value <= 0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        for (field, value) in [
            ("event_chance", self.event_chance),
            ("combo_chance", self.combo_chance),
            ("catch_stun_chance", self.catch_stun_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { field, value });
            }
        }

        if self.starting_hand > self.max_hand_size {
            return Err(ConfigError::HandTooLarge {
                hand: self.starting_hand,
                max: self.max_hand_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "leader_hp": 20, "max_turns": 40 }"#)
            .expect("partial config should parse");
        assert_eq!(config.leader_hp, 20);
        assert_eq!(config.max_turns, 40);
        assert_eq!(config.deck_size, EngineConfig::default().deck_size);
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let err = EngineConfig::from_json_str(r#"{ "event_chance": 1.5 }"#)
            .expect_err("probability above one must be rejected");
        assert!(matches!(
            err,
            ConfigError::ProbabilityOutOfRange { field: "event_chance", .. }
        ));
    }

    #[test]
    fn rejects_zero_log_capacity() {
        let config = EngineConfig {
            log_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "log_capacity", .. })
        ));
    }
}
