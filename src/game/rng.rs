//! 对局随机数：以 (seed, rng_counter) 寻址的 ChaCha8 流。
//!
//! 每次逻辑抽取恰好推进游标一次，游标从不回退，因此相同种子与相同动作序列
//! 必然得到相同结果。

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::state::MatchState;

/// 游标位置 `counter` 处的均匀样本，范围 [0, 1)。
pub fn sample_at(seed: u64, counter: u64) -> f64 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    // 每个 u64 占两个 32 位字
    rng.set_word_pos(u128::from(counter) * 2);
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

impl MatchState {
    pub fn roll(&mut self) -> f64 {
        let value = sample_at(self.seed, self.rng_counter);
        self.rng_counter += 1;
        value
    }

    /// 在 `len` 个候选中均匀选择一个；`len` 为 0 时不消耗随机数。
    pub fn roll_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = (self.roll() * len as f64) as usize;
        Some(index.min(len - 1))
    }

    pub fn roll_chance(&mut self, chance: f64) -> bool {
        self.roll() < chance
    }
}
