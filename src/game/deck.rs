//! 按种子构筑阵营牌组，并平滑牌顶的连续同名/同类卡。

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::catalog::{self, CardDefinition, CardId, Faction};
use crate::config::EngineConfig;

/// 同名卡最多连续出现的张数。
pub const MAX_SAME_ID_RUN: usize = 2;
/// 牌顶区域内同类（单位/法术）最多连续出现的张数。
pub const MAX_SAME_KIND_RUN: usize = 3;
pub const TOP_WINDOW: usize = 15;

fn weight(card: &CardDefinition) -> u32 {
    if card.is_unit() {
        3
    } else {
        2
    }
}

fn cap(card: &CardDefinition, rules: &EngineConfig) -> u32 {
    if card.dirty {
        rules.dirty_copy_cap.min(rules.copy_cap)
    } else {
        rules.copy_cap
    }
}

/// 构筑牌组，返回的牌组牌顶在末尾。
pub fn build_deck(faction: Faction, seed: u64, rules: &EngineConfig) -> Vec<CardId> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ faction.salt());
    let pool = catalog::faction_pool(faction);
    let mut counts: BTreeMap<&'static str, u32> = BTreeMap::new();
    let mut cards: Vec<&'static CardDefinition> = Vec::with_capacity(rules.deck_size as usize);

    while cards.len() < rules.deck_size as usize {
        let candidates: Vec<&'static CardDefinition> = pool
            .iter()
            .copied()
            .filter(|card| counts.get(card.id).copied().unwrap_or(0) < cap(card, rules))
            .collect();
        let Ok(&card) = candidates.choose_weighted(&mut rng, |card| weight(card)) else {
            tracing::warn!(?faction, built = cards.len(), wanted = rules.deck_size, "card pool exhausted by copy caps");
            break;
        };
        *counts.entry(card.id).or_insert(0) += 1;
        cards.push(card);
    }

    cards.shuffle(&mut rng);
    let mut order = smooth_streaks(cards);
    order.reverse();
    order.into_iter().map(|card| card.id.to_string()).collect()
}

fn streak<F>(order: &[&'static CardDefinition], same: F) -> usize
where
    F: Fn(&CardDefinition) -> bool,
{
    order.iter().rev().take_while(|card| same(**card)).count()
}

fn fits(order: &[&'static CardDefinition], card: &CardDefinition) -> bool {
    if streak(order, |other| other.id == card.id) >= MAX_SAME_ID_RUN {
        return false;
    }
    order.len() >= TOP_WINDOW || streak(order, |other| other.is_unit() == card.is_unit()) < MAX_SAME_KIND_RUN
}

/// 按抽牌顺序（下标 0 先抽）逐位取第一张不破坏连续上限的牌；
/// 找不到时接受违规，只可能发生在牌库末尾。
fn smooth_streaks(mut remaining: Vec<&'static CardDefinition>) -> Vec<&'static CardDefinition> {
    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let pick = remaining.iter().position(|card| fits(&order, card)).unwrap_or(0);
        order.push(remaining.remove(pick));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_order(deck: &[CardId]) -> Vec<&'static CardDefinition> {
        deck.iter()
            .rev()
            .map(|id| catalog::card(id).expect("catalog card"))
            .collect()
    }

    #[test]
    fn decks_are_seeded_and_full() {
        let rules = EngineConfig::default();
        let first = build_deck(Faction::Retail, 42, &rules);
        assert_eq!(first, build_deck(Faction::Retail, 42, &rules));
        assert_ne!(first, build_deck(Faction::Retail, 43, &rules));
        assert_eq!(first.len(), rules.deck_size as usize);
    }

    #[test]
    fn copy_caps_hold() {
        let rules = EngineConfig::default();
        for faction in [Faction::Retail, Faction::HedgeFund, Faction::MarketMaker, Faction::ShortSeller] {
            let deck = build_deck(faction, 7, &rules);
            let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
            for id in &deck {
                *counts.entry(id.as_str()).or_insert(0) += 1;
            }
            for (id, count) in counts {
                let card = catalog::card(id).expect("catalog card");
                assert!(count <= cap(card, &rules), "{id} x{count}");
                assert!(card.faction == faction || card.faction == Faction::Neutral);
            }
        }
    }

    #[test]
    fn top_of_deck_is_smoothed() {
        let rules = EngineConfig::default();
        for seed in 0..20 {
            let deck = build_deck(Faction::ShortSeller, seed, &rules);
            let order = draw_order(&deck);
            let top = &order[..TOP_WINDOW];
            for window in top.windows(MAX_SAME_ID_RUN + 1) {
                assert!(window.iter().any(|card| card.id != window[0].id), "seed {seed}");
            }
            for window in top.windows(MAX_SAME_KIND_RUN + 1) {
                assert!(
                    window.iter().any(|card| card.is_unit() != window[0].is_unit()),
                    "seed {seed}"
                );
            }
        }
    }

    #[test]
    fn tiny_caps_stop_short_instead_of_looping() {
        let rules = EngineConfig {
            copy_cap: 1,
            dirty_copy_cap: 1,
            ..EngineConfig::default()
        };
        let deck = build_deck(Faction::Retail, 1, &rules);
        assert!(deck.len() < rules.deck_size as usize);
        assert_eq!(deck.len(), catalog::faction_pool(Faction::Retail).len());
    }
}
