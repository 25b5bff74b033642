use judge_duel::ai::{maybe_run_bot, orchestrate_bot_turn, InMemoryPlanStore};
use judge_duel::game::judge::catch_chance;
use judge_duel::game::{
    create_initial_match, play_card, resistance_chance, resistance_summary, Controller, CreateMatchInput, DebuffKind,
    Faction, Lane, MatchMode, MatchState, MatchStatus, PlayCardInput, SideSetup,
};
use proptest::prelude::*;

const STEP_BUDGET: usize = 400;

fn bot_vs_bot(seed: u64) -> CreateMatchInput {
    CreateMatchInput {
        id: format!("bots-{seed}"),
        seed,
        mode: MatchMode::Pve,
        a: SideSetup {
            faction: Faction::Retail,
            controller: Controller::Bot { level: 3 },
            deck: None,
        },
        b: SideSetup {
            faction: Faction::ShortSeller,
            controller: Controller::Bot { level: 3 },
            deck: None,
        },
        rules: None,
    }
}

fn play_out(seed: u64) -> (MatchState, usize) {
    let mut state = create_initial_match(&bot_vs_bot(seed), 0).expect("match created");
    for step in 0..STEP_BUDGET {
        if state.status == MatchStatus::Finished {
            return (state, step);
        }
        let next = maybe_run_bot(&state).expect("bots never hit fatal errors");
        assert!(next.revision > state.revision, "bot made no progress at step {step}");
        state = next;
    }
    (state, STEP_BUDGET)
}

#[test]
fn seed_42_bots_finish_with_a_winner() {
    let (state, steps) = play_out(42);
    assert_eq!(state.status, MatchStatus::Finished, "still running after {steps} steps");
    assert!(state.winner_side.is_some());
    assert!(state.finish_reason.is_some());
    assert!(state.integrity_check().is_ok());
}

#[test]
fn replays_are_identical() {
    let (first, _) = play_out(42);
    let (second, _) = play_out(42);
    assert_eq!(first, second);
    assert_eq!(first.rng_counter, second.rng_counter);
}

#[test]
fn planner_reaches_the_same_result() {
    let mut direct = create_initial_match(&bot_vs_bot(9), 0).expect("match created");
    let mut planned = direct.clone();
    let mut store = InMemoryPlanStore::new();
    let mut now = 0;
    for _ in 0..6 {
        direct = maybe_run_bot(&direct).expect("not fatal");
        for _ in 0..3 {
            let outcome = orchestrate_bot_turn(&mut store, &planned, now).expect("not fatal");
            let ready_at = outcome.plan.as_ref().map_or(now, |plan| plan.ready_at);
            if outcome.match_state != planned {
                planned = outcome.match_state;
                break;
            }
            now = ready_at;
        }
        assert_eq!(direct, planned);
    }
}

#[test]
fn resistance_matches_its_summary() {
    for card_id in ["retail_ape", "hedge_prime_broker", "mm_hft", "short_kingpin", "neutral_intern"] {
        let summary = resistance_summary(card_id);
        for kind in [DebuffKind::Exposed, DebuffKind::Stun, DebuffKind::AttackDown] {
            let chance = resistance_chance(card_id, kind);
            assert_eq!(chance, resistance_chance(card_id, kind));
            let expected = format!("{} {}%", kind.label(), (chance * 100.0).round() as u32);
            assert!(summary.contains(&expected), "{summary} lacks {expected}");
        }
    }
}

proptest! {
    #[test]
    fn catch_chance_is_monotone(power in 0i32..4, probation in 0i32..20, mood in -3i32..3) {
        let base = catch_chance(power, probation, mood);
        prop_assert!(catch_chance(power, probation + 1, mood) >= base);
        prop_assert!(catch_chance(power, probation, mood + 1) >= base);
    }

    #[test]
    fn rejected_plays_leave_the_match_untouched(hand_index in 0usize..12, col in 0usize..7, back in any::<bool>()) {
        let mut input = bot_vs_bot(5);
        input.mode = MatchMode::Sandbox;
        input.a.controller = Controller::Human;
        input.b.controller = Controller::Human;
        let state = judge_duel::game::create_sandbox_match(&input, 0).expect("match created");
        let side = state.active_side.opponent();
        let lane = if back { Lane::Back } else { Lane::Front };
        let play = PlayCardInput {
            side,
            hand_index,
            lane: Some(lane),
            col: Some(col),
            target: None,
        };
        // 非当前行动方的任何出牌都必须被拒绝
        let result = play_card(&state, &play).expect("not fatal");
        prop_assert!(!result.ok);
        prop_assert_eq!(&result.match_state, &state);
        prop_assert!(result.events.is_empty());
    }
}
