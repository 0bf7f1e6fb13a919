// Property tests for the draft engine: arbitrary interleavings of picks,
// undos, clock ticks and forced selections must never break the roster
// bookkeeping.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use railpick_core::catalog::{catalog_from_csv, Catalog, RuleSet};
use railpick_core::draft::order::{Action, DraftMode, Team};
use railpick_core::draft::state::{DraftState, Selection};
use railpick_core::draft::timer;
use railpick_core::settings::DraftSettings;

const ROLES: [&str; 3] = ["DPS", "Support", "Sustain"];

fn catalog(size: usize) -> Arc<Catalog> {
    let mut characters = String::from(
        "name,display_name,aliases,rarity,role,moc_e0,moc_e1,moc_e2,moc_e3,moc_e4,moc_e5,moc_e6,\
         apoc_e0,apoc_e1,apoc_e2,apoc_e3,apoc_e4,apoc_e5,apoc_e6\n",
    );
    for i in 0..size {
        let rarity = if i % 3 == 0 { 4 } else { 5 };
        characters.push_str(&format!(
            "c{i},Character {i},,{rarity},{},1,1,1,1,1,1,1,1,1,1,1,1,1,1\n",
            ROLES[i % 3]
        ));
    }
    let lightcones = "name,display_name,aliases,rarity,s1,s2,s3,s4,s5\n";
    Arc::new(catalog_from_csv(&characters, lightcones).unwrap())
}

#[derive(Debug, Clone)]
enum Op {
    Select(usize),
    Undo,
    Tick(u8),
    Pause,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..30).prop_map(Op::Select),
        2 => Just(Op::Undo),
        2 => (1u8..40).prop_map(Op::Tick),
        1 => Just(Op::Pause),
    ]
}

fn expected_count(draft: &DraftState, team: Team, action: Action) -> usize {
    draft.draft_mode().order()[..draft.current_step()]
        .iter()
        .filter(|t| t.team == team && t.action == action)
        .count()
}

fn check_invariants(draft: &DraftState) -> Result<(), TestCaseError> {
    prop_assert_eq!(draft.history_len(), draft.current_step());
    prop_assert!(draft.current_step() <= draft.draft_mode().total_turns());

    let mut seen = HashSet::new();
    for team in [Team::Blue, Team::Red] {
        let state = draft.team(team);
        prop_assert_eq!(state.banned.len(), expected_count(draft, team, Action::Ban));
        prop_assert_eq!(state.drafted.len(), expected_count(draft, team, Action::Pick));
        prop_assert!(state.reserve_time <= draft.settings().reserve_time);
        for name in state.banned.iter().chain(state.drafted.iter().map(|d| &d.character)) {
            prop_assert!(seen.insert(name.clone()), "{} appears twice", name);
        }
    }
    prop_assert_eq!(
        draft.available_characters().len() + seen.len(),
        draft.catalog().list_characters().len()
    );
    Ok(())
}

proptest! {
    #[test]
    fn roster_bookkeeping_holds(
        six_ban in any::<bool>(),
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 0..120),
    ) {
        let mode = if six_ban { DraftMode::SixBan } else { DraftMode::FourBan };
        let settings = DraftSettings {
            phase_time: 8,
            reserve_time: 20,
            ..DraftSettings::default()
        };
        let mut draft = DraftState::new(catalog(30), settings, RuleSet::MemoryOfChaos, mode);
        draft.start().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for op in ops {
            match op {
                Op::Select(i) => {
                    let _ = draft.select_character(&format!("c{i}"), Selection::Manual);
                }
                Op::Undo => {
                    let _ = draft.undo();
                }
                Op::Tick(n) => {
                    for _ in 0..n {
                        timer::advance(&mut draft, &mut rng);
                    }
                }
                Op::Pause => {
                    draft.toggle_pause();
                }
            }
            check_invariants(&draft)?;
        }
    }

    #[test]
    fn select_then_undo_restores_membership(
        prefix in prop::collection::vec(0usize..30, 0..15),
        pick in 0usize..30,
    ) {
        let mut draft = DraftState::new(
            catalog(30),
            DraftSettings::default(),
            RuleSet::ApocalypticShadow,
            DraftMode::SixBan,
        );
        draft.start().unwrap();
        for i in prefix {
            let _ = draft.select_character(&format!("c{i}"), Selection::Manual);
        }

        let before_blue = draft.team(Team::Blue).clone();
        let before_red = draft.team(Team::Red).clone();
        let before_step = draft.current_step();

        if draft.select_character(&format!("c{pick}"), Selection::Manual).is_ok() {
            draft.undo().unwrap();
        }

        prop_assert_eq!(draft.current_step(), before_step);
        prop_assert_eq!(&draft.team(Team::Blue).banned, &before_blue.banned);
        prop_assert_eq!(&draft.team(Team::Blue).drafted, &before_blue.drafted);
        prop_assert_eq!(&draft.team(Team::Red).banned, &before_red.banned);
        prop_assert_eq!(&draft.team(Team::Red).drafted, &before_red.drafted);
    }

    #[test]
    fn forced_selection_always_finishes_a_draft(seed in any::<u64>()) {
        let settings = DraftSettings {
            phase_time: 8,
            reserve_time: 8,
            ..DraftSettings::default()
        };
        let mut draft = DraftState::new(catalog(24), settings, RuleSet::MemoryOfChaos, DraftMode::SixBan);
        draft.start().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        // Generous upper bound: every turn costs at most phase + reserve ticks.
        for _ in 0..(22 * 16 + 10) {
            timer::advance(&mut draft, &mut rng);
        }
        prop_assert!(draft.is_complete());
        check_invariants(&draft)?;
    }
}
