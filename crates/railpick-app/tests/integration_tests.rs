// Integration tests for railpick.
//
// These drive the application loop end-to-end through its channels with the
// same JSON a rendering client sends, against the shipped catalog and default
// configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use railpick_app::app::{self, AppState};
use railpick_app::config::{ensure_config_files, load_config_from, Config};
use railpick_core::catalog::{load_catalog, Catalog, Eidolon, RuleSet};
use railpick_core::db::Database;
use railpick_core::draft::order::{Action, DraftMode, Team, Turn};
use railpick_core::draft::state::DraftStatus;
use railpick_core::protocol::{DraftView, NoticeLevel, ServerMessage};
use railpick_core::ws_server::WsEvent;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

// ===========================================================================
// Test helpers
// ===========================================================================

fn shipped_catalog() -> Catalog {
    load_catalog(
        Path::new("data/characters.csv"),
        Path::new("data/lightcones.csv"),
    )
    .expect("shipped catalog should load")
}

/// The shipped defaults, loaded through a scratch copy of `config/`.
fn default_config(name: &str) -> Config {
    let tmp = std::env::temp_dir().join(format!("railpick_it_{name}"));
    let _ = std::fs::remove_dir_all(&tmp);
    std::fs::create_dir_all(tmp.join("defaults")).unwrap();
    for file in ["draft.toml", "server.toml"] {
        std::fs::copy(
            Path::new("defaults").join(file),
            tmp.join("defaults").join(file),
        )
        .unwrap();
    }
    ensure_config_files(&tmp).unwrap();
    load_config_from(&tmp).unwrap()
}

struct Harness {
    ws_tx: mpsc::Sender<WsEvent>,
    out_rx: broadcast::Receiver<String>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    fn start(config: Config, db: Database) -> Self {
        let state = AppState::new(
            config,
            Arc::new(shipped_catalog()),
            db,
            ChaCha8Rng::seed_from_u64(2024),
        );
        let (ws_tx, ws_rx) = mpsc::channel(64);
        let (out_tx, out_rx) = broadcast::channel(1024);
        let handle = tokio::spawn(app::run(ws_rx, out_tx, state));
        Harness {
            ws_tx,
            out_rx,
            handle,
        }
    }

    async fn send(&self, json: &str) {
        self.ws_tx
            .send(WsEvent::Message(json.to_string()))
            .await
            .unwrap();
    }

    async fn next(&mut self) -> ServerMessage {
        let json = self.out_rx.recv().await.unwrap();
        serde_json::from_str(&json).unwrap()
    }

    async fn next_snapshot(&mut self) -> DraftView {
        loop {
            if let ServerMessage::Snapshot { payload } = self.next().await {
                return payload;
            }
        }
    }

    /// Send a command and return the snapshot published for it.
    async fn command(&mut self, json: &str) -> DraftView {
        self.send(json).await;
        self.next_snapshot().await
    }

    async fn shutdown(self) {
        drop(self.ws_tx);
        let result = self.handle.await.unwrap();
        assert!(result.is_ok());
    }
}

fn select(name: &str) -> String {
    format!(r#"{{"type":"SELECT_CHARACTER","payload":{{"character":"{name}"}}}}"#)
}

/// Twenty-two distinct characters, enough for either draft mode.
const ROSTER: [&str; 22] = [
    "Acheron", "seele", "sparkle", "ruan_mei", "robin", "jingliu", "firefly", "huohuo", "fu_xuan",
    "boothill", "feixiao", "kafka", "black_swan", "pela", "tingyun", "gallagher", "lynx",
    "aventurine", "bronya", "silver_wolf", "dhil", "hmc",
];

// ===========================================================================
// Shipped data and configuration
// ===========================================================================

#[test]
fn defaults_are_valid_toml() {
    for file in ["defaults/draft.toml", "defaults/server.toml"] {
        let content = std::fs::read_to_string(file).expect("default config should exist");
        let parsed: Result<toml::Value, _> = toml::from_str(&content);
        assert!(parsed.is_ok(), "{file} is not valid TOML: {:?}", parsed.err());
    }
}

#[test]
fn defaults_load_into_config() {
    let config = default_config("defaults_load");
    assert_eq!(config.draft.rule_set, RuleSet::MemoryOfChaos);
    assert_eq!(config.draft.settings.phase_time, 30);
    assert_eq!(config.draft.settings.reserve_time, 480);
}

#[test]
fn shipped_catalog_resolves_aliases_and_ranks() {
    let catalog = shipped_catalog();
    assert!(catalog.list_characters().len() >= 40);
    assert!(catalog.list_lightcones().len() >= 20);

    let dhil = catalog.find_character("dhil").expect("alias should resolve");
    assert_eq!(dhil.name, "dan_heng_imbibitor_lunae");
    assert_eq!(dhil.default_rank(), Eidolon::E0);

    let hmc = catalog.find_character("HMC").unwrap();
    assert!(hmc.is_trailblazer());
    assert_eq!(hmc.default_rank(), Eidolon::E6);

    assert_eq!(catalog.find_character("pela").unwrap().default_rank(), Eidolon::E6);
    assert_eq!(
        catalog.find_lightcone("ITNOTW").unwrap().name,
        "in_the_name_of_the_world"
    );
}

// ===========================================================================
// Full drafts through the event loop
// ===========================================================================

#[tokio::test]
async fn full_four_ban_draft_and_score() {
    let mut h = Harness::start(default_config("four_ban"), Database::open(":memory:").unwrap());

    let view = h.command(r#"{"type":"START"}"#).await;
    assert_eq!(view.status, DraftStatus::Running);
    assert_eq!(
        view.current_turn,
        Some(Turn {
            team: Team::Blue,
            action: Action::Ban
        })
    );

    let mut view = view;
    for name in &ROSTER[..20] {
        view = h.command(&select(name)).await;
    }
    assert_eq!(view.current_step, 20);
    assert_eq!(view.status, DraftStatus::Complete);
    assert_eq!(view.current_turn, None);
    assert_eq!(view.blue_team.banned, vec!["acheron", "firefly"]);
    assert_eq!(view.red_team.banned, vec!["seele", "huohuo"]);
    assert_eq!(view.blue_team.drafted.len(), 8);
    assert_eq!(view.red_team.drafted.len(), 8);
    assert!(view.available.iter().all(|c| c != "sparkle"));

    // Picks past the end are ignored.
    let after = h.command(&select("dhil")).await;
    assert_eq!(after.current_step, 20);

    h.send(
        r#"{"type":"CALCULATE_SCORE","payload":{
            "blue":{"firstHalf":3,"secondHalf":4,"deaths":0,"additionalModifier":0},
            "red":{"firstHalf":5,"secondHalf":5,"deaths":2,"additionalModifier":0}}}"#,
    )
    .await;
    let _ = h.next_snapshot().await;
    match h.next().await {
        ServerMessage::Score { payload } => {
            assert_eq!(payload.winner, Some(Team::Blue));
        }
        other => panic!("expected SCORE, got {other:?}"),
    }

    h.shutdown().await;
}

#[tokio::test]
async fn setup_changes_lock_once_started() {
    let mut h = Harness::start(default_config("setup_lock"), Database::open(":memory:").unwrap());

    let view = h
        .command(r#"{"type":"CHANGE_DRAFT_MODE","payload":{"draftMode":"SixBan"}}"#)
        .await;
    assert_eq!(view.draft_mode, DraftMode::SixBan);
    assert_eq!(view.total_steps, 22);

    let view = h
        .command(r#"{"type":"CHANGE_RULE_SET","payload":{"ruleSet":"ApocalypticShadow"}}"#)
        .await;
    assert_eq!(view.rule_set, RuleSet::ApocalypticShadow);

    h.command(r#"{"type":"START"}"#).await;
    let view = h
        .command(r#"{"type":"CHANGE_DRAFT_MODE","payload":{"draftMode":"FourBan"}}"#)
        .await;
    assert_eq!(view.draft_mode, DraftMode::SixBan);

    // Names can change at any time.
    let view = h
        .command(r#"{"type":"CHANGE_TEAM_NAME","payload":{"team":"Red","name":"  Penacony  "}}"#)
        .await;
    assert_eq!(view.red_team.name, "Penacony");

    h.shutdown().await;
}

#[tokio::test]
async fn undo_and_reset_over_the_wire() {
    let mut h = Harness::start(default_config("undo_reset"), Database::open(":memory:").unwrap());

    h.command(r#"{"type":"START"}"#).await;
    h.command(&select("acheron")).await;
    let view = h.command(&select("seele")).await;
    assert_eq!(view.current_step, 2);
    assert!(view.can_undo);

    let view = h.command(r#"{"type":"UNDO"}"#).await;
    assert_eq!(view.current_step, 1);
    assert!(view.red_team.banned.is_empty());
    assert!(view.available.iter().any(|c| c == "seele"));

    h.command(r#"{"type":"CHANGE_TEAM_NAME","payload":{"team":"Blue","name":"Astral Express"}}"#)
        .await;
    let view = h.command(r#"{"type":"RESET"}"#).await;
    assert_eq!(view.current_step, 0);
    assert_eq!(view.status, DraftStatus::NotStarted);
    assert!(!view.can_undo);
    assert_eq!(view.blue_team.name, "Blue Team");

    h.shutdown().await;
}

#[tokio::test]
async fn ban_restriction_applies_to_manual_bans() {
    let mut h = Harness::start(default_config("ban_rule"), Database::open(":memory:").unwrap());

    h.command(
        r#"{"type":"UPDATE_SETTINGS","payload":{
            "phaseTime":30,"reserveTime":480,"banRestriction":"onePerRole",
            "mocSettings":{"rosterDifferenceAdvantagePerPoint":0,"rosterThreshold":45,
                "underThresholdAdvantagePerPoint":0.25,"aboveThresholdPenaltyPerPoint":0.1667,"deathPenalty":0.25},
            "apocSettings":{"rosterDifferenceAdvantagePerPoint":40,"rosterThreshold":50,
                "underThresholdAdvantagePerPoint":0,"aboveThresholdPenaltyPerPoint":0,"deathPenalty":100}}}"#,
    )
    .await;
    h.command(r#"{"type":"START"}"#).await;

    // Turn order: Bb Rb Bp Rp Rp Bp Bb ...
    for name in ["acheron", "seele", "sparkle", "robin", "ruan_mei", "bronya"] {
        h.command(&select(name)).await;
    }
    // Blue already banned a DPS.
    let view = h.command(&select("jingliu")).await;
    assert_eq!(view.current_step, 6);
    let view = h.command(&select("huohuo")).await;
    assert_eq!(view.current_step, 7);
    assert_eq!(view.blue_team.banned, vec!["acheron", "huohuo"]);

    h.shutdown().await;
}

// ===========================================================================
// Clock
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn expired_clocks_force_a_random_selection() {
    let mut h = Harness::start(default_config("auto_select"), Database::open(":memory:").unwrap());

    h.command(
        r#"{"type":"UPDATE_SETTINGS","payload":{
            "phaseTime":8,"reserveTime":8,
            "mocSettings":{"rosterDifferenceAdvantagePerPoint":0,"rosterThreshold":45,
                "underThresholdAdvantagePerPoint":0.25,"aboveThresholdPenaltyPerPoint":0.1667,"deathPenalty":0.25},
            "apocSettings":{"rosterDifferenceAdvantagePerPoint":40,"rosterThreshold":50,
                "underThresholdAdvantagePerPoint":0,"aboveThresholdPenaltyPerPoint":0,"deathPenalty":100}}}"#,
    )
    .await;
    let view = h.command(r#"{"type":"START"}"#).await;
    assert_eq!(view.phase_timer, 8);

    // 8 phase ticks, then 8 reserve ticks; the last one forces the ban.
    let mut view = view;
    while view.current_step == 0 {
        view = h.next_snapshot().await;
    }
    assert_eq!(view.current_step, 1);
    assert_eq!(view.blue_team.banned.len(), 1);
    assert_eq!(view.blue_team.reserve_time, 0);
    assert_eq!(view.phase_timer, 8);

    // Red's turn now counts down its own phase timer.
    let view = h.next_snapshot().await;
    assert_eq!(view.current_step, 1);
    assert_eq!(view.phase_timer, 7);
    assert_eq!(view.red_team.reserve_time, 8);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn paused_draft_does_not_tick() {
    let mut h = Harness::start(default_config("paused"), Database::open(":memory:").unwrap());

    h.command(r#"{"type":"START"}"#).await;
    let view = h.command(r#"{"type":"TOGGLE_PAUSE"}"#).await;
    assert_eq!(view.status, DraftStatus::Paused);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.out_rx.try_recv().is_err());

    let view = h.command(r#"{"type":"TOGGLE_PAUSE"}"#).await;
    assert_eq!(view.status, DraftStatus::Running);
    assert_eq!(view.phase_timer, 30);
    let view = h.next_snapshot().await;
    assert_eq!(view.phase_timer, 29);

    h.shutdown().await;
}

// ===========================================================================
// Persistence
// ===========================================================================

#[tokio::test]
async fn loadouts_and_settings_survive_restart() {
    let db_path = std::env::temp_dir().join("railpick_it_persist.db");
    let _ = std::fs::remove_file(&db_path);
    let db_path = db_path.to_string_lossy().to_string();

    {
        let mut h = Harness::start(default_config("persist_a"), Database::open(&db_path).unwrap());
        h.command(r#"{"type":"START"}"#).await;
        for name in ["acheron", "seele", "sparkle"] {
            h.command(&select(name)).await;
        }
        h.command(
            r#"{"type":"UPDATE_DRAFTED_CHARACTER","payload":{
                "team":"Blue","index":0,"rank":"E1","lightcone":"Earthly Escapade","lightconeRank":"S2"}}"#,
        )
        .await;
        h.send(r#"{"type":"SAVE_LOADOUT","payload":{"team":"Blue","name":"sparkle e1"}}"#)
            .await;
        let _ = h.next_snapshot().await;
        match h.next().await {
            ServerMessage::Loadouts { payload } => assert_eq!(payload.loadouts.len(), 1),
            other => panic!("expected LOADOUTS, got {other:?}"),
        }
        h.command(
            r#"{"type":"UPDATE_SETTINGS","payload":{
                "phaseTime":45,"reserveTime":300,
                "mocSettings":{"rosterDifferenceAdvantagePerPoint":0,"rosterThreshold":45,
                    "underThresholdAdvantagePerPoint":0.25,"aboveThresholdPenaltyPerPoint":0.1667,"deathPenalty":0.25},
                "apocSettings":{"rosterDifferenceAdvantagePerPoint":40,"rosterThreshold":50,
                    "underThresholdAdvantagePerPoint":0,"aboveThresholdPenaltyPerPoint":0,"deathPenalty":100}}}"#,
        )
        .await;
        h.shutdown().await;
    }

    let mut h = Harness::start(default_config("persist_b"), Database::open(&db_path).unwrap());
    h.ws_tx
        .send(WsEvent::Connected {
            addr: "127.0.0.1:40000".into(),
        })
        .await
        .unwrap();
    let view = h.next_snapshot().await;
    assert_eq!(view.settings.phase_time, 45);
    assert_eq!(view.phase_timer, 45);
    match h.next().await {
        ServerMessage::Loadouts { payload } => {
            assert_eq!(payload.loadouts[0].name, "sparkle e1");
            assert_eq!(payload.loadouts[0].members[0].rank, Eidolon::E1);
        }
        other => panic!("expected LOADOUTS, got {other:?}"),
    }

    // Applying it to a fresh pick restores the equipment.
    h.command(r#"{"type":"START"}"#).await;
    for name in ["acheron", "seele", "sparkle"] {
        h.command(&select(name)).await;
    }
    let view = h
        .command(r#"{"type":"APPLY_LOADOUT","payload":{"team":"Blue","name":"sparkle e1"}}"#)
        .await;
    let slot = &view.blue_team.drafted[0];
    assert_eq!(slot.rank, Eidolon::E1);
    assert_eq!(slot.lightcone.as_ref().unwrap().name, "earthly_escapade");

    h.send(r#"{"type":"DELETE_LOADOUT","payload":{"name":"sparkle e1"}}"#)
        .await;
    let _ = h.next_snapshot().await;
    match h.next().await {
        ServerMessage::Loadouts { payload } => assert!(payload.loadouts.is_empty()),
        other => panic!("expected LOADOUTS, got {other:?}"),
    }

    h.send(r#"{"type":"APPLY_LOADOUT","payload":{"team":"Blue","name":"sparkle e1"}}"#)
        .await;
    let _ = h.next_snapshot().await;
    match h.next().await {
        ServerMessage::Notice { payload } => assert_eq!(payload.level, NoticeLevel::Info),
        other => panic!("expected NOTICE, got {other:?}"),
    }

    h.shutdown().await;
}
