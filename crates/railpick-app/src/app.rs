// Application orchestration: owns the draft, the clock and storage, and
// routes client commands and timer ticks through them.

use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use railpick_core::catalog::Catalog;
use railpick_core::db::Database;
use railpick_core::draft::order::Team;
use railpick_core::draft::state::{DraftState, Rejection, Selection};
use railpick_core::draft::timer::{self, TickOutcome, TimerDriver};
use railpick_core::loadout::Loadout;
use railpick_core::protocol::{ClientCommand, DraftView, LoadoutsPayload, Notice, ServerMessage};
use railpick_core::scoring::{score_match, ScoringError};
use railpick_core::ws_server::WsEvent;

use crate::config::Config;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything the event loop owns. Only `run` mutates it.
pub struct AppState {
    pub config: Config,
    pub draft: DraftState,
    pub db: Database,
    rng: ChaCha8Rng,
}

impl AppState {
    /// Build the initial state. Settings saved by a previous session win over
    /// the configured ones if they still validate.
    pub fn new(config: Config, catalog: Arc<Catalog>, db: Database, rng: ChaCha8Rng) -> Self {
        let settings = match db.load_settings() {
            Ok(Some(saved)) => match saved.validate() {
                Ok(()) => {
                    info!("Restored last-used draft settings");
                    saved
                }
                Err(e) => {
                    warn!("Ignoring stored settings: {}", e);
                    config.draft.settings.clone()
                }
            },
            Ok(None) => config.draft.settings.clone(),
            Err(e) => {
                warn!("Failed to read stored settings: {:#}", e);
                config.draft.settings.clone()
            }
        };

        let mut draft = DraftState::new(
            catalog,
            settings,
            config.draft.rule_set,
            config.draft.draft_mode,
        );
        draft.set_default_team_names(&config.draft.blue_team_name, &config.draft.red_team_name);

        AppState {
            config,
            draft,
            db,
            rng,
        }
    }

    fn snapshot(&self) -> ServerMessage {
        ServerMessage::Snapshot {
            payload: DraftView::from_state(&self.draft),
        }
    }

    fn loadouts_message(&self) -> ServerMessage {
        match self.db.load_loadouts() {
            Ok(loadouts) => ServerMessage::Loadouts {
                payload: LoadoutsPayload { loadouts },
            },
            Err(e) => {
                warn!("Failed to list loadouts: {:#}", e);
                notice(Notice::error("Could not read saved loadouts"))
            }
        }
    }

    fn persist_settings(&self, replies: &mut Vec<ServerMessage>) {
        if let Err(e) = self.db.save_settings(self.draft.settings()) {
            warn!("Failed to persist settings: {:#}", e);
            replies.push(notice(Notice::error("Settings applied but could not be saved")));
        }
    }
}

fn notice(notice: Notice) -> ServerMessage {
    ServerMessage::Notice { payload: notice }
}

// ---------------------------------------------------------------------------
// Command handling
// ---------------------------------------------------------------------------

/// Apply one client command. Returns the messages addressed to the client
/// besides the snapshot, which the loop always sends afterwards.
///
/// Engine rejections leave the draft untouched and are only logged.
pub fn handle_command(state: &mut AppState, command: ClientCommand) -> Vec<ServerMessage> {
    let mut replies = Vec::new();

    let outcome: Result<(), Rejection> = match command {
        ClientCommand::SelectCharacter { payload } => state
            .draft
            .select_character(&payload.character, Selection::Manual)
            .map(|turn| {
                info!("{} {:?}: {}", turn.team, turn.action, payload.character);
            }),
        ClientCommand::Undo => state.draft.undo(),
        ClientCommand::Reset => {
            state.draft.reset();
            Ok(())
        }
        ClientCommand::Start => state.draft.start(),
        ClientCommand::TogglePause => {
            state.draft.toggle_pause();
            Ok(())
        }
        ClientCommand::UpdateSettings { payload } => {
            let result = state.draft.update_settings(payload);
            if result.is_ok() {
                state.persist_settings(&mut replies);
            }
            result
        }
        ClientCommand::ResetSettings => {
            let result = state.draft.reset_settings();
            if result.is_ok() {
                state.persist_settings(&mut replies);
            }
            result
        }
        ClientCommand::ChangeRuleSet { payload } => state.draft.change_rule_set(payload.rule_set),
        ClientCommand::ChangeDraftMode { payload } => {
            state.draft.change_draft_mode(payload.draft_mode)
        }
        ClientCommand::ChangeTeamName { payload } => {
            if payload.name.trim().is_empty() {
                debug!("Ignoring blank name for {}", payload.team);
            } else {
                state.draft.change_team_name(payload.team, &payload.name);
            }
            Ok(())
        }
        ClientCommand::UpdateDraftedCharacter { payload } => {
            state
                .draft
                .update_drafted_character(payload.team, payload.index, payload.edit())
        }
        ClientCommand::SaveLoadout { payload } => {
            save_loadout(state, payload.team, &payload.name, &mut replies);
            Ok(())
        }
        ClientCommand::ApplyLoadout { payload } => {
            apply_loadout(state, payload.team, &payload.name, &mut replies);
            Ok(())
        }
        ClientCommand::DeleteLoadout { payload } => {
            match state.db.delete_loadout(&payload.name) {
                Ok(true) => {
                    info!("Deleted loadout '{}'", payload.name);
                    replies.push(state.loadouts_message());
                }
                Ok(false) => debug!("No loadout named '{}' to delete", payload.name),
                Err(e) => {
                    warn!("Failed to delete loadout '{}': {:#}", payload.name, e);
                    replies.push(notice(Notice::error(format!(
                        "Could not delete loadout '{}'",
                        payload.name
                    ))));
                }
            }
            Ok(())
        }
        ClientCommand::ListLoadouts => {
            replies.push(state.loadouts_message());
            Ok(())
        }
        ClientCommand::CalculateScore { payload } => {
            match score_match(&state.draft, &payload.blue, &payload.red) {
                Ok(score) => {
                    info!(
                        "Score: blue {} vs red {} (winner {:?})",
                        score.blue.final_score, score.red.final_score, score.winner
                    );
                    replies.push(ServerMessage::Score { payload: score });
                }
                Err(ScoringError::MissingField(field)) => {
                    debug!("Score request missing {}", field);
                    replies.push(notice(Notice::info("Please fill in all fields")));
                }
                Err(ScoringError::DraftIncomplete) => {
                    replies.push(notice(Notice::info(
                        "Scores can be calculated once the draft is complete",
                    )));
                }
            }
            Ok(())
        }
        ClientCommand::RequestSnapshot => Ok(()),
    };

    if let Err(rejection) = outcome {
        debug!("Command rejected: {}", rejection);
    }

    replies
}

fn save_loadout(state: &mut AppState, team: Team, name: &str, replies: &mut Vec<ServerMessage>) {
    let name = name.trim();
    if name.is_empty() {
        replies.push(notice(Notice::info("Loadouts need a name")));
        return;
    }
    let loadout = Loadout::capture(name, state.draft.team(team));
    match state.db.save_loadout(&loadout) {
        Ok(saved) => {
            info!(
                "Saved loadout '{}' from {} ({} members)",
                saved.name,
                team,
                saved.members.len()
            );
            replies.push(state.loadouts_message());
        }
        Err(e) => {
            warn!("Failed to save loadout '{}': {:#}", name, e);
            replies.push(notice(Notice::error(format!(
                "Could not save loadout '{name}'"
            ))));
        }
    }
}

fn apply_loadout(state: &mut AppState, team: Team, name: &str, replies: &mut Vec<ServerMessage>) {
    match state.db.load_loadout(name) {
        Ok(Some(loadout)) => {
            state.draft.apply_loadout(team, &loadout);
        }
        Ok(None) => {
            replies.push(notice(Notice::info(format!("No saved loadout named '{name}'"))));
        }
        Err(e) => {
            warn!("Failed to load loadout '{}': {:#}", name, e);
            replies.push(notice(Notice::error(format!(
                "Could not load loadout '{name}'"
            ))));
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Waits on WebSocket events and on the draft clock. After every event the
/// forced selection is re-checked, the clock is armed or disarmed to match
/// the draft, and a fresh snapshot is published on `outbound`. Returns when
/// the WebSocket event channel closes.
pub async fn run(
    mut ws_rx: mpsc::Receiver<WsEvent>,
    outbound: broadcast::Sender<String>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    let mut clock = TimerDriver::new();
    clock.sync(state.draft.timer_should_run());

    loop {
        let mut replies = Vec::new();

        tokio::select! {
            // --- WebSocket events ---
            ws_event = ws_rx.recv() => {
                match ws_event {
                    Some(WsEvent::Connected { addr }) => {
                        info!("Client connected from {}", addr);
                        replies.push(state.loadouts_message());
                    }
                    Some(WsEvent::Disconnected) => {
                        info!("Client disconnected");
                        continue;
                    }
                    Some(WsEvent::Message(json_str)) => {
                        match serde_json::from_str::<ClientCommand>(&json_str) {
                            Ok(command) => {
                                debug!("Command: {:?}", command);
                                replies = handle_command(&mut state, command);
                            }
                            Err(e) => {
                                warn!("Failed to parse client message: {}", e);
                                continue;
                            }
                        }
                    }
                    None => {
                        info!("WebSocket channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Draft clock ---
            _ = clock.tick() => {
                match timer::advance(&mut state.draft, &mut state.rng) {
                    TickOutcome::Idle => continue,
                    TickOutcome::Countdown(countdown) => debug!("Tick: {:?}", countdown),
                    TickOutcome::AutoSelected { turn, character } => {
                        info!("Time expired: auto {:?} for {}: {}", turn.action, turn.team, character);
                    }
                    TickOutcome::Stalled => warn!("Draft stalled with nothing left to select"),
                }
            }
        }

        if let Some(outcome) = timer::resolve_expiry(&mut state.draft, &mut state.rng) {
            info!("Resolved expired turn after command: {:?}", outcome);
        }
        clock.sync(state.draft.timer_should_run());

        publish(&outbound, &state.snapshot());
        for reply in &replies {
            publish(&outbound, reply);
        }
    }

    info!("Application event loop exiting");
    Ok(())
}

fn publish(outbound: &broadcast::Sender<String>, message: &ServerMessage) {
    match message.to_json() {
        // No subscribers just means no client is connected.
        Ok(json) => {
            let _ = outbound.send(json);
        }
        Err(e) => warn!("Failed to serialize outbound message: {}", e),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
