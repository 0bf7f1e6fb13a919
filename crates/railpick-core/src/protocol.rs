// JSON messages exchanged with the rendering client over the WebSocket.
//
// Every message is an object with a SCREAMING_SNAKE_CASE `type` tag and, when
// it carries data, a camelCase `payload`.

use serde::{Deserialize, Serialize};

use crate::catalog::{Eidolon, RuleSet, Superimposition};
use crate::draft::order::{DraftMode, Team, Turn};
use crate::draft::state::{DraftState, DraftStatus, DraftedCharacter, SlotEdit, TeamState};
use crate::loadout::Loadout;
use crate::scoring::{team_cost, MatchResult, MatchScore};
use crate::settings::DraftSettings;

// ---------------------------------------------------------------------------
// Client -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    SelectCharacter { payload: SelectCharacterPayload },
    Undo,
    Reset,
    Start,
    TogglePause,
    UpdateSettings { payload: DraftSettings },
    ResetSettings,
    ChangeRuleSet { payload: RuleSetPayload },
    ChangeDraftMode { payload: DraftModePayload },
    ChangeTeamName { payload: TeamNamePayload },
    UpdateDraftedCharacter { payload: UpdateDraftedCharacterPayload },
    SaveLoadout { payload: TeamLoadoutPayload },
    ApplyLoadout { payload: TeamLoadoutPayload },
    DeleteLoadout { payload: LoadoutNamePayload },
    ListLoadouts,
    CalculateScore { payload: CalculateScorePayload },
    RequestSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectCharacterPayload {
    /// Character name, display name or alias.
    pub character: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetPayload {
    pub rule_set: RuleSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftModePayload {
    pub draft_mode: DraftMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNamePayload {
    pub team: Team,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDraftedCharacterPayload {
    pub team: Team,
    pub index: usize,
    pub rank: Eidolon,
    #[serde(default)]
    pub lightcone: Option<String>,
    #[serde(default)]
    pub lightcone_rank: Superimposition,
}

impl UpdateDraftedCharacterPayload {
    pub fn edit(&self) -> SlotEdit {
        SlotEdit {
            rank: self.rank,
            lightcone: self.lightcone.clone(),
            lightcone_rank: self.lightcone_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLoadoutPayload {
    pub team: Team,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadoutNamePayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateScorePayload {
    pub blue: MatchResult,
    pub red: MatchResult,
}

// ---------------------------------------------------------------------------
// App -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Snapshot { payload: DraftView },
    Score { payload: MatchScore },
    Loadouts { payload: LoadoutsPayload },
    Notice { payload: Notice },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadoutsPayload {
    pub loadouts: Vec<Loadout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient message for the user, such as a storage failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub name: String,
    pub drafted: Vec<DraftedCharacter>,
    pub banned: Vec<String>,
    pub reserve_time: u32,
    /// Roster cost under the current ruleset.
    pub cost: f64,
}

/// Read-only render view of the whole draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub blue_team: TeamView,
    pub red_team: TeamView,
    pub current_step: usize,
    pub total_steps: usize,
    pub current_turn: Option<Turn>,
    pub rule_set: RuleSet,
    pub draft_mode: DraftMode,
    pub phase_timer: u32,
    pub is_timer_active: bool,
    pub is_draft_started: bool,
    pub status: DraftStatus,
    pub can_undo: bool,
    pub settings: DraftSettings,
    /// Names of characters still open for picking or banning.
    pub available: Vec<String>,
}

impl DraftView {
    pub fn from_state(draft: &DraftState) -> Self {
        let team_view = |team: &TeamState| TeamView {
            name: team.name.clone(),
            drafted: team.drafted.iter().cloned().collect(),
            banned: team.banned.iter().cloned().collect(),
            reserve_time: team.reserve_time,
            cost: team_cost(team, draft.catalog(), draft.rule_set()),
        };
        DraftView {
            blue_team: team_view(draft.team(Team::Blue)),
            red_team: team_view(draft.team(Team::Red)),
            current_step: draft.current_step(),
            total_steps: draft.draft_mode().total_turns(),
            current_turn: draft.current_turn(),
            rule_set: draft.rule_set(),
            draft_mode: draft.draft_mode(),
            phase_timer: draft.phase_timer(),
            is_timer_active: draft.is_timer_active(),
            is_draft_started: draft.is_draft_started(),
            status: draft.status(),
            can_undo: draft.history_len() > 0,
            settings: draft.settings().clone(),
            available: draft
                .available_characters()
                .into_iter()
                .map(|c| c.name.clone())
                .collect(),
        }
    }
}
