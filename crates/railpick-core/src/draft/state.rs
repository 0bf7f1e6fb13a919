// Draft state machine: current step, both teams, timers and undo history.

use std::sync::Arc;

use im::Vector;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::order::{Action, DraftMode, Turn, Team};
use super::restriction::{can_ban, BanRestriction};
use crate::catalog::{Catalog, Character, Eidolon, RuleSet, Superimposition};
use crate::loadout::{resolve_team_member, Loadout};
use crate::settings::{DraftSettings, SettingsError};

/// A lightcone attached to a drafted character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquippedLightcone {
    pub name: String,
    pub rank: Superimposition,
}

/// A character on a team's roster along with its post-pick equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftedCharacter {
    pub character: String,
    pub rank: Eidolon,
    pub lightcone: Option<EquippedLightcone>,
}

impl DraftedCharacter {
    fn picked(character: &Character) -> Self {
        DraftedCharacter {
            character: character.name.clone(),
            rank: character.default_rank(),
            lightcone: None,
        }
    }
}

/// The state of a single team during the draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamState {
    pub name: String,
    /// Picks in draft order.
    pub drafted: Vector<DraftedCharacter>,
    /// Bans in draft order, by character name.
    pub banned: Vector<String>,
    /// Seconds of reserve time left.
    pub reserve_time: u32,
}

impl TeamState {
    fn new(name: String, reserve_time: u32) -> Self {
        TeamState {
            name,
            drafted: Vector::new(),
            banned: Vector::new(),
            reserve_time,
        }
    }

    fn has_drafted(&self, name: &str) -> bool {
        self.drafted.iter().any(|d| d.character == name)
    }

    fn has_banned(&self, name: &str) -> bool {
        self.banned.iter().any(|b| b == name)
    }
}

/// How a selection entered the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Manual,
    /// Forced by the clock running out. Skips the started check and ban
    /// restrictions.
    Auto,
}

/// Coarse lifecycle of the draft, derived from the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStatus {
    NotStarted,
    Running,
    Paused,
    Complete,
    /// Auto-select fired with nothing left to choose from.
    Stalled,
}

/// One second of countdown applied by [`DraftState::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Phase { remaining: u32 },
    Reserve { team: Team, remaining: u32 },
}

/// Replacement equipment for a drafted slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotEdit {
    pub rank: Eidolon,
    /// Lightcone name (or alias); `None` removes the lightcone.
    #[serde(default)]
    pub lightcone: Option<String>,
    #[serde(default)]
    pub lightcone_rank: Superimposition,
}

/// Why a command was refused. A refused command changes nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("the draft is already complete")]
    DraftComplete,

    #[error("the draft has not started")]
    NotStarted,

    #[error("the draft has already started")]
    AlreadyStarted,

    #[error("this setting is locked while the draft is in progress")]
    DraftInProgress,

    #[error("unknown character '{0}'")]
    UnknownCharacter(String),

    #[error("'{0}' has already been picked or banned")]
    Unavailable(String),

    #[error("{team} may not ban '{character}' under the {policy:?} restriction")]
    BanRestricted {
        team: Team,
        character: String,
        policy: BanRestriction,
    },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("{team} has no drafted character at slot {index}")]
    NoSuchSlot { team: Team, index: usize },

    #[error("unknown lightcone '{0}'")]
    UnknownLightcone(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("no characters left to auto-select")]
    PoolExhausted,
}

/// Pre-action copy of the mutable draft progress. Cheap to keep around:
/// the rosters are persistent vectors that share structure.
#[derive(Debug, Clone)]
struct DraftSnapshot {
    blue_team: TeamState,
    red_team: TeamState,
    current_step: usize,
    is_timer_active: bool,
    is_draft_started: bool,
}

/// The complete state of a draft session.
#[derive(Debug, Clone)]
pub struct DraftState {
    catalog: Arc<Catalog>,
    blue_team: TeamState,
    red_team: TeamState,
    current_step: usize,
    rule_set: RuleSet,
    draft_mode: DraftMode,
    history: Vector<DraftSnapshot>,
    phase_timer: u32,
    is_timer_active: bool,
    is_draft_started: bool,
    stalled: bool,
    settings: DraftSettings,
    /// Names both teams go back to on reset.
    default_names: (String, String),
}

impl DraftState {
    pub fn new(
        catalog: Arc<Catalog>,
        settings: DraftSettings,
        rule_set: RuleSet,
        draft_mode: DraftMode,
    ) -> Self {
        DraftState {
            catalog,
            blue_team: TeamState::new("Blue Team".into(), settings.reserve_time),
            red_team: TeamState::new("Red Team".into(), settings.reserve_time),
            current_step: 0,
            rule_set,
            draft_mode,
            history: Vector::new(),
            phase_timer: settings.phase_time,
            is_timer_active: false,
            is_draft_started: false,
            stalled: false,
            settings,
            default_names: ("Blue Team".into(), "Red Team".into()),
        }
    }

    /// Set the names teams start with and return to on reset. Blank names
    /// are left at their previous value.
    pub fn set_default_team_names(&mut self, blue: &str, red: &str) {
        for (team, name) in [(Team::Blue, blue), (Team::Red, red)] {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match team {
                Team::Blue => self.default_names.0 = name.to_string(),
                Team::Red => self.default_names.1 = name.to_string(),
            }
            self.team_mut(team).name = name.to_string();
        }
    }

    // --- read access ---

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn team(&self, team: Team) -> &TeamState {
        match team {
            Team::Blue => &self.blue_team,
            Team::Red => &self.red_team,
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut TeamState {
        match team {
            Team::Blue => &mut self.blue_team,
            Team::Red => &mut self.red_team,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// The turn waiting to be played, or `None` once the draft is complete.
    pub fn current_turn(&self) -> Option<Turn> {
        self.draft_mode.order().get(self.current_step).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.current_step >= self.draft_mode.total_turns()
    }

    pub fn rule_set(&self) -> RuleSet {
        self.rule_set
    }

    pub fn draft_mode(&self) -> DraftMode {
        self.draft_mode
    }

    pub fn settings(&self) -> &DraftSettings {
        &self.settings
    }

    pub fn phase_timer(&self) -> u32 {
        self.phase_timer
    }

    pub fn is_timer_active(&self) -> bool {
        self.is_timer_active
    }

    pub fn is_draft_started(&self) -> bool {
        self.is_draft_started
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn status(&self) -> DraftStatus {
        if !self.is_draft_started {
            DraftStatus::NotStarted
        } else if self.is_complete() {
            DraftStatus::Complete
        } else if self.stalled {
            DraftStatus::Stalled
        } else if self.is_timer_active {
            DraftStatus::Running
        } else {
            DraftStatus::Paused
        }
    }

    /// Whether the 1 Hz clock should be running right now.
    pub fn timer_should_run(&self) -> bool {
        self.is_draft_started && self.is_timer_active && !self.is_complete()
    }

    /// Characters neither team has picked or banned, in catalog order.
    pub fn available_characters(&self) -> Vec<&Character> {
        self.catalog
            .list_characters()
            .iter()
            .filter(|c| self.is_available(&c.name))
            .collect()
    }

    fn is_available(&self, name: &str) -> bool {
        [&self.blue_team, &self.red_team]
            .iter()
            .all(|t| !t.has_drafted(name) && !t.has_banned(name))
    }

    fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            blue_team: self.blue_team.clone(),
            red_team: self.red_team.clone(),
            current_step: self.current_step,
            is_timer_active: self.is_timer_active,
            is_draft_started: self.is_draft_started,
        }
    }

    // --- commands ---

    /// Resolve the current turn with `name`: ban it or pick it for the
    /// acting team. Returns the turn that was played.
    pub fn select_character(&mut self, name: &str, selection: Selection) -> Result<Turn, Rejection> {
        let turn = self.current_turn().ok_or(Rejection::DraftComplete)?;
        if !self.is_draft_started && selection == Selection::Manual {
            return Err(Rejection::NotStarted);
        }

        let catalog = Arc::clone(&self.catalog);
        let character = catalog
            .find_character(name)
            .ok_or_else(|| Rejection::UnknownCharacter(name.to_string()))?;
        if !self.is_available(&character.name) {
            return Err(Rejection::Unavailable(character.name.clone()));
        }

        if turn.action == Action::Ban && selection == Selection::Manual {
            let policy = self.settings.ban_restriction;
            let prior: Vec<&Character> = self
                .team(turn.team)
                .banned
                .iter()
                .filter_map(|b| catalog.character(b))
                .collect();
            if !can_ban(policy, character, &prior) {
                debug!(
                    "{} ban of '{}' refused by {:?}",
                    turn.team, character.name, policy
                );
                return Err(Rejection::BanRestricted {
                    team: turn.team,
                    character: character.name.clone(),
                    policy,
                });
            }
        }

        let snapshot = self.snapshot();
        self.history.push_back(snapshot);
        let team = self.team_mut(turn.team);
        match turn.action {
            Action::Ban => team.banned.push_back(character.name.clone()),
            Action::Pick => team.drafted.push_back(DraftedCharacter::picked(character)),
        }
        self.current_step += 1;
        self.phase_timer = self.settings.phase_time;
        self.stalled = false;

        info!(
            "Step {}: {} {:?} '{}'{}",
            self.current_step,
            turn.team,
            turn.action,
            character.name,
            if selection == Selection::Auto { " (auto)" } else { "" }
        );
        if self.is_complete() {
            info!("Draft complete after {} steps", self.current_step);
        }
        Ok(turn)
    }

    /// Step back one action.
    ///
    /// The popped snapshot becomes the current state: rosters, bans, team
    /// names, step, reserve times and the timer/started flags. Equipment
    /// edits made since then survive for every slot that still holds the
    /// same character at the same index, and settings are kept as they are
    /// now.
    pub fn undo(&mut self) -> Result<(), Rejection> {
        let previous = self.history.pop_back().ok_or(Rejection::NothingToUndo)?;

        let mut blue = previous.blue_team;
        let mut red = previous.red_team;
        carry_equipment(&mut blue, &self.blue_team);
        carry_equipment(&mut red, &self.red_team);

        self.blue_team = blue;
        self.red_team = red;
        self.current_step = previous.current_step;
        self.is_timer_active = previous.is_timer_active;
        self.is_draft_started = previous.is_draft_started;
        self.phase_timer = self.settings.phase_time;
        self.stalled = false;

        info!("Undo: back to step {}", self.current_step);
        Ok(())
    }

    /// Empty both rosters and return to the not-started configuration.
    /// Settings, ruleset and draft mode are kept; team names go back to
    /// their defaults.
    pub fn reset(&mut self) {
        let reserve = self.settings.reserve_time;
        self.blue_team = TeamState::new(self.default_names.0.clone(), reserve);
        self.red_team = TeamState::new(self.default_names.1.clone(), reserve);
        self.current_step = 0;
        self.history = Vector::new();
        self.phase_timer = self.settings.phase_time;
        self.is_timer_active = false;
        self.is_draft_started = false;
        self.stalled = false;
        info!("Draft reset");
    }

    pub fn start(&mut self) -> Result<(), Rejection> {
        if self.is_draft_started {
            return Err(Rejection::AlreadyStarted);
        }
        self.is_draft_started = true;
        self.is_timer_active = true;
        self.phase_timer = self.settings.phase_time;
        info!(
            "Draft started: {:?}, {} turns",
            self.draft_mode,
            self.draft_mode.total_turns()
        );
        Ok(())
    }

    /// Flip the timer on or off. Returns the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.is_timer_active = !self.is_timer_active;
        info!(
            "Timer {}",
            if self.is_timer_active { "resumed" } else { "paused" }
        );
        self.is_timer_active
    }

    /// Replace the settings. Reserve times still at the old default follow
    /// the new default; spent or customised ones are left alone.
    pub fn update_settings(&mut self, settings: DraftSettings) -> Result<(), Rejection> {
        settings.validate()?;

        let old_reserve = self.settings.reserve_time;
        for team in [&mut self.blue_team, &mut self.red_team] {
            if team.reserve_time == old_reserve {
                team.reserve_time = settings.reserve_time;
            }
        }
        if !self.is_draft_started {
            self.phase_timer = settings.phase_time;
        }
        self.settings = settings;
        info!(
            "Settings updated: phase={}s reserve={}s bans={:?}",
            self.settings.phase_time, self.settings.reserve_time, self.settings.ban_restriction
        );
        Ok(())
    }

    pub fn reset_settings(&mut self) -> Result<(), Rejection> {
        self.update_settings(DraftSettings::default())
    }

    pub fn change_rule_set(&mut self, rule_set: RuleSet) -> Result<(), Rejection> {
        if self.is_draft_started {
            return Err(Rejection::DraftInProgress);
        }
        self.rule_set = rule_set;
        Ok(())
    }

    pub fn change_draft_mode(&mut self, draft_mode: DraftMode) -> Result<(), Rejection> {
        if self.is_draft_started {
            return Err(Rejection::DraftInProgress);
        }
        self.draft_mode = draft_mode;
        Ok(())
    }

    pub fn change_team_name(&mut self, team: Team, name: &str) {
        self.team_mut(team).name = name.trim().to_string();
    }

    /// Replace the eidolon and lightcone of a drafted slot. The character
    /// itself never changes and no history entry is recorded.
    pub fn update_drafted_character(
        &mut self,
        team: Team,
        index: usize,
        edit: SlotEdit,
    ) -> Result<(), Rejection> {
        let lightcone = match edit.lightcone.as_deref() {
            Some(query) => {
                let cone = self
                    .catalog
                    .find_lightcone(query)
                    .ok_or_else(|| Rejection::UnknownLightcone(query.to_string()))?;
                Some(EquippedLightcone {
                    name: cone.name.clone(),
                    rank: edit.lightcone_rank,
                })
            }
            None => None,
        };
        let slot = self
            .team_mut(team)
            .drafted
            .get_mut(index)
            .ok_or(Rejection::NoSuchSlot { team, index })?;
        slot.rank = edit.rank;
        slot.lightcone = lightcone;
        debug!("{} slot {} now {:?}", team, index, slot);
        Ok(())
    }

    /// Copy rank and lightcone from `loadout` onto every drafted character
    /// it has a member for. Returns how many slots changed.
    pub fn apply_loadout(&mut self, team: Team, loadout: &Loadout) -> usize {
        let catalog = Arc::clone(&self.catalog);
        let mut applied = 0;
        for slot in self.team_mut(team).drafted.iter_mut() {
            let Some(member) = loadout
                .members
                .iter()
                .find(|m| m.character_name == slot.character)
            else {
                continue;
            };
            let Some(resolved) = resolve_team_member(member, &catalog) else {
                warn!(
                    "loadout '{}' member '{}' no longer resolves against the catalog",
                    loadout.name, member.character_name
                );
                continue;
            };
            slot.rank = resolved.rank;
            slot.lightcone = resolved.lightcone.map(|(cone, rank)| EquippedLightcone {
                name: cone.name.clone(),
                rank,
            });
            applied += 1;
        }
        info!("Applied loadout '{}' to {} ({} slots)", loadout.name, team, applied);
        applied
    }

    // --- clock ---

    /// Apply one second of countdown: the phase timer first, then the
    /// acting team's reserve. Does nothing while the clock is stopped.
    pub fn tick(&mut self) -> Option<Countdown> {
        if !self.timer_should_run() {
            return None;
        }
        if self.phase_timer > 0 {
            self.phase_timer -= 1;
            return Some(Countdown::Phase {
                remaining: self.phase_timer,
            });
        }
        let acting = self.current_turn()?.team;
        let team = self.team_mut(acting);
        team.reserve_time = team.reserve_time.saturating_sub(1);
        Some(Countdown::Reserve {
            team: acting,
            remaining: team.reserve_time,
        })
    }

    /// Both clocks of the acting team are spent and a choice is owed.
    pub fn auto_select_due(&self) -> bool {
        if !self.is_draft_started || self.stalled || self.phase_timer > 0 {
            return false;
        }
        match self.current_turn() {
            Some(turn) => self.team(turn.team).reserve_time == 0,
            None => false,
        }
    }

    /// Resolve the current turn with a uniformly random available
    /// character. With nothing left, the draft stalls and the clock stops.
    pub fn auto_select<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<String, Rejection> {
        let choice = self
            .available_characters()
            .choose(rng)
            .map(|c| c.name.clone());
        let Some(name) = choice else {
            warn!(
                "Auto-select at step {} found no available characters; draft stalled",
                self.current_step
            );
            self.stalled = true;
            self.is_timer_active = false;
            return Err(Rejection::PoolExhausted);
        };
        self.select_character(&name, Selection::Auto)?;
        Ok(name)
    }
}

/// Keep equipment edits from `current` on slots of `restored` that still
/// hold the same character at the same index.
fn carry_equipment(restored: &mut TeamState, current: &TeamState) {
    for (index, slot) in restored.drafted.iter_mut().enumerate() {
        if let Some(now) = current.drafted.get(index) {
            if now.character == slot.character {
                slot.rank = now.rank;
                slot.lightcone = now.lightcone.clone();
            }
        }
    }
}
