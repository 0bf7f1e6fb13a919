// Fixed turn sequences for each draft mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Blue,
    Red,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Blue => write!(f, "Blue"),
            Team::Red => write!(f, "Red"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Ban,
    Pick,
}

/// One step of a draft: which team acts and what it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    pub team: Team,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DraftMode {
    /// 20 turns, two bans per team.
    FourBan,
    /// 22 turns, three bans per team.
    SixBan,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown draft mode '{0}' (expected \"4ban\" or \"6ban\")")]
pub struct UnknownDraftMode(pub String);

impl FromStr for DraftMode {
    type Err = UnknownDraftMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "4ban" | "fourban" => Ok(DraftMode::FourBan),
            "6ban" | "sixban" => Ok(DraftMode::SixBan),
            _ => Err(UnknownDraftMode(s.to_string())),
        }
    }
}

/// Picks each team makes regardless of mode.
pub const PICKS_PER_TEAM: usize = 8;

const fn t(team: Team, action: Action) -> Turn {
    Turn { team, action }
}

use Action::{Ban as B, Pick as P};
use Team::{Blue, Red};

const FOUR_BAN_ORDER: [Turn; 20] = [
    t(Blue, B),
    t(Red, B),
    t(Blue, P),
    t(Red, P),
    t(Red, P),
    t(Blue, P),
    t(Blue, B),
    t(Red, B),
    t(Red, P),
    t(Blue, P),
    t(Blue, P),
    t(Red, P),
    t(Red, P),
    t(Blue, P),
    t(Blue, P),
    t(Red, P),
    t(Red, P),
    t(Blue, P),
    t(Blue, P),
    t(Red, P),
];

const SIX_BAN_ORDER: [Turn; 22] = [
    t(Blue, B),
    t(Red, B),
    t(Blue, P),
    t(Red, P),
    t(Red, P),
    t(Blue, P),
    t(Red, B),
    t(Blue, B),
    t(Red, P),
    t(Blue, P),
    t(Blue, P),
    t(Red, P),
    t(Blue, B),
    t(Red, B),
    t(Blue, P),
    t(Red, P),
    t(Red, P),
    t(Blue, P),
    t(Blue, P),
    t(Red, P),
    t(Red, P),
    t(Blue, P),
];

impl DraftMode {
    /// The turn sequence this mode follows.
    pub fn order(&self) -> &'static [Turn] {
        match self {
            DraftMode::FourBan => &FOUR_BAN_ORDER,
            DraftMode::SixBan => &SIX_BAN_ORDER,
        }
    }

    pub fn bans_per_team(&self) -> usize {
        match self {
            DraftMode::FourBan => 2,
            DraftMode::SixBan => 3,
        }
    }

    pub fn total_turns(&self) -> usize {
        self.order().len()
    }
}

/// Number of turns of `action` that `team` gets in `mode`.
pub fn slots_for(mode: DraftMode, team: Team, action: Action) -> usize {
    mode.order()
        .iter()
        .filter(|turn| turn.team == team && turn.action == action)
        .count()
}
