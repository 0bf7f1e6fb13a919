// Roster cost and final match score.
//
// Memory of Chaos scores are cycle counts (lower is better); Apocalyptic
// Shadow scores are points (higher is better). Every adjustment below is
// signed so that it helps or hurts in the direction the ruleset expects.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{Catalog, RuleSet};
use crate::draft::order::Team;
use crate::draft::state::{DraftState, TeamState};
use crate::settings::ScoringCoefficients;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("missing match result field: {0}")]
    MissingField(&'static str),

    #[error("scores can only be calculated once the draft is complete")]
    DraftIncomplete,
}

/// User-entered results for one team. Every field must be filled in before
/// a score can be computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    #[serde(default)]
    pub first_half: Option<f64>,
    #[serde(default)]
    pub second_half: Option<f64>,
    #[serde(default)]
    /// Deaths as entered; fractional values are accepted as-is.
    pub deaths: Option<f64>,
    #[serde(default)]
    pub additional_modifier: Option<f64>,
}

struct FilledResult {
    first_half: f64,
    second_half: f64,
    deaths: f64,
    additional_modifier: f64,
}

impl MatchResult {
    fn filled(&self) -> Result<FilledResult, ScoringError> {
        Ok(FilledResult {
            first_half: self.first_half.ok_or(ScoringError::MissingField("first_half"))?,
            second_half: self.second_half.ok_or(ScoringError::MissingField("second_half"))?,
            deaths: self.deaths.ok_or(ScoringError::MissingField("deaths"))?,
            additional_modifier: self
                .additional_modifier
                .ok_or(ScoringError::MissingField("additional_modifier"))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub cost: f64,
    pub base: f64,
    pub roster_adjustment: f64,
    pub threshold_adjustment: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub blue: ScoreBreakdown,
    pub red: ScoreBreakdown,
    /// `None` on an exact tie.
    pub winner: Option<Team>,
}

/// Sum of every drafted character's cost at its eidolon plus its
/// lightcone's cost at its superimposition.
pub fn team_cost(team: &TeamState, catalog: &Catalog, rule_set: RuleSet) -> f64 {
    team.drafted
        .iter()
        .map(|slot| {
            let character = match catalog.character(&slot.character) {
                Some(c) => c.cost(rule_set, slot.rank),
                None => {
                    warn!("'{}' is not in the catalog, costing it at 0", slot.character);
                    0.0
                }
            };
            let lightcone = match &slot.lightcone {
                Some(equipped) => match catalog.lightcone(&equipped.name) {
                    Some(cone) => cone.cost(equipped.rank),
                    None => {
                        warn!("lightcone '{}' is not in the catalog, costing it at 0", equipped.name);
                        0.0
                    }
                },
                None => 0.0,
            };
            character + lightcone
        })
        .sum()
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Score one team given both rosters' costs.
pub fn score_team(
    rule_set: RuleSet,
    coefficients: &ScoringCoefficients,
    cost: f64,
    opponent_cost: f64,
    result: &MatchResult,
) -> Result<ScoreBreakdown, ScoringError> {
    let r = result.filled()?;
    let c = coefficients;

    let death_term = r.deaths * c.death_penalty;
    let base = match rule_set {
        RuleSet::MemoryOfChaos => r.first_half + r.second_half + r.additional_modifier + death_term,
        RuleSet::ApocalypticShadow => {
            r.first_half + r.second_half + r.additional_modifier - death_term
        }
    };

    let roster_adjustment = if cost < opponent_cost {
        let advantage = (opponent_cost - cost) * c.roster_difference_advantage_per_point;
        match rule_set {
            RuleSet::MemoryOfChaos => -advantage,
            RuleSet::ApocalypticShadow => advantage,
        }
    } else {
        0.0
    };

    let threshold_diff = cost - c.roster_threshold;
    let threshold_adjustment = if threshold_diff > 0.0 {
        let penalty = threshold_diff * c.above_threshold_penalty_per_point;
        match rule_set {
            RuleSet::MemoryOfChaos => penalty,
            RuleSet::ApocalypticShadow => -penalty,
        }
    } else if threshold_diff < 0.0 {
        let advantage = threshold_diff.abs() * c.under_threshold_advantage_per_point;
        match rule_set {
            RuleSet::MemoryOfChaos => -advantage,
            RuleSet::ApocalypticShadow => advantage,
        }
    } else {
        0.0
    };

    Ok(ScoreBreakdown {
        cost,
        base,
        roster_adjustment,
        threshold_adjustment,
        final_score: round3(base + roster_adjustment + threshold_adjustment),
    })
}

/// Score both teams of a completed draft and decide the winner.
pub fn score_match(
    draft: &DraftState,
    blue: &MatchResult,
    red: &MatchResult,
) -> Result<MatchScore, ScoringError> {
    if !draft.is_complete() {
        return Err(ScoringError::DraftIncomplete);
    }
    let rule_set = draft.rule_set();
    let coefficients = draft.settings().coefficients(rule_set);
    let blue_cost = team_cost(draft.team(Team::Blue), draft.catalog(), rule_set);
    let red_cost = team_cost(draft.team(Team::Red), draft.catalog(), rule_set);

    let blue = score_team(rule_set, coefficients, blue_cost, red_cost, blue)?;
    let red = score_team(rule_set, coefficients, red_cost, blue_cost, red)?;

    let (b, r) = (blue.final_score, red.final_score);
    let winner = if b == r {
        None
    } else {
        let blue_better = match rule_set {
            RuleSet::MemoryOfChaos => b < r,
            RuleSet::ApocalypticShadow => b > r,
        };
        Some(if blue_better { Team::Blue } else { Team::Red })
    };

    Ok(MatchScore { blue, red, winner })
}
