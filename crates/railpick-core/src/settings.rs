// Draft settings: timers, ban policy, and per-ruleset scoring coefficients.

use serde::{Deserialize, Serialize};

use crate::catalog::RuleSet;
use crate::draft::restriction::BanRestriction;

/// Lower bound for both the phase timer and the reserve timer, in seconds.
pub const MIN_TIMER_SECS: u32 = 8;

/// Coefficients of the scoring formula for one ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringCoefficients {
    /// Applied per point of roster cost difference to the cheaper team.
    pub roster_difference_advantage_per_point: f64,
    /// Roster cost at which threshold adjustments flip sign.
    pub roster_threshold: f64,
    pub under_threshold_advantage_per_point: f64,
    pub above_threshold_penalty_per_point: f64,
    pub death_penalty: f64,
}

impl ScoringCoefficients {
    pub fn memory_of_chaos_defaults() -> Self {
        ScoringCoefficients {
            roster_difference_advantage_per_point: 0.0,
            roster_threshold: 45.0,
            under_threshold_advantage_per_point: 0.25,
            above_threshold_penalty_per_point: 0.1667,
            death_penalty: 0.25,
        }
    }

    pub fn apocalyptic_shadow_defaults() -> Self {
        ScoringCoefficients {
            roster_difference_advantage_per_point: 40.0,
            roster_threshold: 50.0,
            under_threshold_advantage_per_point: 0.0,
            above_threshold_penalty_per_point: 0.0,
            death_penalty: 100.0,
        }
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("roster_difference_advantage_per_point", self.roster_difference_advantage_per_point),
            ("roster_threshold", self.roster_threshold),
            ("under_threshold_advantage_per_point", self.under_threshold_advantage_per_point),
            ("above_threshold_penalty_per_point", self.above_threshold_penalty_per_point),
            ("death_penalty", self.death_penalty),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSettings {
    /// Seconds per turn before reserve time starts draining.
    pub phase_time: u32,
    /// Seconds of reserve time each team starts with.
    pub reserve_time: u32,
    #[serde(default)]
    pub ban_restriction: BanRestriction,
    pub moc_settings: ScoringCoefficients,
    pub apoc_settings: ScoringCoefficients,
}

impl Default for DraftSettings {
    fn default() -> Self {
        DraftSettings {
            phase_time: 30,
            reserve_time: 480,
            ban_restriction: BanRestriction::Unrestricted,
            moc_settings: ScoringCoefficients::memory_of_chaos_defaults(),
            apoc_settings: ScoringCoefficients::apocalyptic_shadow_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be at least {min} seconds, got {value}", min = MIN_TIMER_SECS)]
    TimerTooShort { field: &'static str, value: u32 },

    #[error("{field} must be a finite number")]
    NonFinite { field: String },
}

impl DraftSettings {
    pub fn coefficients(&self, rule_set: RuleSet) -> &ScoringCoefficients {
        match rule_set {
            RuleSet::MemoryOfChaos => &self.moc_settings,
            RuleSet::ApocalypticShadow => &self.apoc_settings,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.phase_time < MIN_TIMER_SECS {
            return Err(SettingsError::TimerTooShort {
                field: "phase_time",
                value: self.phase_time,
            });
        }
        if self.reserve_time < MIN_TIMER_SECS {
            return Err(SettingsError::TimerTooShort {
                field: "reserve_time",
                value: self.reserve_time,
            });
        }
        for (prefix, coeffs) in [("moc_settings", &self.moc_settings), ("apoc_settings", &self.apoc_settings)] {
            for (name, value) in coeffs.fields() {
                if !value.is_finite() {
                    return Err(SettingsError::NonFinite {
                        field: format!("{prefix}.{name}"),
                    });
                }
            }
        }
        Ok(())
    }
}
