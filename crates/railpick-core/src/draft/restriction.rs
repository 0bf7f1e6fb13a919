// Ban restriction policies.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{Character, Role};

/// Which of a team's earlier bans block a new ban.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum BanRestriction {
    /// Anything may be banned.
    #[default]
    #[serde(rename = "none")]
    Unrestricted,
    /// At most one ban per role.
    #[serde(rename = "onePerRole")]
    OnePerRole,
    #[serde(rename = "oneDPS")]
    OneDps,
    #[serde(rename = "oneSupport")]
    OneSupport,
    #[serde(rename = "oneSustain")]
    OneSustain,
}

impl BanRestriction {
    /// Parse a policy name. Unrecognised names fall back to `Unrestricted`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim() {
            "none" => BanRestriction::Unrestricted,
            "onePerRole" => BanRestriction::OnePerRole,
            "oneDPS" => BanRestriction::OneDps,
            "oneSupport" => BanRestriction::OneSupport,
            "oneSustain" => BanRestriction::OneSustain,
            other => {
                warn!("unknown ban restriction '{}', allowing all bans", other);
                BanRestriction::Unrestricted
            }
        }
    }

    /// The single role this policy limits, for the `one<Role>` policies.
    fn limited_role(&self) -> Option<Role> {
        match self {
            BanRestriction::OneDps => Some(Role::Dps),
            BanRestriction::OneSupport => Some(Role::Support),
            BanRestriction::OneSustain => Some(Role::Sustain),
            BanRestriction::Unrestricted | BanRestriction::OnePerRole => None,
        }
    }
}

impl From<String> for BanRestriction {
    fn from(s: String) -> Self {
        BanRestriction::from_str_lossy(&s)
    }
}

/// Whether `candidate` may be banned by a team whose earlier bans are
/// `prior_bans`.
pub fn can_ban(policy: BanRestriction, candidate: &Character, prior_bans: &[&Character]) -> bool {
    let already_banned = |role: Role| prior_bans.iter().any(|c| c.role == role);
    match policy {
        BanRestriction::Unrestricted => true,
        BanRestriction::OnePerRole => !already_banned(candidate.role),
        limited => match limited.limited_role() {
            Some(role) if candidate.role == role => !already_banned(role),
            _ => true,
        },
    }
}
