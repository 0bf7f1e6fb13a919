// Saved team loadouts: per-character eidolon and lightcone choices that can
// be re-applied to a later draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Character, Eidolon, Lightcone, Superimposition};
use crate::draft::state::{DraftedCharacter, TeamState};

/// A single character's saved equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadoutMember {
    pub character_name: String,
    pub rank: Eidolon,
    #[serde(default)]
    pub lightcone_name: Option<String>,
    #[serde(default)]
    pub lightcone_rank: Superimposition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loadout {
    pub name: String,
    pub members: Vec<LoadoutMember>,
    /// Set when the loadout is written to the database.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Loadout {
    /// Record the current equipment of every drafted character on `team`.
    pub fn capture(name: &str, team: &TeamState) -> Self {
        Loadout {
            name: name.trim().to_string(),
            members: team.drafted.iter().map(unresolve_drafted).collect(),
            saved_at: None,
        }
    }
}

/// A loadout member bound to live catalog entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMember<'a> {
    pub character: &'a Character,
    pub rank: Eidolon,
    pub lightcone: Option<(&'a Lightcone, Superimposition)>,
}

/// Bind `member` to the catalog, matching names first and aliases second.
/// A character that no longer exists yields `None`; a lightcone that no
/// longer exists is dropped.
pub fn resolve_team_member<'a>(member: &LoadoutMember, catalog: &'a Catalog) -> Option<ResolvedMember<'a>> {
    let character = catalog.find_character(&member.character_name)?;
    let lightcone = member
        .lightcone_name
        .as_deref()
        .and_then(|name| catalog.find_lightcone(name))
        .map(|cone| (cone, member.lightcone_rank));
    Some(ResolvedMember {
        character,
        rank: member.rank,
        lightcone,
    })
}

/// Inverse of [`resolve_team_member`]: store canonical names only.
pub fn unresolve_team_member(resolved: &ResolvedMember<'_>) -> LoadoutMember {
    LoadoutMember {
        character_name: resolved.character.name.clone(),
        rank: resolved.rank,
        lightcone_name: resolved.lightcone.map(|(cone, _)| cone.name.clone()),
        lightcone_rank: resolved
            .lightcone
            .map(|(_, rank)| rank)
            .unwrap_or_default(),
    }
}

fn unresolve_drafted(slot: &DraftedCharacter) -> LoadoutMember {
    LoadoutMember {
        character_name: slot.character.clone(),
        rank: slot.rank,
        lightcone_name: slot.lightcone.as_ref().map(|lc| lc.name.clone()),
        lightcone_rank: slot.lightcone.as_ref().map(|lc| lc.rank).unwrap_or_default(),
    }
}
