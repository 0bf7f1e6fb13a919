// Character and lightcone catalog: the read-only pool the draft picks from.
//
// Loaded from two CSV files. Each character row carries one cost table per
// ruleset (E0..E6); each lightcone row carries a single S1..S5 cost table.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Enums shared across the engine
// ---------------------------------------------------------------------------

/// Scoring/cost context of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSet {
    MemoryOfChaos,
    ApocalypticShadow,
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSet::MemoryOfChaos => write!(f, "Memory of Chaos"),
            RuleSet::ApocalypticShadow => write!(f, "Apocalyptic Shadow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ruleset '{0}' (expected \"moc\" or \"apoc\")")]
pub struct UnknownRuleSet(pub String);

impl FromStr for RuleSet {
    type Err = UnknownRuleSet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "moc" | "memoryofchaos" => Ok(RuleSet::MemoryOfChaos),
            "apoc" | "as" | "apocalypticshadow" => Ok(RuleSet::ApocalypticShadow),
            _ => Err(UnknownRuleSet(s.to_string())),
        }
    }
}

/// Combat role, used by ban restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Dps,
    Support,
    Sustain,
}

impl Role {
    /// Parse the role column of the catalog CSV ("DPS", "Support", "Sustain").
    pub fn from_str_role(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dps" => Some(Role::Dps),
            "support" => Some(Role::Support),
            "sustain" => Some(Role::Sustain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    ThreeStar,
    FourStar,
    FiveStar,
}

impl Rarity {
    pub fn from_stars(stars: u8) -> Option<Self> {
        match stars {
            3 => Some(Rarity::ThreeStar),
            4 => Some(Rarity::FourStar),
            5 => Some(Rarity::FiveStar),
            _ => None,
        }
    }
}

/// Eidolon level of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Eidolon {
    E0,
    E1,
    E2,
    E3,
    E4,
    E5,
    E6,
}

impl Eidolon {
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Superimposition level of a lightcone.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Superimposition {
    #[default]
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl Superimposition {
    pub fn index(&self) -> usize {
        *self as usize
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// Per-ruleset cost of a character at each eidolon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCosts {
    pub memory_of_chaos: [f64; 7],
    pub apocalyptic_shadow: [f64; 7],
}

impl CharacterCosts {
    pub fn cost(&self, rule_set: RuleSet, rank: Eidolon) -> f64 {
        match rule_set {
            RuleSet::MemoryOfChaos => self.memory_of_chaos[rank.index()],
            RuleSet::ApocalypticShadow => self.apocalyptic_shadow[rank.index()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Stable identifier used everywhere in draft state.
    pub name: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub rarity: Rarity,
    pub role: Role,
    pub costs: CharacterCosts,
}

impl Character {
    /// Eidolon a freshly picked character starts at.
    ///
    /// 5★ characters start at E0, except the Trailblazer variants which are
    /// free to max out and start at E6. Everyone else starts at E6.
    pub fn default_rank(&self) -> Eidolon {
        if self.rarity == Rarity::FiveStar && !self.is_trailblazer() {
            Eidolon::E0
        } else {
            Eidolon::E6
        }
    }

    pub fn is_trailblazer(&self) -> bool {
        self.name.to_ascii_lowercase().contains("trailblazer")
    }

    pub fn cost(&self, rule_set: RuleSet, rank: Eidolon) -> f64 {
        self.costs.cost(rule_set, rank)
    }

    fn matches(&self, query: &str) -> bool {
        self.display_name.eq_ignore_ascii_case(query)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(query))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lightcone {
    pub name: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub rarity: Rarity,
    /// Cost at S1..S5.
    pub costs: [f64; 5],
}

impl Lightcone {
    pub fn cost(&self, rank: Superimposition) -> f64 {
        self.costs[rank.index()]
    }

    fn matches(&self, query: &str) -> bool {
        self.display_name.eq_ignore_ascii_case(query)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(query))
    }
}

/// The immutable set of selectable characters and lightcones.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    characters: Vec<Character>,
    lightcones: Vec<Lightcone>,
    character_index: HashMap<String, usize>,
    lightcone_index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from already-parsed entries. Later duplicates of a
    /// name replace earlier ones.
    pub fn new(characters: Vec<Character>, lightcones: Vec<Lightcone>) -> Self {
        let mut catalog = Catalog::default();
        for c in characters {
            if let Some(&idx) = catalog.character_index.get(&c.name) {
                warn!("duplicate character '{}' in catalog, using latest row", c.name);
                catalog.characters[idx] = c;
            } else {
                catalog.character_index.insert(c.name.clone(), catalog.characters.len());
                catalog.characters.push(c);
            }
        }
        for lc in lightcones {
            if let Some(&idx) = catalog.lightcone_index.get(&lc.name) {
                warn!("duplicate lightcone '{}' in catalog, using latest row", lc.name);
                catalog.lightcones[idx] = lc;
            } else {
                catalog.lightcone_index.insert(lc.name.clone(), catalog.lightcones.len());
                catalog.lightcones.push(lc);
            }
        }
        catalog
    }

    pub fn list_characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn list_lightcones(&self) -> &[Lightcone] {
        &self.lightcones
    }

    /// Look up a character by its exact `name`.
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.character_index.get(name).map(|&i| &self.characters[i])
    }

    /// Look up a lightcone by its exact `name`.
    pub fn lightcone(&self, name: &str) -> Option<&Lightcone> {
        self.lightcone_index.get(name).map(|&i| &self.lightcones[i])
    }

    /// Exact name first, then a case-insensitive display name or alias match.
    pub fn find_character(&self, query: &str) -> Option<&Character> {
        let query = query.trim();
        self.character(query)
            .or_else(|| self.characters.iter().find(|c| c.matches(query)))
    }

    /// Exact name first, then a case-insensitive display name or alias match.
    pub fn find_lightcone(&self, query: &str) -> Option<&Lightcone> {
        let query = query.trim();
        self.lightcone(query)
            .or_else(|| self.lightcones.iter().find(|l| l.matches(query)))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawCharacter {
    name: String,
    display_name: String,
    #[serde(default)]
    aliases: String,
    rarity: u8,
    role: String,
    moc_e0: f64,
    moc_e1: f64,
    moc_e2: f64,
    moc_e3: f64,
    moc_e4: f64,
    moc_e5: f64,
    moc_e6: f64,
    apoc_e0: f64,
    apoc_e1: f64,
    apoc_e2: f64,
    apoc_e3: f64,
    apoc_e4: f64,
    apoc_e5: f64,
    apoc_e6: f64,
}

#[derive(Debug, Deserialize)]
struct RawLightcone {
    name: String,
    display_name: String,
    #[serde(default)]
    aliases: String,
    rarity: u8,
    s1: f64,
    s2: f64,
    s3: f64,
    s4: f64,
    s5: f64,
}

fn split_aliases(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn characters_from_reader<R: Read>(rdr: R) -> Result<Vec<Character>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut characters = Vec::new();
    for result in reader.deserialize::<RawCharacter>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed character row: {}", e);
                continue;
            }
        };
        let name = raw.name.trim().to_string();
        let Some(rarity) = Rarity::from_stars(raw.rarity) else {
            warn!("skipping character '{}': rarity {} is not 3, 4 or 5", name, raw.rarity);
            continue;
        };
        let Some(role) = Role::from_str_role(&raw.role) else {
            warn!("skipping character '{}': unknown role '{}'", name, raw.role);
            continue;
        };
        let moc = [
            raw.moc_e0, raw.moc_e1, raw.moc_e2, raw.moc_e3, raw.moc_e4, raw.moc_e5, raw.moc_e6,
        ];
        let apoc = [
            raw.apoc_e0,
            raw.apoc_e1,
            raw.apoc_e2,
            raw.apoc_e3,
            raw.apoc_e4,
            raw.apoc_e5,
            raw.apoc_e6,
        ];
        if !all_finite(&moc) || !all_finite(&apoc) {
            warn!("skipping character '{}': non-finite cost value", name);
            continue;
        }
        characters.push(Character {
            name,
            display_name: raw.display_name.trim().to_string(),
            aliases: split_aliases(&raw.aliases),
            rarity,
            role,
            costs: CharacterCosts {
                memory_of_chaos: moc,
                apocalyptic_shadow: apoc,
            },
        });
    }
    Ok(characters)
}

fn lightcones_from_reader<R: Read>(rdr: R) -> Result<Vec<Lightcone>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut lightcones = Vec::new();
    for result in reader.deserialize::<RawLightcone>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed lightcone row: {}", e);
                continue;
            }
        };
        let name = raw.name.trim().to_string();
        let Some(rarity) = Rarity::from_stars(raw.rarity) else {
            warn!("skipping lightcone '{}': rarity {} is not 3, 4 or 5", name, raw.rarity);
            continue;
        };
        let costs = [raw.s1, raw.s2, raw.s3, raw.s4, raw.s5];
        if !all_finite(&costs) {
            warn!("skipping lightcone '{}': non-finite cost value", name);
            continue;
        }
        lightcones.push(Lightcone {
            name,
            display_name: raw.display_name.trim().to_string(),
            aliases: split_aliases(&raw.aliases),
            rarity,
            costs,
        });
    }
    Ok(lightcones)
}

fn open(path: &Path) -> Result<std::fs::File, CatalogError> {
    std::fs::File::open(path).map_err(|e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load the catalog from a characters CSV and a lightcones CSV.
pub fn load_catalog(characters: &Path, lightcones: &Path) -> Result<Catalog, CatalogError> {
    let chars = characters_from_reader(open(characters)?).map_err(|e| CatalogError::Csv {
        path: characters.display().to_string(),
        source: e,
    })?;
    let cones = lightcones_from_reader(open(lightcones)?).map_err(|e| CatalogError::Csv {
        path: lightcones.display().to_string(),
        source: e,
    })?;

    if chars.is_empty() {
        return Err(CatalogError::Validation(
            "characters CSV produced zero valid rows".into(),
        ));
    }

    Ok(Catalog::new(chars, cones))
}

/// Build a catalog straight from CSV text. Used by tests across the workspace.
pub fn catalog_from_csv(characters: &str, lightcones: &str) -> Result<Catalog, CatalogError> {
    let chars = characters_from_reader(characters.as_bytes()).map_err(|e| CatalogError::Csv {
        path: "<inline characters>".into(),
        source: e,
    })?;
    let cones = lightcones_from_reader(lightcones.as_bytes()).map_err(|e| CatalogError::Csv {
        path: "<inline lightcones>".into(),
        source: e,
    })?;
    Ok(Catalog::new(chars, cones))
}
