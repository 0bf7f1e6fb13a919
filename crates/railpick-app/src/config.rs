// Configuration loading and parsing (draft.toml, server.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use railpick_core::catalog::RuleSet;
use railpick_core::draft::order::DraftMode;
use railpick_core::draft::restriction::BanRestriction;
use railpick_core::settings::{DraftSettings, ScoringCoefficients};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub draft: DraftConfig,
    pub ws_port: u16,
    pub db_path: String,
    pub catalog_paths: CatalogPaths,
}

/// Initial configuration of a draft session.
#[derive(Debug, Clone)]
pub struct DraftConfig {
    pub rule_set: RuleSet,
    pub draft_mode: DraftMode,
    pub blue_team_name: String,
    pub red_team_name: String,
    pub settings: DraftSettings,
}

// ---------------------------------------------------------------------------
// draft.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct DraftFile {
    draft: DraftSection,
    timers: TimersSection,
    #[serde(default)]
    bans: BansSection,
    scoring: ScoringSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DraftSection {
    rule_set: String,
    draft_mode: String,
    blue_team_name: String,
    red_team_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TimersSection {
    phase_time: u32,
    reserve_time: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BansSection {
    #[serde(default)]
    restriction: BanRestriction,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoringSection {
    memory_of_chaos: CoefficientsSection,
    apocalyptic_shadow: CoefficientsSection,
}

#[derive(Debug, Clone, Deserialize)]
struct CoefficientsSection {
    roster_difference_advantage_per_point: f64,
    roster_threshold: f64,
    under_threshold_advantage_per_point: f64,
    above_threshold_penalty_per_point: f64,
    death_penalty: f64,
}

impl From<CoefficientsSection> for ScoringCoefficients {
    fn from(c: CoefficientsSection) -> Self {
        ScoringCoefficients {
            roster_difference_advantage_per_point: c.roster_difference_advantage_per_point,
            roster_threshold: c.roster_threshold,
            under_threshold_advantage_per_point: c.under_threshold_advantage_per_point,
            above_threshold_penalty_per_point: c.above_threshold_penalty_per_point,
            death_penalty: c.death_penalty,
        }
    }
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    websocket: WebsocketSection,
    database: DatabaseSection,
    catalog: CatalogPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPaths {
    pub characters: String,
    pub lightcones: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/draft.toml` and
/// `config/server.toml`, relative to `base_dir`. Does not copy defaults;
/// prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let draft_path = config_dir.join("draft.toml");
    let draft_file: DraftFile = parse_file(&draft_path)?;

    let server_path = config_dir.join("server.toml");
    let server_file: ServerFile = parse_file(&server_path)?;

    let draft = assemble_draft(draft_file)?;
    let config = Config {
        draft,
        ws_port: server_file.websocket.port,
        db_path: server_file.database.path,
        catalog_paths: server_file.catalog,
    };

    validate(&config)?;

    Ok(config)
}

fn assemble_draft(file: DraftFile) -> Result<DraftConfig, ConfigError> {
    let rule_set = file
        .draft
        .rule_set
        .parse::<RuleSet>()
        .map_err(|e| ConfigError::ValidationError {
            field: "draft.rule_set".into(),
            message: e.to_string(),
        })?;
    let draft_mode = file
        .draft
        .draft_mode
        .parse::<DraftMode>()
        .map_err(|e| ConfigError::ValidationError {
            field: "draft.draft_mode".into(),
            message: e.to_string(),
        })?;

    Ok(DraftConfig {
        rule_set,
        draft_mode,
        blue_team_name: file.draft.blue_team_name,
        red_team_name: file.draft.red_team_name,
        settings: DraftSettings {
            phase_time: file.timers.phase_time,
            reserve_time: file.timers.reserve_time,
            ban_restriction: file.bans.restriction,
            moc_settings: file.scoring.memory_of_chaos.into(),
            apoc_settings: file.scoring.apocalyptic_shadow.into(),
        },
    })
}

/// Files under `config/` that are seeded from `defaults/`.
const CONFIG_FILES: [&str; 2] = ["draft.toml", "server.toml"];

/// Copy every config file missing from `config/` out of `defaults/`.
/// Existing files are never overwritten. Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let copy_error = |message: String| ConfigError::DefaultsCopyError { message };

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(copy_error(format!(
            "neither defaults/ nor config/ directory found in {}",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;

    let mut copied = Vec::new();
    for file in CONFIG_FILES {
        let source = defaults_dir.join(file);
        let target = config_dir.join(file);
        if target.exists() || !source.is_file() {
            continue;
        }
        std::fs::copy(&source, &target)
            .map_err(|e| copy_error(format!("failed to copy {}: {e}", source.display())))?;
        copied.push(target);
    }
    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = read_file(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.ws_port == 0 {
        return Err(ConfigError::ValidationError {
            field: "websocket.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    for (field, name) in [
        ("draft.blue_team_name", &config.draft.blue_team_name),
        ("draft.red_team_name", &config.draft.red_team_name),
    ] {
        if name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: field.into(),
                message: "must not be empty".into(),
            });
        }
    }

    config
        .draft
        .settings
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "draft settings".into(),
            message: e.to_string(),
        })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
