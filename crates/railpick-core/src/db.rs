// SQLite persistence for saved loadouts and key-value app state.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::warn;

use crate::loadout::{Loadout, LoadoutMember};
use crate::settings::DraftSettings;

/// Key under which the last-used draft settings are stored.
pub const SETTINGS_KEY: &str = "settings";

/// SQLite-backed storage for loadouts and key-value state. The draft itself
/// is never written here.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS loadouts (
                name     TEXT PRIMARY KEY,
                members  TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert or replace a loadout by name. Returns the loadout as stored,
    /// with `saved_at` set to now.
    pub fn save_loadout(&self, loadout: &Loadout) -> Result<Loadout> {
        let saved_at = Utc::now();
        let members_json =
            serde_json::to_string(&loadout.members).context("failed to serialize loadout members")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO loadouts (name, members, saved_at) VALUES (?1, ?2, ?3)",
                params![loadout.name, members_json, saved_at.to_rfc3339()],
            )
            .with_context(|| format!("failed to save loadout '{}'", loadout.name))?;
        Ok(Loadout {
            saved_at: Some(saved_at),
            ..loadout.clone()
        })
    }

    /// All saved loadouts, ordered by name. Rows that no longer decode are
    /// skipped with a warning.
    pub fn load_loadouts(&self) -> Result<Vec<Loadout>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT name, members, saved_at FROM loadouts ORDER BY name")
            .context("failed to prepare load_loadouts query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("failed to query loadouts")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map loadout rows")?;

        let mut loadouts = Vec::with_capacity(rows.len());
        for (name, members_json, saved_at) in rows {
            let members: Vec<LoadoutMember> = match serde_json::from_str(&members_json) {
                Ok(m) => m,
                Err(e) => {
                    warn!("skipping loadout '{}': bad members JSON: {}", name, e);
                    continue;
                }
            };
            let saved_at = DateTime::parse_from_rfc3339(&saved_at)
                .map(|t| t.with_timezone(&Utc))
                .ok();
            loadouts.push(Loadout {
                name,
                members,
                saved_at,
            });
        }
        Ok(loadouts)
    }

    /// Look up one loadout by exact name.
    pub fn load_loadout(&self, name: &str) -> Result<Option<Loadout>> {
        Ok(self.load_loadouts()?.into_iter().find(|l| l.name == name))
    }

    /// Delete a loadout. Returns whether a row was removed.
    pub fn delete_loadout(&self, name: &str) -> Result<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM loadouts WHERE name = ?1", params![name])
            .with_context(|| format!("failed to delete loadout '{name}'"))?;
        Ok(removed > 0)
    }

    /// Persist an arbitrary JSON value under `key`, replacing any previous
    /// value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO kv_state (key, value) VALUES (?1, ?2)",
                params![key, json_str],
            )
            .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM kv_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query kv_state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn save_settings(&self, settings: &DraftSettings) -> Result<()> {
        let value = serde_json::to_value(settings).context("failed to serialize settings")?;
        self.save_state(SETTINGS_KEY, &value)
    }

    /// The last saved settings, if any. A stored value that no longer
    /// decodes is treated as absent.
    pub fn load_settings(&self) -> Result<Option<DraftSettings>> {
        let Some(value) = self.load_state(SETTINGS_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                warn!("ignoring stored settings: {}", e);
                Ok(None)
            }
        }
    }
}
