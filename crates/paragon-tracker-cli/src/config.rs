//! Locates the database file and the optional character roster.
//!
//! Database path precedence:
//! 1. `--db` on the command line
//! 2. `PARAGON_TRACKER_DB` environment variable
//! 3. `$HOME/.local/share/paragon-tracker/records.sqlite3`
//! 4. `./data_system.db`

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use paragon_tracker_core::Roster;

pub const DB_ENV_VAR: &str = "PARAGON_TRACKER_DB";

const HOME_DATA_FILE: &str = ".local/share/paragon-tracker/records.sqlite3";
const FALLBACK_DATA_FILE: &str = "./data_system.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    pub roster: Roster,
}

impl TrackerConfig {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            roster: Roster::unrestricted(),
        }
    }

    #[must_use]
    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }
}

#[must_use]
pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }

    if let Ok(path) = std::env::var(DB_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(HOME_DATA_FILE);
    }

    PathBuf::from(FALLBACK_DATA_FILE)
}

/// Chooses the roster from `--roster-file` / `--known-roster`.
///
/// # Errors
/// Returns an error when both are given or the roster file cannot be read
/// as a JSON array of names.
pub fn resolve_roster(roster_file: Option<&Path>, known_roster: bool) -> Result<Roster> {
    match (roster_file, known_roster) {
        (Some(_), true) => Err(anyhow!(
            "--roster-file and --known-roster are mutually exclusive"
        )),
        (Some(path), false) => load_roster(path),
        (None, true) => Ok(Roster::known()),
        (None, false) => Ok(Roster::unrestricted()),
    }
}

/// Reads a roster file holding a JSON array of character names.
///
/// # Errors
/// Returns an error when the file is unreadable or not a JSON array of strings.
pub fn load_roster(path: &Path) -> Result<Roster> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&body)
        .with_context(|| format!("roster file {} is not valid JSON", path.display()))?;
    Roster::from_json(&value).map_err(|err| anyhow!("{}: {err}", path.display()))
}

/// Creates the parent directory of a database file if it is missing.
///
/// # Errors
/// Returns an error when the directory cannot be created.
pub fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display())),
        _ => Ok(()),
    }
}
