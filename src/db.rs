use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

const DB_ENV_VAR: &str = "METZ_DB_PATH";
const DB_FILE: &str = "metz_pipeline.sqlite";

pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(DB_FILE)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS teams (
            team_id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_name TEXT NOT NULL UNIQUE,
            statsbomb_team_id INTEGER UNIQUE,
            skillcorner_team_id INTEGER UNIQUE,
            transfermarkt_team_id TEXT UNIQUE,
            country TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            player_id INTEGER PRIMARY KEY AUTOINCREMENT,
            statsbomb_player_id INTEGER NULL UNIQUE,
            statsbomb_player_name TEXT NULL,
            skillcorner_player_id INTEGER NULL UNIQUE,
            skillcorner_player_name TEXT NULL,
            transfermarkt_player_id TEXT NULL UNIQUE,
            player_name TEXT NOT NULL,
            date_of_birth TEXT NULL,
            nationality TEXT NULL,
            height_cm REAL NULL,
            weight_kg REAL NULL,
            preferred_foot TEXT NULL,
            primary_position TEXT NULL,
            market_value TEXT NULL,
            market_value_numeric REAL NULL,
            contract_expiry TEXT NULL,
            current_club TEXT NULL,
            agent TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS match_lineups (
            lineup_id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            source_match_id INTEGER NOT NULL,
            player_id INTEGER NOT NULL REFERENCES players(player_id),
            team_id INTEGER NULL REFERENCES teams(team_id),
            position TEXT NULL,
            minutes_played REAL NULL,
            UNIQUE(source, source_match_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS player_season_stats (
            stat_id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players(player_id),
            season_id INTEGER NOT NULL,
            minutes_played INTEGER NULL,
            goals_90 REAL NULL,
            assists_90 REAL NULL,
            np_xg_90 REAL NULL,
            shots_90 REAL NULL,
            passes_90 REAL NULL,
            tackles_90 REAL NULL,
            pressures_90 REAL NULL,
            obv_90 REAL NULL,
            UNIQUE(player_id, season_id)
        );

        CREATE TABLE IF NOT EXISTS player_match_physical (
            physical_id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players(player_id),
            skillcorner_match_id INTEGER NOT NULL,
            total_distance_m REAL NULL,
            sprinting_distance_m REAL NULL,
            max_speed_kmh REAL NULL,
            num_sprints INTEGER NULL,
            num_high_speed_runs INTEGER NULL,
            UNIQUE(player_id, skillcorner_match_id)
        );

        CREATE TABLE IF NOT EXISTS player_manual_mapping (
            mapping_id INTEGER PRIMARY KEY AUTOINCREMENT,
            statsbomb_player_id INTEGER NOT NULL,
            skillcorner_player_id INTEGER NULL,
            transfermarkt_player_id TEXT NULL,
            notes TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS player_fused (
            player_id INTEGER PRIMARY KEY REFERENCES players(player_id),
            player_name TEXT NOT NULL,
            minutes_played_sb INTEGER NULL,
            goals_90 REAL NULL,
            assists_90 REAL NULL,
            np_xg_90 REAL NULL,
            shots_90 REAL NULL,
            passes_90 REAL NULL,
            tackles_90 REAL NULL,
            pressures_90 REAL NULL,
            obv_90 REAL NULL,
            matches_tracked INTEGER NULL,
            avg_total_distance_m REAL NULL,
            avg_sprinting_m REAL NULL,
            avg_max_speed_kmh REAL NULL,
            avg_sprints REAL NULL,
            avg_high_speed_runs REAL NULL,
            market_value TEXT NULL,
            market_value_numeric REAL NULL,
            contract_expiry TEXT NULL,
            current_club TEXT NULL,
            has_event_data INTEGER NOT NULL DEFAULT 0,
            has_tracking_data INTEGER NOT NULL DEFAULT 0,
            has_context_data INTEGER NOT NULL DEFAULT 0,
            sources_linked INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS resolver_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            manual_applied INTEGER NOT NULL DEFAULT 0,
            merged_event_tracking INTEGER NOT NULL DEFAULT 0,
            linked_market INTEGER NOT NULL DEFAULT 0,
            fused_rows INTEGER NOT NULL DEFAULT 0,
            errors_json TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_lineups_player ON match_lineups(player_id);
        CREATE INDEX IF NOT EXISTS idx_stats_player ON player_season_stats(player_id);
        CREATE INDEX IF NOT EXISTS idx_physical_player ON player_match_physical(player_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Insert a resolver_runs row and return its id. Closed by `finish_run`.
pub fn start_run(conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO resolver_runs(started_at) VALUES (?1)",
        params![Utc::now().to_rfc3339()],
    )
    .context("insert resolver run")?;
    Ok(conn.last_insert_rowid())
}

pub struct RunCounts {
    pub manual_applied: usize,
    pub merged_event_tracking: usize,
    pub linked_market: usize,
    pub fused_rows: usize,
    pub errors: Vec<String>,
}

pub fn finish_run(conn: &Connection, run_id: i64, counts: &RunCounts) -> Result<()> {
    let errors_json = serde_json::to_string(&counts.errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE resolver_runs
         SET finished_at = ?1, manual_applied = ?2, merged_event_tracking = ?3,
             linked_market = ?4, fused_rows = ?5, errors_json = ?6
         WHERE run_id = ?7",
        params![
            Utc::now().to_rfc3339(),
            counts.manual_applied as i64,
            counts.merged_event_tracking as i64,
            counts.linked_market as i64,
            counts.fused_rows as i64,
            errors_json,
            run_id
        ],
    )
    .context("update resolver run")?;
    Ok(())
}
