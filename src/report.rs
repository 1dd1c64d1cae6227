use anyhow::{Context, Result};
use rusqlite::Connection;

/// Per-run operator summary: enough to judge match quality without reading
/// individual rows.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSummary {
    pub players: i64,
    pub teams: i64,
    pub lineup_rows: i64,
    pub season_stat_rows: i64,
    pub physical_rows: i64,
    pub manual_mappings: i64,
    pub fused_rows: i64,
    pub with_statsbomb: i64,
    pub with_skillcorner: i64,
    pub with_transfermarkt: i64,
    pub linked_event_tracking: i64,
    pub linked_event_market: i64,
    pub linked_all_three: i64,
    pub unlinked_statsbomb_only: i64,
    pub unlinked_skillcorner_only: i64,
    pub unlinked_transfermarkt_only: i64,
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("count query: {sql}"))
}

pub fn database_summary(conn: &Connection) -> Result<DatabaseSummary> {
    Ok(DatabaseSummary {
        players: count(conn, "SELECT COUNT(*) FROM players")?,
        teams: count(conn, "SELECT COUNT(*) FROM teams")?,
        lineup_rows: count(conn, "SELECT COUNT(*) FROM match_lineups")?,
        season_stat_rows: count(conn, "SELECT COUNT(*) FROM player_season_stats")?,
        physical_rows: count(conn, "SELECT COUNT(*) FROM player_match_physical")?,
        manual_mappings: count(conn, "SELECT COUNT(*) FROM player_manual_mapping")?,
        fused_rows: count(conn, "SELECT COUNT(*) FROM player_fused")?,
        with_statsbomb: count(
            conn,
            "SELECT COUNT(*) FROM players WHERE statsbomb_player_id IS NOT NULL",
        )?,
        with_skillcorner: count(
            conn,
            "SELECT COUNT(*) FROM players WHERE skillcorner_player_id IS NOT NULL",
        )?,
        with_transfermarkt: count(
            conn,
            "SELECT COUNT(*) FROM players WHERE transfermarkt_player_id IS NOT NULL",
        )?,
        linked_event_tracking: count(
            conn,
            "SELECT COUNT(*) FROM players
             WHERE statsbomb_player_id IS NOT NULL AND skillcorner_player_id IS NOT NULL",
        )?,
        linked_event_market: count(
            conn,
            "SELECT COUNT(*) FROM players
             WHERE statsbomb_player_id IS NOT NULL AND transfermarkt_player_id IS NOT NULL",
        )?,
        linked_all_three: count(
            conn,
            "SELECT COUNT(*) FROM players
             WHERE statsbomb_player_id IS NOT NULL
               AND skillcorner_player_id IS NOT NULL
               AND transfermarkt_player_id IS NOT NULL",
        )?,
        unlinked_statsbomb_only: count(
            conn,
            "SELECT COUNT(*) FROM players
             WHERE statsbomb_player_id IS NOT NULL
               AND skillcorner_player_id IS NULL
               AND transfermarkt_player_id IS NULL",
        )?,
        unlinked_skillcorner_only: count(
            conn,
            "SELECT COUNT(*) FROM players
             WHERE skillcorner_player_id IS NOT NULL
               AND statsbomb_player_id IS NULL
               AND transfermarkt_player_id IS NULL",
        )?,
        unlinked_transfermarkt_only: count(
            conn,
            "SELECT COUNT(*) FROM players
             WHERE transfermarkt_player_id IS NOT NULL
               AND statsbomb_player_id IS NULL
               AND skillcorner_player_id IS NULL",
        )?,
    })
}

pub fn print_summary(summary: &DatabaseSummary) {
    println!("=== registry summary ===");
    println!("players ............... {}", summary.players);
    println!("teams ................. {}", summary.teams);
    println!("lineup rows ........... {}", summary.lineup_rows);
    println!("season stat rows ...... {}", summary.season_stat_rows);
    println!("physical rows ......... {}", summary.physical_rows);
    println!("manual mappings ....... {}", summary.manual_mappings);
    println!("fused rows ............ {}", summary.fused_rows);
    println!("--- source coverage ---");
    println!("with statsbomb id ..... {}", summary.with_statsbomb);
    println!("with skillcorner id ... {}", summary.with_skillcorner);
    println!("with transfermarkt id . {}", summary.with_transfermarkt);
    println!("sb + sc linked ........ {}", summary.linked_event_tracking);
    println!("sb + tm linked ........ {}", summary.linked_event_market);
    println!("all three linked ...... {}", summary.linked_all_three);
    println!("--- still unlinked ---");
    println!("statsbomb only ........ {}", summary.unlinked_statsbomb_only);
    println!("skillcorner only ...... {}", summary.unlinked_skillcorner_only);
    println!("transfermarkt only .... {}", summary.unlinked_transfermarkt_only);
}
