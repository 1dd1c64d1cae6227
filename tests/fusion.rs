use rusqlite::{Connection, params};

use metz_pipeline::db;
use metz_pipeline::fusion::rebuild_fused_view;
use metz_pipeline::registry::{self, SourceId};

fn test_db() -> Connection {
    db::open_in_memory().expect("in-memory db should open")
}

fn insert_season(conn: &Connection, player_id: i64, season_id: i64, goals_90: f64) {
    conn.execute(
        "INSERT INTO player_season_stats(player_id, season_id, minutes_played, goals_90)
         VALUES (?1, ?2, 900, ?3)",
        params![player_id, season_id, goals_90],
    )
    .expect("insert season stats");
}

fn insert_physical(conn: &Connection, player_id: i64, match_id: i64, distance: f64, sprints: i64) {
    conn.execute(
        "INSERT INTO player_match_physical
           (player_id, skillcorner_match_id, total_distance_m, num_sprints)
         VALUES (?1, ?2, ?3, ?4)",
        params![player_id, match_id, distance, sprints],
    )
    .expect("insert physical record");
}

#[test]
fn fused_row_takes_stats_from_the_latest_season() {
    let mut conn = test_db();
    let player = registry::create_player(&conn, "Jean Dupont", &SourceId::Statsbomb(100))
        .expect("create player");
    insert_season(&conn, player, 90, 0.10);
    insert_season(&conn, player, 235, 0.45);
    insert_season(&conn, player, 108, 0.20);

    let rows = rebuild_fused_view(&mut conn).expect("rebuild");
    assert_eq!(rows, 1);

    let goals: f64 = conn
        .query_row(
            "SELECT goals_90 FROM player_fused WHERE player_id = ?1",
            params![player],
            |row| row.get(0),
        )
        .expect("query fused goals");
    assert!((goals - 0.45).abs() < 1e-9);
}

#[test]
fn tracking_aggregates_average_over_all_matches() {
    let mut conn = test_db();
    let player = registry::create_player(&conn, "Jean Dupont", &SourceId::Skillcorner(200))
        .expect("create player");
    insert_physical(&conn, player, 11, 10_000.0, 20);
    insert_physical(&conn, player, 12, 11_000.0, 30);

    rebuild_fused_view(&mut conn).expect("rebuild");

    let (matches, distance, sprints): (i64, f64, f64) = conn
        .query_row(
            "SELECT matches_tracked, avg_total_distance_m, avg_sprints
             FROM player_fused WHERE player_id = ?1",
            params![player],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("query fused tracking");
    assert_eq!(matches, 2);
    assert!((distance - 10_500.0).abs() < 1e-9);
    assert!((sprints - 25.0).abs() < 1e-9);
}

#[test]
fn sources_linked_counts_contributing_sources_not_ids() {
    let mut conn = test_db();
    // Fully linked ids but only event data present: coverage flags follow the
    // data actually contributed, not the id columns.
    let linked = registry::create_player(&conn, "Jean Dupont", &SourceId::Statsbomb(100))
        .expect("create player");
    registry::assign_link(&conn, linked, &SourceId::Skillcorner(200), None)
        .expect("assign tracking id");
    insert_season(&conn, linked, 235, 0.45);

    let bare = registry::create_player(&conn, "Paul Durand", &SourceId::Statsbomb(101))
        .expect("create bare player");

    let full = registry::create_player(&conn, "Luc Martin", &SourceId::Statsbomb(102))
        .expect("create full player");
    insert_season(&conn, full, 235, 0.10);
    insert_physical(&conn, full, 11, 9_800.0, 15);
    conn.execute(
        "UPDATE players SET market_value = '€5.00m', market_value_numeric = 5000000.0
         WHERE player_id = ?1",
        params![full],
    )
    .expect("seed market context");

    let rows = rebuild_fused_view(&mut conn).expect("rebuild");
    assert_eq!(rows, 3);

    let count_for = |player_id: i64| -> (i64, i64, i64, i64) {
        conn.query_row(
            "SELECT has_event_data, has_tracking_data, has_context_data, sources_linked
             FROM player_fused WHERE player_id = ?1",
            params![player_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .expect("query coverage flags")
    };
    assert_eq!(count_for(linked), (1, 0, 0, 1));
    assert_eq!(count_for(bare), (0, 0, 0, 0));
    assert_eq!(count_for(full), (1, 1, 1, 3));
}

#[test]
fn rebuild_is_a_pure_function_of_the_registry() {
    let mut conn = test_db();
    let player = registry::create_player(&conn, "Jean Dupont", &SourceId::Statsbomb(100))
        .expect("create player");
    insert_season(&conn, player, 235, 0.45);
    insert_physical(&conn, player, 11, 10_000.0, 20);

    let snapshot = |conn: &Connection| -> Vec<(i64, String, Option<f64>, Option<i64>, i64)> {
        let mut stmt = conn
            .prepare(
                "SELECT player_id, player_name, goals_90, matches_tracked, sources_linked
                 FROM player_fused ORDER BY player_id",
            )
            .expect("prepare snapshot");
        stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })
        .expect("query snapshot")
        .collect::<rusqlite::Result<Vec<_>>>()
        .expect("collect snapshot")
    };

    rebuild_fused_view(&mut conn).expect("first rebuild");
    let first = snapshot(&conn);
    rebuild_fused_view(&mut conn).expect("second rebuild");
    let second = snapshot(&conn);
    assert_eq!(first, second);

    // Stale rows from removed players never survive a rebuild.
    conn.execute("DELETE FROM player_season_stats WHERE player_id = ?1", params![player])
        .expect("drop stats");
    conn.execute("DELETE FROM player_match_physical WHERE player_id = ?1", params![player])
        .expect("drop physical");
    conn.execute("DELETE FROM player_fused WHERE player_id = ?1", params![player])
        .expect("drop fused");
    conn.execute("DELETE FROM players WHERE player_id = ?1", params![player])
        .expect("drop player");
    let rows = rebuild_fused_view(&mut conn).expect("third rebuild");
    assert_eq!(rows, 0);
    assert!(snapshot(&conn).is_empty());
}
