use std::fs;
use std::path::PathBuf;

use rusqlite::params;

use metz_pipeline::db;
use metz_pipeline::fusion::rebuild_fused_view;
use metz_pipeline::ingest::{
    apply_skillcorner_players, apply_statsbomb_players, apply_transfermarkt_players,
    parse_skillcorner_players_json, parse_statsbomb_players_json, parse_transfermarkt_players_json,
};
use metz_pipeline::registry::{self, SourceId};
use metz_pipeline::resolver::{self, Thresholds};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn ingest_creates_players_and_is_idempotent() {
    let conn = db::open_in_memory().expect("open db");
    let players =
        parse_statsbomb_players_json(&read_fixture("statsbomb_players.json")).expect("parse");

    let first = apply_statsbomb_players(&conn, &players).expect("first apply");
    assert_eq!(first.created, 2);
    assert_eq!(first.updated, 0);

    let second = apply_statsbomb_players(&conn, &players).expect("second apply");
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);

    let lineups: i64 = conn
        .query_row("SELECT COUNT(*) FROM match_lineups", [], |row| row.get(0))
        .expect("count lineups");
    assert_eq!(lineups, 2);
    let teams: i64 = conn
        .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
        .expect("count teams");
    assert_eq!(teams, 1);
}

#[test]
fn sources_sharing_a_team_name_reuse_one_team_row() {
    let conn = db::open_in_memory().expect("open db");
    let sb = parse_statsbomb_players_json(&read_fixture("statsbomb_players.json")).expect("parse");
    let sc =
        parse_skillcorner_players_json(&read_fixture("skillcorner_players.json")).expect("parse");
    apply_statsbomb_players(&conn, &sb).expect("apply event");
    apply_skillcorner_players(&conn, &sc).expect("apply tracking");

    let (teams, sb_id, sc_id): (i64, Option<i64>, Option<i64>) = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM teams), statsbomb_team_id, skillcorner_team_id
             FROM teams LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("query team");
    assert_eq!(teams, 1);
    assert_eq!(sb_id, Some(401));
    assert_eq!(sc_id, Some(77));
}

#[test]
fn full_pipeline_links_all_three_sources_for_one_player() {
    let mut conn = db::open_in_memory().expect("open db");
    let sb = parse_statsbomb_players_json(&read_fixture("statsbomb_players.json")).expect("parse");
    let sc =
        parse_skillcorner_players_json(&read_fixture("skillcorner_players.json")).expect("parse");
    let tm = parse_transfermarkt_players_json(&read_fixture("transfermarkt_players.json"))
        .expect("parse");

    apply_statsbomb_players(&conn, &sb).expect("apply event");
    apply_skillcorner_players(&conn, &sc).expect("apply tracking");
    apply_transfermarkt_players(&conn, &tm).expect("apply market");

    let outcome = resolver::resolve(&mut conn, &Thresholds::default()).expect("resolve");
    // "Jean Dupont" / "J. Dupont" merge on name plus shared team; the market
    // record with the same full name links on top of that.
    assert_eq!(outcome.merged_event_tracking, 1);
    assert_eq!(outcome.linked_market, 1);
    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);

    let player = registry::find_by_source_id(&conn, &SourceId::Statsbomb(743523))
        .expect("lookup")
        .expect("player exists");
    assert_eq!(player.skillcorner_player_id, Some(8812));
    assert_eq!(player.transfermarkt_player_id.as_deref(), Some("tm-285123"));
    assert_eq!(player.market_value.as_deref(), Some("€4.50m"));
    assert_eq!(player.market_value_numeric, Some(4_500_000.0));
    assert_eq!(player.nationality.as_deref(), Some("France"));

    rebuild_fused_view(&mut conn).expect("fuse");
    let (matches_tracked, sources_linked): (i64, i64) = conn
        .query_row(
            "SELECT matches_tracked, sources_linked FROM player_fused WHERE player_id = ?1",
            params![player.player_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query fused row");
    assert_eq!(matches_tracked, 2);
    assert_eq!(sources_linked, 3);
}
