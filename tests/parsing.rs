use std::fs;
use std::path::PathBuf;

use metz_pipeline::ingest::{
    parse_skillcorner_players_json, parse_statsbomb_players_json, parse_transfermarkt_players_json,
};
use metz_pipeline::manual_map::parse_manual_mappings_json;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_statsbomb_fixture() {
    let raw = read_fixture("statsbomb_players.json");
    let players = parse_statsbomb_players_json(&raw).expect("fixture should parse");
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].player_id, 743523);
    assert_eq!(players[0].player_name, "Jean Dupont");
    assert_eq!(players[0].team_name.as_deref(), Some("FC Metz"));
    assert_eq!(players[0].appearances.len(), 2);
    assert_eq!(players[0].appearances[0].match_id, 3900001);
    assert_eq!(players[0].season_stats.len(), 1);
    assert_eq!(players[0].season_stats[0].season_id, 235);
    assert_eq!(players[0].season_stats[0].goals_90, Some(0.32));
    // Sparse record: only id and name, everything else defaults.
    assert_eq!(players[1].player_id, 743999);
    assert!(players[1].appearances.is_empty());
    assert!(players[1].season_stats.is_empty());
    assert!(players[1].nationality.is_none());
}

#[test]
fn parses_skillcorner_fixture() {
    let raw = read_fixture("skillcorner_players.json");
    let players = parse_skillcorner_players_json(&raw).expect("fixture should parse");
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].id, 8812);
    assert_eq!(players[0].name, "J. Dupont");
    assert_eq!(players[0].physical.len(), 2);
    assert_eq!(players[0].physical[0].match_id, 551001);
    assert_eq!(players[0].physical[0].total_distance_m, Some(10431.5));
    assert_eq!(players[0].physical[1].num_sprints, Some(24));
    assert!(players[1].physical.is_empty());
}

#[test]
fn parses_transfermarkt_fixture() {
    let raw = read_fixture("transfermarkt_players.json");
    let players = parse_transfermarkt_players_json(&raw).expect("fixture should parse");
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].tm_id, "tm-285123");
    assert_eq!(players[0].name, "Jean Dupont");
    assert_eq!(players[0].market_value.as_deref(), Some("€4.50m"));
    assert_eq!(players[0].current_club.as_deref(), Some("FC Metz"));
    assert_eq!(players[0].contract_expiry.as_deref(), Some("2027-06-30"));
    assert_eq!(players[1].tm_id, "tm-990011");
    assert!(players[1].market_value.is_none());
}

#[test]
fn parses_manual_mappings_fixture() {
    let raw = read_fixture("manual_mappings.json");
    let mappings = parse_manual_mappings_json(&raw).expect("fixture should parse");
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0].statsbomb_player_id, 743523);
    assert_eq!(mappings[0].skillcorner_player_id, Some(8812));
    assert_eq!(
        mappings[0].transfermarkt_player_id.as_deref(),
        Some("tm-285123")
    );
    assert!(mappings[0].notes.is_some());
    assert_eq!(mappings[1].skillcorner_player_id, None);
}

#[test]
fn empty_and_null_exports_parse_to_nothing() {
    assert!(
        parse_statsbomb_players_json("null")
            .expect("null should parse")
            .is_empty()
    );
    assert!(
        parse_skillcorner_players_json("")
            .expect("empty should parse")
            .is_empty()
    );
    assert!(
        parse_transfermarkt_players_json("{\"players\": []}")
            .expect("empty list should parse")
            .is_empty()
    );
    assert!(
        parse_manual_mappings_json("null")
            .expect("null should parse")
            .is_empty()
    );
}

#[test]
fn malformed_export_is_an_error_not_a_panic() {
    assert!(parse_statsbomb_players_json("{\"players\": 42}").is_err());
    assert!(parse_transfermarkt_players_json("not json at all").is_err());
}
