use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Deserialize;

use crate::registry::{self, SourceId};

/// Per-source player observations, parsed from provider export files. Each
/// observation carries the provider's own id plus whatever descriptive fields
/// that provider knows; cross-source correlation is the resolver's job.

#[derive(Debug, Clone, Deserialize)]
pub struct StatsbombPlayer {
    pub player_id: i64,
    pub player_name: String,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub preferred_foot: Option<String>,
    #[serde(default)]
    pub primary_position: Option<String>,
    #[serde(default)]
    pub appearances: Vec<Appearance>,
    #[serde(default)]
    pub season_stats: Vec<SeasonStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Appearance {
    pub match_id: i64,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub minutes_played: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonStats {
    pub season_id: i64,
    #[serde(default)]
    pub minutes_played: Option<i64>,
    #[serde(default)]
    pub goals_90: Option<f64>,
    #[serde(default)]
    pub assists_90: Option<f64>,
    #[serde(default)]
    pub np_xg_90: Option<f64>,
    #[serde(default)]
    pub shots_90: Option<f64>,
    #[serde(default)]
    pub passes_90: Option<f64>,
    #[serde(default)]
    pub tackles_90: Option<f64>,
    #[serde(default)]
    pub pressures_90: Option<f64>,
    #[serde(default)]
    pub obv_90: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillcornerPlayer {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub physical: Vec<PhysicalRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicalRecord {
    pub match_id: i64,
    #[serde(default)]
    pub total_distance_m: Option<f64>,
    #[serde(default)]
    pub sprinting_distance_m: Option<f64>,
    #[serde(default)]
    pub max_speed_kmh: Option<f64>,
    #[serde(default)]
    pub num_sprints: Option<i64>,
    #[serde(default)]
    pub num_high_speed_runs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransfermarktPlayer {
    pub tm_id: String,
    pub name: String,
    #[serde(default)]
    pub market_value: Option<String>,
    #[serde(default)]
    pub contract_expiry: Option<String>,
    #[serde(default)]
    pub current_club: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub preferred_foot: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerExport<T> {
    #[serde(default = "Vec::new")]
    players: Vec<T>,
}

fn parse_export<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<Vec<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let export: PlayerExport<T> =
        serde_json::from_str(trimmed).with_context(|| format!("invalid {what} export json"))?;
    Ok(export.players)
}

pub fn parse_statsbomb_players_json(raw: &str) -> Result<Vec<StatsbombPlayer>> {
    parse_export(raw, "statsbomb")
}

pub fn parse_skillcorner_players_json(raw: &str) -> Result<Vec<SkillcornerPlayer>> {
    parse_export(raw, "skillcorner")
}

pub fn parse_transfermarkt_players_json(raw: &str) -> Result<Vec<TransfermarktPlayer>> {
    parse_export(raw, "transfermarkt")
}

/// Parse a market value string to euros, e.g. "€25.00m" -> 25_000_000,
/// "500 K €" -> 500_000. Returns None for anything unparseable.
pub fn parse_market_value(raw: &str) -> Option<f64> {
    let lowered = raw
        .to_lowercase()
        .replace(['€', '$', '£'], " ")
        .trim()
        .to_string();
    if lowered.is_empty() {
        return None;
    }

    let number: String = lowered
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let value: f64 = number.replace(',', ".").parse().ok()?;

    let multiplier = if lowered.contains("mrd") || lowered.contains("md") || lowered.contains("bn")
    {
        1_000_000_000.0
    } else if lowered.contains("mio") || lowered.contains('m') {
        1_000_000.0
    } else if lowered.contains('k') || lowered.contains("tsd") {
        1_000.0
    } else {
        1.0
    };
    Some(value * multiplier)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Apply event-provider observations. New external ids create canonical
/// players; known ids only fill gaps (first writer wins). Appearance rows
/// feed team-overlap corroboration; season stats feed the fused view.
pub fn apply_statsbomb_players(
    conn: &Connection,
    players: &[StatsbombPlayer],
) -> Result<IngestCounts> {
    let mut counts = IngestCounts::default();
    for obs in players {
        if obs.player_name.trim().is_empty() {
            counts.skipped += 1;
            continue;
        }
        let source_id = SourceId::Statsbomb(obs.player_id);
        let player_id = match registry::find_by_source_id(conn, &source_id)? {
            Some(existing) => {
                counts.updated += 1;
                existing.player_id
            }
            None => {
                counts.created += 1;
                registry::create_player(conn, &obs.player_name, &source_id)?
            }
        };

        fill_bio_fields(
            conn,
            player_id,
            &BioFields {
                date_of_birth: obs.date_of_birth.as_deref(),
                nationality: obs.nationality.as_deref(),
                height_cm: obs.height_cm,
                weight_kg: obs.weight_kg,
                preferred_foot: obs.preferred_foot.as_deref(),
                primary_position: obs.primary_position.as_deref(),
            },
        )?;

        let team_id = match (&obs.team_name, obs.team_id) {
            (Some(name), external) => Some(registry::upsert_team(
                conn,
                name,
                external.map(SourceId::Statsbomb).as_ref(),
            )?),
            _ => None,
        };

        for appearance in &obs.appearances {
            conn.execute(
                "INSERT OR IGNORE INTO match_lineups
                   (source, source_match_id, player_id, team_id, position, minutes_played)
                 VALUES ('statsbomb', ?1, ?2, ?3, ?4, ?5)",
                params![
                    appearance.match_id,
                    player_id,
                    team_id,
                    appearance.position,
                    appearance.minutes_played
                ],
            )
            .context("insert statsbomb appearance")?;
        }

        for stats in &obs.season_stats {
            conn.execute(
                "INSERT OR IGNORE INTO player_season_stats
                   (player_id, season_id, minutes_played, goals_90, assists_90, np_xg_90,
                    shots_90, passes_90, tackles_90, pressures_90, obv_90)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    player_id,
                    stats.season_id,
                    stats.minutes_played,
                    stats.goals_90,
                    stats.assists_90,
                    stats.np_xg_90,
                    stats.shots_90,
                    stats.passes_90,
                    stats.tackles_90,
                    stats.pressures_90,
                    stats.obv_90
                ],
            )
            .context("insert season stats")?;
        }
    }
    Ok(counts)
}

/// Apply tracking-provider observations: players, their team affiliation and
/// per-match physical records.
pub fn apply_skillcorner_players(
    conn: &Connection,
    players: &[SkillcornerPlayer],
) -> Result<IngestCounts> {
    let mut counts = IngestCounts::default();
    for obs in players {
        if obs.name.trim().is_empty() {
            counts.skipped += 1;
            continue;
        }
        let source_id = SourceId::Skillcorner(obs.id);
        let player_id = match registry::find_by_source_id(conn, &source_id)? {
            Some(existing) => {
                counts.updated += 1;
                existing.player_id
            }
            None => {
                counts.created += 1;
                registry::create_player(conn, &obs.name, &source_id)?
            }
        };

        let team_id = match (&obs.team_name, obs.team_id) {
            (Some(name), external) => Some(registry::upsert_team(
                conn,
                name,
                external.map(SourceId::Skillcorner).as_ref(),
            )?),
            _ => None,
        };

        for record in &obs.physical {
            conn.execute(
                "INSERT OR IGNORE INTO player_match_physical
                   (player_id, skillcorner_match_id, total_distance_m, sprinting_distance_m,
                    max_speed_kmh, num_sprints, num_high_speed_runs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    player_id,
                    record.match_id,
                    record.total_distance_m,
                    record.sprinting_distance_m,
                    record.max_speed_kmh,
                    record.num_sprints,
                    record.num_high_speed_runs
                ],
            )
            .context("insert physical record")?;
            conn.execute(
                "INSERT OR IGNORE INTO match_lineups
                   (source, source_match_id, player_id, team_id)
                 VALUES ('skillcorner', ?1, ?2, ?3)",
                params![record.match_id, player_id, team_id],
            )
            .context("insert skillcorner appearance")?;
        }
    }
    Ok(counts)
}

/// Apply market-provider observations. Records with an unseen Transfermarkt
/// id become market-only players; the resolver's second pass later copies
/// their context onto the matching event-provider player.
pub fn apply_transfermarkt_players(
    conn: &Connection,
    players: &[TransfermarktPlayer],
) -> Result<IngestCounts> {
    let mut counts = IngestCounts::default();
    for obs in players {
        if obs.name.trim().is_empty() || obs.tm_id.trim().is_empty() {
            counts.skipped += 1;
            continue;
        }
        let source_id = SourceId::Transfermarkt(obs.tm_id.clone());
        let player_id = match registry::find_by_source_id(conn, &source_id)? {
            Some(existing) => {
                counts.updated += 1;
                existing.player_id
            }
            None => {
                counts.created += 1;
                registry::create_player(conn, &obs.name, &source_id)?
            }
        };

        let market_value_numeric = obs
            .market_value
            .as_deref()
            .and_then(parse_market_value);
        conn.execute(
            "UPDATE players SET
                market_value = COALESCE(market_value, ?1),
                market_value_numeric = COALESCE(market_value_numeric, ?2),
                contract_expiry = COALESCE(contract_expiry, ?3),
                current_club = COALESCE(current_club, ?4),
                agent = COALESCE(agent, ?5),
                updated_at = ?6
             WHERE player_id = ?7",
            params![
                obs.market_value,
                market_value_numeric,
                obs.contract_expiry,
                obs.current_club,
                obs.agent,
                Utc::now().to_rfc3339(),
                player_id
            ],
        )
        .context("update market fields")?;

        fill_bio_fields(
            conn,
            player_id,
            &BioFields {
                date_of_birth: obs.date_of_birth.as_deref(),
                nationality: obs.nationality.as_deref(),
                height_cm: obs.height_cm,
                weight_kg: None,
                preferred_foot: obs.preferred_foot.as_deref(),
                primary_position: obs.position.as_deref(),
            },
        )?;
    }
    Ok(counts)
}

struct BioFields<'a> {
    date_of_birth: Option<&'a str>,
    nationality: Option<&'a str>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    preferred_foot: Option<&'a str>,
    primary_position: Option<&'a str>,
}

fn fill_bio_fields(conn: &Connection, player_id: i64, bio: &BioFields<'_>) -> Result<()> {
    conn.execute(
        "UPDATE players SET
            date_of_birth = COALESCE(date_of_birth, ?1),
            nationality = COALESCE(nationality, ?2),
            height_cm = COALESCE(height_cm, ?3),
            weight_kg = COALESCE(weight_kg, ?4),
            preferred_foot = COALESCE(preferred_foot, ?5),
            primary_position = COALESCE(primary_position, ?6),
            updated_at = ?7
         WHERE player_id = ?8",
        params![
            bio.date_of_birth,
            bio.nationality,
            bio.height_cm,
            bio.weight_kg,
            bio.preferred_foot,
            bio.primary_position,
            Utc::now().to_rfc3339(),
            player_id
        ],
    )
    .context("fill bio fields")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_market_value;

    #[test]
    fn parses_common_market_value_forms() {
        assert_eq!(parse_market_value("€25.00m"), Some(25_000_000.0));
        assert_eq!(parse_market_value("25,00 M €"), Some(25_000_000.0));
        assert_eq!(parse_market_value("500 K €"), Some(500_000.0));
        assert_eq!(parse_market_value("€1.20bn"), Some(1_200_000_000.0));
        assert_eq!(parse_market_value("750000"), Some(750_000.0));
    }

    #[test]
    fn rejects_unparseable_values() {
        assert_eq!(parse_market_value(""), None);
        assert_eq!(parse_market_value("-"), None);
        assert_eq!(parse_market_value("free transfer"), None);
    }
}
