use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::normalize::normalize_name;

/// External identifier scoped to the provider that assigned it. Transfermarkt
/// ids are opaque strings; the other two providers use integers.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceId {
    Statsbomb(i64),
    Skillcorner(i64),
    Transfermarkt(String),
}

impl SourceId {
    pub fn source_label(&self) -> &'static str {
        match self {
            SourceId::Statsbomb(_) => "statsbomb",
            SourceId::Skillcorner(_) => "skillcorner",
            SourceId::Transfermarkt(_) => "transfermarkt",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            SourceId::Statsbomb(_) => "statsbomb_player_id",
            SourceId::Skillcorner(_) => "skillcorner_player_id",
            SourceId::Transfermarkt(_) => "transfermarkt_player_id",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Statsbomb(id) => write!(f, "statsbomb:{id}"),
            SourceId::Skillcorner(id) => write!(f, "skillcorner:{id}"),
            SourceId::Transfermarkt(id) => write!(f, "transfermarkt:{id}"),
        }
    }
}

/// How many sources a player is linked to, derived from which external id
/// fields are populated. Makes the implicit nullable-column state machine
/// explicit where resolution logic branches on coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    Linked2,
    Linked3,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerRow {
    pub player_id: i64,
    pub player_name: String,
    pub statsbomb_player_id: Option<i64>,
    pub statsbomb_player_name: Option<String>,
    pub skillcorner_player_id: Option<i64>,
    pub skillcorner_player_name: Option<String>,
    pub transfermarkt_player_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub preferred_foot: Option<String>,
    pub primary_position: Option<String>,
    pub market_value: Option<String>,
    pub market_value_numeric: Option<f64>,
    pub contract_expiry: Option<String>,
    pub current_club: Option<String>,
    pub agent: Option<String>,
}

impl PlayerRow {
    pub fn link_state(&self) -> LinkState {
        let linked = [
            self.statsbomb_player_id.is_some(),
            self.skillcorner_player_id.is_some(),
            self.transfermarkt_player_id.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        match linked {
            0 | 1 => LinkState::Unlinked,
            2 => LinkState::Linked2,
            _ => LinkState::Linked3,
        }
    }

    /// Best display name for matching against the given provider's records.
    pub fn search_name(&self) -> &str {
        self.statsbomb_player_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.player_name)
    }
}

const PLAYER_COLUMNS: &str = "player_id, player_name, \
     statsbomb_player_id, statsbomb_player_name, \
     skillcorner_player_id, skillcorner_player_name, transfermarkt_player_id, \
     date_of_birth, nationality, height_cm, weight_kg, preferred_foot, \
     primary_position, market_value, market_value_numeric, contract_expiry, \
     current_club, agent";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerRow> {
    Ok(PlayerRow {
        player_id: row.get(0)?,
        player_name: row.get(1)?,
        statsbomb_player_id: row.get(2)?,
        statsbomb_player_name: row.get(3)?,
        skillcorner_player_id: row.get(4)?,
        skillcorner_player_name: row.get(5)?,
        transfermarkt_player_id: row.get(6)?,
        date_of_birth: row.get(7)?,
        nationality: row.get(8)?,
        height_cm: row.get(9)?,
        weight_kg: row.get(10)?,
        preferred_foot: row.get(11)?,
        primary_position: row.get(12)?,
        market_value: row.get(13)?,
        market_value_numeric: row.get(14)?,
        contract_expiry: row.get(15)?,
        current_club: row.get(16)?,
        agent: row.get(17)?,
    })
}

pub fn load_player(conn: &Connection, player_id: i64) -> Result<Option<PlayerRow>> {
    conn.query_row(
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE player_id = ?1"),
        params![player_id],
        player_from_row,
    )
    .optional()
    .with_context(|| format!("load player {player_id}"))
}

pub fn find_by_source_id(conn: &Connection, id: &SourceId) -> Result<Option<PlayerRow>> {
    let sql = format!(
        "SELECT {PLAYER_COLUMNS} FROM players WHERE {} = ?1",
        id.id_column()
    );
    let found = match id {
        SourceId::Statsbomb(value) | SourceId::Skillcorner(value) => conn
            .query_row(&sql, params![value], player_from_row)
            .optional(),
        SourceId::Transfermarkt(value) => conn
            .query_row(&sql, params![value], player_from_row)
            .optional(),
    };
    found.with_context(|| format!("lookup player by {id}"))
}

/// Create a new canonical player seeded from one source observation.
pub fn create_player(conn: &Connection, display_name: &str, id: &SourceId) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    match id {
        SourceId::Statsbomb(value) => conn.execute(
            "INSERT INTO players(player_name, statsbomb_player_id, statsbomb_player_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![display_name, value, display_name, now],
        ),
        SourceId::Skillcorner(value) => conn.execute(
            "INSERT INTO players(player_name, skillcorner_player_id, skillcorner_player_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![display_name, value, display_name, now],
        ),
        SourceId::Transfermarkt(value) => conn.execute(
            "INSERT INTO players(player_name, transfermarkt_player_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![display_name, value, now],
        ),
    }
    .with_context(|| format!("create player for {id}"))?;
    Ok(conn.last_insert_rowid())
}

/// Attach an external id to a player. Conflicts are errors: if another player
/// already holds the id the caller must go through `merge_players` first. If
/// the player already carries a non-null id for that source, the existing
/// value wins and nothing is written.
pub fn assign_link(
    conn: &Connection,
    player_id: i64,
    id: &SourceId,
    external_name: Option<&str>,
) -> Result<()> {
    if let Some(holder) = find_by_source_id(conn, id)? {
        if holder.player_id == player_id {
            return Ok(());
        }
        bail!(
            "external id {id} already held by player {} ({})",
            holder.player_id,
            holder.player_name
        );
    }

    let player = load_player(conn, player_id)?
        .with_context(|| format!("assign {id} to missing player {player_id}"))?;
    let now = Utc::now().to_rfc3339();
    match id {
        SourceId::Statsbomb(value) => {
            if player.statsbomb_player_id.is_some() {
                return Ok(());
            }
            conn.execute(
                "UPDATE players SET statsbomb_player_id = ?1,
                        statsbomb_player_name = COALESCE(statsbomb_player_name, ?2),
                        updated_at = ?3
                 WHERE player_id = ?4",
                params![value, external_name, now, player_id],
            )
        }
        SourceId::Skillcorner(value) => {
            if player.skillcorner_player_id.is_some() {
                return Ok(());
            }
            conn.execute(
                "UPDATE players SET skillcorner_player_id = ?1,
                        skillcorner_player_name = COALESCE(skillcorner_player_name, ?2),
                        updated_at = ?3
                 WHERE player_id = ?4",
                params![value, external_name, now, player_id],
            )
        }
        SourceId::Transfermarkt(value) => {
            if player.transfermarkt_player_id.is_some() {
                return Ok(());
            }
            conn.execute(
                "UPDATE players SET transfermarkt_player_id = ?1, updated_at = ?2
                 WHERE player_id = ?3",
                params![value, now, player_id],
            )
        }
    }
    .with_context(|| format!("assign {id} to player {player_id}"))?;
    Ok(())
}

/// Merge `loser_id` into `winner_id`: every dependent record is re-pointed at
/// the winner, the winner's link and descriptive gaps are filled from the
/// loser, and the loser row is deleted. Runs in one transaction so a failure
/// partway leaves both players untouched.
pub fn merge_players(conn: &mut Connection, winner_id: i64, loser_id: i64) -> Result<()> {
    if winner_id == loser_id {
        bail!("cannot merge player {winner_id} into itself");
    }
    let loser = load_player(conn, loser_id)?
        .with_context(|| format!("merge source player {loser_id} not found"))?;
    let winner = load_player(conn, winner_id)?
        .with_context(|| format!("merge target player {winner_id} not found"))?;

    let tx = conn.transaction().context("begin merge transaction")?;

    // Dependent rows the winner already covers (same season / same match)
    // would collide with the uniqueness constraints after re-pointing; drop
    // the loser's duplicates first, then reassign the rest.
    tx.execute(
        "DELETE FROM player_season_stats WHERE player_id = ?1 AND season_id IN
           (SELECT season_id FROM player_season_stats WHERE player_id = ?2)",
        params![loser_id, winner_id],
    )
    .context("drop colliding season stats")?;
    tx.execute(
        "UPDATE player_season_stats SET player_id = ?1 WHERE player_id = ?2",
        params![winner_id, loser_id],
    )
    .context("reassign season stats")?;

    tx.execute(
        "DELETE FROM player_match_physical WHERE player_id = ?1 AND skillcorner_match_id IN
           (SELECT skillcorner_match_id FROM player_match_physical WHERE player_id = ?2)",
        params![loser_id, winner_id],
    )
    .context("drop colliding physical rows")?;
    tx.execute(
        "UPDATE player_match_physical SET player_id = ?1 WHERE player_id = ?2",
        params![winner_id, loser_id],
    )
    .context("reassign physical rows")?;

    tx.execute(
        "DELETE FROM match_lineups WHERE player_id = ?1 AND (source, source_match_id) IN
           (SELECT source, source_match_id FROM match_lineups WHERE player_id = ?2)",
        params![loser_id, winner_id],
    )
    .context("drop colliding lineup rows")?;
    tx.execute(
        "UPDATE match_lineups SET player_id = ?1 WHERE player_id = ?2",
        params![winner_id, loser_id],
    )
    .context("reassign lineup rows")?;

    tx.execute("DELETE FROM player_fused WHERE player_id = ?1", params![loser_id])
        .context("drop loser fused row")?;

    // Free the unique external ids before re-attaching them to the winner.
    tx.execute(
        "UPDATE players SET statsbomb_player_id = NULL, statsbomb_player_name = NULL,
                skillcorner_player_id = NULL, skillcorner_player_name = NULL,
                transfermarkt_player_id = NULL
         WHERE player_id = ?1",
        params![loser_id],
    )
    .context("clear loser links")?;
    tx.execute("DELETE FROM players WHERE player_id = ?1", params![loser_id])
        .context("delete loser player")?;

    let now = Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE players SET
            statsbomb_player_id = COALESCE(statsbomb_player_id, ?1),
            statsbomb_player_name = COALESCE(statsbomb_player_name, ?2),
            skillcorner_player_id = COALESCE(skillcorner_player_id, ?3),
            skillcorner_player_name = COALESCE(skillcorner_player_name, ?4),
            transfermarkt_player_id = COALESCE(transfermarkt_player_id, ?5),
            date_of_birth = COALESCE(date_of_birth, ?6),
            nationality = COALESCE(nationality, ?7),
            height_cm = COALESCE(height_cm, ?8),
            weight_kg = COALESCE(weight_kg, ?9),
            preferred_foot = COALESCE(preferred_foot, ?10),
            primary_position = COALESCE(primary_position, ?11),
            market_value = COALESCE(market_value, ?12),
            market_value_numeric = COALESCE(market_value_numeric, ?13),
            contract_expiry = COALESCE(contract_expiry, ?14),
            current_club = COALESCE(current_club, ?15),
            agent = COALESCE(agent, ?16),
            updated_at = ?17
         WHERE player_id = ?18",
        params![
            loser.statsbomb_player_id,
            loser.statsbomb_player_name,
            loser.skillcorner_player_id,
            loser.skillcorner_player_name,
            loser.transfermarkt_player_id,
            loser.date_of_birth,
            loser.nationality,
            loser.height_cm,
            loser.weight_kg,
            loser.preferred_foot,
            loser.primary_position,
            loser.market_value,
            loser.market_value_numeric,
            loser.contract_expiry,
            loser.current_club,
            loser.agent,
            now,
            winner.player_id,
        ],
    )
    .context("coalesce links onto winner")?;

    tx.commit().context("commit merge transaction")?;
    Ok(())
}

/// Copy Transfermarkt descriptive fields from one player onto another without
/// clobbering anything already known. Used where the donor row cannot be
/// deleted (its own dependents keep it alive).
pub fn copy_descriptive_fields(conn: &Connection, from_id: i64, to_id: i64) -> Result<()> {
    let donor = load_player(conn, from_id)?
        .with_context(|| format!("descriptive-copy source player {from_id} not found"))?;
    conn.execute(
        "UPDATE players SET
            market_value = COALESCE(market_value, ?1),
            market_value_numeric = COALESCE(market_value_numeric, ?2),
            contract_expiry = COALESCE(contract_expiry, ?3),
            current_club = COALESCE(current_club, ?4),
            agent = COALESCE(agent, ?5),
            nationality = COALESCE(nationality, ?6),
            height_cm = COALESCE(height_cm, ?7),
            preferred_foot = COALESCE(preferred_foot, ?8),
            date_of_birth = COALESCE(date_of_birth, ?9),
            primary_position = COALESCE(primary_position, ?10),
            updated_at = ?11
         WHERE player_id = ?12",
        params![
            donor.market_value,
            donor.market_value_numeric,
            donor.contract_expiry,
            donor.current_club,
            donor.agent,
            donor.nationality,
            donor.height_cm,
            donor.preferred_foot,
            donor.date_of_birth,
            donor.primary_position,
            Utc::now().to_rfc3339(),
            to_id,
        ],
    )
    .with_context(|| format!("copy descriptive fields {from_id} -> {to_id}"))?;
    Ok(())
}

/// Move a Transfermarkt identity from the market-only row that holds it onto
/// an anchor player: descriptive fields are copied with coalesce semantics,
/// the donor gives up the id (uniqueness demands a single holder), and the
/// donor row is deleted only if nothing else references it. Unlike
/// `merge_players` this never touches dependent metric rows.
pub fn transfer_market_identity(
    conn: &mut Connection,
    donor_id: i64,
    anchor_id: i64,
) -> Result<()> {
    let donor = load_player(conn, donor_id)?
        .with_context(|| format!("market-identity donor {donor_id} not found"))?;
    let Some(tm_id) = donor.transfermarkt_player_id.clone() else {
        bail!("player {donor_id} holds no transfermarkt id");
    };

    let tx = conn.transaction().context("begin market-identity transaction")?;
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE players SET
            market_value = COALESCE(market_value, ?1),
            market_value_numeric = COALESCE(market_value_numeric, ?2),
            contract_expiry = COALESCE(contract_expiry, ?3),
            current_club = COALESCE(current_club, ?4),
            agent = COALESCE(agent, ?5),
            nationality = COALESCE(nationality, ?6),
            height_cm = COALESCE(height_cm, ?7),
            preferred_foot = COALESCE(preferred_foot, ?8),
            date_of_birth = COALESCE(date_of_birth, ?9),
            primary_position = COALESCE(primary_position, ?10),
            updated_at = ?11
         WHERE player_id = ?12",
        params![
            donor.market_value,
            donor.market_value_numeric,
            donor.contract_expiry,
            donor.current_club,
            donor.agent,
            donor.nationality,
            donor.height_cm,
            donor.preferred_foot,
            donor.date_of_birth,
            donor.primary_position,
            now,
            anchor_id,
        ],
    )
    .context("copy market fields to anchor")?;

    tx.execute(
        "UPDATE players SET transfermarkt_player_id = NULL, updated_at = ?1 WHERE player_id = ?2",
        params![now, donor_id],
    )
    .context("release donor transfermarkt id")?;

    let dependents: i64 = tx
        .query_row(
            "SELECT (SELECT COUNT(*) FROM match_lineups WHERE player_id = ?1)
                  + (SELECT COUNT(*) FROM player_season_stats WHERE player_id = ?1)
                  + (SELECT COUNT(*) FROM player_match_physical WHERE player_id = ?1)",
            params![donor_id],
            |row| row.get(0),
        )
        .context("count donor dependents")?;
    let other_links =
        donor.statsbomb_player_id.is_some() || donor.skillcorner_player_id.is_some();
    if dependents == 0 && !other_links {
        tx.execute("DELETE FROM player_fused WHERE player_id = ?1", params![donor_id])
            .context("drop donor fused row")?;
        tx.execute("DELETE FROM players WHERE player_id = ?1", params![donor_id])
            .context("delete orphaned market-only donor")?;
    }

    tx.execute(
        "UPDATE players SET transfermarkt_player_id = ?1, updated_at = ?2
         WHERE player_id = ?3 AND transfermarkt_player_id IS NULL",
        params![tm_id, now, anchor_id],
    )
    .context("assign transfermarkt id to anchor")?;

    tx.commit().context("commit market-identity transaction")?;
    Ok(())
}

/// Internal team ids a player has appeared for, from the lineup join table.
/// Feeds team-overlap corroboration in the resolver.
pub fn team_ids_for_player(conn: &Connection, player_id: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT team_id FROM match_lineups
             WHERE player_id = ?1 AND team_id IS NOT NULL",
        )
        .context("prepare team lookup")?;
    let ids = stmt
        .query_map(params![player_id], |row| row.get::<_, i64>(0))
        .context("query player teams")?
        .collect::<rusqlite::Result<HashSet<i64>>>()
        .context("collect player teams")?;
    Ok(ids)
}

/// Teams are reconciled by exact normalized-name match, not fuzzy scoring.
/// Returns the internal team id, creating the row on first sight and filling
/// the per-source external id on later sightings (coalesce, never overwrite).
pub fn upsert_team(conn: &Connection, team_name: &str, id: Option<&SourceId>) -> Result<i64> {
    let normalized = normalize_name(team_name);
    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT team_id, team_name FROM teams WHERE team_name = ?1",
            params![team_name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("lookup team by name")?;

    let team_id = match existing {
        Some((team_id, _)) => team_id,
        None => {
            // Fall back to a normalized scan so "Paris SG" and "Paris  SG"
            // collapse onto one row across sources.
            let mut stmt = conn
                .prepare("SELECT team_id, team_name FROM teams")
                .context("prepare team scan")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .context("scan teams")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("collect teams")?;
            match rows
                .into_iter()
                .find(|(_, name)| normalize_name(name) == normalized)
            {
                Some((team_id, _)) => team_id,
                None => {
                    conn.execute(
                        "INSERT INTO teams(team_name) VALUES (?1)",
                        params![team_name],
                    )
                    .with_context(|| format!("insert team {team_name}"))?;
                    conn.last_insert_rowid()
                }
            }
        }
    };

    if let Some(id) = id {
        let sql = match id {
            SourceId::Statsbomb(_) => {
                "UPDATE teams SET statsbomb_team_id = COALESCE(statsbomb_team_id, ?1) WHERE team_id = ?2"
            }
            SourceId::Skillcorner(_) => {
                "UPDATE teams SET skillcorner_team_id = COALESCE(skillcorner_team_id, ?1) WHERE team_id = ?2"
            }
            SourceId::Transfermarkt(_) => {
                "UPDATE teams SET transfermarkt_team_id = COALESCE(transfermarkt_team_id, ?1) WHERE team_id = ?2"
            }
        };
        match id {
            SourceId::Statsbomb(value) | SourceId::Skillcorner(value) => {
                conn.execute(sql, params![value, team_id])
            }
            SourceId::Transfermarkt(value) => conn.execute(sql, params![value, team_id]),
        }
        .with_context(|| format!("link team {team_name} to {id}"))?;
    }

    Ok(team_id)
}
