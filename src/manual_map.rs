use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;

use crate::registry::{self, SourceId};

/// A human-verified cross-source id pair. Anchored on the event provider's
/// id; the other two ids are optional. Never produced by automation.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualMapping {
    pub statsbomb_player_id: i64,
    #[serde(default)]
    pub skillcorner_player_id: Option<i64>,
    #[serde(default)]
    pub transfermarkt_player_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default = "Vec::new")]
    mappings: Vec<ManualMapping>,
}

/// Parse a verified-mappings JSON file ({"mappings": [...]}).
pub fn parse_manual_mappings_json(raw: &str) -> Result<Vec<ManualMapping>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let file: MappingFile =
        serde_json::from_str(trimmed).context("invalid manual mapping json")?;
    Ok(file.mappings)
}

/// Insert verified pairs into player_manual_mapping, skipping pairs already
/// present. Returns the number of newly inserted rows.
pub fn insert_manual_mappings(conn: &Connection, mappings: &[ManualMapping]) -> Result<usize> {
    let mut inserted = 0;
    for mapping in mappings {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT mapping_id FROM player_manual_mapping
                 WHERE statsbomb_player_id = ?1
                   AND skillcorner_player_id IS ?2
                   AND transfermarkt_player_id IS ?3",
                params![
                    mapping.statsbomb_player_id,
                    mapping.skillcorner_player_id,
                    mapping.transfermarkt_player_id
                ],
                |row| row.get(0),
            )
            .optional()
            .context("check existing manual mapping")?;
        if exists.is_some() {
            continue;
        }
        conn.execute(
            "INSERT INTO player_manual_mapping
               (statsbomb_player_id, skillcorner_player_id, transfermarkt_player_id, notes)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                mapping.statsbomb_player_id,
                mapping.skillcorner_player_id,
                mapping.transfermarkt_player_id,
                mapping.notes
            ],
        )
        .context("insert manual mapping")?;
        inserted += 1;
    }
    Ok(inserted)
}

pub fn load_manual_mappings(conn: &Connection) -> Result<Vec<ManualMapping>> {
    let mut stmt = conn
        .prepare(
            "SELECT statsbomb_player_id, skillcorner_player_id, transfermarkt_player_id, notes
             FROM player_manual_mapping ORDER BY mapping_id",
        )
        .context("prepare manual mapping query")?;
    let mappings = stmt
        .query_map([], |row| {
            Ok(ManualMapping {
                statsbomb_player_id: row.get(0)?,
                skillcorner_player_id: row.get(1)?,
                transfermarkt_player_id: row.get(2)?,
                notes: row.get(3)?,
            })
        })
        .context("query manual mappings")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("collect manual mappings")?;
    Ok(mappings)
}

/// Apply every verified mapping to the registry. Runs before automated
/// resolution and its results are authoritative. Entries whose anchor id is
/// not in the registry yet are skipped (retried next run); per-entry failures
/// are logged and do not abort the rest. Returns the number of link changes.
pub fn apply_manual_mappings(conn: &mut Connection) -> Result<usize> {
    let mappings = load_manual_mappings(conn)?;
    let mut changes = 0;

    for mapping in &mappings {
        match apply_one(conn, mapping) {
            Ok(applied) => changes += applied,
            Err(err) => {
                eprintln!(
                    "manual mapping sb={} failed: {err:#}",
                    mapping.statsbomb_player_id
                );
            }
        }
    }
    Ok(changes)
}

fn apply_one(conn: &mut Connection, mapping: &ManualMapping) -> Result<usize> {
    let anchor_sid = SourceId::Statsbomb(mapping.statsbomb_player_id);
    let Some(anchor) = registry::find_by_source_id(conn, &anchor_sid)? else {
        eprintln!(
            "manual mapping skipped: no player holds {} yet",
            anchor_sid
        );
        return Ok(0);
    };
    let mut changes = 0;

    if let Some(sc_id) = mapping.skillcorner_player_id {
        let sc_sid = SourceId::Skillcorner(sc_id);
        match registry::find_by_source_id(conn, &sc_sid)? {
            Some(holder) if holder.player_id != anchor.player_id => {
                registry::merge_players(conn, anchor.player_id, holder.player_id)?;
                changes += 1;
            }
            Some(_) => {} // already linked to the anchor
            None => {
                if anchor.skillcorner_player_id.is_none() {
                    registry::assign_link(conn, anchor.player_id, &sc_sid, None)?;
                    changes += 1;
                }
            }
        }
    }

    if let Some(tm_id) = &mapping.transfermarkt_player_id {
        // The merge above may have filled more of the anchor's links.
        let anchor = registry::load_player(conn, anchor.player_id)?
            .context("manual mapping anchor vanished mid-apply")?;
        let tm_sid = SourceId::Transfermarkt(tm_id.clone());
        match registry::find_by_source_id(conn, &tm_sid)? {
            Some(holder) if holder.player_id != anchor.player_id => {
                // Market-only rows are never merge-deleted; copy fields and
                // move the id.
                registry::transfer_market_identity(conn, holder.player_id, anchor.player_id)?;
                changes += 1;
            }
            Some(_) => {}
            None => {
                if anchor.transfermarkt_player_id.is_none() {
                    registry::assign_link(conn, anchor.player_id, &tm_sid, None)?;
                    changes += 1;
                }
            }
        }
    }

    Ok(changes)
}
