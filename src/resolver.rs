use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::registry::{self, team_ids_for_player};
use crate::similarity::name_similarity;

/// Acceptance thresholds, one per source pair. The asymmetry is deliberate
/// tuning carried over from operation: the market pass has no team-overlap
/// signal to corroborate a name hit, so it demands a higher score.
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Minimum score for an event<->tracking pair to be considered at all.
    pub event_tracking_floor: f64,
    /// Score at which an event<->tracking pair is auto-merged.
    pub event_tracking_accept: f64,
    /// Score at which a market->event pair is linked.
    pub market_event_accept: f64,
    /// Market->event pairs scoring in [review_floor, accept) are exported
    /// for human adjudication instead of being silently dropped.
    pub market_event_review_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            event_tracking_floor: 0.60,
            event_tracking_accept: 0.70,
            market_event_accept: 0.75,
            market_event_review_floor: 0.65,
        }
    }
}

impl Thresholds {
    /// Defaults, with optional env overrides (METZ_ACCEPT_EVENT_TRACKING,
    /// METZ_ACCEPT_MARKET).
    pub fn from_env() -> Self {
        let mut thresholds = Self::default();
        if let Some(value) = env_f64("METZ_ACCEPT_EVENT_TRACKING") {
            thresholds.event_tracking_accept = value;
        }
        if let Some(value) = env_f64("METZ_ACCEPT_MARKET") {
            thresholds.market_event_accept = value;
        }
        thresholds
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// A near-threshold pair held back for human review.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewCandidate {
    pub source_pair: &'static str,
    pub anchor_player_id: i64,
    pub anchor_external_id: String,
    pub anchor_name: String,
    pub candidate_player_id: i64,
    pub candidate_external_id: String,
    pub candidate_name: String,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub merged_event_tracking: usize,
    pub linked_market: usize,
    pub skipped_partial: usize,
    pub vetoed_team_overlap: usize,
    pub review: Vec<ReviewCandidate>,
    pub errors: Vec<String>,
}

struct LinkCandidate {
    player_id: i64,
    external_id: i64,
    name: String,
}

struct MarketCandidate {
    player_id: i64,
    external_id: String,
    name: String,
}

/// Two-pass automated resolution over the registry. Pass 1 merges
/// tracking-only players into event-only players on a corroborated name
/// match; pass 2 links market-only rows to event players by copying context.
/// Greedy, one accepted candidate per anchor, fully deterministic: anchors
/// ascend by external id, candidates sort by (score desc, external id asc).
pub fn resolve(conn: &mut Connection, thresholds: &Thresholds) -> Result<ResolveOutcome> {
    let mut outcome = ResolveOutcome::default();
    resolve_event_tracking(conn, thresholds, &mut outcome)?;
    resolve_market_event(conn, thresholds, &mut outcome)?;
    Ok(outcome)
}

fn resolve_event_tracking(
    conn: &mut Connection,
    thresholds: &Thresholds,
    outcome: &mut ResolveOutcome,
) -> Result<()> {
    let anchors = load_candidates(
        conn,
        "SELECT player_id, statsbomb_player_id,
                COALESCE(statsbomb_player_name, player_name)
         FROM players
         WHERE statsbomb_player_id IS NOT NULL AND skillcorner_player_id IS NULL
         ORDER BY statsbomb_player_id",
    )?;
    let mut pool = load_candidates(
        conn,
        "SELECT player_id, skillcorner_player_id,
                COALESCE(skillcorner_player_name, player_name)
         FROM players
         WHERE skillcorner_player_id IS NOT NULL AND statsbomb_player_id IS NULL
         ORDER BY skillcorner_player_id",
    )?;

    for anchor in &anchors {
        if anchor.name.trim().is_empty() {
            outcome.skipped_partial += 1;
            continue;
        }
        let anchor_teams = team_ids_for_player(conn, anchor.player_id)?;

        let mut scored: Vec<(f64, usize)> = Vec::new();
        for (idx, candidate) in pool.iter().enumerate() {
            let score = name_similarity(&anchor.name, &candidate.name);
            if score < thresholds.event_tracking_floor {
                continue;
            }
            // Similar names on provably different teams are the classic
            // false positive; a disjoint affiliation veto beats any score.
            if !anchor_teams.is_empty() {
                let candidate_teams = team_ids_for_player(conn, candidate.player_id)?;
                if !candidate_teams.is_empty() && anchor_teams.is_disjoint(&candidate_teams) {
                    outcome.vetoed_team_overlap += 1;
                    continue;
                }
            }
            scored.push((score, idx));
        }
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(pool[a.1].external_id.cmp(&pool[b.1].external_id))
        });

        let Some(&(best_score, best_idx)) = scored.first() else {
            continue;
        };
        let best = &pool[best_idx];
        if best_score >= thresholds.event_tracking_accept {
            match registry::merge_players(conn, anchor.player_id, best.player_id) {
                Ok(()) => {
                    outcome.merged_event_tracking += 1;
                    pool.remove(best_idx);
                }
                Err(err) => outcome.errors.push(format!(
                    "merge {} <- {} failed: {err:#}",
                    anchor.player_id, best.player_id
                )),
            }
        } else {
            outcome.review.push(ReviewCandidate {
                source_pair: "statsbomb<->skillcorner",
                anchor_player_id: anchor.player_id,
                anchor_external_id: format!("statsbomb:{}", anchor.external_id),
                anchor_name: anchor.name.clone(),
                candidate_player_id: best.player_id,
                candidate_external_id: format!("skillcorner:{}", best.external_id),
                candidate_name: best.name.clone(),
                score: best_score,
            });
        }
    }
    Ok(())
}

fn resolve_market_event(
    conn: &mut Connection,
    thresholds: &Thresholds,
    outcome: &mut ResolveOutcome,
) -> Result<()> {
    let market_only = load_market_candidates(conn)?;
    let mut targets = load_candidates(
        conn,
        "SELECT player_id, statsbomb_player_id,
                COALESCE(statsbomb_player_name, player_name)
         FROM players
         WHERE statsbomb_player_id IS NOT NULL AND transfermarkt_player_id IS NULL
         ORDER BY statsbomb_player_id",
    )?;

    for donor in &market_only {
        if donor.name.trim().is_empty() {
            outcome.skipped_partial += 1;
            continue;
        }

        let mut scored: Vec<(f64, usize)> = Vec::new();
        for (idx, target) in targets.iter().enumerate() {
            let score = name_similarity(&donor.name, &target.name);
            if score >= thresholds.market_event_review_floor {
                scored.push((score, idx));
            }
        }
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(targets[a.1].external_id.cmp(&targets[b.1].external_id))
        });

        let Some(&(best_score, best_idx)) = scored.first() else {
            continue;
        };
        let best = &targets[best_idx];
        if best_score >= thresholds.market_event_accept {
            match registry::transfer_market_identity(conn, donor.player_id, best.player_id) {
                Ok(()) => {
                    outcome.linked_market += 1;
                    targets.remove(best_idx);
                }
                Err(err) => outcome.errors.push(format!(
                    "market link {} -> {} failed: {err:#}",
                    donor.player_id, best.player_id
                )),
            }
        } else {
            outcome.review.push(ReviewCandidate {
                source_pair: "transfermarkt->statsbomb",
                anchor_player_id: donor.player_id,
                anchor_external_id: format!("transfermarkt:{}", donor.external_id),
                anchor_name: donor.name.clone(),
                candidate_player_id: best.player_id,
                candidate_external_id: format!("statsbomb:{}", best.external_id),
                candidate_name: best.name.clone(),
                score: best_score,
            });
        }
    }
    Ok(())
}

/// Read-only scoring scan over both source pairs: every pair in the review
/// band (at or above the pair's floor, below its accept threshold) is
/// returned without mutating the registry. Backs the review-export tool.
pub fn scan_review_candidates(
    conn: &Connection,
    thresholds: &Thresholds,
) -> Result<Vec<ReviewCandidate>> {
    let mut review = Vec::new();

    let anchors = load_candidates(
        conn,
        "SELECT player_id, statsbomb_player_id,
                COALESCE(statsbomb_player_name, player_name)
         FROM players
         WHERE statsbomb_player_id IS NOT NULL AND skillcorner_player_id IS NULL
         ORDER BY statsbomb_player_id",
    )?;
    let pool = load_candidates(
        conn,
        "SELECT player_id, skillcorner_player_id,
                COALESCE(skillcorner_player_name, player_name)
         FROM players
         WHERE skillcorner_player_id IS NOT NULL AND statsbomb_player_id IS NULL
         ORDER BY skillcorner_player_id",
    )?;
    for anchor in &anchors {
        for candidate in &pool {
            let score = name_similarity(&anchor.name, &candidate.name);
            if score >= thresholds.event_tracking_floor
                && score < thresholds.event_tracking_accept
            {
                review.push(ReviewCandidate {
                    source_pair: "statsbomb<->skillcorner",
                    anchor_player_id: anchor.player_id,
                    anchor_external_id: format!("statsbomb:{}", anchor.external_id),
                    anchor_name: anchor.name.clone(),
                    candidate_player_id: candidate.player_id,
                    candidate_external_id: format!("skillcorner:{}", candidate.external_id),
                    candidate_name: candidate.name.clone(),
                    score,
                });
            }
        }
    }

    let market_only = load_market_candidates(conn)?;
    let targets = load_candidates(
        conn,
        "SELECT player_id, statsbomb_player_id,
                COALESCE(statsbomb_player_name, player_name)
         FROM players
         WHERE statsbomb_player_id IS NOT NULL AND transfermarkt_player_id IS NULL
         ORDER BY statsbomb_player_id",
    )?;
    for donor in &market_only {
        for target in &targets {
            let score = name_similarity(&donor.name, &target.name);
            if score >= thresholds.market_event_review_floor
                && score < thresholds.market_event_accept
            {
                review.push(ReviewCandidate {
                    source_pair: "transfermarkt->statsbomb",
                    anchor_player_id: donor.player_id,
                    anchor_external_id: format!("transfermarkt:{}", donor.external_id),
                    anchor_name: donor.name.clone(),
                    candidate_player_id: target.player_id,
                    candidate_external_id: format!("statsbomb:{}", target.external_id),
                    candidate_name: target.name.clone(),
                    score,
                });
            }
        }
    }

    Ok(review)
}

/// Write review candidates as JSON lines, one pair per line, for a human to
/// adjudicate. Not consumed by anything automated.
pub fn write_review_export(path: &Path, review: &[ReviewCandidate]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("create review export {}", path.display()))?;
    for candidate in review {
        let line = serde_json::to_string(candidate).context("serialize review candidate")?;
        writeln!(file, "{line}").context("write review export line")?;
    }
    Ok(())
}

fn load_candidates(conn: &Connection, sql: &str) -> Result<Vec<LinkCandidate>> {
    let mut stmt = conn.prepare(sql).context("prepare candidate query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LinkCandidate {
                player_id: row.get(0)?,
                external_id: row.get(1)?,
                name: row.get(2)?,
            })
        })
        .context("query candidates")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("collect candidates")?;
    Ok(rows)
}

fn load_market_candidates(conn: &Connection) -> Result<Vec<MarketCandidate>> {
    let mut stmt = conn
        .prepare(
            "SELECT player_id, transfermarkt_player_id, player_name
             FROM players
             WHERE transfermarkt_player_id IS NOT NULL AND statsbomb_player_id IS NULL
             ORDER BY transfermarkt_player_id",
        )
        .context("prepare market candidate query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MarketCandidate {
                player_id: row.get(0)?,
                external_id: row.get(1)?,
                name: row.get(2)?,
            })
        })
        .context("query market candidates")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("collect market candidates")?;
    Ok(rows)
}
