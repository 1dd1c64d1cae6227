use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// One fused row per canonical player: latest-season event statistics,
/// tracking aggregates, market context, and how many of the three sources
/// contributed. The table is fully rebuilt on every call so it can never
/// drift from the registry, even after a partial earlier run.
pub fn rebuild_fused_view(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction().context("begin fusion transaction")?;

    tx.execute("DELETE FROM player_fused", [])
        .context("clear fused view")?;

    let players: Vec<(i64, String, Option<String>, Option<f64>, Option<String>, Option<String>)> = {
        let mut stmt = tx
            .prepare(
                "SELECT player_id, player_name, market_value, market_value_numeric,
                        contract_expiry, current_club
                 FROM players ORDER BY player_id",
            )
            .context("prepare fused player scan")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .context("query players for fusion")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect players for fusion")?;
        rows
    };

    let mut count = 0;
    for (player_id, player_name, market_value, market_value_numeric, contract_expiry, current_club) in
        players
    {
        // Latest season wins; highest season_id is the tie-break.
        let event_row: Option<(
            Option<i64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
        )> = tx
            .query_row(
                "SELECT minutes_played, goals_90, assists_90, np_xg_90, shots_90,
                        passes_90, tackles_90, pressures_90, obv_90
                 FROM player_season_stats
                 WHERE player_id = ?1
                 ORDER BY season_id DESC
                 LIMIT 1",
                params![player_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )
            .optional()
            .context("query latest season stats")?;

        let tracking_row: (i64, Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<f64>) =
            tx.query_row(
                "SELECT COUNT(*), AVG(total_distance_m), AVG(sprinting_distance_m),
                        AVG(max_speed_kmh), AVG(num_sprints), AVG(num_high_speed_runs)
                 FROM player_match_physical
                 WHERE player_id = ?1",
                params![player_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .context("aggregate tracking records")?;

        let has_event = event_row.is_some();
        let has_tracking = tracking_row.0 > 0;
        let has_context = market_value.is_some()
            || market_value_numeric.is_some()
            || contract_expiry.is_some()
            || current_club.is_some();
        let sources_linked =
            has_event as i64 + has_tracking as i64 + has_context as i64;

        let (mp_sb, g90, a90, xg90, s90, p90, t90, pr90, obv) =
            event_row.unwrap_or((None, None, None, None, None, None, None, None, None));
        let (matches_tracked, avg_dist, avg_sprint, avg_speed, avg_sprints, avg_hsr) =
            if has_tracking {
                (
                    Some(tracking_row.0),
                    tracking_row.1,
                    tracking_row.2,
                    tracking_row.3,
                    tracking_row.4,
                    tracking_row.5,
                )
            } else {
                (None, None, None, None, None, None)
            };

        tx.execute(
            "INSERT INTO player_fused
               (player_id, player_name,
                minutes_played_sb, goals_90, assists_90, np_xg_90, shots_90,
                passes_90, tackles_90, pressures_90, obv_90,
                matches_tracked, avg_total_distance_m, avg_sprinting_m,
                avg_max_speed_kmh, avg_sprints, avg_high_speed_runs,
                market_value, market_value_numeric, contract_expiry, current_club,
                has_event_data, has_tracking_data, has_context_data, sources_linked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            params![
                player_id,
                player_name,
                mp_sb,
                g90,
                a90,
                xg90,
                s90,
                p90,
                t90,
                pr90,
                obv,
                matches_tracked,
                avg_dist,
                avg_sprint,
                avg_speed,
                avg_sprints,
                avg_hsr,
                market_value,
                market_value_numeric,
                contract_expiry,
                current_club,
                has_event as i64,
                has_tracking as i64,
                has_context as i64,
                sources_linked
            ],
        )
        .context("insert fused row")?;
        count += 1;
    }

    tx.commit().context("commit fusion transaction")?;
    Ok(count)
}
