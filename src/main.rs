use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use metz_pipeline::resolver::Thresholds;
use metz_pipeline::{db, fusion, ingest, manual_map, report, resolver};

struct Args {
    db_path: PathBuf,
    statsbomb: Option<PathBuf>,
    skillcorner: Option<PathBuf>,
    transfermarkt: Option<PathBuf>,
    manual: Option<PathBuf>,
    review_out: Option<PathBuf>,
    summary_only: bool,
    skip_resolve: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        db_path: db::default_db_path(),
        statsbomb: None,
        skillcorner: None,
        transfermarkt: None,
        manual: None,
        review_out: None,
        summary_only: false,
        skip_resolve: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut path_arg = |flag: &str| -> Result<PathBuf> {
            iter.next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("{flag} needs a path"))
        };
        match arg.as_str() {
            "--db" => args.db_path = path_arg("--db")?,
            "--statsbomb" => args.statsbomb = Some(path_arg("--statsbomb")?),
            "--skillcorner" => args.skillcorner = Some(path_arg("--skillcorner")?),
            "--transfermarkt" => args.transfermarkt = Some(path_arg("--transfermarkt")?),
            "--manual" => args.manual = Some(path_arg("--manual")?),
            "--review-out" => args.review_out = Some(path_arg("--review-out")?),
            "--summary" => args.summary_only = true,
            "--skip-resolve" => args.skip_resolve = true,
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = parse_args()?;
    let mut conn = db::open_db(&args.db_path)
        .with_context(|| format!("open pipeline db {}", args.db_path.display()))?;

    if args.summary_only {
        let summary = report::database_summary(&conn)?;
        report::print_summary(&summary);
        return Ok(());
    }

    let run_id = db::start_run(&conn)?;
    let mut counts = db::RunCounts {
        manual_applied: 0,
        merged_event_tracking: 0,
        linked_market: 0,
        fused_rows: 0,
        errors: Vec::new(),
    };

    // Each phase commits on its own; a failure in one is reported and the
    // rest still run. Re-running the whole pipeline is always safe.
    if let Some(path) = &args.statsbomb {
        match std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))
            .and_then(|raw| ingest::parse_statsbomb_players_json(&raw))
            .and_then(|players| ingest::apply_statsbomb_players(&conn, &players))
        {
            Ok(applied) => println!(
                "statsbomb: {} created, {} updated, {} skipped",
                applied.created, applied.updated, applied.skipped
            ),
            Err(err) => {
                eprintln!("statsbomb ingest failed: {err:#}");
                counts.errors.push(format!("statsbomb ingest: {err:#}"));
            }
        }
    }
    if let Some(path) = &args.skillcorner {
        match std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))
            .and_then(|raw| ingest::parse_skillcorner_players_json(&raw))
            .and_then(|players| ingest::apply_skillcorner_players(&conn, &players))
        {
            Ok(applied) => println!(
                "skillcorner: {} created, {} updated, {} skipped",
                applied.created, applied.updated, applied.skipped
            ),
            Err(err) => {
                eprintln!("skillcorner ingest failed: {err:#}");
                counts.errors.push(format!("skillcorner ingest: {err:#}"));
            }
        }
    }
    if let Some(path) = &args.transfermarkt {
        match std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))
            .and_then(|raw| ingest::parse_transfermarkt_players_json(&raw))
            .and_then(|players| ingest::apply_transfermarkt_players(&conn, &players))
        {
            Ok(applied) => println!(
                "transfermarkt: {} created, {} updated, {} skipped",
                applied.created, applied.updated, applied.skipped
            ),
            Err(err) => {
                eprintln!("transfermarkt ingest failed: {err:#}");
                counts.errors.push(format!("transfermarkt ingest: {err:#}"));
            }
        }
    }

    if let Some(path) = &args.manual {
        match std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))
            .and_then(|raw| manual_map::parse_manual_mappings_json(&raw))
            .and_then(|mappings| manual_map::insert_manual_mappings(&conn, &mappings))
        {
            Ok(inserted) => println!("manual mappings: {inserted} new entries loaded"),
            Err(err) => {
                eprintln!("manual mapping load failed: {err:#}");
                counts.errors.push(format!("manual load: {err:#}"));
            }
        }
    }

    // Verified pairs are authoritative and always run before the resolver.
    match manual_map::apply_manual_mappings(&mut conn) {
        Ok(applied) => {
            counts.manual_applied = applied;
            println!("manual mappings applied: {applied} changes");
        }
        Err(err) => {
            eprintln!("manual apply failed: {err:#}");
            counts.errors.push(format!("manual apply: {err:#}"));
        }
    }

    if !args.skip_resolve {
        let thresholds = Thresholds::from_env();
        match resolver::resolve(&mut conn, &thresholds) {
            Ok(outcome) => {
                counts.merged_event_tracking = outcome.merged_event_tracking;
                counts.linked_market = outcome.linked_market;
                counts.errors.extend(outcome.errors.iter().cloned());
                println!(
                    "resolver: {} merged (event<->tracking), {} linked (market), \
                     {} skipped partial, {} vetoed by team overlap, {} for review",
                    outcome.merged_event_tracking,
                    outcome.linked_market,
                    outcome.skipped_partial,
                    outcome.vetoed_team_overlap,
                    outcome.review.len()
                );
                if let Some(path) = &args.review_out {
                    if let Err(err) = resolver::write_review_export(path, &outcome.review) {
                        eprintln!("review export failed: {err:#}");
                    }
                }
            }
            Err(err) => {
                eprintln!("resolver failed: {err:#}");
                counts.errors.push(format!("resolver: {err:#}"));
            }
        }
    }

    match fusion::rebuild_fused_view(&mut conn) {
        Ok(fused) => {
            counts.fused_rows = fused;
            println!("fused view rebuilt: {fused} rows");
        }
        Err(err) => {
            eprintln!("fusion failed: {err:#}");
            counts.errors.push(format!("fusion: {err:#}"));
        }
    }

    db::finish_run(&conn, run_id, &counts)?;

    let summary = report::database_summary(&conn)?;
    report::print_summary(&summary);
    Ok(())
}
