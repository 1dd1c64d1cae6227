use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use metz_pipeline::resolver::{self, Thresholds};
use metz_pipeline::db;

const DEFAULT_OUT: &str = "review_candidates.jsonl";

/// Dump near-threshold candidate pairs for human adjudication without
/// touching the registry. Usage: review_export [--db PATH] [--out PATH]
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let mut db_path = db::default_db_path();
    let mut out_path = PathBuf::from(DEFAULT_OUT);

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" => {
                db_path = PathBuf::from(iter.next().ok_or_else(|| anyhow!("--db needs a path"))?)
            }
            "--out" => {
                out_path =
                    PathBuf::from(iter.next().ok_or_else(|| anyhow!("--out needs a path"))?)
            }
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }

    let conn = db::open_db(&db_path)
        .with_context(|| format!("open pipeline db {}", db_path.display()))?;

    let thresholds = Thresholds::from_env();
    let review = resolver::scan_review_candidates(&conn, &thresholds)?;
    resolver::write_review_export(&out_path, &review)?;

    println!(
        "wrote {} review candidates to {}",
        review.len(),
        out_path.display()
    );
    Ok(())
}
