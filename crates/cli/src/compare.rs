//! `tally compare`: reconcile two stored batches and write the report.

use std::fs;
use std::path::{Path, PathBuf};

use tally_recon::{BatchId, ReconResult};

use crate::{print_json, CliError, Context};

pub fn cmd_compare(
    ctx: &Context,
    id_a: i64,
    id_b: i64,
    output: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let (id_a, id_b) = (BatchId(id_a), BatchId(id_b));
    let store = ctx.open_store()?;
    let result = tally_recon::compare(&store, id_a, id_b, ctx.settings.reconcile.duplicates)?;

    let report = tally_io::render(&result, id_a, id_b)?;
    let path = output.unwrap_or_else(|| PathBuf::from(&report.filename));
    fs::write(&path, &report.bytes)
        .map_err(|e| CliError::error(format!("cannot write {}: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), "report written");

    if json {
        print_json(&result)
    } else {
        print_summary(&result, id_a, id_b, &path);
        Ok(())
    }
}

fn print_summary(result: &ReconResult, id_a: BatchId, id_b: BatchId, path: &Path) {
    let s = &result.summary;
    println!("batch {} ({} rows) vs batch {} ({} rows)", id_a, s.rows_a, id_b, s.rows_b);
    line("exact:", s.exact);
    line(
        "discrepant:",
        format!("{} (amount {}, status {})", s.discrepant, s.amount_discrepancies, s.status_discrepancies),
    );
    line(&format!("only in {}:", id_a), s.only_a);
    line(&format!("only in {}:", id_b), s.only_b);
    if s.duplicates_a + s.duplicates_b > 0 {
        line("duplicates:", format!("{} in A, {} in B", s.duplicates_a, s.duplicates_b));
    }
    line("report:", path.display());
}

fn line(label: &str, value: impl std::fmt::Display) {
    println!("{:<14}{}", label, value);
}
