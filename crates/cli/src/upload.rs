//! `tally upload`: decode a file and persist it as a batch.

use std::fs;
use std::path::Path;

use tally_recon::{BatchSummary, Ingestor};

use crate::{print_json, CliError, Context};

pub fn cmd_upload(ctx: &Context, file: &Path, json: bool) -> Result<(), CliError> {
    let bytes = fs::read(file)
        .map_err(|e| CliError::usage(format!("cannot read {}: {}", file.display(), e)))?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let table = tally_io::read_table(&bytes, &filename)?;
    let ingestor = Ingestor::new(ctx.settings.ingest_options()?);
    let mut store = ctx.open_store()?;
    let batch = ingestor.ingest(&mut store, &table, &filename)?;

    if json {
        print_json(&BatchSummary {
            id: batch.id,
            filename: batch.filename.clone(),
            created_at: batch.created_at,
            transaction_count: batch.transactions.len(),
        })
    } else {
        println!("{}", batch.id);
        Ok(())
    }
}
