//! `tally batch` / `tally transactions`: read and delete stored data.

use clap::Subcommand;
use tally_recon::{BatchId, BatchStore, TransactionRecord};

use crate::{print_json, CliError, Context};

const DEFAULT_LIMIT: usize = 100;

#[derive(Subcommand)]
pub enum BatchCommands {
    /// List stored batches
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one batch with its transactions
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Delete a batch and all of its transactions
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// List transactions across all batches, ordered by id
    #[command(after_help = "\
Examples:
  tally transactions list
  tally transactions list --skip 100 --limit 50 --json")]
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show one transaction
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },
}

fn storage(err: tally_recon::StoreError) -> CliError {
    CliError::storage(err.to_string())
}

pub fn cmd_batch(ctx: &Context, cmd: BatchCommands) -> Result<(), CliError> {
    match cmd {
        BatchCommands::List { json } => {
            let store = ctx.open_store()?;
            let batches = store.list_batches().map_err(storage)?;
            if json {
                return print_json(&batches);
            }
            if batches.is_empty() {
                eprintln!("no batches");
                return Ok(());
            }
            println!("{:>6}  {:<25}  {:>6}  filename", "id", "created_at", "rows");
            for b in &batches {
                println!(
                    "{:>6}  {:<25}  {:>6}  {}",
                    b.id.0,
                    b.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    b.transaction_count,
                    b.filename
                );
            }
            Ok(())
        }
        BatchCommands::Show { id, json } => {
            let store = ctx.open_store()?;
            let batch = store
                .load_batch_with_records(BatchId(id))
                .map_err(storage)?
                .ok_or_else(|| batch_not_found(id))?;
            if json {
                return print_json(&batch);
            }
            println!("batch:      {}", batch.id);
            println!("filename:   {}", batch.filename);
            println!("created_at: {}", batch.created_at.to_rfc3339());
            println!("rows:       {}", batch.transactions.len());
            for tx in &batch.transactions {
                print_record_line(tx);
            }
            Ok(())
        }
        BatchCommands::Delete { id } => {
            let mut store = ctx.open_store()?;
            if !store.delete_batch(BatchId(id)).map_err(storage)? {
                return Err(batch_not_found(id));
            }
            eprintln!("deleted batch {}", id);
            Ok(())
        }
    }
}

pub fn cmd_transactions(ctx: &Context, cmd: TransactionCommands) -> Result<(), CliError> {
    match cmd {
        TransactionCommands::List { skip, limit, json } => {
            let store = ctx.open_store()?;
            let records = store.list_transactions(skip, limit).map_err(storage)?;
            if json {
                return print_json(&records);
            }
            for tx in &records {
                print_record_line(tx);
            }
            Ok(())
        }
        TransactionCommands::Show { id, json } => {
            let store = ctx.open_store()?;
            let tx = store
                .get_transaction(id)
                .map_err(storage)?
                .ok_or_else(|| CliError::not_found(format!("transaction not found: {}", id)))?;
            if json {
                return print_json(&tx);
            }
            println!("id:                  {}", tx.id);
            println!("batch:               {}", tx.batch_id);
            println!("business_id:         {}", tx.business_id);
            println!("occurred_at:         {}", tx.occurred_at);
            println!("source_account:      {}", tx.source_account);
            println!("destination_account: {}", tx.destination_account);
            println!("amount:              {}", tx.amount);
            println!("status:              {}", tx.status.as_str());
            for (key, value) in &tx.raw_attributes {
                println!("  {}: {}", key, value);
            }
            Ok(())
        }
    }
}

fn batch_not_found(id: i64) -> CliError {
    CliError::not_found(format!("batch not found: {}", id))
        .with_hint("run `tally batch list` to see stored batches")
}

fn print_record_line(tx: &TransactionRecord) {
    println!(
        "{:>6}  {:<12}  {}  {} -> {}  {:>12}  {}",
        tx.id,
        tx.business_id,
        tx.occurred_at.format("%Y-%m-%d %H:%M:%S"),
        tx.source_account,
        tx.destination_account,
        tx.amount,
        tx.status.as_str()
    );
}
