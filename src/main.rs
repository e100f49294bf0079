//! heapdb - command line front end to a heap-file store

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use heapdb::access::{CompareOp, DataType, Schema, Tuple, Value};
use heapdb::optimizer::IntHistogram;
use heapdb::{Database, DatabaseConfig};
use log::info;
use rand::Rng;
use std::path::PathBuf;

/// heapdb - a transactional heap-file store
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./heapdb_data")]
    data_dir: PathBuf,

    /// Page size in bytes
    #[arg(long, default_value_t = heapdb::storage::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Buffer pool capacity in pages
    #[arg(short = 'p', long, default_value_t = heapdb::config::DEFAULT_PAGES)]
    pool_pages: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a table of (id INT, name VARCHAR) rows and fill it
    Load {
        table: String,
        /// Number of rows to insert
        #[arg(short, long, default_value_t = 1000)]
        rows: i32,
    },
    /// Print every row of a table
    Scan { table: String },
    /// Page and row counts plus an id histogram
    Stats {
        table: String,
        /// Estimate the selectivity of `id < below`
        #[arg(short, long)]
        below: Option<i32>,
        #[arg(long, default_value_t = 10)]
        buckets: usize,
    },
}

const LOAD_BATCH: i32 = 256;

fn people_schema() -> Schema {
    Schema::from_pairs(&[("id", DataType::Int32), ("name", DataType::Varchar)])
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = DatabaseConfig::new(&args.data_dir)
        .with_page_size(args.page_size)
        .with_buffer_pool_pages(args.pool_pages);
    let db = Database::open(config).context("Failed to open database")?;

    match args.command {
        Command::Load { table, rows } => load(&db, &table, rows),
        Command::Scan { table } => scan(&db, &table),
        Command::Stats {
            table,
            below,
            buckets,
        } => stats(&db, &table, below, buckets),
    }
}

fn load(db: &Database, table: &str, rows: i32) -> Result<()> {
    let table_id = db
        .create_table(table, people_schema())
        .with_context(|| format!("Failed to create table '{}'", table))?;

    // Dirty pages cannot leave the pool before commit.
    let mut rng = rand::thread_rng();
    let mut start = 0;
    while start < rows {
        let end = rows.min(start.saturating_add(LOAD_BATCH));
        let txn = db.begin();
        for id in start..end {
            let name: String = (0..rng.gen_range(3..12))
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect();
            db.buffer_pool()
                .insert_tuple(
                    txn.id(),
                    table_id,
                    Tuple::new(vec![Value::Int32(id), Value::String(name)]),
                )
                .with_context(|| format!("Failed to insert row {}", id))?;
        }
        txn.commit().context("Failed to commit load")?;
        start = end;
    }

    let pages = db.catalog().get_file(table_id)?.num_pages()?;
    info!("Loaded {} rows into '{}' ({} pages)", rows, table, pages);
    Ok(())
}

fn scan(db: &Database, table: &str) -> Result<()> {
    let table_id = db.open_table(table, people_schema())?;
    let txn = db.begin();

    let rows = db.scan(txn.id(), table_id)?;
    for row in &rows {
        let fields: Vec<String> = row.values.iter().map(Value::to_string).collect();
        println!("{}", fields.join("\t"));
    }
    txn.commit()?;

    info!("{} rows", rows.len());
    Ok(())
}

fn stats(db: &Database, table: &str, below: Option<i32>, buckets: usize) -> Result<()> {
    let table_id = db.open_table(table, people_schema())?;
    let file = db.catalog().get_file(table_id)?;
    let txn = db.begin();

    let ids: Vec<i32> = db
        .scan(txn.id(), table_id)?
        .iter()
        .filter_map(|row| row.value(0).and_then(Value::as_i32))
        .collect();
    txn.commit()?;

    println!("table:  {} (id {})", table, table_id);
    println!("file:   {}", file.path().display());
    println!("pages:  {}", file.num_pages()?);
    println!("rows:   {}", ids.len());

    let (Some(&min), Some(&max)) = (ids.iter().min(), ids.iter().max()) else {
        return Ok(());
    };
    let mut hist = IntHistogram::new(buckets, min, max);
    for &id in &ids {
        hist.add_value(id);
    }
    println!("{}", hist);

    if let Some(v) = below {
        println!(
            "est. selectivity of id < {}: {:.4}",
            v,
            hist.estimate_selectivity(CompareOp::LessThan, v)
        );
    }
    Ok(())
}
