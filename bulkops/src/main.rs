use anyhow::{Context, bail};
use bulkops::config::DEFAULT_CONFIG_PATH;
use bulkops::{BulkConfig, BulkDatabase, BulkOperationsExt, BulkOptions, ColumnMapping, DataReader, Dialect, TableName, telemetry};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::{Connection, Postgres, Sqlite};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Bulk copy tables between databases")]
struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BULKOPS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy every row of a table from one database into another
    Copy(CopyArgs),
}

#[derive(clap::Args, Debug)]
struct CopyArgs {
    /// Source database URL (defaults to `source_url` from the config)
    #[arg(long)]
    source: Option<String>,

    /// Destination database URL (defaults to `destination_url` from the config)
    #[arg(long)]
    destination: Option<String>,

    /// Table to read from the source
    #[arg(long)]
    table: String,

    /// Destination table, if named differently from the source table
    #[arg(long)]
    target: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Insert)]
    mode: Mode,

    /// Column used to match rows on merge and update (repeatable)
    #[arg(long = "qualifier")]
    qualifiers: Vec<String>,

    /// Column mapping as SOURCE=DESTINATION (repeatable)
    #[arg(long = "map")]
    mappings: Vec<ColumnMapping>,

    /// Rows per statement, overriding the config
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Insert,
    Merge,
    Update,
}

fn dialect_of(url: &str) -> anyhow::Result<Dialect> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Dialect::Postgres)
    } else if url.starts_with("sqlite:") {
        Ok(Dialect::Sqlite)
    } else {
        bail!("Unsupported database URL '{url}', expected postgres:// or sqlite:")
    }
}

async fn copy_table<S, D>(args: &CopyArgs, source_url: &str, destination_url: &str, options: &BulkOptions) -> anyhow::Result<u64>
where
    S: BulkDatabase,
    D: BulkDatabase,
    D::Connection: BulkOperationsExt,
{
    let mut source = S::Connection::connect(source_url).await.context("Failed to connect to source")?;
    let mut destination = D::Connection::connect(destination_url)
        .await
        .context("Failed to connect to destination")?;

    let query = format!("SELECT * FROM {}", TableName::parse(&args.table)?.quoted());
    let target = args.target.as_deref().unwrap_or(&args.table);
    let reader = DataReader::query::<S>(&mut source, &query);

    let affected = match args.mode {
        Mode::Insert => destination.bulk_insert_reader(target, reader, options).await?,
        Mode::Merge => destination.bulk_merge_reader(target, reader, options).await?,
        Mode::Update => destination.bulk_update_reader(target, reader, options).await?,
    };

    destination.close().await?;
    source.close().await?;
    Ok(affected)
}

async fn copy(args: CopyArgs, config: BulkConfig) -> anyhow::Result<()> {
    let source_url = args
        .source
        .clone()
        .or(config.source_url.clone())
        .context("No source URL given (--source or source_url)")?;
    let destination_url = args
        .destination
        .clone()
        .or(config.destination_url.clone())
        .context("No destination URL given (--destination, destination_url or DATABASE_URL)")?;

    let mut options = BulkOptions::from_config(&config)
        .with_qualifiers(args.qualifiers.clone())
        .with_mappings(args.mappings.clone());
    if let Some(batch_size) = args.batch_size {
        options = options.with_batch_size(batch_size);
    }

    let affected = match (dialect_of(&source_url)?, dialect_of(&destination_url)?) {
        (Dialect::Postgres, Dialect::Postgres) => copy_table::<Postgres, Postgres>(&args, &source_url, &destination_url, &options).await?,
        (Dialect::Postgres, Dialect::Sqlite) => copy_table::<Postgres, Sqlite>(&args, &source_url, &destination_url, &options).await?,
        (Dialect::Sqlite, Dialect::Postgres) => copy_table::<Sqlite, Postgres>(&args, &source_url, &destination_url, &options).await?,
        (Dialect::Sqlite, Dialect::Sqlite) => copy_table::<Sqlite, Sqlite>(&args, &source_url, &destination_url, &options).await?,
    };

    info!(table = %args.table, mode = ?args.mode, affected, "Copy finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = BulkConfig::load(&args.config)?;

    telemetry::init_telemetry()?;
    tracing::debug!("{:?}", args);

    match args.command {
        Command::Copy(copy_args) => copy(copy_args, config).await,
    }
}
