//! brickql CLI - query Databricks account and workspace APIs with SQL

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use brickql_connectors::{register_tables, TableCatalog, TableDef};
use brickql_core::{ConnectionConfig, ConnectionContext};
use clap::{Parser, Subcommand};
use datafusion::prelude::SessionContext;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "brickql")]
#[command(about = "Query Databricks account and workspace resources with SQL")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a JSON connection config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Profile from the Databricks config file
    #[arg(short, long, global = true, env = "BRICKQL_PROFILE")]
    profile: Option<String>,

    /// Databricks account ID
    #[arg(long, global = true)]
    account_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SQL query against the Databricks tables
    Query {
        /// SQL statement
        sql: String,
    },

    /// List the available tables
    Tables,

    /// Show the columns of a table
    Describe {
        /// Table name, e.g. databricks_compute_cluster
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Query { sql } => {
            let config = load_config(&cli)?;
            run_query(config, sql).await?;
        }
        Commands::Tables => list_tables(),
        Commands::Describe { table } => describe_table(table)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ConnectionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading connection config from {:?}", path);
            ConnectionConfig::from_file(path)?
        }
        None => ConnectionConfig::default(),
    };
    if let Some(profile) = &cli.profile {
        config.config_profile = Some(profile.clone());
    }
    if let Some(account_id) = &cli.account_id {
        config.account_id = Some(account_id.clone());
    }
    Ok(config)
}

async fn run_query(config: ConnectionConfig, sql: &str) -> Result<()> {
    let connection = Arc::new(ConnectionContext::new("databricks", config));
    let ctx = SessionContext::new();
    register_tables(&ctx, connection)?;

    info!("Executing query");
    let df = ctx.sql(sql).await?;
    df.show().await?;
    Ok(())
}

fn list_tables() {
    let catalog = TableCatalog::new();
    let width = catalog
        .tables()
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0);
    for table in catalog.tables() {
        println!("{:<width$}  {}", table.name, table.description, width = width);
    }
}

fn describe_table(name: &str) -> Result<()> {
    let catalog = TableCatalog::new();
    let Some(table) = catalog.get(name) else {
        anyhow::bail!("Unknown table '{}'. Run `brickql tables` to list them.", name);
    };

    println!("{}", table.name);
    println!("{}", table.description);
    println!("Scope: {}", table.scope);
    println!();

    let width = table.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in &table.columns {
        println!(
            "{:<width$}  {:<9}  {:<8}  {}",
            column.name,
            column.ty.as_str(),
            pushdown_operators(table, column.name),
            column.description,
            width = width
        );
    }
    Ok(())
}

fn pushdown_operators(table: &TableDef, column: &str) -> String {
    table
        .key_columns
        .iter()
        .filter(|k| k.name == column)
        .flat_map(|k| k.operators.iter().map(|op| op.as_sql()))
        .collect::<Vec<_>>()
        .join(",")
}
