//! Tally command-line interface.
//!
//! Lists the dataset catalog, renders the SQL for a query, or runs a query
//! against PostgreSQL and prints the page as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tally_kernel::catalog::datasets::builtin_catalog;
use tally_kernel::cli;
use tally_kernel::config::Config;
use tally_kernel::db;
use tally_kernel::query::{EngineSettings, QueryComposer};
use tally_kernel::storage::{MemoryStorage, PgStorage, Storage};

/// Filtered, seek-paginated queries over disclosure datasets.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered datasets with their filters.
    Datasets,

    /// Run a query and print one page as JSON.
    Query {
        /// Dataset name, e.g. `schedule_b`.
        dataset: String,

        /// Request parameter as key=value; repeatable.
        #[arg(short, long = "param", value_parser = cli::parse_param)]
        params: Vec<(String, String)>,

        /// JSON file holding a list of [key, value] pairs.
        #[arg(long)]
        params_file: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Print the SQL a query would run, without connecting.
    Explain {
        dataset: String,

        #[arg(short, long = "param", value_parser = cli::parse_param)]
        params: Vec<(String, String)>,

        #[arg(long)]
        params_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let catalog = Arc::new(
        builtin_catalog(config.itemized_start_year).context("invalid dataset catalog")?,
    );
    let settings = EngineSettings::from_config(&config);

    let outcome = match args.command {
        Command::Datasets => {
            print!("{}", cli::cmd_datasets(&catalog));
            return Ok(ExitCode::SUCCESS);
        }
        Command::Explain {
            dataset,
            params,
            params_file,
        } => {
            let params = merge_params(params, params_file)?;
            let composer = QueryComposer::new(catalog, Arc::new(MemoryStorage::new()), settings);
            cli::cmd_explain(&composer, &dataset, &params)
        }
        Command::Query {
            dataset,
            params,
            params_file,
            pretty,
        } => {
            let params = merge_params(params, params_file)?;
            let pool = db::create_pool(&config).await?;
            if !db::check_health(&pool).await {
                anyhow::bail!("database health check failed");
            }
            info!(
                max_connections = config.database_max_connections,
                "Database pool established"
            );
            let storage: Arc<dyn Storage> =
                Arc::new(PgStorage::new(pool, settings.query_timeout));
            let composer = QueryComposer::new(catalog, storage, settings);
            cli::cmd_query(&composer, &dataset, &params, pretty).await
        }
    };

    match outcome {
        Ok(output) => {
            print!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_client_error() => {
            eprintln!("{}", cli::describe_error(&e));
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "query failed");
            eprintln!("{}", cli::describe_error(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn merge_params(
    mut params: Vec<(String, String)>,
    file: Option<PathBuf>,
) -> Result<Vec<(String, String)>> {
    if let Some(path) = file {
        params.extend(cli::load_params(&path)?);
    }
    Ok(params)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally_kernel=info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
