use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

mod aggregate;
mod config;
mod db;
mod employee;
mod error;
mod logging;
mod models;
mod period;
mod server;
mod store;
mod trend;

use crate::config::Config;
use crate::db::PgStore;
use crate::store::{AggregateStore, EmployeeStore};

#[derive(Parser)]
#[command(name = "hr-analytics")]
#[command(about = "HR analytics read-model service for workforce diversity dashboards", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small realistic employee set
    Seed,
    /// Import employee rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute the monthly, quarterly and yearly diversity documents
    RebuildAggregates,
    /// Print the current five-month diversity trend as JSON
    Trend,
    /// Serve the dashboard API over HTTP
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.config.log_format);

    let pool = cli.config.connect().await?;
    let store = PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&store, &csv).await?;
            println!("Inserted {inserted} employees from {}.", csv.display());
        }
        Commands::RebuildAggregates => {
            let employees = store.list_employees().await?;
            let documents = aggregate::build_documents(&employees, Utc::now().date_naive());
            let written = store
                .replace_aggregates(&documents)
                .await
                .context("failed to store diversity documents")?;
            println!(
                "Rebuilt {written} diversity documents from {} employees.",
                employees.len()
            );
        }
        Commands::Trend => {
            let points = trend::trend_window(&store, Utc::now().date_naive()).await?;
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
        Commands::Serve => {
            let store = Arc::new(store);
            let state = server::AppState {
                aggregates: store.clone(),
                employees: store,
                enforce_roles: cli.config.enforce_roles,
            };
            server::serve(state, cli.config.bind).await?;
        }
    }

    Ok(())
}
