use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Context;
use clap::Args;
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `json` in any case selects JSON lines; every other value is human readable.
    pub fn parse(value: &str) -> Result<Self, Infallible> {
        if value.trim().eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else {
            Ok(LogFormat::Pretty)
        }
    }
}

/// Settings shared by every subcommand. Each flag can also come from the
/// environment or a `.env` file.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Size of the shared connection pool
    #[arg(long, env = "HR_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Address the HTTP server listens on
    #[arg(long, env = "HR_BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Require the admin role for writes
    #[arg(
        long,
        env = "HR_ENFORCE_ROLES",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enforce_roles: bool,

    /// `json` for JSON lines, anything else for human-readable output
    #[arg(long, env = "HR_LOG_FORMAT", value_parser = LogFormat::parse, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Config {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .context("failed to connect to Postgres")
    }
}
