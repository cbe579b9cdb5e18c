//! TDP CLI - Management commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Deserialize;
use tdp_storage_sqlite::SqliteBackend;
use tdp_users::populate::{generate_test_users, populate_stts, GeneratedUsers, PopulationSummary};
use tdp_users::UserDirectory;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "tdp")]
#[command(about = "TANF Data Portal CLI - Populate STTs, seed test users, check the server")]
#[command(version)]
struct Cli {
    /// Directory holding the SQLite database
    #[arg(long, default_value = "data", env = "TDP_DATA_DIR")]
    data_dir: PathBuf,

    /// Database name (file stem)
    #[arg(long, default_value = "tdp", env = "TDP_DATABASE")]
    database: String,

    /// TDP server address
    #[arg(long, default_value = "http://localhost:8080", env = "TDP_ADDR")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate regions, states, territories and tribes
    PopulateStts,
    /// Create one test user per role plus an unassigned one
    GenerateTestUsers,
    /// Check server status
    Status,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ============================================================================
// Commands
// ============================================================================

async fn open_directory(data_dir: &Path, database: &str) -> Result<UserDirectory> {
    let backend = SqliteBackend::open(data_dir, database)
        .await
        .with_context(|| format!("Failed to open database in {}", data_dir.display()))?;
    Ok(UserDirectory::new(backend).await?)
}

async fn cmd_populate_stts(directory: &UserDirectory) -> Result<PopulationSummary> {
    let summary = populate_stts(directory).await?;

    println!("Populated:");
    println!("  Regions:                {}", summary.regions);
    println!("  States and territories: {}", summary.states_and_territories);
    println!("  Tribes:                 {}", summary.tribes);

    Ok(summary)
}

async fn cmd_generate_test_users(directory: &UserDirectory) -> Result<GeneratedUsers> {
    let generated = generate_test_users(directory).await?;

    if generated.created.is_empty() {
        println!("All test users already exist");
    } else {
        println!("Created {} test users:", generated.created.len());
        for username in &generated.created {
            println!("  {}", username);
        }
        println!();
        println!("Password: {}", generated.password);
    }

    Ok(generated)
}

async fn cmd_status(addr: &str) -> Result<()> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;

    let resp = client
        .get(format!("{}/v1/health", addr.trim_end_matches('/')))
        .send()
        .await
        .context("Failed to connect to server")?;

    if !resp.status().is_success() {
        bail!("Server unhealthy: HTTP {}", resp.status());
    }

    let health: HealthResponse = resp.json().await.context("Failed to parse response")?;

    println!("TDP server status:");
    println!("  Status:  {}", health.status);
    println!("  Version: {}", health.version);

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::PopulateStts => {
            let directory = open_directory(&cli.data_dir, &cli.database).await?;
            cmd_populate_stts(&directory).await.map(|_| ())
        },
        Commands::GenerateTestUsers => {
            let directory = open_directory(&cli.data_dir, &cli.database).await?;
            cmd_generate_test_users(&directory).await.map(|_| ())
        },
        Commands::Status => cmd_status(&cli.addr).await,
    }
}
