use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use research_core::{Config, ReportStore, SqliteReportStore, TokenAuthenticator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Operator tooling for the research service's auth and report store.
#[derive(Parser, Debug)]
#[command(name = "reportctl", version, about)]
struct Cli {
    /// Config file (defaults to the per-user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue or inspect session tokens
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },
    /// Inspect and maintain the report store
    Reports {
        #[command(subcommand)]
        action: ReportCommands,
    },
    /// Show the effective configuration or its schema
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommands {
    /// Mint a token for a configured user
    Issue { username: String },
    /// Check a token and print its subject and expiry
    Verify { token: String },
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    /// List reports, newest first
    List {
        /// Restrict to these ids (repeatable)
        #[arg(long = "id")]
        ids: Vec<String>,
    },
    /// Print one report with its timestamps
    Get { id: String },
    /// Delete one report
    Delete { id: String },
    /// Import a legacy JSON snapshot
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the JSON schema of the config file
    Schema,
    /// Print the effective configuration (secrets redacted)
    Show,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn format_epoch(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |dt| dt.to_rfc3339())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Token { action } => run_token(&config, action),
        Commands::Reports { action } => run_reports(&config, action).await,
        Commands::Config { action } => run_config(&config, &action),
    }
}

fn run_token(config: &Config, action: TokenCommands) -> Result<()> {
    let auth = TokenAuthenticator::from_config(&config.auth);
    match action {
        TokenCommands::Issue { username } => {
            if !auth.credentials().contains(&username) {
                bail!("Unknown user: {username}");
            }
            let session = auth.issue(&username);
            println!("{}", session.token);
            eprintln!("expires {}", format_epoch(session.expires_at));
        }
        TokenCommands::Verify { token } => match auth.claims(&token) {
            Some(claims) => {
                println!("subject: {}", claims.sub);
                println!("expires: {}", format_epoch(claims.exp));
            }
            None => bail!("Invalid or expired token"),
        },
    }
    Ok(())
}

async fn run_reports(config: &Config, action: ReportCommands) -> Result<()> {
    let store = SqliteReportStore::from_config(&config.storage);
    match action {
        ReportCommands::List { ids } => {
            let filter = (!ids.is_empty()).then_some(ids.as_slice());
            let reports = store.list(filter).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        ReportCommands::Get { id } => {
            let Some(record) = store.get_record(&id).await? else {
                bail!("Report not found: {id}");
            };
            eprintln!(
                "created {} / updated {}",
                format_epoch(record.created_at),
                format_epoch(record.updated_at)
            );
            println!("{}", serde_json::to_string_pretty(&record.data)?);
        }
        ReportCommands::Delete { id } => {
            if !store.delete(&id).await? {
                bail!("Report not found: {id}");
            }
            println!("Deleted {id}");
        }
        ReportCommands::Import { path } => {
            let outcome = store
                .import_legacy(&path)
                .await
                .with_context(|| format!("Failed to import {}", path.display()))?;
            match outcome {
                Some(outcome) => println!(
                    "Imported {} of {} entries; snapshot moved to {}",
                    outcome.inserted,
                    outcome.found,
                    outcome.backup_path.display()
                ),
                None => bail!("Snapshot not found: {}", path.display()),
            }
        }
    }
    Ok(())
}

fn run_config(config: &Config, action: &ConfigCommands) -> Result<()> {
    let rendered = match action {
        ConfigCommands::Schema => serde_json::to_string_pretty(&Config::json_schema())?,
        ConfigCommands::Show => toml::to_string_pretty(&config.redacted())?,
    };
    println!("{rendered}");
    Ok(())
}
