use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use seerr_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use seerr_core::{DatabaseContext, PostgresDatabase};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "seerrctl", about = "Seerr database operations")]
struct Cli {
    /// Path to seerr.toml
    #[arg(long, global = true, env = "SEERR_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// Env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations and seed the default jobs
    Migrate,
    /// Exit non-zero when the database does not answer
    Health,
    /// Inspect or re-enable scheduled jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Purge stale sessions, expired auth artifacts and expired shares
    Maintenance,
}

#[derive(Subcommand)]
enum JobsAction {
    /// List every job with its schedule and failure state
    List,
    /// Re-enable a job, clearing its disabled reason
    Enable { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ConfigLoad> {
    let load = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    if load.config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in &load.warnings.items {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }
    Ok(load)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let ConfigLoad { config, .. } = load_config(&cli)?;
    let database_settings = config.database_settings();

    if let Command::Health = cli.command {
        let healthy = match PostgresDatabase::connect(&database_settings).await {
            Ok(db) => db.check_health().await,
            Err(err) => {
                error!("database connection failed: {err}");
                false
            }
        };
        println!("{}", if healthy { "healthy" } else { "unhealthy" });
        return Ok(if healthy {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let postgres = Arc::new(
        PostgresDatabase::connect(&database_settings)
            .await
            .context("failed to connect to PostgreSQL")?,
    );

    if let Command::Migrate = cli.command {
        postgres
            .initialize_schema()
            .await
            .context("failed to apply migrations")?;
        println!("migrations applied");
        return Ok(ExitCode::SUCCESS);
    }

    let context = DatabaseContext::from_postgres(postgres, config.context_options())
        .context("failed to build database context")?;
    let uow = context.unit_of_work();

    match cli.command {
        Command::Jobs {
            action: JobsAction::List,
        } => {
            let now = Utc::now();
            for job in uow.jobs.list_jobs().await? {
                let state = match (&job.disabled_reason, job.enabled) {
                    (_, true) if job.is_due_at(now) => "due".to_string(),
                    (_, true) => "enabled".to_string(),
                    (Some(reason), false) => format!("disabled ({reason})"),
                    (None, false) => "disabled".to_string(),
                };
                let next = job
                    .next_run
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<24} {:<16} next={:<32} failures={} {}",
                    job.name, job.schedule, next, job.failure_count, state
                );
            }
        }
        Command::Jobs {
            action: JobsAction::Enable { name },
        } => {
            let job = uow
                .jobs
                .set_job_enabled(&name, true)
                .await
                .with_context(|| format!("failed to enable job {name}"))?;
            info!(job = %job.name, "job enabled");
        }
        Command::Maintenance => {
            let sessions = uow.sessions.purge_stale_sessions().await?;
            let auth = uow.credentials.purge_expired_auth_artifacts().await?;
            let shares = uow.shares.purge_expired_shares().await?;
            info!(sessions, auth, shares, "maintenance complete");
        }
        Command::Health | Command::Migrate => {}
    }

    Ok(ExitCode::SUCCESS)
}
