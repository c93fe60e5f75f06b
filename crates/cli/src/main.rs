use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crm_infra::{
    CrmConfig, CrmJobs, CrmStore, GraphQlClient, InMemoryCrmStore, JobKind, PostgresCrmStore,
    Scheduler,
};
use crm_observability::LogFormat;

/// Scheduled CRM maintenance jobs.
#[derive(Debug, Parser)]
#[command(name = "crm-jobs", version)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, global = true, env = "CRM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one job now and print its summary.
    Run {
        /// heartbeat, low-stock, customer-cleanup, order-reminders or report
        job: JobKind,
    },
    /// Run every job on its schedule until Ctrl-C.
    Schedule,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CrmConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("crm-jobs: {e}");
            return ExitCode::from(2);
        }
    };

    crm_observability::init(if config.observability.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "crm-jobs failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: CrmConfig) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let remote = Arc::new(GraphQlClient::new(&config.remote).context("building GraphQL client")?);
    let jobs = CrmJobs::new(config, store, remote)?;

    match command {
        Command::Run { job } => {
            let report = jobs.run(job).await;
            println!("{}", report.summary);
        }
        Command::Schedule => {
            let scheduler = Scheduler::from_config(jobs)?;
            let handle = scheduler.spawn();
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            tracing::info!("shutdown requested");
            handle.shutdown().await;
        }
    }
    Ok(())
}

async fn open_store(config: &CrmConfig) -> anyhow::Result<Arc<dyn CrmStore>> {
    match &config.database.url {
        Some(url) => {
            let store = PostgresCrmStore::connect(url)
                .await
                .context("connecting to database")?;
            tracing::info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no database url configured; using an empty in-memory store");
            Ok(Arc::new(InMemoryCrmStore::new()))
        }
    }
}
