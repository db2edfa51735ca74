//! Frostline command-line entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use frostline::{
    capture, load_config, validate_jobs, ArchiveContext, ArchiveError, IncidentReporter,
    JsonlReporter, Reporters, RunSummary, Runner, TracingReporter,
};
use frostline_db::mysql::MySqlWarehouse;
use frostline_logging::{init_logging, LogConfig};
use frostline_protocol::defaults::CONFIG_ENV;
use frostline_protocol::paths::default_config_path;
use frostline_protocol::{ArchiveJob, FrostlineConfig};
use frostline_sinks::ObjectStoreSink;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "frostline", about = "Archive aging MySQL rows to cold storage")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Configuration file [default: ~/.frostline/frostline.toml]
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Archive every job in the configuration file
    Run,

    /// Archive a single table
    Archive {
        /// Live table name
        #[arg(long)]
        table: String,

        /// Predicate selecting rows to archive
        #[arg(long = "where")]
        where_clause: String,

        /// Column whose min/max go into the object name
        #[arg(long = "column-to-log")]
        column_to_log: String,

        /// Index the copy should scan
        #[arg(long)]
        index_hint: Option<String>,

        /// Run OPTIMIZE TABLE on the live table afterwards
        #[arg(long)]
        optimize: bool,

        /// Rows per transaction (overrides [database].transaction_size)
        #[arg(long)]
        transaction_size: Option<u64>,
    },

    /// Validate the configuration and jobs without connecting
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "frostline",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config(&TracingReporter, &config_path)?;

    match cli.command {
        Commands::Run => {
            let jobs = config.jobs.clone();
            archive(&config, &jobs)
        }
        Commands::Archive {
            table,
            where_clause,
            column_to_log,
            index_hint,
            optimize,
            transaction_size,
        } => {
            let mut job =
                ArchiveJob::new(table, where_clause, column_to_log).with_optimize(optimize);
            job.index_hint = index_hint;
            job.transaction_size = transaction_size;
            archive(&config, &[job])
        }
        Commands::Check => check(&config),
    }
}

fn archive(config: &FrostlineConfig, jobs: &[ArchiveJob]) -> Result<()> {
    let reporter: Arc<dyn IncidentReporter> = Arc::new(incident_reporters(config));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary: RunSummary = rt.block_on(async {
        let connected = async {
            let warehouse = MySqlWarehouse::connect(&config.database, &config.copy).await?;
            let store = ObjectStoreSink::from_config(&config.storage)?;
            Ok::<_, ArchiveError>((Arc::new(warehouse), Arc::new(store)))
        }
        .await;
        let (warehouse, store) = capture(reporter.as_ref(), None, connected)?;

        let ctx = ArchiveContext::new(warehouse.clone(), store, config.database.database.clone())
            .configured(config);
        let result = Runner::new(ctx, Arc::clone(&reporter)).run_all(jobs).await;
        warehouse.close().await;
        result
    })?;

    for outcome in &summary.outcomes {
        println!(
            "{}: {} rows archived in {} cycle(s)",
            outcome.table,
            outcome.archived_rows(),
            outcome.cycles
        );
    }
    info!(rows = summary.archived_rows(), "Done");
    Ok(())
}

fn check(config: &FrostlineConfig) -> Result<()> {
    validate_jobs(&config.jobs)?;
    ObjectStoreSink::from_config(&config.storage)?;

    println!(
        "database: {}@{}:{}/{} (archive host: {})",
        config.database.user,
        config.database.host,
        config.database.port,
        config.database.database,
        config.database.archive_host()
    );
    println!("storage:  {}", config.storage.url);
    println!("work dir: {}", config.storage.work_dir().display());
    println!(
        "retry:    {} cycles, {}ms backoff (max {}ms)",
        config.retry.max_cycles, config.retry.backoff_ms, config.retry.max_backoff_ms
    );
    for job in &config.jobs {
        println!(
            "job:      {} where {} (log column {}, {} rows/txn)",
            job.table,
            job.where_clause,
            job.log_column,
            job.effective_transaction_size(config.database.transaction_size)
        );
    }
    Ok(())
}

fn incident_reporters(config: &FrostlineConfig) -> Reporters {
    let reporters = Reporters::new().with(Arc::new(TracingReporter));
    match &config.reporting.incident_log {
        Some(path) => reporters.with(Arc::new(JsonlReporter::new(path))),
        None => reporters,
    }
}
