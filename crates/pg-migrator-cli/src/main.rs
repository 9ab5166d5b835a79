//! pg-migrator CLI - PostgreSQL to PostgreSQL migration with validation.

use clap::{Parser, Subcommand};
use pg_migrator::preflight::{self, EndpointHealth};
use pg_migrator::{
    Config, MigrateError, MigrationResult, MigrationStatus, Orchestrator, TableReport,
    ValidationPipeline, ValidationProfile, ValidationReport,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-migrator")]
#[command(about = "PostgreSQL to PostgreSQL migration with post-migration validation")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source database URL (overrides config and SOURCE_DATABASE_URL)
    #[arg(long, global = true)]
    source: Option<String>,

    /// Target database URL (overrides config and TARGET_DATABASE_URL)
    #[arg(long, global = true)]
    target: Option<String>,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the source database into an empty target
    Run {
        /// Parallel pg_restore jobs
        #[arg(long)]
        jobs: Option<usize>,

        /// Restore object ownership (aborts the restore on the first error)
        #[arg(long)]
        preserve_ownership: bool,

        /// Restore access privileges
        #[arg(long)]
        preserve_acl: bool,

        /// Validate all tables after the migration
        #[arg(long)]
        validate_after: bool,
    },

    /// Compare source and target schema and data
    Validate {
        /// Validate a single table instead of every table in the schema
        #[arg(long)]
        table: Option<String>,

        /// Include the full-table data checksum (single table only)
        #[arg(long)]
        checksum: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    }
    .apply_env()?;

    if let Some(url) = &cli.source {
        config.source.url = url.clone();
    }
    if let Some(url) = &cli.target {
        config.target.url = url.clone();
    }
    if let Commands::Run {
        jobs,
        preserve_ownership,
        preserve_acl,
        validate_after,
    } = &cli.command
    {
        if let Some(jobs) = jobs {
            config.migration.parallel_jobs = *jobs;
        }
        config.migration.preserve_ownership |= *preserve_ownership;
        config.migration.preserve_acl |= *preserve_acl;
        config.migration.validate_after |= *validate_after;
    }
    config.validate()?;

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler();

    match cli.command {
        Commands::Run { .. } => {
            let mut orchestrator = Orchestrator::new(config.policy()?, &config);
            let result = orchestrator.run(cancel_token.clone()).await?;

            let validation = if config.migration.validate_after {
                info!("Validating migrated tables");
                Some(validate_all(&config, &cancel_token).await?)
            } else {
                None
            };

            if cli.output_json {
                let output = json!({ "migration": result, "validation": validation });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_migration(&result);
                if let Some(report) = &validation {
                    print_validation(report);
                }
            }
        }

        Commands::Validate { table, checksum } => {
            let report = match table {
                Some(table) => {
                    let pipeline = connect_pipeline(&config).await?;
                    let with_checksum = checksum || config.validation.checksum;
                    ValidationReport {
                        tables: vec![pipeline
                            .validate_table(&table, with_checksum, &cancel_token)
                            .await?],
                    }
                }
                None => {
                    if checksum {
                        warn!("--checksum applies to single-table validation only; ignoring");
                    }
                    validate_all(&config, &cancel_token).await?
                }
            };

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_validation(&report);
            }
        }

        Commands::HealthCheck => {
            let result = preflight::health_check(
                &config.source.url,
                &config.target.url,
                &config.connect_options(),
            )
            .await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                print_endpoint("Source", &result.source);
                print_endpoint("Target", &result.target);
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if let Some(err) = result.failure() {
                return Err(err);
            }
        }
    }

    Ok(())
}

async fn connect_pipeline(
    config: &Config,
) -> Result<ValidationPipeline<pg_migrator::PgSession>, MigrateError> {
    ValidationPipeline::connect(
        &config.source.url,
        &config.target.url,
        ValidationProfile::from(&config.validation),
        &config.connect_options(),
    )
    .await
}

async fn validate_all(
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ValidationReport, MigrateError> {
    connect_pipeline(config).await?.validate_all(cancel).await
}

fn print_migration(result: &MigrationResult) {
    match result.status {
        MigrationStatus::Completed => println!("\nMigration completed!"),
        MigrationStatus::CompletedWithWarnings => {
            println!("\nMigration completed with restore warnings!")
        }
    }
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  PostgreSQL: {} -> {}",
        result.source_version, result.target_version
    );
    println!("  Archive: {} bytes", result.archive_bytes);
    println!(
        "  Dump: {:.2}s, Restore: {:.2}s ({} jobs)",
        result.dump_seconds, result.restore_seconds, result.parallel_jobs
    );
}

fn print_validation(report: &ValidationReport) {
    println!("\nValidation passed: {} table(s)", report.tables_validated());
    for table in &report.tables {
        print_table(table);
    }
}

fn print_table(table: &TableReport) {
    let skipped = table.checks.iter().filter(|c| !c.is_passed()).count();
    print!("  ✓ {} ({} rows", table.table, table.row_count);
    if skipped > 0 {
        print!(", {} check(s) skipped", skipped);
    }
    println!(")");
    if let Some(checksum) = &table.checksum {
        println!("    checksum: {}", checksum);
    }
}

fn print_endpoint(label: &str, health: &EndpointHealth) {
    println!(
        "  {}: {} ({}ms)",
        label,
        if health.connected { "OK" } else { "FAILED" },
        health.latency_ms
    );
    if let Some(version) = &health.version {
        println!("    Version: {}", version);
    }
    if let Some(err) = &health.error {
        println!("    Error: {}", err);
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json leaves stdout parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Cancelling migration...", name);
                    token.cancel();
                }
                Err(e) => warn!("Failed to install {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Cancelling migration...");
                token.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
