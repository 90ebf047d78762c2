//! Marker Coordinate Load - QC and partition tool

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use mrkcoord_common::logging::{init_logging, LogConfig, LogLevel};
use mrkcoord_load::columns::check_columns;
use mrkcoord_load::config::{LoaderKind, QcConfig};
use mrkcoord_load::db::{create_pool, DbConfig};
use mrkcoord_load::delete::{delete_features, DeleteConfig, DeleteMode};
use mrkcoord_load::pipeline::QcPipeline;
use mrkcoord_load::reference::PgReferenceStore;
use mrkcoord_load::split::{split_feed, SplitConfig};
use mrkcoord_load::staging::{BulkLoader, CommandLoader, CopyLoader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mrkcoordload")]
#[command(author, version, about = "Marker coordinate QC and load tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// QC a coordinate feed; exits 2 when discrepancies were reported
    Qc {
        /// Coordinate feed to check
        input: PathBuf,

        /// Delete stale associations and write the load-ready file
        /// (default: LIVE_RUN)
        #[arg(long)]
        live: bool,
    },

    /// Check that every data line has at least N columns
    CheckColumns {
        file: PathBuf,
        columns: usize,
    },

    /// Split a load-ready feed into per-collection coordinate files
    Split {
        #[arg(long, env = "INPUT_FILE_LOAD")]
        input: PathBuf,

        /// miRBase association file to write
        #[arg(long, env = "MIRBASE_ASSOC_FILE")]
        association_file: PathBuf,

        /// Prefix of the per-collection files
        #[arg(long, env = "INFILE_NAME")]
        file_root: PathBuf,

        /// File listing the generated files
        #[arg(long, env = "COORD_FILES")]
        file_list: PathBuf,
    },

    /// Delete the coordinate features named in a file
    Delete {
        file: PathBuf,

        /// `preview` only reports; any other mode deletes
        mode: String,

        #[arg(long, env = "LOG_DIAG")]
        log_diag: Option<PathBuf>,

        #[arg(long, env = "LOG_ERROR")]
        log_error: Option<PathBuf>,
    },
}

/// Status for a failed argument parse. Usage errors must not collide with
/// the discrepancy status, so everything but help and version exits 1.
fn usage_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(e.kind()));
        }
    };

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("mrkcoordload")
        .build();

    // environment variables take precedence
    let _guard = match log_config.merge_env().and_then(|config| init_logging(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "mrkcoordload failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Qc { input, live } => qc(input, live.then_some(true)).await,
        Command::CheckColumns { file, columns } => {
            let report = check_columns(&file, columns)?;
            Ok(if report.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        },
        Command::Split {
            input,
            association_file,
            file_root,
            file_list,
        } => {
            let config = SplitConfig {
                input,
                association_file,
                file_root,
                file_list,
            };
            let summary = split_feed(&config).context("split failed")?;
            info!(files = summary.files.len(), "Split complete");
            Ok(ExitCode::SUCCESS)
        },
        Command::Delete {
            file,
            mode,
            log_diag,
            log_error,
        } => delete(file, DeleteMode::from_arg(&mode), log_diag, log_error).await,
    }
}

async fn qc(input: PathBuf, live: Option<bool>) -> Result<ExitCode> {
    let config = QcConfig::from_env(input, live).context("invalid QC configuration")?;
    let db_config = DbConfig::from_env()?;
    let pool = create_pool(&db_config)
        .await
        .with_context(|| format!("cannot connect to {}/{}", db_config.server, db_config.database))?;

    let store = PgReferenceStore::new(pool.clone());
    let loader: Box<dyn BulkLoader> = match &config.loader {
        LoaderKind::Command(program) => Box::new(CommandLoader::new(
            program.clone(),
            &db_config.server,
            &db_config.database,
        )),
        LoaderKind::Copy => Box::new(CopyLoader::new(pool)),
    };

    let summary = QcPipeline::new(&config, &store, loader.as_ref()).run().await?;
    info!(
        outcome = ?summary.outcome,
        build = %summary.build,
        associations_deleted = summary.associations_deleted,
        "QC finished"
    );
    Ok(ExitCode::from(summary.outcome.exit_code()))
}

async fn delete(
    file: PathBuf,
    mode: DeleteMode,
    log_diag: Option<PathBuf>,
    log_error: Option<PathBuf>,
) -> Result<ExitCode> {
    let db_config = DbConfig::from_env()?;
    let config = DeleteConfig::new(file, mode, log_diag, log_error)?
        .with_target(&db_config.server, &db_config.database);
    let pool = create_pool(&db_config)
        .await
        .with_context(|| format!("cannot connect to {}/{}", db_config.server, db_config.database))?;
    let store = PgReferenceStore::new(pool);

    let summary = delete_features(&config, &store).await?;
    Ok(if summary.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
