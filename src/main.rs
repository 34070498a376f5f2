use sheet_ingest::cluster::{ClusterStateGuard, HadoopCli};
use sheet_ingest::config::PipelineConfig;
use sheet_ingest::confirm::{ConfirmationPolicy, ConfirmationPrompt, ProceedPolicy, TerminalConfirmation};
use sheet_ingest::execution::{
    ComputeEngine, FallbackReader, LivySession, ReadOutcome, ResilientReader, SheetCandidates, SheetSelector,
    SpreadsheetCodec,
};
use sheet_ingest::ingestion::{BatchReport, IngestionOrchestrator, LocalModeMarker};
use sheet_ingest::table::TabularResult;
use sheet_ingest::transform::{pivot_wide_to_long, WideTable};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PREVIEW_ROWS: usize = 5;

#[derive(Parser)]
#[command(name = "sheet-ingest")]
#[command(about = "Upload spreadsheets to HDFS and read them back through Spark")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every .xls/.xlsx file in a directory
    Ingest {
        /// Local data directory (default: INGEST_DATA_DIR or ./data)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Answer yes to every confirmation instead of prompting
        #[arg(short, long)]
        yes: bool,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,

        /// Read every uploaded file back afterwards
        #[arg(long)]
        read_back: bool,

        /// Skip the Spark session for the read-back
        #[arg(long)]
        no_engine: bool,
    },
    /// Read one uploaded spreadsheet, Spark first and local parse second
    Read {
        /// File name relative to the remote base path
        file: String,

        /// Sheet selector to try, in order (name, #index or "default")
        #[arg(short, long = "sheet")]
        sheets: Vec<String>,

        /// Skip Spark and read locally
        #[arg(long)]
        no_engine: bool,

        /// Pivot the result on this region column
        #[arg(long)]
        pivot: Option<String>,

        /// Write the (pivoted) table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show whether HDFS is writable
    Probe {
        /// Try to leave safe mode if it is on
        #[arg(long)]
        release: bool,
    },
    /// Pivot a local regional spreadsheet into a time-indexed table
    Pivot {
        /// Local .xls/.xlsx file
        file: PathBuf,

        /// Column holding the region labels
        #[arg(short, long, default_value = "地区")]
        region_column: String,

        /// Write the result to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = PipelineConfig::from_env().context("Invalid configuration")?;

    match args.command {
        Commands::Ingest {
            data_dir,
            yes,
            json,
            read_back,
            no_engine,
        } => run_ingest(config, data_dir, yes, json, read_back, no_engine).await,
        Commands::Read {
            file,
            sheets,
            no_engine,
            pivot,
            output,
        } => run_read(config, file, sheets, no_engine, pivot, output).await,
        Commands::Probe { release } => run_probe(config, release).await,
        Commands::Pivot {
            file,
            region_column,
            output,
        } => run_pivot(file, region_column, output).await,
    }
}

async fn run_ingest(
    mut config: PipelineConfig,
    data_dir: Option<PathBuf>,
    yes: bool,
    json: bool,
    read_back: bool,
    no_engine: bool,
) -> Result<()> {
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    let confirmation: Box<dyn ConfirmationPolicy> = if yes {
        Box::new(ProceedPolicy)
    } else {
        Box::new(TerminalConfirmation)
    };
    let hadoop = HadoopCli::new(&config.hadoop_bin, &config.filesystem_uri);
    let orchestrator = IngestionOrchestrator::new(&hadoop, &hadoop, confirmation.as_ref(), &config);

    println!("\n{}", "=".repeat(60));
    println!(" Uploading {} to {}", config.data_dir.display(), config.remote_base_path);
    println!("{}", "=".repeat(60));

    let result = if read_back {
        let session = open_session(&config, no_engine).await;
        let run = {
            let reader = resilient_reader(&config, &hadoop, session.as_ref(), config.sheet_candidates());
            orchestrator.ingest_and_read(&config.data_dir, &reader).await
        };
        close_session(session).await;
        run.map(|run| {
            for summary in &run.reads {
                match &summary.outcome {
                    Ok(read) => println!("  {} -> {} ({} rows)", summary.remote, read.tier, read.result.row_count()),
                    Err(e) => println!("  {} -> failed: {}", summary.remote, e),
                }
            }
            run.report
        })
    } else {
        orchestrator.run(&config.data_dir).await
    };

    match result {
        Ok(report) => {
            print_report(&report, json)?;
            if report.is_empty() {
                anyhow::bail!("No spreadsheets found in {}", config.data_dir.display());
            }
            if !report.all_succeeded() {
                anyhow::bail!("{} of {} uploads failed", report.failed(), report.attempted);
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ Ingestion aborted: {}", e);
            let prompt = ConfirmationPrompt::IngestionAborted { reason: e.to_string() };
            if confirmation.confirm(&prompt) {
                let marker = LocalModeMarker::write(&config).context("Failed to write local-mode marker")?;
                println!(" Local mode marker written to {}", marker.display());
            }
            Err(e).context("Ingestion failed")
        }
    }
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("\n Uploaded {}/{} files", report.succeeded, report.attempted);
    for record in &report.records {
        match record.failure_cause() {
            None => println!("   ✅ {} ({:.1} KB)", record.name(), record.byte_size() as f64 / 1024.0),
            Some(cause) => println!("   ❌ {}: {}", record.name(), cause),
        }
    }
    if let Some(marker) = &report.local_mode_marker {
        println!(" Local mode marker: {}", marker.display());
    }
    Ok(())
}

async fn run_read(
    config: PipelineConfig,
    file: String,
    sheets: Vec<String>,
    no_engine: bool,
    pivot: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let remote = config.remote_path_for(&file)?;
    let candidates = if sheets.is_empty() {
        config.sheet_candidates()
    } else {
        sheets
            .iter()
            .map(|s| s.parse::<SheetSelector>())
            .collect::<sheet_ingest::Result<SheetCandidates>>()?
    };

    let hadoop = HadoopCli::new(&config.hadoop_bin, &config.filesystem_uri);
    let session = open_session(&config, no_engine).await;
    let outcome = {
        let reader = resilient_reader(&config, &hadoop, session.as_ref(), candidates);
        reader.read(&remote).await
    };
    close_session(session).await;
    let outcome = outcome.with_context(|| format!("Failed to read {}", remote))?;

    print_outcome(&remote.to_string(), &outcome)?;
    finish_table(outcome.result, pivot, output)
}

async fn run_probe(config: PipelineConfig, release: bool) -> Result<()> {
    let hadoop = HadoopCli::new(&config.hadoop_bin, &config.filesystem_uri);
    let guard = ClusterStateGuard::new(&hadoop);

    let state = guard.probe().await;
    println!(" Cluster state: {:?}", state);

    if release && state == sheet_ingest::cluster::ClusterState::ProtectiveMode {
        let released = config
            .release_policy
            .retry_until("Safe mode release", || guard.attempt_release())
            .await;
        println!(" Released: {}", released);
    }
    Ok(())
}

async fn run_pivot(file: PathBuf, region_column: String, output: Option<PathBuf>) -> Result<()> {
    let codec = SpreadsheetCodec::for_path(&file)
        .with_context(|| format!("{} is not an .xls/.xlsx file", file.display()))?;
    let path = file.clone();
    let table = tokio::task::spawn_blocking(move || codec.parse(&path))
        .await?
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", file.display(), e))?;
    info!("Parsed {} rows from {}", table.row_count(), file.display());

    finish_table(table, Some(region_column), output)
}

async fn open_session(config: &PipelineConfig, no_engine: bool) -> Option<LivySession> {
    if no_engine {
        return None;
    }
    match LivySession::open(config).await {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("⚠️ Spark session unavailable ({}), reading locally only", e);
            None
        }
    }
}

async fn close_session(session: Option<LivySession>) {
    if let Some(session) = session {
        if let Err(e) = session.close().await {
            warn!("Failed to close Spark session: {}", e);
        }
    }
}

fn resilient_reader<'a>(
    config: &PipelineConfig,
    hadoop: &'a HadoopCli,
    session: Option<&'a LivySession>,
    candidates: SheetCandidates,
) -> ResilientReader<'a> {
    let mut fallback = FallbackReader::new(hadoop);
    if let Some(dir) = &config.scratch_dir {
        fallback = fallback.with_scratch_dir(dir);
    }
    ResilientReader::new(
        session.map(|s| s as &dyn ComputeEngine),
        config.filesystem_uri.clone(),
        candidates,
        fallback,
    )
}

fn print_outcome(source: &str, outcome: &ReadOutcome) -> Result<()> {
    println!("\n {} read via {} tier", source, outcome.tier);
    if let Some(selector) = &outcome.selector {
        println!("   sheet: {}", selector);
    }
    for failure in &outcome.candidate_failures {
        println!("   tried {}: {}", failure.selector, failure.reason);
    }
    println!(
        "   shape: {} rows x {} columns",
        outcome.result.row_count(),
        outcome.result.columns().len()
    );
    println!("{}", serde_json::to_string_pretty(&outcome.result.preview_json(PREVIEW_ROWS)?)?);
    Ok(())
}

fn finish_table(table: TabularResult, pivot: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let mut frame = match pivot {
        Some(region_column) => {
            let long = pivot_wide_to_long(&WideTable::new(table.into_frame()), &region_column)
                .context("Pivot failed")?;
            println!("\n Pivoted table:\n{}", long.frame());
            long.into_frame()
        }
        None => table.into_frame(),
    };

    if let Some(path) = output {
        write_csv(&mut frame, &path)?;
        println!(" Wrote {}", path.display());
    }
    Ok(())
}

fn write_csv(frame: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
