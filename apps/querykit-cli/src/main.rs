mod config;
mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use querykit::{CompiledQuery, Compiler, DynamicQuery, JsonFields, SortDir};
use querykit_store::{MemoryStore, PageRequest, QueryableExt, paginate_async};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, CliOverrides};

/// QueryKit CLI - run dynamic filter/sort/page requests against JSON records
#[derive(Parser)]
#[command(name = "querykit-cli")]
#[command(about = "QueryKit CLI - run dynamic filter/sort/page requests against JSON records")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON file holding an array of records
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// JSON file holding the request (`filter`, `sort`, `page`)
    #[arg(short, long, global = true)]
    request: Option<PathBuf>,

    /// Page index override
    #[arg(long, global = true)]
    index: Option<u64>,

    /// Page size override
    #[arg(long, global = true)]
    size: Option<u64>,

    /// Page origin override
    #[arg(long, global = true)]
    origin: Option<u64>,

    /// Print effective configuration (JSON) and exit
    #[arg(long, global = true)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run the request and print the page envelope
    Query,
    /// Compile the request and print the predicate and ordering
    Check,
}

/// Request file shape: a dynamic query plus optional paging.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestFile {
    #[serde(flatten)]
    query: DynamicQuery,
    #[serde(default)]
    page: PageArgs,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageArgs {
    index: Option<u64>,
    size: Option<u64>,
    origin: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) defaults -> 2) YAML (if provided) -> 3) env (QUERYKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        size: cli.size,
        origin: cli.origin,
        verbose: cli.verbose,
    });

    logging::init_logging(&config.logging);

    if cli.print_config {
        println!("{}", config.to_pretty_json()?);
        return Ok(());
    }

    let request = load_request(cli.request.as_deref())?;
    match cli.command.unwrap_or(Commands::Query) {
        Commands::Query => run_query(&cli, &config, &request).await,
        Commands::Check => check_request(&config, &request),
    }
}

fn load_request(path: Option<&Path>) -> Result<RequestFile> {
    let Some(path) = path else {
        return Ok(RequestFile::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("malformed request in {}", path.display()))
}

fn compile(config: &AppConfig, query: &DynamicQuery) -> Result<CompiledQuery> {
    let mut compiled = Compiler::new(config.limits)
        .compile_dynamic(query)
        .inspect_err(|e| tracing::warn!(error = %e, "request rejected"))?;
    if let Some(tiebreaker) = &config.tiebreaker {
        compiled.order = compiled.order.ensure_tiebreaker(tiebreaker, SortDir::Asc);
    }
    Ok(compiled)
}

/// CLI flags win over the request file, which wins over config.
fn page_request(cli: &Cli, config: &AppConfig, page: &PageArgs) -> PageRequest {
    let origin = cli.origin.or(page.origin).unwrap_or(config.paging.origin);
    PageRequest {
        index: cli.index.or(page.index).unwrap_or(origin),
        size: cli.size.or(page.size).unwrap_or(config.paging.size),
        origin,
    }
}

async fn run_query(cli: &Cli, config: &AppConfig, request: &RequestFile) -> Result<()> {
    let data = cli
        .data
        .as_deref()
        .context("--data is required for the query command")?;
    let text = fs::read_to_string(data)
        .with_context(|| format!("failed to read data file {}", data.display()))?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&text)
        .with_context(|| format!("data file {} must hold a JSON array", data.display()))?;

    let compiled = compile(config, &request.query)?;
    let page = page_request(cli, config, &request.page);
    tracing::info!(rows = rows.len(), index = page.index, size = page.size, "running query");

    let store = MemoryStore::with_rows(JsonFields, rows);
    let query = store.query().apply(&compiled)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C signal");
                cancel.cancel();
            }
        })
    };

    let result = paginate_async(&query, page, &cancel).await;
    ctrl_c.abort();

    let page = result.inspect_err(|e| tracing::warn!(error = %e, "query failed"))?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn check_request(config: &AppConfig, request: &RequestFile) -> Result<()> {
    tracing::info!("Checking request...");
    let compiled = compile(config, &request.query)?;

    let (filter, values) = match &compiled.filter {
        Some(p) => (Some(p.to_string()), p.values().to_vec()),
        None => (None, Vec::new()),
    };
    let report = serde_json::json!({
        "filter": filter,
        "values": values,
        "order": compiled.order.to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
