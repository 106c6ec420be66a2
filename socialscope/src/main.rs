//! socialscope - analytics CLI for a social-media dataset
//!
//! Runs the growth, virality, lifecycle and engagement-pair analyses against
//! a SQLite dataset, prints a report and writes charts.

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use socialscope_core::analytics::{create_default_engine, AnalysisContext, RunStatus};
use socialscope_core::chart::sink_for;
use socialscope_core::config::ChartFormat;
use socialscope_core::{Config, Datastore};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "socialscope")]
#[command(about = "Growth, virality, lifecycle and engagement-pair reports for a social dataset")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the dataset (overrides datastore.path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Servers currently serving the platform
    #[arg(long, global = true)]
    servers: Option<u32>,

    /// Number of ranked posts and pairs shown in detail
    #[arg(long, global = true)]
    top: Option<usize>,

    /// Write charts to this directory
    #[arg(long, value_name = "DIR", global = true)]
    charts: Option<PathBuf>,

    /// Do not write charts
    #[arg(long, global = true, conflicts_with = "charts")]
    no_charts: bool,

    /// Chart file format: svg or json
    #[arg(long, global = true)]
    chart_format: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the dataset's tables, columns and row counts
    Inspect,
    /// Tables, lurkers, top influencers and repeated content
    Overview,
    /// Activity growth projection and server capacity plan
    Growth,
    /// Posts ranked by virality score
    Virality,
    /// Time from posting to first and last comment
    Lifecycle,
    /// User pairs ranked by mutual engagement
    Pairs,
    /// Run every analysis (default)
    All,
    /// List available analyses
    List,
}

impl Command {
    /// Analysis run by this command; `None` for commands that run all or none.
    fn analysis_name(&self) -> Option<&'static str> {
        match self {
            Command::Overview => Some("overview"),
            Command::Growth => Some("growth"),
            Command::Virality => Some("virality"),
            Command::Lifecycle => Some("lifecycle"),
            Command::Pairs => Some("pairs"),
            Command::Inspect | Command::All | Command::List => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("Unknown format: {}. Use 'text' or 'json'", other),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;

    // Logging is best effort; reports still print without a log file
    let _log_guard = socialscope_core::logging::init(&config.logging).ok();

    apply_overrides(&mut config, &args)?;
    config.validate().context("invalid configuration")?;
    let format = OutputFormat::parse(&args.format)?;
    let command = args.command.unwrap_or(Command::All);

    let engine = create_default_engine(&config.datastore_path());

    // List mode needs no dataset
    if command == Command::List {
        println!("Available analyses:");
        for (name, description) in engine.descriptions() {
            println!("  {:<10} {}", name, description);
        }
        return Ok(());
    }

    let db_path = engine.datastore_path().to_path_buf();
    let store = Datastore::open_read_only(&db_path)
        .with_context(|| format!("failed to open datastore {}", db_path.display()))?;

    if command == Command::Inspect {
        let tables = store.list_tables().context("failed to inspect datastore")?;
        match format {
            OutputFormat::Text => report::print_tables(&tables),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
        }
        return Ok(());
    }

    let ctx = AnalysisContext {
        current_servers: config.capacity.current_servers,
        top_n: config.report.top_n,
    };

    let names: Vec<&str> = match command.analysis_name() {
        Some(name) => vec![name],
        None => engine.analysis_names(),
    };

    let mut runs = Vec::with_capacity(names.len());
    for name in names {
        runs.push(engine.run_with_store(name, &store, &ctx)?);
    }
    drop(store);

    // Write charts for every analysis that produced a result
    let mut chart_paths = Vec::new();
    if config.report.charts {
        let dir = config.chart_dir();
        let sink = sink_for(config.report.chart_format);
        for run in &runs {
            let Some(output) = &run.output else {
                continue;
            };
            match sink.render(&output.chart(ctx.top_n), &dir) {
                Ok(path) => chart_paths.push(path),
                Err(e) => {
                    tracing::warn!(analysis = %run.name, error = %e, "Failed to write chart");
                    eprintln!("Warning: failed to write chart for {}: {}", run.name, e);
                }
            }
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Dataset: {}", db_path.display());
            report::print_text(&runs, &ctx, &chart_paths);
        }
        OutputFormat::Json => report::print_json(&db_path, &runs, &chart_paths)?,
    }

    let failed: Vec<&str> = runs
        .iter()
        .filter(|r| r.status == RunStatus::Error)
        .map(|r| r.name.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("analysis failed: {}", failed.join(", "));
    }

    Ok(())
}

/// Apply command-line overrides on top of the configuration file.
fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(ref db) = args.db {
        config.datastore.path = Some(db.clone());
    }
    if let Some(servers) = args.servers {
        config.capacity.current_servers = servers;
    }
    if let Some(top) = args.top {
        config.report.top_n = top;
    }
    if let Some(ref dir) = args.charts {
        config.report.chart_dir = Some(dir.clone());
        config.report.charts = true;
    }
    if args.no_charts {
        config.report.charts = false;
    }
    if let Some(ref value) = args.chart_format {
        config.report.chart_format = value
            .parse::<ChartFormat>()
            .context("invalid --chart-format")?;
    }
    Ok(())
}
