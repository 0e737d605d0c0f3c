//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use pathwise_core::{
    CacheStore, EnhanceProgress, Enhancer, EnhancerConfig, ProgressStatus, ProgressUpdate,
    is_expired, needs_enhancement,
};
use pathwise_research::HttpResearchAdapter;
use pathwise_shared::{
    AppConfig, BaselineEntity, cache_key, init_config, load_config, research_api_key,
};
use pathwise_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pathwise: verified enrichment for career pathways.
#[derive(Parser)]
#[command(
    name = "pathwise",
    version,
    about = "Attach verified salary, demand and training data to career pathways.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enhance a JSON array of baseline career entities.
    Enhance {
        /// Input file: a JSON array of objects with at least a `title`.
        #[arg(short, long)]
        input: PathBuf,

        /// Write the enhanced array here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the cache in memory only for this run.
        #[arg(long)]
        no_store: bool,
    },

    /// Inspect the durable enrichment cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show recent enhancement batches.
    History {
        /// Number of batches to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Print the cached record for a career title.
    Show {
        /// Career title, e.g. "Data Analyst".
        title: String,
    },
    /// Count cached records and how many are still fresh.
    Stats,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pathwise=info",
        1 => "pathwise=debug",
        _ => "pathwise=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries command output, so logs go to stderr
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enhance {
            input,
            output,
            no_store,
        } => cmd_enhance(&input, output.as_deref(), no_store).await,
        Command::Cache { action } => match action {
            CacheAction::Show { title } => cmd_cache_show(&title).await,
            CacheAction::Stats => cmd_cache_stats().await,
        },
        Command::History { limit } => cmd_history(limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enhance(input: &Path, output: Option<&Path>, no_store: bool) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    let api_key = research_api_key(&config)?;

    let raw = std::fs::read_to_string(input)
        .map_err(|e| eyre!("cannot read '{}': {e}", input.display()))?;
    let entities: Vec<BaselineEntity> = serde_json::from_str(&raw)
        .map_err(|e| eyre!("'{}' is not a JSON array of entities: {e}", input.display()))?;

    let cache = if no_store {
        CacheStore::in_memory()
    } else {
        let db_path = config.storage.resolved_path()?;
        CacheStore::with_storage(Arc::new(Storage::open(&db_path).await?))
    };
    let cache = Arc::new(cache);

    let adapter = HttpResearchAdapter::new(&config.research, api_key)?;
    let enhancer = Enhancer::new(adapter, Arc::clone(&cache), EnhancerConfig::from(&config));

    info!(
        input = %input.display(),
        entities = entities.len(),
        durable = cache.is_durable(),
        "enhancing entities"
    );

    let reporter = CliProgress::new();
    let report = enhancer.enhance(&entities, &reporter).await;
    cache.flush().await;

    let json = serde_json::to_string_pretty(&report.entities)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?,
        None => println!("{json}"),
    }

    let summary = &report.summary;
    eprintln!();
    eprintln!("  Batch:      {}", report.batch_id);
    eprintln!("  Entities:   {}", report.entities.len());
    eprintln!("  Attempted:  {}", summary.attempted);
    eprintln!("  Succeeded:  {}", summary.succeeded);
    eprintln!("  Failed:     {}", summary.failed);
    eprintln!("  Cache hits: {}", summary.cache_hits);
    for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
        eprintln!(
            "  ✗ {}: {}",
            outcome.entity_key,
            outcome.reason.as_deref().unwrap_or("unknown")
        );
    }
    eprintln!();

    Ok(())
}

async fn open_cache_readonly(config: &AppConfig) -> Result<Storage> {
    let db_path = config.storage.resolved_path()?;
    if !db_path.exists() {
        return Err(eyre!(
            "no cache database at '{}'; run `pathwise enhance` first",
            db_path.display()
        ));
    }
    Ok(Storage::open_readonly(&db_path).await?)
}

async fn cmd_cache_show(title: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_cache_readonly(&config).await?;

    let key = cache_key(title);
    let Some(record) = storage.get_cached_record(&key).await? else {
        println!("No cached enrichment for '{title}' (key: {key})");
        return Ok(());
    };

    let now = Utc::now();
    let state = if is_expired(&record, now) {
        "stale"
    } else if needs_enhancement(Some(&record), config.enhancement.confidence_threshold, now) {
        "fresh, below confidence threshold"
    } else {
        "fresh"
    };

    println!("  Key:        {}", record.key());
    println!("  Confidence: {:.2}", record.confidence());
    println!("  Created:    {}", record.created_at().to_rfc3339());
    println!("  Stale at:   {}", record.stale_at().to_rfc3339());
    println!("  State:      {state}");
    println!();
    println!("{}", serde_json::to_string_pretty(record.payload())?);

    Ok(())
}

async fn cmd_cache_stats() -> Result<()> {
    let config = load_config()?;
    let storage = open_cache_readonly(&config).await?;
    let (total, fresh) = storage.cache_counts(Utc::now()).await?;

    println!("  Records: {total}");
    println!("  Fresh:   {fresh}");
    println!("  Stale:   {}", total - fresh);
    Ok(())
}

async fn cmd_history(limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_cache_readonly(&config).await?;
    let runs = storage.list_batch_runs(limit).await?;

    if runs.is_empty() {
        println!("No enhancement batches recorded yet.");
        return Ok(());
    }

    for run in runs {
        let elapsed = run.finished_at - run.started_at;
        println!(
            "{}  {}  {:.1}s  {}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            elapsed.num_milliseconds() as f64 / 1000.0,
            run.stats_json
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

const PROGRESS_TEMPLATE: &str = "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl EnhanceProgress for CliProgress {
    fn update(&self, update: &ProgressUpdate) {
        self.bar.set_length(update.total as u64);
        self.bar.set_position(update.completed as u64);
        match update.status {
            ProgressStatus::Processing => {
                let msg = match &update.current_item {
                    Some(item) => format!("{item} ({} failed)", update.errors.len()),
                    None => "Researching".to_string(),
                };
                self.bar.set_message(msg);
            }
            ProgressStatus::Completed | ProgressStatus::Error => self.bar.finish_and_clear(),
        }
    }
}
