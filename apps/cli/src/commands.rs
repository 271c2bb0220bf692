//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use eventharvest_core::{Pipeline, ProgressReporter, RunReport, Sink, failed_stats_json};
use eventharvest_crawler::{HttpRenderer, RenderSession, Selectors};
use eventharvest_shared::{
    AppConfig, RunId, StoreBackendKind, init_config, load_config, parse_listing_url,
    resolve_store_credentials,
};
use eventharvest_storage::{DateRange, EventFilter, Storage, StoreBackend, SupabaseStore};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// EventHarvest: collect events from a listing page into a backing store.
#[derive(Parser)]
#[command(
    name = "eventharvest",
    version,
    about = "Walk an event listing, enrich each entry from its detail page, and store the results.",
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
    /// Run the pipeline once against the listing page.
    ///
    /// Pages are fetched with a plain HTTP GET and parsed as served. A listing
    /// whose entries are inserted by client-side script will come back empty;
    /// such sites need a browser-driven renderer.
    Run {
        /// Listing page URL (defaults to `[source].listing_url`).
        #[arg(long)]
        listing_url: Option<String>,

        /// Backing store: supabase, local, or none (defaults to `[store].backend`).
        #[arg(long)]
        store: Option<String>,

        /// Database file for the local store (defaults to `[store].local_path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Also write every normalized record to this file as JSON.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Milliseconds to wait after each page load.
        #[arg(long)]
        settle_ms: Option<u64>,

        /// Send the run-local sequence id with each row.
        #[arg(long)]
        include_id: bool,
    },

    /// List events saved in the local store, ordered by start date.
    List {
        /// Database file (defaults to `[store].local_path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Only show events from this run.
        #[arg(long)]
        run: Option<String>,

        /// Only show this category (`all` shows every category).
        #[arg(long)]
        category: Option<String>,

        /// Case-insensitive text to look for in title, description, or location.
        #[arg(long)]
        search: Option<String>,

        /// Only show events starting within: today, week, or month.
        #[arg(long)]
        since: Option<String>,

        /// Print as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List runs recorded in the local store.
    Runs {
        /// Database file (defaults to `[store].local_path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "eventharvest=info",
        1 => "eventharvest=debug",
        _ => "eventharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            listing_url,
            store,
            db,
            out,
            settle_ms,
            include_id,
        } => {
            let options = RunOptions {
                listing_url,
                store,
                db,
                out,
                settle_ms,
                include_id,
            };
            cmd_run(options).await
        }
        Command::List {
            db,
            run,
            category,
            search,
            since,
            json,
        } => {
            let filter = EventFilter {
                run_id: run.as_deref().map(str::parse::<RunId>).transpose()?,
                category,
                search,
                since: since.as_deref().map(str::parse::<DateRange>).transpose()?,
            };
            cmd_list(db.as_deref(), &filter, json).await
        }
        Command::Runs { db } => cmd_runs(db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Flags of `eventharvest run`; unset values fall back to the config file.
struct RunOptions {
    listing_url: Option<String>,
    store: Option<String>,
    db: Option<PathBuf>,
    out: Option<PathBuf>,
    settle_ms: Option<u64>,
    include_id: bool,
}

async fn cmd_run(options: RunOptions) -> Result<()> {
    let config = load_config()?;

    let raw_url = options
        .listing_url
        .unwrap_or_else(|| config.source.listing_url.clone());
    let listing_url = parse_listing_url(&raw_url)?;

    let backend_kind = match options.store.as_deref() {
        Some(name) => name.parse::<StoreBackendKind>()?,
        None => config.store.backend,
    };
    let include_id = options.include_id || config.store.include_id;
    let selectors = Selectors::compile(&config.selectors)?;

    let run_id = RunId::new();
    info!(%run_id, listing_url = %listing_url, backend = %backend_kind, "starting run");

    // Local runs are recorded before the first page load.
    let storage = match backend_kind {
        StoreBackendKind::Local => {
            let path = db_path(&config, options.db.as_deref());
            let storage = Storage::open(&path).await?;
            storage.insert_run(&run_id, listing_url.as_str()).await?;
            Some(storage)
        }
        _ => None,
    };

    let backend = if let Some(storage) = &storage {
        StoreBackend::Local(storage.for_run(&run_id))
    } else if backend_kind == StoreBackendKind::Supabase {
        let credentials = resolve_store_credentials(&config)?;
        StoreBackend::Supabase(SupabaseStore::new(&credentials, &config.store.table)?)
    } else {
        StoreBackend::Discard
    };

    let renderer =
        HttpRenderer::with_timeout(Duration::from_secs(config.source.request_timeout_secs))?;
    let settle_delay =
        Duration::from_millis(options.settle_ms.unwrap_or(config.source.settle_delay_ms));
    let mut session = RenderSession::open(renderer, settle_delay);

    let pipeline = Pipeline::new(selectors, Sink::new(backend, include_id));
    let reporter = CliProgress::new();

    let result = pipeline
        .run(&mut session, &listing_url, run_id.clone(), &reporter)
        .await;
    session.close();
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            reporter.abandon();
            if let Some(storage) = &storage {
                storage.finish_run(&run_id, &failed_stats_json(&e)).await?;
            }
            return Err(e.into());
        }
    };

    if let Some(storage) = &storage {
        storage.finish_run(&run_id, &report.stats_json()).await?;
    }

    if let Some(out) = &options.out {
        write_records(out, &report)?;
    }

    println!("Processed {} events, persisted {}.", report.attempted, report.persisted);
    for failure in &report.failures {
        println!("  not saved: {} ({})", failure.title, failure.reason);
    }

    Ok(())
}

fn db_path(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.store.local_path))
}

fn write_records(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.records)?;
    std::fs::write(path, json).map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
    info!(path = %path.display(), records = report.records.len(), "wrote records");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn abandon(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item_started(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Extracting [{current}/{total}] {title}"));
    }

    fn item_finished(&self, title: &str, saved: bool) {
        if !saved {
            self.spinner.println(format!("  ✗ {title}"));
        }
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// list / runs
// ---------------------------------------------------------------------------

async fn cmd_list(db: Option<&Path>, filter: &EventFilter, json: bool) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&db_path(&config, db)).await?;
    let events = storage.list_events(filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No matching events.");
        return Ok(());
    }

    for event in &events {
        let row = &event.row;
        let coords = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => format!("{lat:.5},{lon:.5}"),
            _ => "-".to_string(),
        };
        println!(
            "{}  {:<40}  {:<12}  {:<24}  {coords}",
            row.start_date, row.title, row.category, row.location_name
        );
    }
    println!();
    println!("{} event(s)", events.len());

    Ok(())
}

async fn cmd_runs(db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&db_path(&config, db)).await?;
    let runs = storage.list_runs().await?;

    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    for run in &runs {
        let status = run.finished_at.as_deref().unwrap_or("unfinished");
        println!("{}  {}  {}  {}", run.id, run.started_at, status, run.listing_url);
        if let Some(stats) = &run.stats_json {
            println!("    {stats}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_help_names_renderer_limit() {
        let mut cmd = Cli::command();
        let run = cmd.find_subcommand_mut("run").expect("run subcommand");
        let help = run.render_long_help().to_string();
        assert!(help.contains("plain HTTP GET"));
        assert!(help.contains("client-side script"));
    }

    #[test]
    fn list_accepts_filters() {
        let cli = Cli::try_parse_from([
            "eventharvest",
            "list",
            "--category",
            "Concert",
            "--search",
            "jazz",
            "--since",
            "week",
        ])
        .unwrap();

        match cli.command {
            Command::List {
                category,
                search,
                since,
                ..
            } => {
                assert_eq!(category.as_deref(), Some("Concert"));
                assert_eq!(search.as_deref(), Some("jazz"));
                let since = since.as_deref().map(str::parse::<DateRange>).transpose();
                assert_eq!(since.unwrap(), Some(DateRange::Week));
            }
            _ => panic!("expected list command"),
        }
    }
}
