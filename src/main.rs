use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_harvester::cli_style::{get_styles, print_error};
use catalog_harvester::config::{AppConfig, CliConfig, FileConfig};
use catalog_harvester::pipeline::{
    print_run_summary, run_pipeline, PipelineContext, RunMode, StopReason, StoreReport,
    SystemClock,
};
use catalog_harvester::provider::{ReqwestTransport, ThreadSleeper};
use catalog_harvester::store::{HarvestStore, SqliteHarvestStore};

const EXIT_COMPLETED: i32 = 0;
const EXIT_FATAL: i32 = 1;
const EXIT_RATE_LIMITED: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version, about)]
struct CliArgs {
    /// Path to the SQLite catalog database file.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Provider application client id.
    #[clap(long, global = true, env = "HARVESTER_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Provider application client secret.
    #[clap(long, global = true, env = "HARVESTER_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Market used to scope search results and release listings.
    #[clap(long, global = true)]
    pub market: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs discovery then completion, optionally followed by revalidation
    /// and cleanup.
    Run {
        /// Also revalidate stored groups and clean up the catalog.
        #[clap(long)]
        revalidate: bool,
    },

    /// Only revalidates stored groups and cleans up the catalog.
    Revalidate,

    /// Prints catalog statistics and the last recorded run.
    Stats {
        /// Print the statistics as JSON.
        #[clap(long)]
        json: bool,
    },
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_path: args.db_path.clone(),
            client_id: args.client_id.clone(),
            client_secret: args.client_secret.clone(),
            market: args.market.clone(),
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();
}

fn load_config(cli_args: &CliArgs) -> Result<AppConfig> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config: CliConfig = cli_args.into();
    AppConfig::resolve(&cli_config, file_config)
}

fn run_harvest(app_config: &AppConfig, store: Arc<dyn HarvestStore>, mode: RunMode) -> Result<i32> {
    let cancellation_token = CancellationToken::new();
    let handler_token = cancellation_token.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, finishing the current unit before stopping");
        handler_token.cancel();
    })
    .context("Failed to install interrupt handler")?;

    let transport = Arc::new(ReqwestTransport::new(app_config.provider.timeout)?);
    let ctx = PipelineContext::from_config(
        app_config,
        store,
        transport,
        Arc::new(ThreadSleeper),
        Arc::new(SystemClock),
        cancellation_token,
    )?;

    let stats = run_pipeline(&ctx, mode)?;
    print_run_summary(&stats);

    if stats.error.is_some() {
        return Ok(EXIT_FATAL);
    }
    Ok(match stats.stopped {
        None => EXIT_COMPLETED,
        Some(StopReason::RateLimited { .. }) => EXIT_RATE_LIMITED,
        Some(StopReason::Cancelled) => EXIT_CANCELLED,
    })
}

fn print_stats(store: &dyn HarvestStore, json: bool) -> Result<i32> {
    let report = StoreReport::collect(store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(EXIT_COMPLETED)
}

fn run(cli_args: CliArgs) -> Result<i32> {
    let app_config = load_config(&cli_args)?;

    info!("Configuration loaded:");
    info!("  db_path: {:?}", app_config.db_path);
    info!("  market: {}", app_config.provider.market);
    info!("  page_size: {}", app_config.provider.page_size);
    info!(
        "  discovery queries: {}",
        app_config.discovery.queries.len()
    );

    info!("Opening SQLite catalog database at {:?}...", app_config.db_path);
    let store = Arc::new(SqliteHarvestStore::new(&app_config.db_path)?);

    match cli_args.command {
        Command::Run { revalidate } => run_harvest(&app_config, store, RunMode::Full { revalidate }),
        Command::Revalidate => run_harvest(&app_config, store, RunMode::RevalidateOnly),
        Command::Stats { json } => print_stats(store.as_ref(), json),
    }
}

fn main() {
    let cli_args = CliArgs::parse();
    init_tracing();

    let code = match run(cli_args) {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}
