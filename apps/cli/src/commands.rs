//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use fleetsql_core::{
    BuildProgress, QuerySurface, build_store, dictionary_for, spawn_build, store_channel,
};
use fleetsql_mcp::{McpServer, serve_http, serve_stdio};
use fleetsql_shared::{AppConfig, BuildConfig, BuildSummary, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// fleetsql: query Fleet integration packages with SQL.
#[derive(Parser)]
#[command(
    name = "fleetsql",
    version,
    about = "Build a SQL store of Elastic Fleet integration packages and serve it over MCP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log level (error, warn, info, debug, trace). Overrides -v.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable logging entirely.
    #[arg(long, global = true)]
    pub no_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Corpus and store locations shared by `serve` and `build`.
#[derive(clap::Args)]
pub(crate) struct StoreArgs {
    /// Path to the elastic/integrations checkout (contains packages/).
    #[arg(long, env = "FLEETSQL_DIR")]
    pub dir: PathBuf,

    /// Store file to build (defaults to [store] path from the config).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// ECS dictionary directory (defaults to [ecs] dictionary_dir).
    #[arg(long)]
    pub ecs_dir: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the store in the background and serve queries over MCP.
    Serve {
        #[command(flatten)]
        store: StoreArgs,

        /// Listen for HTTP at this address instead of using stdin/stdout.
        #[arg(long)]
        http: Option<String>,
    },

    /// Build the store in the foreground and print a summary.
    Build {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print the table catalog.
    Schema,

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

/// Initialize tracing based on CLI flags. Output always goes to stderr since
/// stdout carries the stdio transport.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    if cli.no_log {
        return;
    }

    let level = cli.log_level.as_deref().unwrap_or(match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fleetsql={level}")));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
        Command::Serve { store, http } => cmd_serve(store, http).await,
        Command::Build { store } => cmd_build(store).await,
        Command::Schema => cmd_schema(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn build_config(config: &AppConfig, args: StoreArgs) -> BuildConfig {
    let mut build = BuildConfig::from_config(config, args.dir);
    if let Some(db) = args.db {
        build.store_path = db;
    }
    if let Some(ecs_dir) = args.ecs_dir {
        build.ecs_dir = Some(ecs_dir);
    }
    build
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(args: StoreArgs, http: Option<String>) -> Result<()> {
    let config = load_config()?;
    let build = build_config(&config, args);

    let http_addr = match (http, config.server.transport.as_str()) {
        (Some(addr), _) => Some(addr),
        (None, "http") => Some(config.server.http_addr.clone()),
        (None, "stdio") => None,
        (None, other) => {
            return Err(eyre!(
                "invalid transport '{other}' in config: expected 'stdio' or 'http'"
            ));
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dir = %build.integrations_dir.display(),
        db = %build.store_path.display(),
        "fleetsql is starting"
    );

    let (publisher, handle) = store_channel();
    let dictionary = dictionary_for(&build);
    let build_task = spawn_build(build, dictionary, publisher);
    tokio::spawn(async move {
        if let Err(e) = build_task.await {
            error!(error = %e, "build task aborted");
        }
    });

    let server = McpServer::new(QuerySurface::new(handle));
    match http_addr {
        Some(addr) => serve_http(server, &addr, shutdown_signal()).await?,
        None => serve_stdio(server, shutdown_signal()).await?,
    }
    info!("fleetsql stopped");
    Ok(())
}

async fn cmd_build(args: StoreArgs) -> Result<()> {
    let config = load_config()?;
    let build = build_config(&config, args);

    let (publisher, _handle) = store_channel();
    let progress = CliProgress::new();
    let summary = build_store(&build, dictionary_for(&build), &publisher, &progress).await?;

    println!();
    println!("  Store built successfully!");
    println!("  Path:         {}", build.store_path.display());
    println!("  Packages:     {}", summary.packages);
    println!("  Data streams: {}", summary.totals.data_streams);
    println!("  Pipelines:    {}", summary.totals.pipelines);
    println!("  Processors:   {}", summary.totals.processors);
    println!("  Fields:       {}", summary.totals.fields);
    println!("  Vars:         {}", summary.totals.vars);
    println!("  Transforms:   {}", summary.totals.transforms);
    println!("  Time:         {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_schema() -> Result<()> {
    println!("{}", fleetsql_storage::table_schemas().join("\n"));
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
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
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl BuildProgress for CliProgress {
    fn started(&self, total: usize) {
        self.spinner.set_message(format!("Found {total} packages"));
    }

    fn package_written(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {name}"));
    }

    fn done(&self, _summary: &BuildSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
