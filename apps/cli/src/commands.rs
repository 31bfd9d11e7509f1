//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncReadExt;
use tracing::info;

use underwrite_bigquery::BigQueryClient;
use underwrite_core::{
    AggregateOptions, ContextAggregator, Memo, MemoPipeline, ProgressReporter, extract,
    validate_input,
};
use underwrite_gemini::GeminiClient;
use underwrite_shared::{AppConfig, Catalogue, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Underwrite: first-draft underwriting memos backed by market data.
#[derive(Parser)]
#[command(
    name = "underwrite",
    version,
    about = "Draft commercial real estate underwriting memos from property descriptions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.underwrite/underwrite.toml.
    #[arg(long, global = true, env = "UNDERWRITE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the property description comes from.
#[derive(clap::Args, Debug)]
pub(crate) struct InputArgs {
    /// Property description text. Read from stdin when neither this nor --file is given.
    #[arg(conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the property description from a file.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the signals extracted from a description as JSON.
    Extract {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the data-source context gathered for a description.
    Context {
        #[command(flatten)]
        input: InputArgs,

        /// Query sources one after another instead of concurrently.
        #[arg(long)]
        sequential: bool,

        /// Overall deadline for source lookups, in milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// Generate a full underwriting memo.
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Print the memo with its signals and context as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the configured data sources.
    Sources {
        /// Print the full source catalogue as JSON.
        #[arg(long)]
        json: bool,
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
        0 => "underwrite=info",
        1 => "underwrite=debug",
        _ => "underwrite=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays pipeable.
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Extract { input } => cmd_extract(input).await,
        Command::Context {
            input,
            sequential,
            deadline_ms,
        } => cmd_context(config_path, input, sequential, deadline_ms).await,
        Command::Analyze { input, json } => cmd_analyze(config_path, input, json).await,
        Command::Sources { json } => cmd_sources(config_path, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Read the description from the positional argument, `--file`, or stdin,
/// rejecting blank input.
async fn read_input(input: InputArgs) -> Result<String> {
    let text = match (input.text, input.file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .map_err(|e| eyre!("cannot read stdin: {e}"))?;
            buf
        }
    };

    validate_input(&text)?;
    Ok(text)
}

fn catalogue_for(config: &AppConfig) -> Arc<Catalogue> {
    Arc::new(Catalogue::standard(&config.bigquery.dataset))
}

fn bigquery_client(config: &AppConfig) -> Result<BigQueryClient> {
    let (project_id, access_token) = config.bigquery.credentials()?;
    Ok(BigQueryClient::new(project_id, access_token, &config.bigquery)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_extract(input: InputArgs) -> Result<()> {
    let text = read_input(input).await?;
    let signal = extract(&text);
    println!("{}", serde_json::to_string_pretty(&signal)?);
    Ok(())
}

async fn cmd_context(
    config_path: Option<&Path>,
    input: InputArgs,
    sequential: bool,
    deadline_ms: Option<u64>,
) -> Result<()> {
    let text = read_input(input).await?;
    let config = resolve_config(config_path)?;

    let mut options = AggregateOptions::from(&config);
    if sequential {
        options.fan_out = false;
    }
    if let Some(ms) = deadline_ms {
        options.deadline = Some(Duration::from_millis(ms));
    }

    let signal = extract(&text);
    info!(
        state = signal.state.as_deref().unwrap_or("-"),
        fan_out = options.fan_out,
        deadline_ms = options.deadline.map(|d| d.as_millis() as u64),
        "gathering source context"
    );

    let aggregator = ContextAggregator::new(bigquery_client(&config)?, catalogue_for(&config))
        .with_options(options);

    let context = aggregator.aggregate(&signal).await;
    println!("{context}");
    Ok(())
}

async fn cmd_analyze(config_path: Option<&Path>, input: InputArgs, json: bool) -> Result<()> {
    let text = read_input(input).await?;
    let config = resolve_config(config_path)?;

    // Resolve both credentials before any network call.
    let source = bigquery_client(&config)?;
    let generator = GeminiClient::new(config.gemini.api_key()?, &config.gemini)?;

    let aggregator = ContextAggregator::new(source, catalogue_for(&config))
        .with_options(AggregateOptions::from(&config));
    let pipeline = MemoPipeline::new(aggregator, generator);

    let reporter = CliProgress::new();
    let memo = match pipeline.analyze(&text, &reporter).await {
        Ok(memo) => memo,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&memo)?);
        return Ok(());
    }

    println!("{}", memo.memo);
    eprintln!();
    eprintln!("  Request: {}", memo.request_id);
    eprintln!("  Model:   {}", config.gemini.model);
    eprintln!("  Time:    {:.1}s", memo.elapsed.as_secs_f64());

    Ok(())
}

fn cmd_sources(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let catalogue = Catalogue::standard(&config.bigquery.dataset);

    if json {
        println!("{}", serde_json::to_string_pretty(&catalogue)?);
        return Ok(());
    }

    for descriptor in catalogue.sources() {
        println!("{}", descriptor.name);
        println!("  Table:    {}", descriptor.table);
        println!("  Limit:    {}", descriptor.result_limit);
        println!("  Tolerant: {}", descriptor.tolerant);
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _memo: &Memo) {
        self.spinner.finish_and_clear();
    }
}
