mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use flowcost::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "flowcost", about = "Estimate and track the cost of LLM flows", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text|json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote a flow run before executing it
    Estimate {
        /// Flow identifier (e.g. cluster-keywords)
        flow_id: String,

        /// Named input as key=value (repeatable)
        #[arg(short, long = "input")]
        input: Vec<String>,

        /// Inputs as a JSON object
        #[arg(long = "inputs")]
        inputs_json: Option<String>,

        /// Read inputs from a JSON file
        #[arg(long)]
        inputs_file: Option<PathBuf>,

        /// Model id (default: configured fallback model)
        #[arg(short, long)]
        model: Option<String>,

        /// Hardware class (default: configured default hardware)
        #[arg(long)]
        hardware: Option<String>,

        /// Known runtime in seconds; skips the cold-start buffer
        #[arg(long)]
        runtime: Option<f64>,
    },
    /// Total the cost of a finished run from its recorded LLM calls
    Track {
        /// Wall-clock runtime of the run in seconds
        #[arg(short, long)]
        runtime: f64,

        /// Hardware class (default: configured default hardware)
        #[arg(long)]
        hardware: Option<String>,

        /// LLM call as MODEL:IN:OUT[:COST] (repeatable)
        #[arg(short, long = "call")]
        call: Vec<String>,
    },
    /// List model prices from the pricing registry
    Models,
    /// List container prices per hardware class
    Hardware,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the effective configuration
    Show,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "flowcost=debug" } else { "flowcost=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("{}, using defaults", e);
        AppConfig::default()
    });

    let format = if cli.json {
        cli::output::OutputFormat::Json
    } else {
        cli.format
            .as_deref()
            .or(Some(config.settings.default_format.as_str()))
            .and_then(cli::output::OutputFormat::from_name)
            .unwrap_or(cli::output::OutputFormat::Text)
    };
    let output_opts = cli::output::OutputOptions {
        format,
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &config.settings.color),
    };

    match cli.command {
        Commands::Estimate {
            flow_id,
            input,
            inputs_json,
            inputs_file,
            model,
            hardware,
            runtime,
        } => {
            let args = cli::estimate_cmd::EstimateArgs {
                flow_id,
                inputs: input,
                inputs_json,
                inputs_file,
                model,
                hardware,
                runtime,
            };
            cli::estimate_cmd::run(args, &config, &output_opts).await?;
        }
        Commands::Track {
            runtime,
            hardware,
            call,
        } => cli::track_cmd::run(hardware, runtime, call, &config, &output_opts).await?,
        Commands::Models => cli::catalog_cmd::models(&config, &output_opts).await?,
        Commands::Hardware => cli::catalog_cmd::hardware(&config, &output_opts)?,
        Commands::Config { action } => match action {
            ConfigAction::Init => cli::config_cmd::init()?,
            ConfigAction::Check => cli::config_cmd::check()?,
            ConfigAction::Show => cli::config_cmd::show(&config)?,
        },
    }

    Ok(())
}
