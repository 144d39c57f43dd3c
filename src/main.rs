mod cli_logger;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

use cli_logger::CliLogger;
use tracedrill::{Config, SessionCommand, session_command};

#[derive(Debug, Parser)]
#[command(name = "tracedrill", version, about = "Drill into recorded profiling traces")]
struct Cli {
    /// Config file; missing or invalid files fall back to defaults.
    #[arg(long, global = true, default_value = "tracedrill.toml")]
    config: PathBuf,

    /// Emit one JSON document per result.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    /// Log at debug level to stderr (RUST_LOG still applies).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: SessionCommand,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tracedrill=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, logger: &CliLogger) -> Result<()> {
    let config = Config::load_optional(&cli.config);
    let stdin = std::io::stdin();
    let value = session_command(&config, &cli.command, stdin.lock(), |response| {
        logger.print_serialized(response)
    })?;
    logger.print_serialized(&value)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let logger = CliLogger::new(cli.json, cli.no_color);
    if let Err(err) = run(&cli, &logger) {
        logger.print_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}
