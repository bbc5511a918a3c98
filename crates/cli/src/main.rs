use std::{path::Path, process};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod mock;
mod serve;

const DEFAULT_LOG_FILTER: &str = "eventcast=info,tower_http=info";
const VERBOSE_LOG_FILTER: &str = "eventcast=debug,tower_http=debug";

#[derive(Parser, Debug)]
#[clap(author, version, about = "eventcast - in-memory JSON event broadcast server", long_about = None)]
struct Opts {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Start the stream server
    Serve(serve::ServeCommand),
    /// Create a stream
    Create(client::CreateCommand),
    /// Post a JSON object to a stream
    Post(client::PostCommand),
    /// List streams
    List(client::ListCommand),
    /// Print every event of a stream as JSON lines
    Subscribe(client::SubscribeCommand),
    /// Send synthetic trial data to a stream
    Mock(mock::MockCommand),
}

#[tokio::main]
async fn main() {
    // Before parsing so env-backed flags see .env values.
    config::load_env_file(Path::new("."));

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    init_tracing(opts.verbose);

    if let Err(e) = handle_command(opts).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_command(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Serve(cmd) => cmd.execute().await,
        Command::Create(cmd) => cmd.execute().await,
        Command::Post(cmd) => cmd.execute().await,
        Command::List(cmd) => cmd.execute().await,
        Command::Subscribe(cmd) => cmd.execute().await,
        Command::Mock(cmd) => cmd.execute().await,
    }
}
