//! Oracle node: command-line entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse the command line
//!   3. Load config (file, then environment)
//!   4. Hand the command to the bootstrap client

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use oracle_node::bootstrap::{Client, RunNodeArgs};
use oracle_node::config;
use oracle_node::error::AppError;

#[derive(Parser)]
#[command(name = "oracle-node")]
#[command(about = "Oracle node: bootstraps the local node and manages its keys and API user")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Optional TOML config file; environment variables override it.
    #[arg(short = 'f', long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node until interrupted.
    Node(NodeArgs),

    /// Import an encrypted key file into the node's keystore.
    Import {
        keyfile: PathBuf,
    },

    /// Delete the API user.
    DeleteUser,
}

#[derive(Args)]
struct NodeArgs {
    /// Log at debug level.
    #[arg(short, long)]
    debug: bool,

    /// Replay logs from this block height (negative disables).
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    replay_from_block: i64,

    /// File holding the keystore password.
    #[arg(short, long)]
    password: Option<PathBuf>,

    /// File holding the API email and password, one per line.
    #[arg(short, long)]
    api: Option<PathBuf>,
}

impl From<NodeArgs> for RunNodeArgs {
    fn from(args: NodeArgs) -> Self {
        Self {
            debug: args.debug,
            replay_from_block: args.replay_from_block,
            password: args.password,
            api: args.api,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Optional file.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    let mut client = Client::production(config);

    match cli.command {
        Command::Node(args) => client.run_node(&args.into()),
        Command::Import { keyfile } => {
            let dst = client.import_key(&keyfile)?;
            println!("imported {}", dst.display());
            Ok(())
        }
        Command::DeleteUser => {
            let user = client.delete_user()?;
            println!("deleted API user {}", user.email);
            Ok(())
        }
    }
}
