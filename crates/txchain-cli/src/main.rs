mod session;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use txchain_core::constants::{DEFAULT_CREATOR_ID, DEFAULT_DIFFICULTY, GENESIS_SENDER};

use crate::session::{Flow, Line, Session};

#[derive(Parser, Debug, Clone)]
#[command(name = "txchain")]
#[command(about = "Record transactions in a proof-of-work ledger for the length of one session")]
pub struct Args {
    /// Leading hex zeros required of every new block
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: u32,

    /// Creator id stamped on blocks added in this session
    #[arg(long, default_value_t = DEFAULT_CREATOR_ID)]
    pub creator_id: u64,

    /// Sender text of the genesis record
    #[arg(long, default_value = GENESIS_SENDER)]
    pub genesis: String,

    /// Give up on a block after this many seconds of mining
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Give up on a block after this many digests
    #[arg(long)]
    pub max_attempts: Option<u64>,

    /// Spread the nonce search over all cores
    #[arg(long)]
    pub parallel: bool,

    /// Print blocks and results as JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut session = Session::new(args)?;
    info!(difficulty = session.chain().difficulty(), "session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Line::from_input(line) {
            Ok(parsed) => {
                if session.handle(parsed.command).await? == Flow::Quit {
                    break;
                }
            }
            Err(message) => println!("{message}"),
        }
    }

    info!(blocks = session.chain().len(), "session ended");
    Ok(())
}
