//! One ledger session: a single chain, fed by commands read from stdin.
//!
//! Mining runs on a blocking worker so a timeout or Ctrl-C can stop it. The
//! chain never leaves this task; only the sealed block comes back.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use txchain_core::{
    pow::{self, MiningControl},
    Block, Chain, MiningError, Record,
};

use crate::Args;

/// One input line, parsed with clap so `help` comes for free.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

impl Line {
    /// Split `input` like a shell, so quoted fields may contain spaces.
    pub fn from_input(input: &str) -> std::result::Result<Self, String> {
        let words = shlex::split(input).ok_or_else(|| "Unbalanced quotes".to_string())?;
        Self::try_parse_from(words).map_err(|err| err.to_string())
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Mine a block holding this record and append it
    Add {
        sender: String,
        receiver: String,
        /// Stored as typed; not checked to be a number
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },
    /// Show or change the difficulty for future blocks
    Difficulty { value: Option<u32> },
    /// Check every block links to the one before it
    Validate,
    /// List every block
    Show,
    /// Show one block
    Inspect { index: usize },
    /// Show the last block
    Tip,
    /// End the session
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Serialize)]
struct BlockRow<'a> {
    index: usize,
    digest: String,
    /// Amount read as a number, when it is one.
    amount_value: Option<f64>,
    #[serde(flatten)]
    block: &'a Block,
}

impl<'a> BlockRow<'a> {
    fn new(index: usize, block: &'a Block) -> Self {
        Self {
            index,
            digest: block.digest(),
            amount_value: block.record.amount_as_decimal(),
            block,
        }
    }
}

pub struct Session {
    chain: Chain,
    args: Args,
}

impl Session {
    pub fn new(args: Args) -> Result<Self> {
        let genesis = Record::new(args.genesis.as_str(), "", "0");
        let chain =
            Chain::with_difficulty(genesis, 0, args.difficulty).context("invalid --difficulty")?;
        Ok(Self { chain, args })
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub async fn handle(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Add {
                sender,
                receiver,
                amount,
            } => self.add(Record::new(sender, receiver, amount)).await?,
            Command::Difficulty { value: None } => {
                self.emit(json!({ "difficulty": self.chain.difficulty() }), || {
                    format!("Difficulty: {}", self.chain.difficulty())
                });
            }
            Command::Difficulty { value: Some(value) } => match self.chain.set_difficulty(value) {
                Ok(()) => self.emit(json!({ "difficulty": value }), || {
                    format!("Difficulty set to {value}")
                }),
                Err(err) => self.emit(json!({ "error": err.to_string() }), || err.to_string()),
            },
            Command::Validate => {
                let result = self.chain.verify();
                self.emit(
                    json!({
                        "valid": result.is_ok(),
                        "error": result.as_ref().err().map(ToString::to_string),
                    }),
                    || match &result {
                        Ok(()) => "Blockchain is valid".to_string(),
                        Err(err) => format!("Blockchain is invalid: {err}"),
                    },
                );
            }
            Command::Show => {
                let rows: Vec<BlockRow> = self
                    .chain
                    .iter()
                    .enumerate()
                    .map(|(index, block)| BlockRow::new(index, block))
                    .collect();
                self.emit_rows(&rows)?;
            }
            Command::Inspect { index } => match self.chain.get(index) {
                Some(block) => self.emit_rows(&[BlockRow::new(index, block)])?,
                None => self.emit(json!({ "error": format!("no block at index {index}") }), || {
                    format!("No block at index {index} (chain has {})", self.chain.len())
                }),
            },
            Command::Tip => {
                let index = self.chain.len() - 1;
                self.emit_rows(&[BlockRow::new(index, self.chain.tip())])?;
            }
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn add(&mut self, record: Record) -> Result<()> {
        let candidate = self.chain.candidate(record, self.args.creator_id);
        let difficulty = self.chain.difficulty();
        let parallel = self.args.parallel;
        let mut control = MiningControl::new();
        if let Some(max) = self.args.max_attempts {
            control = control.with_max_attempts(max);
        }
        let worker_control = control.clone();

        let mut worker = tokio::task::spawn_blocking(move || {
            if parallel {
                pow::mine_block_parallel(candidate, difficulty, &worker_control)
            } else {
                pow::try_mine_block(candidate, difficulty, &worker_control)
            }
        });
        let timeout = self.args.timeout_secs;
        let deadline = async move {
            match timeout {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            joined = &mut worker => joined.context("mining worker failed")?,
            _ = deadline => {
                warn!("mining timed out");
                control.cancel();
                worker.await.context("mining worker failed")?
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("mining interrupted");
                control.cancel();
                worker.await.context("mining worker failed")?
            }
        };

        match outcome {
            Ok(sealed) => {
                // Already sealed at this difficulty, so this only appends.
                let index = self.chain.len();
                let block = self.chain.add_candidate(sealed);
                info!(index, "block added");
                let row = BlockRow::new(index, block);
                if self.args.json {
                    println!("{}", serde_json::to_string(&row)?);
                } else {
                    println!("Added block {index}: {}", row.digest);
                }
            }
            Err(err) => self.report_mining_error(err),
        }
        Ok(())
    }

    fn report_mining_error(&self, err: MiningError) {
        self.emit(json!({ "error": err.to_string() }), || {
            format!("Block not added: {err}")
        });
    }

    fn emit(&self, value: serde_json::Value, text: impl FnOnce() -> String) {
        if self.args.json {
            println!("{value}");
        } else {
            println!("{}", text());
        }
    }

    fn emit_rows(&self, rows: &[BlockRow]) -> Result<()> {
        if self.args.json {
            println!("{}", serde_json::to_string_pretty(rows)?);
            return Ok(());
        }
        for row in rows {
            println!("{}", render_row(row));
        }
        Ok(())
    }
}

fn render_row(row: &BlockRow) -> String {
    let block = row.block;
    let amount = match row.amount_value {
        Some(_) => block.record.amount.clone(),
        None => format!("{:?} (not a number)", block.record.amount),
    };
    format!(
        "#{:<3} creator={:<4} nonce={:<8} time={} prev={} hash={}  {} -> {} : {}",
        row.index,
        block.creator_id,
        block.nonce,
        block.timestamp,
        short(&block.prev_hash),
        short(&row.digest),
        block.record.sender,
        block.record.receiver,
        amount,
    )
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
