use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use powledger::config::Settings;
use powledger::peer::HttpChainFetcher;
use powledger::storage::ChainStore;
use powledger::{ConsensusResolver, Ledger, Node, Transaction};

#[derive(Parser)]
#[clap(name = "powledger-node", version, about = "Proof-of-work ledger node")]
struct Cli {
    /// Configuration file (defaults to ./powledger.toml if present)
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mine blocks, each carrying one placeholder transaction
    Mine {
        #[clap(short, long, default_value_t = 1)]
        blocks: u32,
    },
    /// Replace the local chain with the longest valid peer chain
    Resolve,
    /// Validate the local chain
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;

    let level: Level = settings
        .log
        .level
        .parse()
        .with_context(|| format!("invalid log level {:?}", settings.log.level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let store = match &settings.storage.path {
        Some(path) => Some(ChainStore::open(path).context("opening chain store")?),
        None => None,
    };
    let ledger = match &store {
        Some(store) => store.load_chain()?.map(Ledger::from_chain).unwrap_or_default(),
        None => Ledger::new(),
    };
    info!(blocks = ledger.chain().len(), peers = settings.node.peers.len(), "node starting");

    let fetcher = Arc::new(HttpChainFetcher::new());
    let resolver = ConsensusResolver::new(fetcher, settings.peer_timeout());
    let mut node = Node::new(ledger, resolver, settings.node.peers.clone());
    if let Some(store) = store {
        node = node.with_store(store);
    }
    let node = Arc::new(node);

    match cli.command {
        Command::Mine { blocks } => {
            let interrupt = node.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, cancelling mining");
                    interrupt.cancel_mining().await;
                }
            });

            for _ in 0..blocks {
                node.enqueue_transaction(Transaction::placeholder()).await;
                let block = node.mine_block().await?;
                info!(
                    index = block.index(),
                    proof = block.proof(),
                    hash = block.hash(),
                    "block mined"
                );
            }
        }
        Command::Resolve => {
            let adopted = node.resolve_conflicts().await?;
            let blocks = node.ledger().read().await.chain().len();
            info!(adopted, blocks, "consensus round finished");
        }
        Command::Verify => {
            if !node.is_chain_valid().await {
                bail!("local chain failed validation");
            }
            info!("local chain is valid");
        }
    }

    Ok(())
}
